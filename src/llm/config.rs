use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::llm::provider::ProviderKind;

/// Persisted provider credentials and overrides.
///
/// Stored as JSON under the user config directory with owner-only
/// permissions; API keys are obfuscated with a machine-derived key before
/// they touch disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub default_provider: Option<String>,
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub encrypted: bool,
}

impl LlmConfig {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let mut config: LlmConfig = serde_json::from_str(&content)?;
            config.decrypt_api_keys()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Clone and obfuscate API keys before they hit disk
        let mut config_to_save = self.clone();
        config_to_save.encrypt_api_keys()?;

        let content = serde_json::to_string_pretty(&config_to_save)?;
        fs::write(&config_path, content)?;

        // Restrict the config file to the owner (Unix only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&config_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&config_path, perms)?;
        }

        Ok(())
    }

    /// Path of the config file: `$XDG_CONFIG_HOME/shadowpilot/config.json`,
    /// falling back to `~/.config`.
    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".config")
        } else {
            return Err(anyhow!("Cannot determine config directory"));
        };

        Ok(config_dir.join("shadowpilot").join("config.json"))
    }

    /// Set API key for a provider
    pub fn set_api_key(&mut self, provider: ProviderKind, api_key: String) {
        let provider_config = self.providers.entry(provider.key().to_string()).or_default();
        provider_config.api_key = api_key;
        provider_config.encrypted = false; // Will be obfuscated when saved
    }

    /// Get API key for a provider, from config only
    pub fn get_api_key(&self, provider: ProviderKind) -> Option<&str> {
        self.providers
            .get(provider.key())
            .map(|config| config.api_key.as_str())
    }

    /// API key for a provider, falling back to the vendor's environment
    /// variable when the config has none.
    pub fn get_api_key_with_fallback(&self, provider: ProviderKind) -> Option<String> {
        if let Some(key) = self.get_api_key(provider) {
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }
        env::var(provider.env_var()).ok().filter(|k| !k.is_empty())
    }

    /// Set default provider
    pub fn set_default_provider(&mut self, provider: String) -> Result<()> {
        ProviderKind::from_key(&provider)?;
        self.default_provider = Some(provider);
        Ok(())
    }

    /// Get default provider
    pub fn get_default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Set model for a provider
    pub fn set_model(&mut self, provider: ProviderKind, model: String) {
        let provider_config = self.providers.entry(provider.key().to_string()).or_default();
        provider_config.model = Some(model);
    }

    /// Get model for a provider
    pub fn get_model(&self, provider: ProviderKind) -> Option<&str> {
        self.providers
            .get(provider.key())
            .and_then(|config| config.model.as_deref())
    }

    /// Set base URL for a provider (useful for gateways or test servers)
    pub fn set_base_url(&mut self, provider: ProviderKind, base_url: String) {
        let provider_config = self.providers.entry(provider.key().to_string()).or_default();
        provider_config.base_url = Some(base_url);
    }

    /// Get base URL for a provider
    pub fn get_base_url(&self, provider: ProviderKind) -> Option<&str> {
        self.providers
            .get(provider.key())
            .and_then(|config| config.base_url.as_deref())
    }

    /// Remove a provider configuration
    pub fn remove_provider(&mut self, provider: ProviderKind) -> bool {
        self.providers.remove(provider.key()).is_some()
    }

    /// Check if a provider has an API key in the config
    pub fn has_provider(&self, provider: ProviderKind) -> bool {
        self.providers
            .get(provider.key())
            .is_some_and(|config| !config.api_key.is_empty())
    }

    /// Generate or get the obfuscation key
    fn get_encryption_key(&self) -> Result<String> {
        if let Some(key) = &self.encryption_key {
            Ok(key.clone())
        } else {
            // Derive a stable key from machine-specific information
            let hostname = hostname::get()
                .map_err(|_| anyhow!("Cannot get hostname"))?
                .to_string_lossy()
                .to_string();

            let user = env::var("USER")
                .or_else(|_| env::var("USERNAME"))
                .unwrap_or_else(|_| "unknown".to_string());

            let key_material = format!("shadowpilot-{}-{}", hostname, user);
            let encoded = general_purpose::STANDARD.encode(key_material.as_bytes());

            // Take first 32 characters for a consistent key
            Ok(encoded.chars().take(32).collect())
        }
    }

    fn encrypt_api_keys(&mut self) -> Result<()> {
        let key = self.get_encryption_key()?;

        for provider_config in self.providers.values_mut() {
            if !provider_config.encrypted && !provider_config.api_key.is_empty() {
                provider_config.api_key = Self::simple_encrypt(&provider_config.api_key, &key)?;
                provider_config.encrypted = true;
            }
        }

        Ok(())
    }

    fn decrypt_api_keys(&mut self) -> Result<()> {
        let key = self.get_encryption_key()?;

        for provider_config in self.providers.values_mut() {
            if provider_config.encrypted && !provider_config.api_key.is_empty() {
                provider_config.api_key = Self::simple_decrypt(&provider_config.api_key, &key)?;
                provider_config.encrypted = false;
            }
        }

        Ok(())
    }

    /// XOR-based obfuscation (not cryptographically secure, but better than
    /// plaintext on disk)
    fn simple_encrypt(data: &str, key: &str) -> Result<String> {
        let key_bytes = key.as_bytes();
        let encrypted: Vec<u8> = data
            .as_bytes()
            .iter()
            .enumerate()
            .map(|(i, &byte)| byte ^ key_bytes[i % key_bytes.len()])
            .collect();

        Ok(general_purpose::STANDARD.encode(&encrypted))
    }

    fn simple_decrypt(encrypted_data: &str, key: &str) -> Result<String> {
        let encrypted_bytes = general_purpose::STANDARD.decode(encrypted_data)?;
        let key_bytes = key.as_bytes();

        let decrypted: Vec<u8> = encrypted_bytes
            .iter()
            .enumerate()
            .map(|(i, &byte)| byte ^ key_bytes[i % key_bytes.len()])
            .collect();

        String::from_utf8(decrypted).map_err(|e| anyhow!("Decryption failed: {}", e))
    }

    /// Validate configuration
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.providers.is_empty() {
            warnings.push("No LLM providers configured".to_string());
        }

        for (provider_name, config) in &self.providers {
            if config.api_key.is_empty() {
                warnings.push(format!("Provider '{}' has no API key", provider_name));
            }
            if ProviderKind::from_key(provider_name).is_err() {
                warnings.push(format!("Unknown provider: '{}'", provider_name));
            }
        }

        if let Some(default) = &self.default_provider {
            if !self.providers.contains_key(default) {
                warnings.push(format!("Default provider '{}' is not configured", default));
            }
        }

        warnings
    }

    /// True when at least one provider has a usable API key.
    pub fn is_configured(&self) -> bool {
        self.providers.values().any(|config| !config.api_key.is_empty())
    }
}
