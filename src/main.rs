use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

mod analysis;
mod filter;
mod lifecycle;
mod llm;
mod planning;
mod workspace;

use analysis::formatter;
use analysis::tree::{self, AnalysisData, AnalysisTreeProvider};
use filter::FileFilter;
use lifecycle::{Disposables, ShadowSweeper};
use llm::{LlmConfig, ProviderFactory, ProviderKind};
use planning::{LoadOutcome, TestPlanningService};
use workspace::{ScanReport, WorkspaceScanner};

#[derive(Parser)]
#[command(name = "shadowpilot")]
#[command(about = "🔍 ShadowPilot - Workspace Analysis and AI Test Planning")]
#[command(long_about = "ShadowPilot scans a source tree for functions and review findings, renders them as
prompt-ready markdown for AI assistants, and asks an LLM provider to draft a prioritized
test plan that is persisted under the workspace's .shadow/ directory.

Perfect for getting a quick picture of an unfamiliar codebase and deciding what to test first.")]
#[command(version = "0.1.0")]
#[command(author = "ShadowPilot Team")]
#[command(help_template = "{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}

EXAMPLES:
    # Scan the current directory and print findings
    shadowpilot analyze

    # Render the analysis tree for another workspace
    shadowpilot tree ../backend

    # Store a key, then generate a test plan
    shadowpilot config set-key claude sk-ant-...
    shadowpilot plan --provider claude

    # Review the persisted plan later
    shadowpilot show-plan

For more help on specific commands, use: shadowpilot <command> --help")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🔍 Scan a workspace and print analysis findings
    #[command(alias = "scan", alias = "check")]
    #[command(long_about = "Walk the workspace, extract a function inventory, and report review findings.

Findings cover unresolved merge conflicts, oversized functions, leftover debug prints,
and TODO/FIXME/HACK markers. The output is markdown meant to be pasted into an AI
assistant; pick the variant that matches where you are pasting it.

EXAMPLES:
    shadowpilot analyze                                  # Current directory, generic report
    shadowpilot analyze ../backend --format cursor       # Compact bullets for inline assistants
    shadowpilot scan --format chatgpt                    # Verbose review request for chat assistants
    shadowpilot analyze --exclude \"**/*.test.ts\" --exclude \"**/generated/**\"")]
    Analyze {
        /// Workspace directory to scan (defaults to the current directory)
        #[arg(help = "Workspace directory to scan")]
        path: Option<PathBuf>,

        /// Output format for the findings
        #[arg(
            short,
            long,
            default_value = "generic",
            help = "Output format: generic, cursor, chatgpt"
        )]
        format: String,

        /// Glob patterns to exclude from the scan
        #[arg(short, long = "exclude", help = "Glob pattern to exclude (repeatable)")]
        exclude: Vec<String>,
    },

    /// 🌳 Render the hierarchical analysis view of a workspace
    #[command(alias = "view")]
    #[command(long_about = "Scan the workspace and render the findings as an indented tree.

The tree starts with a summary node, then one node per file with findings, each holding
its functions and issues. Useful for a quick structural overview before diving in.

EXAMPLES:
    shadowpilot tree
    shadowpilot view ../backend --exclude \"**/vendor/**\"")]
    Tree {
        /// Workspace directory to scan (defaults to the current directory)
        #[arg(help = "Workspace directory to scan")]
        path: Option<PathBuf>,

        /// Glob patterns to exclude from the scan
        #[arg(short, long = "exclude", help = "Glob pattern to exclude (repeatable)")]
        exclude: Vec<String>,
    },

    /// 🤖 Generate an AI test plan and persist it under .shadow/
    #[command(alias = "plan-tests")]
    #[command(long_about = "Run the full planning workflow: scan the workspace, project the function inventory,
build a planning prompt, ask the selected LLM provider for a test plan, and save the
result to <workspace>/.shadow/test-plan.json.

The provider defaults to the configured default provider, then to claude. Optional
product documentation and architecture notes are folded into the prompt to ground
the plan in domain knowledge.

EXAMPLES:
    shadowpilot plan                                        # Current directory, default provider
    shadowpilot plan ../backend --provider openai
    shadowpilot plan --product-docs docs/product.md --architecture docs/arch.md
    shadowpilot plan --exclude \"**/*.spec.ts\"")]
    Plan {
        /// Workspace directory to plan for (defaults to the current directory)
        #[arg(help = "Workspace directory to plan for")]
        path: Option<PathBuf>,

        /// LLM provider to use
        #[arg(short, long, help = "LLM provider: openai, claude")]
        provider: Option<String>,

        /// Product documentation folded into the planning prompt
        #[arg(long, help = "Markdown file with product documentation")]
        product_docs: Option<PathBuf>,

        /// Architecture notes folded into the planning prompt
        #[arg(long, help = "Markdown file with architecture insights")]
        architecture: Option<PathBuf>,

        /// Glob patterns to exclude from the scan
        #[arg(short, long = "exclude", help = "Glob pattern to exclude (repeatable)")]
        exclude: Vec<String>,
    },

    /// 📋 Show the persisted test plan for a workspace
    #[command(alias = "show")]
    #[command(long_about = "Load the test plan saved by a previous 'plan' run and print its functions in
priority order. Functions in higher-priority groups (lower numbers) come first;
ungrouped priorities sort last.

EXAMPLES:
    shadowpilot show-plan
    shadowpilot show ../backend")]
    ShowPlan {
        /// Workspace directory to read the plan from (defaults to the current directory)
        #[arg(help = "Workspace directory to read the plan from")]
        path: Option<PathBuf>,
    },

    /// 📡 List known LLM providers and their configuration state
    #[command(long_about = "Show every provider ShadowPilot knows about, whether it has a usable API key
(from the config file or the vendor's environment variable), the model that would be
used, and the static per-provider request budget.

EXAMPLES:
    shadowpilot providers")]
    Providers,

    /// ⚙️ Configure LLM provider credentials and overrides
    #[command(alias = "cfg", alias = "setup")]
    #[command(long_about = "Manage provider API keys, model overrides, base URLs and the default provider.

Configuration lives in a JSON file under your user config directory with owner-only
permissions; API keys are obfuscated before they reach disk. Environment variables
(ANTHROPIC_API_KEY, OPENAI_API_KEY) act as a fallback when no key is stored.

EXAMPLES:
    shadowpilot config                                    # Show current configuration
    shadowpilot config set-key claude sk-ant-...          # Store an API key
    shadowpilot config set-model openai gpt-4-turbo       # Override the model
    shadowpilot config set-url openai http://localhost:8080/v1
    shadowpilot config set-default claude
    shadowpilot config test claude                        # Round-trip connectivity check")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Store an API key for a provider
    SetKey {
        /// Provider to store the key for
        #[arg(help = "Provider key: openai, claude")]
        provider: String,
        /// The API key (obfuscated before it reaches disk)
        #[arg(help = "API key for the provider")]
        key: String,
    },

    /// Override the model used for a provider
    SetModel {
        #[arg(help = "Provider key: openai, claude")]
        provider: String,
        #[arg(help = "Model identifier (e.g. gpt-4-turbo)")]
        model: String,
    },

    /// Override the API base URL for a provider
    SetUrl {
        #[arg(help = "Provider key: openai, claude")]
        provider: String,
        #[arg(help = "Base URL (e.g. http://localhost:8080/v1 for a gateway)")]
        url: String,
    },

    /// Choose the provider used when --provider is omitted
    SetDefault {
        #[arg(help = "Provider key: openai, claude")]
        provider: String,
    },

    /// Remove a provider's stored configuration
    Remove {
        #[arg(help = "Provider key: openai, claude")]
        provider: String,
    },

    /// Show the current configuration
    Show,

    /// Send a connectivity check through a provider
    Test {
        #[arg(help = "Provider key: openai, claude")]
        provider: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            path,
            format,
            exclude,
        } => {
            // Reject a bad format before spending time on the scan
            match format.as_str() {
                "generic" | "cursor" | "chatgpt" => {}
                _ => {
                    eprintln!("❌ Invalid format: {}", format);
                    eprintln!("   Valid formats: generic, cursor, chatgpt");
                    std::process::exit(1);
                }
            }

            let root = resolve_workspace(path)?;
            let report = scan_workspace(&root, &exclude)?;

            println!("🔍 Analyzed {}", root.display());
            println!(
                "   Files scanned: {} ({} skipped)",
                report.files_scanned, report.files_skipped
            );
            println!(
                "   Functions found: {}",
                report.analysis.functions.as_ref().map(Vec::len).unwrap_or(0)
            );
            println!("   Issues found: {}", report.issues.len());
            if !report.languages.is_empty() {
                println!("   Languages: {}", report.languages.join(", "));
            }
            println!();

            let rendered = match format.as_str() {
                "cursor" => formatter::format_for_cursor(&report.issues),
                "chatgpt" => formatter::format_for_chatgpt(&report.issues),
                _ => formatter::format_generic(&report.issues),
            };
            println!("{}", rendered);
        }
        Commands::Tree { path, exclude } => {
            let root = resolve_workspace(path)?;
            let report = scan_workspace(&root, &exclude)?;

            let mut provider = AnalysisTreeProvider::new();
            provider.set_analysis_data(AnalysisData::from_analysis(
                &report.analysis,
                &report.issues,
            ));

            println!("🌳 Analysis tree for {}", root.display());
            println!();
            print!("{}", tree::render(&provider));
        }
        Commands::Plan {
            path,
            provider,
            product_docs,
            architecture,
            exclude,
        } => {
            let root = resolve_workspace(path)?;

            let config = match LlmConfig::load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            };

            // Fall back to the configured default, then to claude
            let provider_key = provider
                .or_else(|| config.get_default_provider().map(|s| s.to_string()))
                .unwrap_or_else(|| ProviderKind::Claude.key().to_string());
            if let Err(e) = ProviderKind::from_key(&provider_key) {
                eprintln!("❌ {}", e);
                eprintln!("   Known providers: openai, claude");
                std::process::exit(1);
            }

            let mut disposables = Disposables::new();
            disposables.register(Box::new(ShadowSweeper::new(&root)));

            let result = run_plan(
                &root,
                config,
                &provider_key,
                product_docs,
                architecture,
                &exclude,
            )
            .await;

            for failure in disposables.dispose_all() {
                log::warn!("teardown of {} failed: {}", failure.name, failure.error);
            }

            if let Err(e) = result {
                eprintln!("❌ Failed to create test plan: {}", e);
                eprintln!("   Check provider configuration with: shadowpilot providers");
                std::process::exit(1);
            }
        }
        Commands::ShowPlan { path } => {
            let root = resolve_workspace(path)?;
            let service = TestPlanningService::new();

            match service.load_test_plan_detailed(&root) {
                LoadOutcome::Loaded(plan) => {
                    println!("📋 Test plan for {}", root.display());
                    println!(
                        "   Functions: {}/{} considered testable",
                        plan.testable_functions, plan.total_functions
                    );
                    println!("   Groups: {}", plan.function_groups.len());
                    println!();

                    let prioritized = service.get_prioritized_functions(&plan);
                    if prioritized.is_empty() {
                        println!("ℹ️  The plan contains no functions.");
                    } else {
                        println!("🎯 Functions in priority order:");
                        for (index, function) in prioritized.iter().enumerate() {
                            println!(
                                "   {}. {}({}) - {}:{} [{}]",
                                index + 1,
                                function.name,
                                function.parameters.join(", "),
                                function.file,
                                function.start_line,
                                function.complexity
                            );
                        }
                    }
                }
                LoadOutcome::NotFound => {
                    println!("ℹ️  No test plan found for {}", root.display());
                    println!("   Create one with: shadowpilot plan {}", root.display());
                }
                LoadOutcome::Invalid(reason) => {
                    eprintln!("⚠️  The stored test plan could not be read: {}", reason);
                    eprintln!("   Re-create it with: shadowpilot plan {}", root.display());
                    std::process::exit(1);
                }
            }
        }
        Commands::Providers => {
            let config = match LlmConfig::load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            };
            let factory = ProviderFactory::new(config);

            println!("📡 LLM Providers");
            println!("================");
            for kind in ProviderKind::ALL {
                let stored = factory.config().has_provider(kind);
                let env_set = std::env::var(kind.env_var()).is_ok_and(|v| !v.is_empty());
                let status = if stored {
                    "✓ key stored"
                } else if env_set {
                    "✓ key from environment"
                } else {
                    "✗ no key"
                };
                let model = factory
                    .config()
                    .get_model(kind)
                    .unwrap_or(kind.default_model());

                println!();
                println!("{} ({})", kind.key(), status);
                println!("   Model: {}", model);
                println!("   Env var: {}", kind.env_var());
                if let Some(url) = factory.config().get_base_url(kind) {
                    println!("   Base URL: {}", url);
                }
                if let Some(limit) = factory.rate_limiter().config(kind) {
                    println!(
                        "   Rate limit: {} requests / {}s window",
                        limit.max_requests,
                        limit.window_ms / 1000
                    );
                }
            }

            println!();
            match factory.config().get_default_provider() {
                Some(default) => println!("Default provider: {}", default),
                None => println!("Default provider: not set (plan falls back to claude)"),
            }
        }
        Commands::Config { action } => {
            let mut config = match LlmConfig::load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load configuration: {}", e);
                    std::process::exit(1);
                }
            };

            match action.unwrap_or(ConfigAction::Show) {
                ConfigAction::SetKey { provider, key } => {
                    let kind = parse_provider(&provider);
                    config.set_api_key(kind, key);
                    save_config(&config);
                    println!("✅ API key stored for {}", kind);
                    println!("   Keys are obfuscated before they reach disk");
                }
                ConfigAction::SetModel { provider, model } => {
                    let kind = parse_provider(&provider);
                    config.set_model(kind, model.clone());
                    save_config(&config);
                    println!("✅ Model for {} set to {}", kind, model);
                }
                ConfigAction::SetUrl { provider, url } => {
                    let kind = parse_provider(&provider);
                    config.set_base_url(kind, url.clone());
                    save_config(&config);
                    println!("✅ Base URL for {} set to {}", kind, url);
                }
                ConfigAction::SetDefault { provider } => match config
                    .set_default_provider(provider.clone())
                {
                    Ok(()) => {
                        save_config(&config);
                        println!("✅ Default provider set to {}", provider);
                    }
                    Err(e) => {
                        eprintln!("❌ {}", e);
                        eprintln!("   Known providers: openai, claude");
                        std::process::exit(1);
                    }
                },
                ConfigAction::Remove { provider } => {
                    let kind = parse_provider(&provider);
                    if config.remove_provider(kind) {
                        if config.get_default_provider() == Some(kind.key()) {
                            config.default_provider = None;
                        }
                        save_config(&config);
                        println!("✅ Removed configuration for {}", kind);
                    } else {
                        println!("ℹ️  No configuration stored for {}", kind);
                    }
                }
                ConfigAction::Show => {
                    show_config(&config);
                }
                ConfigAction::Test { provider } => {
                    let kind = parse_provider(&provider);
                    let mut factory = ProviderFactory::new(config);
                    let client = match factory.get_provider(kind.key()) {
                        Ok(client) => client,
                        Err(e) => {
                            eprintln!("❌ {}", e);
                            std::process::exit(1);
                        }
                    };

                    println!("🔌 Testing connection to {} ({})...", kind, client.model());
                    match client.test_connection().await {
                        Ok(()) => println!("✅ Connection OK"),
                        Err(e) => {
                            eprintln!("❌ Connection failed: {}", e);
                            std::process::exit(1);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// The planning workflow proper: scan, project, prompt, persist.
async fn run_plan(
    root: &Path,
    config: LlmConfig,
    provider_key: &str,
    product_docs: Option<PathBuf>,
    architecture: Option<PathBuf>,
    exclude: &[String],
) -> Result<()> {
    let report = scan_workspace(root, exclude)?;
    let service = TestPlanningService::new();
    let functions = service.analyze_functions(Some(&report.analysis));

    if functions.is_empty() {
        println!("ℹ️  No functions found in {}", root.display());
        println!("   Nothing to plan tests for.");
        return Ok(());
    }

    println!(
        "🔍 Found {} functions across {} files",
        functions.len(),
        report.files_scanned
    );

    let product_docs = read_context_file(product_docs.as_deref(), "product docs")?;
    let architecture = read_context_file(architecture.as_deref(), "architecture notes")?;

    let mut factory = ProviderFactory::new(config);
    let client = factory.get_provider(provider_key)?;
    println!(
        "🤖 Asking {} ({}) for a test plan...",
        provider_key,
        client.model()
    );

    let context = report.planning_context();
    let plan = service
        .create_test_plan(
            &context,
            &functions,
            client.as_ref(),
            product_docs.as_deref(),
            architecture.as_deref(),
        )
        .await?;

    let plan_path = service.save_test_plan(root, &plan)?;

    println!("✅ Test plan created!");
    println!(
        "   Functions: {}/{} considered testable",
        plan.testable_functions, plan.total_functions
    );
    println!("   Groups: {}", plan.function_groups.len());
    println!("📄 Saved to: {}", plan_path.display());
    println!();
    println!("💡 Review it with: shadowpilot show-plan {}", root.display());
    Ok(())
}

/// Resolve the workspace argument, defaulting to the current directory.
fn resolve_workspace(path: Option<PathBuf>) -> Result<PathBuf> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        eprintln!("❌ Not a directory: {}", root.display());
        std::process::exit(1);
    }
    Ok(root)
}

/// Scan a workspace with the given exclusion patterns.
fn scan_workspace(root: &Path, exclude: &[String]) -> Result<ScanReport> {
    let scanner = WorkspaceScanner::new(FileFilter::new(exclude));
    scanner.scan(root)
}

/// Parse a provider key, exiting with a hint when it is unknown.
fn parse_provider(key: &str) -> ProviderKind {
    match ProviderKind::from_key(key) {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("   Known providers: openai, claude");
            std::process::exit(1);
        }
    }
}

/// Persist the config, exiting on failure.
fn save_config(config: &LlmConfig) {
    if let Err(e) = config.save() {
        eprintln!("❌ Failed to save configuration: {}", e);
        std::process::exit(1);
    }
}

/// Read an optional prompt-context file, failing loudly on a bad path.
fn read_context_file(path: Option<&Path>, what: &str) -> Result<Option<String>> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| anyhow!("Failed to read {} file {}: {}", what, path.display(), e))?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

fn show_config(config: &LlmConfig) {
    println!("⚙️  ShadowPilot Configuration");
    println!("============================");
    if let Ok(path) = LlmConfig::config_file_path() {
        println!("Config file: {}", path.display());
    }
    match config.get_default_provider() {
        Some(default) => println!("Default provider: {}", default),
        None => println!("Default provider: not set"),
    }

    println!();
    println!("Providers:");
    for kind in ProviderKind::ALL {
        let has_key = config.has_provider(kind);
        let model = config.get_model(kind).unwrap_or(kind.default_model());

        print!(
            "  {} - API key: {} - Model: {}",
            kind.key(),
            if has_key { "✓" } else { "✗" },
            model
        );
        if let Some(url) = config.get_base_url(kind) {
            print!(" - Base URL: {}", url);
        }
        println!();
    }

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in warnings {
            println!("  ⚠ {}", warning);
        }
    }
}
