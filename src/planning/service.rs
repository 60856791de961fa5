//! Test planning workflow
//!
//! Orchestrates the planning steps: project analyzer output into testable
//! functions, hand a prompt to the LLM boundary, persist the resulting plan
//! under the workspace shadow directory, and read it back later. Holds no
//! state between calls; the plan file is the only shared resource.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::issue::CodeAnalysis;
use crate::llm::prompt;
use crate::planning::plan::{TestPlan, TestableFunction};

/// Hidden per-workspace directory for generated artifacts.
pub const SHADOW_DIR: &str = ".shadow";
/// Fixed plan filename inside the shadow directory.
pub const PLAN_FILE: &str = "test-plan.json";

/// Workspace facts fed into the planning prompt.
#[derive(Debug, Clone, Default)]
pub struct PlanningContext {
    pub workspace_name: String,
    pub root: PathBuf,
    pub file_count: usize,
    pub languages: Vec<String>,
}

/// The LLM boundary for planning: turn a prompt into a [`TestPlan`].
///
/// Implemented by the real provider client and by test mocks. Whatever error
/// an implementation produces propagates through the workflow verbatim.
#[allow(async_fn_in_trait)]
pub trait TestStrategy {
    async fn generate_test_strategy(&self, prompt: &str) -> Result<TestPlan>;
}

/// Outcome of reading the persisted plan, keeping "no file" apart from
/// "file present but unreadable".
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(TestPlan),
    NotFound,
    Invalid(String),
}

#[derive(Debug, Default)]
pub struct TestPlanningService;

impl TestPlanningService {
    pub fn new() -> Self {
        Self
    }

    /// Project raw analyzer output into testable-function records.
    ///
    /// Missing analysis or a missing `functions` field yields an empty list;
    /// this never fails. Absent complexity defaults to "unknown" and absent
    /// parameter lists to empty, so downstream consumers see a uniform shape.
    pub fn analyze_functions(&self, analysis: Option<&CodeAnalysis>) -> Vec<TestableFunction> {
        let functions = match analysis.and_then(|a| a.functions.as_ref()) {
            Some(functions) => functions,
            None => return Vec::new(),
        };

        let testable: Vec<TestableFunction> = functions
            .iter()
            .map(|f| TestableFunction {
                name: f.name.clone(),
                file: f.file.clone(),
                start_line: f.start_line,
                end_line: f.end_line,
                lines: f.lines,
                complexity: f
                    .complexity
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                parameters: f.parameters.clone().unwrap_or_default(),
                return_type: f.return_type.clone(),
            })
            .collect();

        log::debug!("projected {} testable functions", testable.len());
        testable
    }

    /// Build the planning prompt and delegate to the LLM boundary.
    ///
    /// The returned plan is whatever the strategy produced, unmodified; this
    /// performs no shape validation beyond what the log lines read. Strategy
    /// failures propagate verbatim.
    pub async fn create_test_plan(
        &self,
        context: &PlanningContext,
        functions: &[TestableFunction],
        llm: &impl TestStrategy,
        product_docs: Option<&str>,
        architecture_insights: Option<&str>,
    ) -> Result<TestPlan> {
        let prompt =
            prompt::build_planning_prompt(context, functions, product_docs, architecture_insights);
        log::debug!("planning prompt is {} characters", prompt.len());

        let plan = llm.generate_test_strategy(&prompt).await?;
        log::info!(
            "received test plan: {} groups, {}/{} functions testable",
            plan.function_groups.len(),
            plan.testable_functions,
            plan.total_functions
        );
        Ok(plan)
    }

    /// Write the plan as pretty-printed JSON to the fixed path under the
    /// workspace shadow directory, creating the directory if needed. Each
    /// save fully replaces the previous plan. Returns the written path.
    pub fn save_test_plan(&self, workspace_root: &Path, plan: &TestPlan) -> Result<PathBuf> {
        let shadow_dir = workspace_root.join(SHADOW_DIR);
        fs::create_dir_all(&shadow_dir)
            .map_err(|e| anyhow!("Failed to create {}: {}", shadow_dir.display(), e))?;

        let plan_file = shadow_dir.join(PLAN_FILE);
        let content = serde_json::to_string_pretty(plan)?;

        // Write to temporary file first for atomic operation
        let temp_file = plan_file.with_extension("tmp");
        fs::write(&temp_file, &content)
            .map_err(|e| anyhow!("Failed to write {}: {}", temp_file.display(), e))?;

        // Atomic rename to final location
        fs::rename(&temp_file, &plan_file)
            .map_err(|e| anyhow!("Failed to finalize {}: {}", plan_file.display(), e))?;

        log::info!("saved test plan to {}", plan_file.display());
        Ok(plan_file)
    }

    /// Load the persisted plan, treating a missing or unreadable file as "no
    /// plan". Parse failures are logged and collapsed to `None`.
    pub fn load_test_plan(&self, workspace_root: &Path) -> Option<TestPlan> {
        match self.load_test_plan_detailed(workspace_root) {
            LoadOutcome::Loaded(plan) => Some(plan),
            LoadOutcome::NotFound => None,
            LoadOutcome::Invalid(reason) => {
                log::warn!("ignoring unreadable test plan: {}", reason);
                None
            }
        }
    }

    /// Load with the distinction between "no file" and "file present but
    /// unreadable" kept, for callers that want to report the difference.
    pub fn load_test_plan_detailed(&self, workspace_root: &Path) -> LoadOutcome {
        let plan_file = workspace_root.join(SHADOW_DIR).join(PLAN_FILE);
        if !plan_file.exists() {
            return LoadOutcome::NotFound;
        }

        let content = match fs::read_to_string(&plan_file) {
            Ok(content) => content,
            Err(e) => return LoadOutcome::Invalid(format!("read {}: {}", plan_file.display(), e)),
        };
        match serde_json::from_str(&content) {
            Ok(plan) => LoadOutcome::Loaded(plan),
            Err(e) => LoadOutcome::Invalid(format!("parse {}: {}", plan_file.display(), e)),
        }
    }

    /// Flatten all groups in group order, then stably sort by each function's
    /// owning group priority, ascending. The name lookup is built while
    /// flattening, so a name in several groups takes the last-seen group's
    /// priority; names mapping to no priority sort last with rank 999.
    pub fn get_prioritized_functions(&self, plan: &TestPlan) -> Vec<TestableFunction> {
        let mut priorities: HashMap<String, Option<i32>> = HashMap::new();
        let mut flattened = Vec::new();

        for group in &plan.function_groups {
            for function in &group.functions {
                priorities.insert(function.name.clone(), group.priority);
                flattened.push(function.clone());
            }
        }

        flattened.sort_by_key(|f| priorities.get(&f.name).copied().flatten().unwrap_or(999));
        flattened
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::issue::RawFunction;
    use crate::planning::plan::FunctionGroup;
    use tempfile::TempDir;

    fn function(name: &str) -> TestableFunction {
        TestableFunction {
            name: name.to_string(),
            file: "src/app.ts".to_string(),
            start_line: 1,
            end_line: 10,
            lines: 10,
            complexity: "low".to_string(),
            parameters: vec!["input".to_string()],
            return_type: Some("string".to_string()),
        }
    }

    fn plan_with_groups(groups: Vec<FunctionGroup>) -> TestPlan {
        let count = groups.iter().map(|g| g.functions.len()).sum();
        TestPlan {
            total_functions: count,
            testable_functions: count,
            function_groups: groups,
        }
    }

    #[test]
    fn test_analyze_functions_applies_defaults() {
        let analysis = CodeAnalysis {
            functions: Some(vec![RawFunction {
                name: "f".to_string(),
                file: "a.ts".to_string(),
                start_line: 1,
                end_line: 5,
                lines: 5,
                complexity: None,
                parameters: None,
                return_type: None,
            }]),
        };

        let service = TestPlanningService::new();
        let result = service.analyze_functions(Some(&analysis));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "f");
        assert_eq!(result[0].complexity, "unknown");
        assert!(result[0].parameters.is_empty());
        assert!(result[0].return_type.is_none());
    }

    #[test]
    fn test_analyze_functions_keeps_present_values() {
        let analysis = CodeAnalysis {
            functions: Some(vec![RawFunction {
                name: "g".to_string(),
                file: "b.ts".to_string(),
                start_line: 3,
                end_line: 9,
                lines: 7,
                complexity: Some("high".to_string()),
                parameters: Some(vec!["x".to_string(), "y".to_string()]),
                return_type: Some("number".to_string()),
            }]),
        };

        let service = TestPlanningService::new();
        let result = service.analyze_functions(Some(&analysis));
        assert_eq!(result[0].complexity, "high");
        assert_eq!(result[0].parameters, vec!["x", "y"]);
        assert_eq!(result[0].return_type.as_deref(), Some("number"));
    }

    #[test]
    fn test_analyze_functions_handles_absent_input() {
        let service = TestPlanningService::new();
        assert!(service.analyze_functions(None).is_empty());
        assert!(
            service
                .analyze_functions(Some(&CodeAnalysis { functions: None }))
                .is_empty()
        );
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let plan = plan_with_groups(vec![FunctionGroup {
            priority: Some(1),
            functions: vec![function("f")],
        }]);

        let service = TestPlanningService::new();
        let path = service.save_test_plan(dir.path(), &plan).unwrap();
        assert!(path.ends_with(".shadow/test-plan.json"));
        assert!(path.exists());

        let loaded = service.load_test_plan(dir.path()).unwrap();
        assert_eq!(loaded, plan);
    }

    #[test]
    fn test_save_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let service = TestPlanningService::new();
        service
            .save_test_plan(dir.path(), &plan_with_groups(vec![]))
            .unwrap();
        assert!(!dir.path().join(SHADOW_DIR).join("test-plan.tmp").exists());
    }

    #[test]
    fn test_save_overwrites_previous_plan() {
        let dir = TempDir::new().unwrap();
        let service = TestPlanningService::new();

        let first = plan_with_groups(vec![FunctionGroup {
            priority: Some(1),
            functions: vec![function("old")],
        }]);
        let second = plan_with_groups(vec![FunctionGroup {
            priority: Some(2),
            functions: vec![function("new")],
        }]);

        service.save_test_plan(dir.path(), &first).unwrap();
        service.save_test_plan(dir.path(), &second).unwrap();

        let loaded = service.load_test_plan(dir.path()).unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn test_saved_plan_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let service = TestPlanningService::new();
        let path = service
            .save_test_plan(dir.path(), &plan_with_groups(vec![]))
            .unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("\n  \"total_functions\""));
    }

    #[test]
    fn test_load_missing_plan_is_absent() {
        let dir = TempDir::new().unwrap();
        let service = TestPlanningService::new();
        assert!(service.load_test_plan(dir.path()).is_none());
        assert!(matches!(
            service.load_test_plan_detailed(dir.path()),
            LoadOutcome::NotFound
        ));
    }

    #[test]
    fn test_load_corrupt_plan_is_absent_but_distinguished() {
        let dir = TempDir::new().unwrap();
        let shadow = dir.path().join(SHADOW_DIR);
        fs::create_dir_all(&shadow).unwrap();
        fs::write(shadow.join(PLAN_FILE), "{ not json").unwrap();

        let service = TestPlanningService::new();
        assert!(service.load_test_plan(dir.path()).is_none());
        assert!(matches!(
            service.load_test_plan_detailed(dir.path()),
            LoadOutcome::Invalid(_)
        ));
    }

    #[test]
    fn test_prioritized_functions_sort_ascending_by_group_priority() {
        let plan = plan_with_groups(vec![
            FunctionGroup {
                priority: Some(2),
                functions: vec![function("f1")],
            },
            FunctionGroup {
                priority: Some(1),
                functions: vec![function("f2")],
            },
        ]);

        let service = TestPlanningService::new();
        let ordered = service.get_prioritized_functions(&plan);
        assert_eq!(ordered[0].name, "f2");
        assert_eq!(ordered[1].name, "f1");
    }

    #[test]
    fn test_prioritized_functions_without_priority_sort_last() {
        let plan = plan_with_groups(vec![
            FunctionGroup {
                priority: None,
                functions: vec![function("unranked")],
            },
            FunctionGroup {
                priority: Some(998),
                functions: vec![function("ranked")],
            },
        ]);

        let service = TestPlanningService::new();
        let ordered = service.get_prioritized_functions(&plan);
        assert_eq!(ordered[0].name, "ranked");
        assert_eq!(ordered[1].name, "unranked");
    }

    #[test]
    fn test_duplicate_names_take_last_seen_priority() {
        let plan = plan_with_groups(vec![
            FunctionGroup {
                priority: Some(1),
                functions: vec![function("dup")],
            },
            FunctionGroup {
                priority: Some(5),
                functions: vec![function("solo"), function("dup")],
            },
            FunctionGroup {
                priority: Some(3),
                functions: vec![function("other")],
            },
        ]);

        let service = TestPlanningService::new();
        let ordered = service.get_prioritized_functions(&plan);
        // "dup" was re-seen at priority 5, so both copies sort after 3
        let names: Vec<&str> = ordered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["other", "dup", "solo", "dup"]);
    }

    #[test]
    fn test_prioritized_sort_is_stable_within_priority() {
        let plan = plan_with_groups(vec![FunctionGroup {
            priority: Some(1),
            functions: vec![function("a"), function("b"), function("c")],
        }]);

        let service = TestPlanningService::new();
        let names: Vec<String> = service
            .get_prioritized_functions(&plan)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
