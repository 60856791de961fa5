//! Test plan data model
//!
//! The plan shape produced by the planning LLM and persisted under the
//! workspace shadow directory. Field names follow the JSON the providers are
//! prompted to emit, so deserialization is tolerant of omitted optionals.

use serde::{Deserialize, Serialize};

/// A function the planner considers a test target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestableFunction {
    pub name: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub lines: u32,
    #[serde(default = "default_complexity")]
    pub complexity: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

fn default_complexity() -> String {
    "unknown".to_string()
}

/// A priority bucket of functions. `priority` may be absent when the model
/// leaves it out; prioritization treats that as unranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default)]
    pub functions: Vec<TestableFunction>,
}

/// The persisted plan. Each save is a full rewrite of the plan file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    pub total_functions: usize,
    pub testable_functions: usize,
    #[serde(default)]
    pub function_groups: Vec<FunctionGroup>,
}
