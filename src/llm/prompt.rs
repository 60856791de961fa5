//! Prompt construction for the planning workflow

use crate::planning::plan::TestableFunction;
use crate::planning::service::PlanningContext;

/// System prompt pinning the model to the JSON plan contract.
pub const PLANNING_SYSTEM_PROMPT: &str = r#"You are a senior test engineer who designs pragmatic test plans for existing codebases. Your plans should be:

1. **Prioritized**: Group functions into numbered priority buckets; lower numbers are tested first
2. **Risk-Driven**: Put complex, central, or failure-prone functions in the earliest buckets
3. **Faithful**: Keep every function's file, line range, and signature details exactly as given
4. **Selective**: Leave out functions that are not worth testing, and reflect that in the counts

Respond with a single JSON object and nothing else, in exactly this shape:

{
  "total_functions": <number of functions you were given>,
  "testable_functions": <number of functions included in groups>,
  "function_groups": [
    {
      "priority": <number, 1 is highest>,
      "functions": [
        {
          "name": "...",
          "file": "...",
          "startLine": 1,
          "endLine": 20,
          "lines": 20,
          "complexity": "low|moderate|high|unknown",
          "parameters": ["..."],
          "returnType": "..."
        }
      ]
    }
  ]
}"#;

/// Assemble the user prompt from workspace context, the function inventory,
/// and optional supplementary documents.
pub fn build_planning_prompt(
    context: &PlanningContext,
    functions: &[TestableFunction],
    product_docs: Option<&str>,
    architecture_insights: Option<&str>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("Please create a prioritized test plan for this workspace.\n\n");
    prompt.push_str(&format!("**Workspace**: {}\n", context.workspace_name));
    prompt.push_str(&format!("**Root**: {}\n", context.root.display()));
    prompt.push_str(&format!("**Files scanned**: {}\n", context.file_count));
    if !context.languages.is_empty() {
        prompt.push_str(&format!("**Languages**: {}\n", context.languages.join(", ")));
    }

    prompt.push_str(&format!(
        "\n## Functions ({})\n\n",
        functions.len()
    ));
    for function in functions {
        prompt.push_str(&format!(
            "- `{}` in {} (lines {}-{}, {} lines, complexity {}",
            function.name,
            function.file,
            function.start_line,
            function.end_line,
            function.lines,
            function.complexity
        ));
        if !function.parameters.is_empty() {
            prompt.push_str(&format!(", parameters: {}", function.parameters.join(", ")));
        }
        if let Some(return_type) = &function.return_type {
            prompt.push_str(&format!(", returns {}", return_type));
        }
        prompt.push_str(")\n");
    }

    if let Some(docs) = product_docs {
        prompt.push_str("\n## Product Documentation\n\n");
        prompt.push_str(docs);
        prompt.push('\n');
    }

    if let Some(insights) = architecture_insights {
        prompt.push_str("\n## Architecture Insights\n\n");
        prompt.push_str(insights);
        prompt.push('\n');
    }

    prompt.push_str(
        "\nGroup the functions by testing priority and respond with the JSON plan only.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn context() -> PlanningContext {
        PlanningContext {
            workspace_name: "demo-app".to_string(),
            root: PathBuf::from("/tmp/demo-app"),
            file_count: 12,
            languages: vec!["typescript".to_string(), "rust".to_string()],
        }
    }

    fn function(name: &str) -> TestableFunction {
        TestableFunction {
            name: name.to_string(),
            file: "src/core.ts".to_string(),
            start_line: 4,
            end_line: 30,
            lines: 27,
            complexity: "high".to_string(),
            parameters: vec!["input".to_string(), "options".to_string()],
            return_type: Some("Promise<Result>".to_string()),
        }
    }

    #[test]
    fn test_prompt_lists_every_function() {
        let functions = vec![function("parseInput"), function("mergeState")];
        let prompt = build_planning_prompt(&context(), &functions, None, None);

        assert!(prompt.contains("`parseInput`"));
        assert!(prompt.contains("`mergeState`"));
        assert!(prompt.contains("Functions (2)"));
        assert!(prompt.contains("complexity high"));
        assert!(prompt.contains("parameters: input, options"));
        assert!(prompt.contains("returns Promise<Result>"));
    }

    #[test]
    fn test_prompt_carries_workspace_context() {
        let prompt = build_planning_prompt(&context(), &[], None, None);
        assert!(prompt.contains("demo-app"));
        assert!(prompt.contains("typescript, rust"));
        assert!(prompt.contains("Files scanned**: 12"));
    }

    #[test]
    fn test_optional_documents_are_included_when_present() {
        let prompt = build_planning_prompt(
            &context(),
            &[],
            Some("Users upload CSV files."),
            Some("Hexagonal architecture, adapters in src/io."),
        );
        assert!(prompt.contains("## Product Documentation"));
        assert!(prompt.contains("Users upload CSV files."));
        assert!(prompt.contains("## Architecture Insights"));
        assert!(prompt.contains("Hexagonal architecture"));
    }

    #[test]
    fn test_optional_documents_are_omitted_when_absent() {
        let prompt = build_planning_prompt(&context(), &[], None, None);
        assert!(!prompt.contains("Product Documentation"));
        assert!(!prompt.contains("Architecture Insights"));
    }

    #[test]
    fn test_system_prompt_pins_json_shape() {
        assert!(PLANNING_SYSTEM_PROMPT.contains("total_functions"));
        assert!(PLANNING_SYSTEM_PROMPT.contains("function_groups"));
        assert!(PLANNING_SYSTEM_PROMPT.contains("startLine"));
        assert!(PLANNING_SYSTEM_PROMPT.contains("single JSON object"));
    }
}
