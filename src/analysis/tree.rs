//! Hierarchical analysis view
//!
//! The tree-shaped projection of a scan that UI surfaces consume one level at
//! a time, plus a terminal rendering of it for the CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::issue::{AnalysisIssue, CodeAnalysis};

/// One node in the analysis tree.
///
/// `id` is unique within its parent's children list. `children` is `None` for
/// leaves; an absent or null `children` field deserializes to `None` and is
/// treated as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    fn leaf(id: String, label: String, node_type: &str) -> Self {
        Self {
            id,
            label,
            node_type: node_type.to_string(),
            description: None,
            tooltip: None,
            children: None,
        }
    }
}

/// Root of the analysis tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    #[serde(default)]
    pub root_nodes: Vec<TreeNode>,
}

impl AnalysisData {
    /// Build the display tree for a scan: a summary node followed by one node
    /// per file with findings, each holding its functions and issues.
    pub fn from_analysis(analysis: &CodeAnalysis, issues: &[AnalysisIssue]) -> Self {
        let mut files: BTreeMap<String, Vec<TreeNode>> = BTreeMap::new();

        if let Some(functions) = &analysis.functions {
            for function in functions {
                let mut node = TreeNode::leaf(
                    format!("{}#{}", function.file, function.name),
                    function.name.clone(),
                    "function",
                );
                node.description = Some(format!(
                    "lines {}-{}, complexity {}",
                    function.start_line,
                    function.end_line,
                    function.complexity.as_deref().unwrap_or("unknown")
                ));
                files.entry(function.file.clone()).or_default().push(node);
            }
        }

        for (index, issue) in issues.iter().enumerate() {
            let mut node = TreeNode::leaf(
                format!("{}:{}:{}", issue.file, issue.line, index),
                issue.description.clone(),
                "issue",
            );
            node.description = Some(format!("{}, {}", issue.severity, issue.category));
            node.tooltip = Some(issue.suggestion.clone());
            files.entry(issue.file.clone()).or_default().push(node);
        }

        let function_count = analysis.functions.as_ref().map(Vec::len).unwrap_or(0);
        let summary = TreeNode {
            id: "summary".to_string(),
            label: "Summary".to_string(),
            node_type: "summary".to_string(),
            description: None,
            tooltip: None,
            children: Some(vec![
                TreeNode::leaf(
                    "summary:functions".to_string(),
                    format!("{} functions", function_count),
                    "metric",
                ),
                TreeNode::leaf(
                    "summary:issues".to_string(),
                    format!("{} issues", issues.len()),
                    "metric",
                ),
                TreeNode::leaf(
                    "summary:files".to_string(),
                    format!("{} files with findings", files.len()),
                    "metric",
                ),
            ]),
        };

        let mut root_nodes = vec![summary];
        for (file, children) in files {
            root_nodes.push(TreeNode {
                id: file.clone(),
                label: file,
                node_type: "file".to_string(),
                description: None,
                tooltip: None,
                children: Some(children),
            });
        }

        Self { root_nodes }
    }
}

/// One-level-at-a-time projection over the held [`AnalysisData`].
///
/// A pure in-memory view: no call here touches I/O. Arbitrary depth is reached
/// by querying children level by level; the tree is acyclic by construction.
#[derive(Debug, Default)]
pub struct AnalysisTreeProvider {
    data: Option<AnalysisData>,
}

impl AnalysisTreeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held analysis wholesale.
    pub fn set_analysis_data(&mut self, data: AnalysisData) {
        self.data = Some(data);
    }

    /// Children of `node`, or the root nodes when `node` is `None`. Nodes
    /// without data or children yield an empty list; every attribute of each
    /// child is preserved.
    pub fn get_children(&self, node: Option<&TreeNode>) -> Vec<TreeNode> {
        match node {
            Some(node) => node.children.clone().unwrap_or_default(),
            None => self
                .data
                .as_ref()
                .map(|data| data.root_nodes.clone())
                .unwrap_or_default(),
        }
    }
}

/// Render the whole tree as indented text for the terminal.
pub fn render(provider: &AnalysisTreeProvider) -> String {
    let mut output = String::new();
    for node in provider.get_children(None) {
        render_node(provider, &node, 0, &mut output);
    }
    if output.is_empty() {
        output.push_str("(no analysis data)\n");
    }
    output
}

fn render_node(
    provider: &AnalysisTreeProvider,
    node: &TreeNode,
    depth: usize,
    output: &mut String,
) {
    let indent = "  ".repeat(depth);
    let glyph = match node.node_type.as_str() {
        "summary" => "📊 ",
        "file" => "📄 ",
        "function" => "🔧 ",
        "issue" => "⚠️ ",
        _ => "",
    };
    match &node.description {
        Some(description) => {
            output.push_str(&format!("{}{}{} ({})\n", indent, glyph, node.label, description));
        }
        None => {
            output.push_str(&format!("{}{}{}\n", indent, glyph, node.label));
        }
    }
    for child in provider.get_children(Some(node)) {
        render_node(provider, &child, depth + 1, output);
    }
}
