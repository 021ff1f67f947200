//! CLI output formatting

use crate::compiler::{GeneratedPipeline, StageNode};
use crate::validation::FieldError;
use console::Emoji;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");

/// Format a validation error with one line per offending field
pub fn format_field_error(error: &FieldError) -> String {
    let mut lines = vec![format!("  {}", style(&error.message).red())];
    for path in error.rendered_paths() {
        lines.push(format!("    at {}", style(path).yellow()));
    }
    if let Some(details) = &error.details {
        lines.push(format!("  {}", style(details).dim()));
    }
    lines.join("\n")
}

/// Indented stage tree; leaves show the task they compile to
pub fn format_stage_tree(nodes: &[StageNode]) -> String {
    let mut lines = Vec::new();
    for node in nodes {
        push_node(node, 0, &mut lines);
    }
    lines.join("\n")
}

fn push_node(node: &StageNode, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth + 1);
    let line = match (&node.task_ref, node.parallel) {
        (Some(task), _) => format!(
            "{}{} {}",
            indent,
            style(&node.name).bold(),
            style(format!("→ {}", task)).dim()
        ),
        (None, true) => format!(
            "{}{} {}",
            indent,
            style(&node.name).bold(),
            style("(parallel)").cyan()
        ),
        (None, false) => format!("{}{}", indent, style(&node.name).bold()),
    };
    lines.push(line);

    for child in &node.children {
        push_node(child, depth + 1, lines);
    }
}

/// One line per generated task, in execution order where one exists
pub fn format_compile_summary(generated: &GeneratedPipeline) -> String {
    let graph = &generated.graph;
    let mut lines = vec![format!(
        "{} Generated {} ({} tasks, namespace {})",
        CHECK,
        style(&graph.name).bold(),
        style(graph.tasks.len()).cyan(),
        style(&graph.namespace).dim()
    )];

    let order = graph
        .execution_order()
        .unwrap_or_else(|_| graph.tasks.iter().map(|t| t.name.clone()).collect());

    for name in order {
        let after = graph.predecessors(&name);
        if after.is_empty() {
            lines.push(format!("  {}", style(&name).green()));
        } else {
            lines.push(format!(
                "  {} {}",
                style(&name).green(),
                style(format!("(after {})", after.join(", "))).dim()
            ));
        }
    }

    lines.join("\n")
}
