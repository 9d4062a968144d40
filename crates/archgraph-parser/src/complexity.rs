// ABOUTME: Cyclomatic complexity and nesting depth of one declaration.
// ABOUTME: Iterative, stops at nested declarations and at the configured caps.

use crate::languages::LanguageRules;
use tree_sitter::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    /// 1 + decision points, capped.
    pub complexity: u32,
    /// Deepest level below the declaration node, capped.
    pub nesting_depth: u32,
    pub depth_exceeded: bool,
}

/// Formula: 1 + count(decision_points) over the declaration body, where
/// nested declarations are measured on their own and skipped here.
pub fn measure(
    declaration: Node,
    src: &[u8],
    rules: &dyn LanguageRules,
    max_complexity: u32,
    max_nesting_depth: u32,
) -> Measurement {
    let mut complexity: u32 = 1;
    let mut deepest: u32 = 0;
    let mut exceeded = false;

    let mut stack: Vec<(Node, u32)> = Vec::new();
    let mut cursor = declaration.walk();
    stack.extend(declaration.children(&mut cursor).map(|c| (c, 1)));

    while let Some((node, depth)) = stack.pop() {
        if rules.declaration(node, src).is_some() {
            continue;
        }
        if depth > max_nesting_depth {
            exceeded = true;
            continue;
        }
        deepest = deepest.max(depth);

        if !exceeded || complexity < max_complexity {
            let points = rules.decision_points(node, src);
            if points > 0 {
                let next = complexity.saturating_add(points);
                if next > max_complexity {
                    complexity = max_complexity;
                    exceeded = true;
                } else {
                    complexity = next;
                }
            }
        }

        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor).map(|c| (c, depth + 1)));
    }

    Measurement {
        complexity: complexity.min(max_complexity.max(1)),
        nesting_depth: deepest,
        depth_exceeded: exceeded,
    }
}
