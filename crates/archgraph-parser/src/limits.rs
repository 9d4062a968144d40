// ABOUTME: Resource-limit checks run before any full traversal of untrusted input.
// ABOUTME: Byte size and line count are checked on raw bytes; AST depth on the parsed tree.
use archgraph_core::{ArchGraphError, ExtractionLimits, ResourceLimit, Result};
use tree_sitter::Tree;

/// Lines as an editor shows them: a trailing newline does not open a line.
pub fn count_lines(bytes: &[u8]) -> u64 {
    if bytes.is_empty() {
        return 0;
    }
    let newlines = bytes.iter().filter(|b| **b == b'\n').count() as u64;
    if bytes.last() == Some(&b'\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Size checks on raw bytes; returns the line count on success.
pub fn check_input(path: &str, bytes: &[u8], limits: &ExtractionLimits) -> Result<u64> {
    let size = bytes.len() as u64;
    if size > limits.max_file_bytes {
        return Err(ArchGraphError::ResourceLimit {
            path: path.to_string(),
            limit: ResourceLimit::FileBytes,
            actual: size,
            max: limits.max_file_bytes,
        });
    }

    let lines = count_lines(bytes);
    if lines > limits.max_lines {
        return Err(ArchGraphError::ResourceLimit {
            path: path.to_string(),
            limit: ResourceLimit::LineCount,
            actual: lines,
            max: limits.max_lines,
        });
    }
    Ok(lines)
}

/// Iterative depth check. Stops at the first node deeper than `max_ast_depth`
/// so the cost of a pathological tree is bounded by the limit.
pub fn check_depth(path: &str, tree: &Tree, limits: &ExtractionLimits) -> Result<u32> {
    let max = limits.max_ast_depth;
    let mut cursor = tree.walk();
    let mut depth: u32 = 0;
    let mut deepest: u32 = 0;

    loop {
        if depth > max {
            return Err(ArchGraphError::ResourceLimit {
                path: path.to_string(),
                limit: ResourceLimit::AstDepth,
                actual: u64::from(depth),
                max: u64::from(max),
            });
        }
        deepest = deepest.max(depth);

        if cursor.goto_first_child() {
            depth += 1;
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(deepest);
            }
            depth -= 1;
        }
    }
}
