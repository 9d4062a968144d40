// ABOUTME: Rust grammar rules: items, impl containers, `use` trees, `mod x;`,
// ABOUTME: path calls and `impl Trait for` through imported names.
use super::{
    is_plain_path, node_text, reference, DeclarationSite, ImportScope, LanguageRules,
};
use archgraph_core::{DeclarationKind, ReferenceEdge, ReferenceKind};
use std::collections::VecDeque;
use tree_sitter::Node;

pub struct RustRules;

const PATH_ROOTS: &[&str] = &["crate", "self", "super"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseItem {
    pub path: String,
    /// Name the item is visible under; `None` for globs.
    pub bound: Option<String>,
}

fn join_path(prefix: &str, rest: &str) -> String {
    match (prefix.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{prefix}::{rest}"),
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

/// Splits on commas that are not inside nested braces.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Flattens a use tree (`a::{b, c::{d as e}, *}`) into full paths.
pub fn expand_use_tree(tree: &str) -> Vec<UseItem> {
    let mut items = Vec::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::new();
    queue.push_back((String::new(), tree.trim().to_string()));

    while let Some((prefix, body)) = queue.pop_front() {
        let body = body.trim();
        if let Some(open) = body.find('{') {
            let head = body[..open].trim().trim_end_matches("::");
            let next_prefix = join_path(&prefix, head);
            let close = body.rfind('}').unwrap_or(body.len());
            if close <= open {
                continue;
            }
            for part in split_top_level(&body[open + 1..close]) {
                queue.push_back((next_prefix.clone(), part.to_string()));
            }
            continue;
        }

        if body == "*" || body.ends_with("::*") {
            let base = body.trim_end_matches('*').trim_end_matches("::");
            let path = join_path(&prefix, base);
            if !path.is_empty() {
                items.push(UseItem { path, bound: None });
            }
            continue;
        }

        let (name, alias) = match body.rfind(" as ") {
            Some(idx) => (body[..idx].trim(), Some(body[idx + 4..].trim())),
            None => (body, None),
        };
        let path = if name == "self" {
            prefix.clone()
        } else {
            join_path(&prefix, name)
        };
        if path.is_empty() {
            continue;
        }
        let bound = alias.unwrap_or_else(|| last_segment(&path)).to_string();
        items.push(UseItem {
            path,
            bound: Some(bound),
        });
    }
    items
}

/// Expands `builder::build` when `builder` is imported; keeps explicit
/// `crate::`/`self::`/`super::` paths as written.
fn expand_path(path: &str, imports: &ImportScope) -> Option<String> {
    let path = path.trim_start_matches("::");
    if !is_plain_path(path) {
        return None;
    }
    let (head, rest) = match path.find("::") {
        Some(idx) => (&path[..idx], &path[idx + 2..]),
        None => (path, ""),
    };
    if PATH_ROOTS.contains(&head) {
        return Some(path.to_string());
    }
    imports.lookup(head).map(|spec| join_path(spec, rest))
}

fn strip_generics(text: &str) -> &str {
    match text.find('<') {
        Some(idx) => text[..idx].trim(),
        None => text.trim(),
    }
}

impl LanguageRules for RustRules {
    fn declaration(&self, node: Node, src: &[u8]) -> Option<DeclarationSite> {
        let kind = match node.kind() {
            "function_item" => DeclarationKind::Function,
            "struct_item" | "enum_item" | "union_item" | "trait_item" => DeclarationKind::Class,
            "const_item" | "static_item" => {
                let parent = node.parent()?;
                if !matches!(parent.kind(), "source_file" | "declaration_list") {
                    return None;
                }
                DeclarationKind::ModuleSymbol
            }
            _ => return None,
        };
        let name = node.child_by_field_name("name")?;
        Some(DeclarationSite {
            kind,
            name: node_text(&name, src).to_string(),
        })
    }

    fn container(&self, node: Node, src: &[u8]) -> Option<String> {
        match node.kind() {
            "impl_item" => node
                .child_by_field_name("type")
                .map(|t| strip_generics(node_text(&t, src)).to_string()),
            "trait_item" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, src).to_string()),
            _ => None,
        }
    }

    fn decision_points(&self, node: Node, src: &[u8]) -> u32 {
        match node.kind() {
            "if_expression" | "while_expression" | "loop_expression" | "for_expression" => 1,
            "match_arm" => {
                let wildcard = node
                    .child_by_field_name("pattern")
                    .map(|p| node_text(&p, src).trim() == "_")
                    .unwrap_or(false);
                u32::from(!wildcard)
            }
            "binary_expression" => node
                .child_by_field_name("operator")
                .map(|op| u32::from(matches!(op.kind(), "&&" | "||")))
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn references(
        &self,
        node: Node,
        src: &[u8],
        imports: &mut ImportScope,
        out: &mut Vec<ReferenceEdge>,
    ) {
        match node.kind() {
            "use_declaration" => {
                let Some(argument) = node.child_by_field_name("argument") else {
                    return;
                };
                for item in expand_use_tree(node_text(&argument, src)) {
                    if let Some(bound) = &item.bound {
                        imports.bind(bound.clone(), item.path.clone());
                    }
                    out.push(reference(item.path, ReferenceKind::Import, &node));
                }
            }
            "mod_item" => {
                // `mod x;` pulls in a child file; inline modules do not.
                if node.child_by_field_name("body").is_some() {
                    return;
                }
                if let Some(name) = node.child_by_field_name("name") {
                    let target = format!("self::{}", node_text(&name, src));
                    out.push(reference(target, ReferenceKind::Import, &node));
                }
            }
            "extern_crate_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let name = node_text(&name, src);
                    imports.bind(name, name);
                    out.push(reference(name, ReferenceKind::Import, &node));
                }
            }
            "call_expression" => {
                let Some(mut function) = node.child_by_field_name("function") else {
                    return;
                };
                if function.kind() == "generic_function" {
                    match function.child_by_field_name("function") {
                        Some(inner) => function = inner,
                        None => return,
                    }
                }
                if !matches!(function.kind(), "identifier" | "scoped_identifier") {
                    return;
                }
                if let Some(target) = expand_path(node_text(&function, src), imports) {
                    out.push(reference(target, ReferenceKind::Call, &node));
                }
            }
            "impl_item" => {
                if let Some(tr) = node.child_by_field_name("trait") {
                    let name = strip_generics(node_text(&tr, src));
                    if let Some(target) = expand_path(name, imports) {
                        out.push(reference(target, ReferenceKind::Inherit, &tr));
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(tree: &str) -> Vec<(String, Option<String>)> {
        expand_use_tree(tree)
            .into_iter()
            .map(|i| (i.path, i.bound))
            .collect()
    }

    #[test]
    fn simple_and_aliased_uses() {
        assert_eq!(
            paths("crate::graph::builder"),
            vec![("crate::graph::builder".into(), Some("builder".into()))]
        );
        assert_eq!(
            paths("std::collections::HashMap as Map"),
            vec![("std::collections::HashMap".into(), Some("Map".into()))]
        );
    }

    #[test]
    fn nested_groups_flatten() {
        let got = paths("crate::{graph::{self, builder::build}, cache as c, util::*}");
        assert!(got.contains(&("crate::graph".into(), Some("graph".into()))));
        assert!(got.contains(&("crate::graph::builder::build".into(), Some("build".into()))));
        assert!(got.contains(&("crate::cache".into(), Some("c".into()))));
        assert!(got.contains(&("crate::util".into(), None)));
        assert_eq!(got.len(), 4);
    }

    #[test]
    fn path_expansion() {
        let mut scope = ImportScope::default();
        scope.bind("builder", "crate::graph::builder");
        assert_eq!(
            expand_path("builder::build", &scope).as_deref(),
            Some("crate::graph::builder::build")
        );
        assert_eq!(
            expand_path("super::util::f", &scope).as_deref(),
            Some("super::util::f")
        );
        assert_eq!(expand_path("local_fn", &scope), None);
    }
}
