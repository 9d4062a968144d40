// ABOUTME: Python grammar rules: defs, classes, module assignments,
// ABOUTME: import/from-import bindings, calls through imported names, base classes.
use super::{
    is_plain_path, node_text, reference, DeclarationSite, ImportScope, LanguageRules,
};
use archgraph_core::{DeclarationKind, ReferenceEdge, ReferenceKind};
use tree_sitter::Node;

pub struct PythonRules;

/// `from . import x` -> `.x`, `from pkg import x` -> `pkg.x`.
fn join_from(module: &str, name: &str) -> String {
    if module.ends_with('.') {
        format!("{module}{name}")
    } else {
        format!("{module}.{name}")
    }
}

/// `util.helper` with `util` bound to `pkg.util` -> `pkg.util.helper`.
fn expand_dotted(path: &str, imports: &ImportScope) -> Option<String> {
    if !is_plain_path(path) || path.contains(':') {
        return None;
    }
    let (head, rest) = match path.find('.') {
        Some(idx) => (&path[..idx], &path[idx..]),
        None => (path, ""),
    };
    imports.lookup(head).map(|spec| format!("{spec}{rest}"))
}

impl PythonRules {
    fn import_statement(
        &self,
        node: Node,
        src: &[u8],
        imports: &mut ImportScope,
        out: &mut Vec<ReferenceEdge>,
    ) {
        let mut cursor = node.walk();
        for name in node.children_by_field_name("name", &mut cursor) {
            match name.kind() {
                "dotted_name" => {
                    let spec = node_text(&name, src);
                    let head = spec.split('.').next().unwrap_or(spec);
                    imports.bind(head, head);
                    out.push(reference(spec, ReferenceKind::Import, &node));
                }
                "aliased_import" => {
                    let spec = name
                        .child_by_field_name("name")
                        .map(|n| node_text(&n, src))
                        .unwrap_or_default();
                    if spec.is_empty() {
                        continue;
                    }
                    if let Some(alias) = name.child_by_field_name("alias") {
                        imports.bind(node_text(&alias, src), spec);
                    }
                    out.push(reference(spec, ReferenceKind::Import, &node));
                }
                _ => {}
            }
        }
    }

    fn import_from(
        &self,
        node: Node,
        src: &[u8],
        imports: &mut ImportScope,
        out: &mut Vec<ReferenceEdge>,
    ) {
        let Some(module) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = node_text(&module, src);

        let mut cursor = node.walk();
        let mut bound_any = false;
        for name in node.children_by_field_name("name", &mut cursor) {
            let (imported, alias) = match name.kind() {
                "aliased_import" => (
                    name.child_by_field_name("name")
                        .map(|n| node_text(&n, src))
                        .unwrap_or_default(),
                    name.child_by_field_name("alias")
                        .map(|n| node_text(&n, src)),
                ),
                _ => (node_text(&name, src), None),
            };
            if imported.is_empty() {
                continue;
            }
            let spec = join_from(module, imported);
            imports.bind(alias.unwrap_or(imported), spec.clone());
            out.push(reference(spec, ReferenceKind::Import, &node));
            bound_any = true;
        }

        // `from x import *`
        if !bound_any {
            out.push(reference(module, ReferenceKind::Import, &node));
        }
    }
}

impl LanguageRules for PythonRules {
    fn declaration(&self, node: Node, src: &[u8]) -> Option<DeclarationSite> {
        let kind = match node.kind() {
            "function_definition" => DeclarationKind::Function,
            "class_definition" => DeclarationKind::Class,
            "expression_statement" => {
                if node.parent()?.kind() != "module" {
                    return None;
                }
                let assignment = node.named_child(0)?;
                if assignment.kind() != "assignment" {
                    return None;
                }
                let left = assignment.child_by_field_name("left")?;
                if left.kind() != "identifier" {
                    return None;
                }
                return Some(DeclarationSite {
                    kind: DeclarationKind::ModuleSymbol,
                    name: node_text(&left, src).to_string(),
                });
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
        if node.kind() == "class_definition" {
            node.child_by_field_name("name")
                .map(|n| node_text(&n, src).to_string())
        } else {
            None
        }
    }

    fn decision_points(&self, node: Node, src: &[u8]) -> u32 {
        match node.kind() {
            "if_statement" | "elif_clause" | "while_statement" | "for_statement"
            | "except_clause" | "except_group_clause" | "conditional_expression"
            | "for_in_clause" | "if_clause" | "boolean_operator" => 1,
            "case_clause" => {
                let wildcard = node
                    .named_child(0)
                    .map(|p| node_text(&p, src).trim() == "_")
                    .unwrap_or(false);
                u32::from(!wildcard)
            }
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
            "import_statement" => self.import_statement(node, src, imports, out),
            "import_from_statement" => self.import_from(node, src, imports, out),
            "call" => {
                if let Some(function) = node.child_by_field_name("function") {
                    if let Some(target) = expand_dotted(node_text(&function, src), imports) {
                        out.push(reference(target, ReferenceKind::Call, &node));
                    }
                }
            }
            "class_definition" => {
                let Some(bases) = node.child_by_field_name("superclasses") else {
                    return;
                };
                let mut cursor = bases.walk();
                for base in bases.named_children(&mut cursor) {
                    if !matches!(base.kind(), "identifier" | "attribute") {
                        continue;
                    }
                    if let Some(target) = expand_dotted(node_text(&base, src), imports) {
                        out.push(reference(target, ReferenceKind::Inherit, &base));
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

    #[test]
    fn from_imports_join_relative_prefixes() {
        assert_eq!(join_from(".", "util"), ".util");
        assert_eq!(join_from("..core", "store"), "..core.store");
        assert_eq!(join_from("pkg", "x"), "pkg.x");
    }

    #[test]
    fn dotted_calls_expand_through_bindings() {
        let mut scope = ImportScope::default();
        scope.bind("util", "pkg.util");
        assert_eq!(
            expand_dotted("util.helper", &scope).as_deref(),
            Some("pkg.util.helper")
        );
        assert_eq!(expand_dotted("util", &scope).as_deref(), Some("pkg.util"));
        assert_eq!(expand_dotted("print", &scope), None);
        assert_eq!(expand_dotted("util(x).y", &scope), None);
    }
}
