// ABOUTME: Go grammar rules: funcs, methods with receiver containers, type specs,
// ABOUTME: package-level const/var, import specs, selector calls and embedded types.
use super::{node_text, reference, unquote, DeclarationSite, ImportScope, LanguageRules};
use archgraph_core::{DeclarationKind, ReferenceEdge, ReferenceKind};
use tree_sitter::Node;

pub struct GoRules;

/// `*Store` / `Store[T]` -> `Store`.
fn receiver_type(method: Node, src: &[u8]) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    let param = receiver.named_child(0)?;
    let ty = param.child_by_field_name("type")?;
    let text = node_text(&ty, src).trim_start_matches('*');
    let text = match text.find('[') {
        Some(idx) => &text[..idx],
        None => text,
    };
    Some(text.trim().to_string())
}

fn is_package_level(spec: Node) -> bool {
    spec.parent()
        .and_then(|decl| decl.parent())
        .map(|p| p.kind() == "source_file")
        .unwrap_or(false)
}

impl GoRules {
    fn import_spec(
        &self,
        spec: Node,
        src: &[u8],
        imports: &mut ImportScope,
        out: &mut Vec<ReferenceEdge>,
    ) {
        let Some(path) = spec.child_by_field_name("path") else {
            return;
        };
        let path = unquote(node_text(&path, src));
        let local = match spec.child_by_field_name("name") {
            Some(name) => node_text(&name, src),
            None => path.rsplit('/').next().unwrap_or(path),
        };
        imports.bind(local, path);
        out.push(reference(path, ReferenceKind::Import, &spec));
    }
}

impl LanguageRules for GoRules {
    fn declaration(&self, node: Node, src: &[u8]) -> Option<DeclarationSite> {
        let kind = match node.kind() {
            "function_declaration" | "method_declaration" => DeclarationKind::Function,
            "type_spec" => DeclarationKind::Class,
            "const_spec" | "var_spec" if is_package_level(node) => DeclarationKind::ModuleSymbol,
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
            "type_spec" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, src).to_string()),
            _ => None,
        }
    }

    fn receiver(&self, node: Node, src: &[u8]) -> Option<String> {
        if node.kind() == "method_declaration" {
            receiver_type(node, src)
        } else {
            None
        }
    }

    fn decision_points(&self, node: Node, _src: &[u8]) -> u32 {
        match node.kind() {
            "if_statement" | "for_statement" | "expression_case" | "type_case"
            | "communication_case" => 1,
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
            "import_spec" => self.import_spec(node, src, imports, out),
            "call_expression" => {
                let Some(function) = node.child_by_field_name("function") else {
                    return;
                };
                if function.kind() != "selector_expression" {
                    return;
                }
                let Some(operand) = function.child_by_field_name("operand") else {
                    return;
                };
                if operand.kind() != "identifier" {
                    return;
                }
                if let Some(spec) = imports.lookup(node_text(&operand, src)) {
                    out.push(reference(spec, ReferenceKind::Call, &node));
                }
            }
            // Embedded `pkg.Base` in a struct.
            "field_declaration" => {
                if node.child_by_field_name("name").is_some() {
                    return;
                }
                let Some(ty) = node.child_by_field_name("type") else {
                    return;
                };
                let ty = if ty.kind() == "pointer_type" {
                    match ty.named_child(0) {
                        Some(inner) => inner,
                        None => return,
                    }
                } else {
                    ty
                };
                if ty.kind() != "qualified_type" {
                    return;
                }
                let Some(package) = ty.child_by_field_name("package") else {
                    return;
                };
                if let Some(spec) = imports.lookup(node_text(&package, src)) {
                    out.push(reference(spec, ReferenceKind::Inherit, &node));
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
    fn import_binding_defaults_to_last_path_segment() {
        let code = "package main\n\nimport (\n\t\"github.com/acme/app/store\"\n\tfm \"fmt\"\n)\n";
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .expect("Failed to set Go language");
        let tree = parser.parse(code, None).expect("Failed to parse code");

        let mut imports = ImportScope::default();
        let mut out = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            GoRules.references(node, code.as_bytes(), &mut imports, &mut out);
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }

        assert_eq!(imports.lookup("store"), Some("github.com/acme/app/store"));
        assert_eq!(imports.lookup("fm"), Some("fmt"));
        assert_eq!(out.len(), 2);
    }
}
