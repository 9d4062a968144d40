// ABOUTME: JavaScript/TypeScript/TSX grammar rules: functions, classes, module-level bindings,
// ABOUTME: ES imports, re-exports, require(), dynamic import(), calls and heritage clauses.
use super::{
    leftmost_leaf, node_text, reference, unquote, DeclarationSite, ImportScope, LanguageRules,
};
use archgraph_core::{DeclarationKind, ReferenceEdge, ReferenceKind};
use tree_sitter::Node;

pub struct EcmaScriptRules;

const MAX_CHAIN: usize = 32;

fn is_module_level(declarator: Node) -> bool {
    let Some(declaration) = declarator.parent() else {
        return false;
    };
    if !matches!(
        declaration.kind(),
        "lexical_declaration" | "variable_declaration"
    ) {
        return false;
    }
    match declaration.parent() {
        Some(p) if p.kind() == "program" => true,
        Some(p) if p.kind() == "export_statement" => {
            p.parent().map(|g| g.kind() == "program").unwrap_or(false)
        }
        _ => false,
    }
}

/// `require("x")` or `import("x")` with a literal argument.
fn module_call_specifier<'a>(call: Node, src: &'a [u8]) -> Option<&'a str> {
    let function = call.child_by_field_name("function")?;
    let is_loader = match function.kind() {
        "import" => true,
        "identifier" => node_text(&function, src) == "require",
        _ => false,
    };
    if !is_loader {
        return None;
    }
    let arguments = call.child_by_field_name("arguments")?;
    let first = arguments.named_child(0)?;
    if first.kind() != "string" {
        return None;
    }
    Some(unquote(node_text(&first, src)))
}

/// Import binding of the leftmost identifier in `a.b.c` / `Base<T>`.
fn bound_head<'s>(node: Node, src: &[u8], imports: &'s ImportScope) -> Option<&'s str> {
    let leaf = leftmost_leaf(node, MAX_CHAIN);
    if !matches!(leaf.kind(), "identifier" | "type_identifier") {
        return None;
    }
    imports.lookup(node_text(&leaf, src))
}

impl EcmaScriptRules {
    fn import_statement(
        &self,
        node: Node,
        src: &[u8],
        imports: &mut ImportScope,
        out: &mut Vec<ReferenceEdge>,
    ) {
        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let spec = unquote(node_text(&source, src)).to_string();

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = child.walk();
            for binding in child.named_children(&mut clause_cursor) {
                match binding.kind() {
                    "identifier" => imports.bind(node_text(&binding, src), spec.clone()),
                    "namespace_import" => {
                        if let Some(ident) = binding.named_child(0) {
                            imports.bind(node_text(&ident, src), spec.clone());
                        }
                    }
                    "named_imports" => {
                        let mut spec_cursor = binding.walk();
                        for specifier in binding.named_children(&mut spec_cursor) {
                            let local = specifier
                                .child_by_field_name("alias")
                                .or_else(|| specifier.child_by_field_name("name"));
                            if let Some(local) = local {
                                imports.bind(node_text(&local, src), spec.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        out.push(reference(spec, ReferenceKind::Import, &node));
    }

    fn heritage(
        &self,
        heritage: Node,
        src: &[u8],
        imports: &ImportScope,
        out: &mut Vec<ReferenceEdge>,
    ) {
        let mut cursor = heritage.walk();
        for clause in heritage.named_children(&mut cursor) {
            match clause.kind() {
                "extends_clause" => {
                    let mut c = clause.walk();
                    for value in clause.children_by_field_name("value", &mut c) {
                        if let Some(spec) = bound_head(value, src, imports) {
                            out.push(reference(spec, ReferenceKind::Inherit, &value));
                        }
                    }
                }
                "implements_clause" => {
                    let mut c = clause.walk();
                    for ty in clause.named_children(&mut c) {
                        if let Some(spec) = bound_head(ty, src, imports) {
                            out.push(reference(spec, ReferenceKind::Inherit, &ty));
                        }
                    }
                }
                // JavaScript puts the superclass expression directly here.
                _ => {
                    if let Some(spec) = bound_head(clause, src, imports) {
                        out.push(reference(spec, ReferenceKind::Inherit, &clause));
                    }
                }
            }
        }
    }
}

impl LanguageRules for EcmaScriptRules {
    fn declaration(&self, node: Node, src: &[u8]) -> Option<DeclarationSite> {
        let kind = match node.kind() {
            "function_declaration" | "generator_function_declaration" | "method_definition" => {
                DeclarationKind::Function
            }
            "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
                DeclarationKind::Class
            }
            "variable_declarator" => {
                if !is_module_level(node) {
                    return None;
                }
                let name = node.child_by_field_name("name")?;
                if name.kind() != "identifier" {
                    return None;
                }
                let is_function = node
                    .child_by_field_name("value")
                    .map(|v| {
                        matches!(
                            v.kind(),
                            "arrow_function" | "function_expression" | "generator_function"
                        )
                    })
                    .unwrap_or(false);
                return Some(DeclarationSite {
                    kind: if is_function {
                        DeclarationKind::Function
                    } else {
                        DeclarationKind::ModuleSymbol
                    },
                    name: node_text(&name, src).to_string(),
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
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => node
                .child_by_field_name("name")
                .map(|n| node_text(&n, src).to_string()),
            _ => None,
        }
    }

    fn decision_points(&self, node: Node, _src: &[u8]) -> u32 {
        match node.kind() {
            "if_statement" | "for_statement" | "for_in_statement" | "while_statement"
            | "do_statement" | "catch_clause" | "ternary_expression" | "switch_case" => 1,
            "binary_expression" => node
                .child_by_field_name("operator")
                .map(|op| u32::from(matches!(op.kind(), "&&" | "||" | "??")))
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
            "import_statement" => self.import_statement(node, src, imports, out),
            "export_statement" => {
                if let Some(source) = node.child_by_field_name("source") {
                    let spec = unquote(node_text(&source, src));
                    out.push(reference(spec, ReferenceKind::Import, &node));
                }
            }
            "variable_declarator" => {
                let (Some(name), Some(value)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("value"),
                ) else {
                    return;
                };
                if name.kind() == "identifier" && value.kind() == "call_expression" {
                    if let Some(spec) = module_call_specifier(value, src) {
                        imports.bind(node_text(&name, src), spec);
                    }
                }
            }
            "call_expression" => {
                if let Some(spec) = module_call_specifier(node, src) {
                    out.push(reference(spec, ReferenceKind::Import, &node));
                    return;
                }
                let Some(function) = node.child_by_field_name("function") else {
                    return;
                };
                if !matches!(function.kind(), "identifier" | "member_expression") {
                    return;
                }
                if let Some(spec) = bound_head(function, src, imports) {
                    out.push(reference(spec, ReferenceKind::Call, &node));
                }
            }
            "class_heritage" => self.heritage(node, src, imports, out),
            _ => {}
        }
    }
}
