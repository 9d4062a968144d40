use crate::complexity::measure;
use crate::languages::{ImportScope, LanguageRules};
use archgraph_core::{Declaration, ExtractionLimits, FileSyntax, Language};
use std::rc::Rc;
use tree_sitter::{Node, Tree};

/// Single pre-order pass over a depth-checked tree. Declarations and
/// references come out in document order.
pub fn collect(
    tree: &Tree,
    src: &[u8],
    language: Language,
    line_count: u32,
    rules: &dyn LanguageRules,
    limits: &ExtractionLimits,
) -> FileSyntax {
    let mut declarations = Vec::new();
    let mut references = Vec::new();
    let mut imports = ImportScope::default();

    let mut stack: Vec<(Node, Option<Rc<str>>)> = vec![(tree.root_node(), None)];
    let mut children = Vec::new();

    while let Some((node, container)) = stack.pop() {
        if let Some(site) = rules.declaration(node, src) {
            let m = measure(
                node,
                src,
                rules,
                limits.max_complexity,
                limits.max_nesting_depth,
            );
            declarations.push(Declaration {
                kind: site.kind,
                name: site.name,
                container: rules
                    .receiver(node, src)
                    .or_else(|| container.as_deref().map(str::to_string)),
                start_line: (node.start_position().row + 1) as u32,
                end_line: (node.end_position().row + 1) as u32,
                complexity: m.complexity,
                nesting_depth: m.nesting_depth,
                depth_exceeded: m.depth_exceeded,
            });
        }

        rules.references(node, src, &mut imports, &mut references);

        let inner = match rules.container(node, src) {
            Some(name) => Some(Rc::from(name.as_str())),
            None => container,
        };

        let mut cursor = node.walk();
        children.clear();
        children.extend(node.children(&mut cursor));
        for child in children.drain(..).rev() {
            stack.push((child, inner.clone()));
        }
    }

    FileSyntax {
        language,
        line_count,
        declarations,
        references,
    }
}
