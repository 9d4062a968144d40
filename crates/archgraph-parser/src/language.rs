// ABOUTME: Maps supported languages to their tree-sitter grammars.
// ABOUTME: Builds a fresh configured parser per extraction.
use archgraph_core::{ArchGraphError, Language, Result};
use std::collections::HashMap;
use tree_sitter::Parser;

pub struct LanguageRegistry {
    grammars: HashMap<Language, tree_sitter::Language>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut grammars = HashMap::new();
        grammars.insert(Language::Rust, tree_sitter_rust::LANGUAGE.into());
        grammars.insert(Language::Python, tree_sitter_python::LANGUAGE.into());
        grammars.insert(Language::JavaScript, tree_sitter_javascript::LANGUAGE.into());
        grammars.insert(
            Language::TypeScript,
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        );
        grammars.insert(Language::Tsx, tree_sitter_typescript::LANGUAGE_TSX.into());
        grammars.insert(Language::Go, tree_sitter_go::LANGUAGE.into());
        Self { grammars }
    }

    pub fn supports(&self, language: Language) -> bool {
        self.grammars.contains_key(&language)
    }

    pub fn parser_for(&self, path: &str, language: Language) -> Result<Parser> {
        let grammar = self
            .grammars
            .get(&language)
            .ok_or_else(|| ArchGraphError::parse(path, "unsupported language"))?;
        let mut parser = Parser::new();
        parser
            .set_language(grammar)
            .map_err(|e| ArchGraphError::parse(path, format!("grammar rejected: {e}")))?;
        Ok(parser)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_a_grammar() {
        let registry = LanguageRegistry::new();
        for lang in [
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Go,
        ] {
            assert!(registry.supports(lang));
            assert!(registry.parser_for("x", lang).is_ok());
        }
    }
}
