// ABOUTME: Binary encoding for values persisted by the cache and report store.
// ABOUTME: Thin wrapper over bincode's serde integration with the standard config.
use crate::{ArchGraphError, Result};
use serde::{de::DeserializeOwned, Serialize};

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ArchGraphError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (value, read) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ArchGraphError::Serialization(e.to_string()))?;
    if read != bytes.len() {
        return Err(ArchGraphError::Serialization(format!(
            "trailing bytes after value: read {} of {}",
            read,
            bytes.len()
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Declaration, DeclarationKind, FileSyntax, Language};

    #[test]
    fn file_syntax_survives_encoding() {
        let syntax = FileSyntax {
            language: Language::Python,
            line_count: 3,
            declarations: vec![Declaration {
                kind: DeclarationKind::Function,
                name: "f".into(),
                container: None,
                start_line: 1,
                end_line: 3,
                complexity: 2,
                nesting_depth: 5,
                depth_exceeded: false,
            }],
            references: vec![],
        };
        let bytes = encode(&syntax).unwrap();
        let back: FileSyntax = decode(&bytes).unwrap();
        assert_eq!(back, syntax);
    }

    #[test]
    fn garbage_is_a_serialization_error() {
        let err = decode::<FileSyntax>(&[0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err.kind(), "serialization");
    }
}
