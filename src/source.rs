//! Interfaces to the collaborators outside the clustering core: the model that
//! turns text into vectors and the store that holds embedded notes.

use std::convert::Infallible;

use crate::error::{Error, Result};
use crate::record::EmbeddingRecord;

/// Turns text into a fixed-length vector.
pub trait Embedder {
    /// Failure type of the underlying model.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Embed one piece of text.
    fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, Self::Error>;
}

/// Supplies every stored record with its embedding.
///
/// Errors are handed back to the caller unchanged; the engine never retries
/// store access on its own.
pub trait RecordSource {
    /// Failure type of the store.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch all records.
    fn fetch_all(&self) -> std::result::Result<Vec<EmbeddingRecord>, Self::Error>;
}

impl RecordSource for Vec<EmbeddingRecord> {
    type Error = Infallible;

    fn fetch_all(&self) -> std::result::Result<Vec<EmbeddingRecord>, Infallible> {
        Ok(self.clone())
    }
}

impl<S: RecordSource + ?Sized> RecordSource for &S {
    type Error = S::Error;

    fn fetch_all(&self) -> std::result::Result<Vec<EmbeddingRecord>, Self::Error> {
        (**self).fetch_all()
    }
}

/// Embed `text` into a new record.
///
/// The text is trimmed; empty or whitespace-only text is rejected before the
/// model is called.
pub fn embed_record<E: Embedder + ?Sized>(
    embedder: &E,
    id: impl Into<String>,
    text: &str,
    metadata: serde_json::Map<String, serde_json::Value>,
) -> Result<EmbeddingRecord> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("note text cannot be empty"));
    }
    let embedding = embedder
        .embed(text)
        .map_err(|e| Error::Upstream(Box::new(e)))?;
    if embedding.is_empty() {
        return Err(Error::InvalidParameter {
            name: "dimension",
            message: "must be at least 1",
        });
    }
    Ok(EmbeddingRecord {
        id: id.into(),
        text: text.to_owned(),
        embedding,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("model offline")]
    struct Offline;

    /// Character-class histogram; enough to tell notes apart in tests.
    struct CharCounts;

    impl Embedder for CharCounts {
        type Error = Infallible;

        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, Infallible> {
            let letters = text.chars().filter(|c| c.is_alphabetic()).count();
            let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
            Ok(vec![letters as f32, digits as f32])
        }
    }

    struct Broken;

    impl Embedder for Broken {
        type Error = Offline;

        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, Offline> {
            Err(Offline)
        }
    }

    #[test]
    fn test_embed_record_trims_text() {
        let record = embed_record(&CharCounts, "n1", "  abc 12 \n", serde_json::Map::new()).unwrap();
        assert_eq!(record.text, "abc 12");
        assert_eq!(record.embedding, vec![3.0, 2.0]);
    }

    #[test]
    fn test_embed_record_rejects_blank_text() {
        let err = embed_record(&CharCounts, "n1", " \t ", serde_json::Map::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_embed_record_wraps_model_failure() {
        let err = embed_record(&Broken, "n1", "hello", serde_json::Map::new()).unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert_eq!(err.to_string(), "upstream failure: model offline");
    }

    #[test]
    fn test_vec_source_returns_copy() {
        let records = vec![EmbeddingRecord::new("a", "x", vec![1.0])];
        assert_eq!(records.fetch_all().unwrap(), records);
    }
}
