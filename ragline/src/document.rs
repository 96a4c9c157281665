//! Data types for documents and retrieval results.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload key holding the document text inside an index point.
pub const TEXT_KEY: &str = "text";
/// Metadata key identifying where a document was loaded from.
pub const SOURCE_KEY: &str = "source";
/// Metadata key carrying the similarity score of a retrieved document.
pub const SCORE_KEY: &str = "score";
/// Metadata key carrying the collection a retrieved document came from.
pub const COLLECTION_KEY: &str = "collection";
/// Metadata key carrying a chunk's position within its source.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A scalar metadata value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl MetadataValue {
    /// Return the value as a string slice if it holds text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Return the value as a number if it holds one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Return the value as a boolean if it holds one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            MetadataValue::Bool(b) => Value::Bool(*b),
            MetadataValue::Number(n) => {
                serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
            }
            MetadataValue::String(s) => Value::String(s.clone()),
        }
    }

    fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(MetadataValue::Bool(b)),
            Value::Number(n) => n.as_f64().map(MetadataValue::Number),
            Value::String(s) => Some(MetadataValue::String(s)),
            // Nested values are kept as their JSON text.
            other => Some(MetadataValue::String(other.to_string())),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Number(n) => write!(f, "{n}"),
            MetadataValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<f32> for MetadataValue {
    fn from(value: f32) -> Self {
        MetadataValue::Number(f64::from(value))
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Open-ended document metadata.
pub type Metadata = HashMap<String, MetadataValue>;

/// A unit of retrievable text: a loaded source, a chunk, or a stored payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Document {
    /// The text content.
    pub content: String,
    /// Metadata carried through splitting and storage. Unknown keys are kept.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, if the loader set one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(MetadataValue::as_str)
    }

    /// Serialize into an index payload: the metadata plus a `text` field.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload: Map<String, Value> =
            self.metadata.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        payload.insert(TEXT_KEY.to_string(), Value::String(self.content.clone()));
        payload
    }

    /// Rebuild a document from an index payload.
    ///
    /// Returns `None` when the payload has no string `text` field.
    pub fn from_payload(mut payload: Map<String, Value>) -> Option<Self> {
        let content = match payload.remove(TEXT_KEY) {
            Some(Value::String(text)) => text,
            _ => return None,
        };
        let metadata = payload
            .into_iter()
            .filter_map(|(k, v)| MetadataValue::from_json(v).map(|v| (k, v)))
            .collect();
        Some(Self { content, metadata })
    }
}

/// A retrieved [`Document`] annotated with its score and collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The retrieved document, with `score` and `collection` metadata attached.
    pub document: Document,
    /// Similarity score (higher is more relevant), if the backend reported one.
    pub score: Option<f32>,
    /// The collection the document was found in.
    pub collection: String,
}

impl RetrievalResult {
    /// Annotate a retrieved document with its score and collection.
    pub fn new(mut document: Document, score: Option<f32>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        if let Some(score) = score {
            document.metadata.insert(SCORE_KEY.to_string(), score.into());
        }
        document.metadata.insert(COLLECTION_KEY.to_string(), collection.clone().into());
        Self { document, score, collection }
    }

    /// The score, if present and finite.
    pub fn usable_score(&self) -> Option<f32> {
        self.score.filter(|s| s.is_finite())
    }

    /// The retrieved text.
    pub fn content(&self) -> &str {
        &self.document.content
    }
}
