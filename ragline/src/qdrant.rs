//! Qdrant indexer backend.
//!
//! Provides [`QdrantIndexer`] which implements [`Indexer`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! Each collection holds a single named vector field, `default`, with cosine
//! distance. Point payloads are the chunk metadata plus a `text` field.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragline::qdrant::QdrantIndexer;
//!
//! let indexer = QdrantIndexer::new("http://localhost:6334")?;
//! indexer.ensure_collection("docs", 768).await?;
//! let ids = indexer.upsert("docs", points).await?;
//! let hits = indexer.search("docs", &query_vector, 4).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::Value;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::indexer::{IndexPoint, Indexer, SearchHit, new_point_id};

/// The default Qdrant gRPC address.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Name of the vector field every point carries.
pub const VECTOR_NAME: &str = "default";

/// An [`Indexer`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantIndexer {
    client: Qdrant,
}

impl QdrantIndexer {
    /// Create a new Qdrant indexer connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant indexer with the default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new(DEFAULT_QDRANT_URL)
    }

    /// Create a new Qdrant indexer from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> RagError {
        RagError::IndexerError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Vector size of the `default` field of an existing collection.
    async fn existing_vector_size(&self, name: &str) -> Result<Option<u64>> {
        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        Ok(match config {
            Some(VectorsConfigKind::ParamsMap(map)) => map.map.get(VECTOR_NAME).map(|p| p.size),
            Some(VectorsConfigKind::Params(params)) => Some(params.size),
            None => None,
        })
    }
}

/// Convert a Qdrant payload value into JSON.
fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        Some(Kind::NullValue(_)) | None => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => {
            serde_json::Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null)
        }
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => {
            Value::Object(s.fields.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        }
    }
}

#[async_trait]
impl Indexer for QdrantIndexer {
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        let exists = self.client.collection_exists(name).await.map_err(Self::map_err)?;
        if exists {
            if let Some(size) = self.existing_vector_size(name).await? {
                if size != vector_size as u64 {
                    return Err(RagError::DimensionMismatch {
                        collection: name.to_string(),
                        expected: size as usize,
                        actual: vector_size,
                    });
                }
            }
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return Ok(());
        }

        let mut vectors_config = VectorsConfigBuilder::default();
        vectors_config.add_named_vector_params(
            VECTOR_NAME,
            VectorParamsBuilder::new(vector_size as u64, Distance::Cosine).build(),
        );
        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, vector_size, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.client.collection_exists(name).await.map_err(Self::map_err)? {
            debug!(collection = name, "qdrant collection absent, nothing to delete");
            return Ok(());
        }
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<Vec<String>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(points.len());
        let mut structs = Vec::with_capacity(points.len());
        for point in points {
            let payload = Payload::try_from(Value::Object(point.payload.to_payload())).map_err(
                |e| RagError::MalformedPayload {
                    collection: name.to_string(),
                    message: e.to_string(),
                },
            )?;
            let id = new_point_id();
            let vectors = HashMap::from([(VECTOR_NAME.to_string(), point.vector)]);
            structs.push(PointStruct::new(id.clone(), vectors, payload));
            ids.push(id);
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, structs).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, count = ids.len(), "upserted points to qdrant");
        Ok(ids)
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, query.to_vec(), limit as u64)
                    .vector_name(VECTOR_NAME)
                    .with_payload(true),
            )
            .await
            .map_err(Self::map_err)?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|scored| {
                let payload = scored.payload.iter().map(|(k, v)| (k.clone(), to_json(v))).collect();
                match Document::from_payload(payload) {
                    Some(document) => {
                        Some(SearchHit { payload: document, score: Some(scored.score) })
                    }
                    None => {
                        warn!(collection = name, "point payload has no text field, skipping");
                        None
                    }
                }
            })
            .collect();

        Ok(hits)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(Self::map_err)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }
}
