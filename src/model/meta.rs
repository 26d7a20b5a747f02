use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{DataAccessError, Result};

/// Position inside the meta model, handed back by [`MetaModel::request_meta_context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaContext {
    pub path: String,
}

impl MetaContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Metadata side of the service. Interpreting `$metadata` is the implementor's business.
#[async_trait]
pub trait MetaModel: Send + Sync {
    /// Meta context matching an absolute data path.
    async fn request_meta_context(&self, data_path: &str) -> Result<MetaContext>;

    /// Object at `meta_path` relative to `context`.
    async fn request_object(&self, meta_path: &str, context: &MetaContext) -> Result<Value>;
}

/// Placeholder used until a real meta model is attached.
#[derive(Debug, Clone)]
pub struct UnavailableMetaModel {
    metadata_url: String,
}

impl UnavailableMetaModel {
    pub fn new(metadata_url: String) -> Self {
        Self { metadata_url }
    }

    pub fn metadata_url(&self) -> &str {
        &self.metadata_url
    }
}

#[async_trait]
impl MetaModel for UnavailableMetaModel {
    async fn request_meta_context(&self, data_path: &str) -> Result<MetaContext> {
        Err(DataAccessError::not_implemented(
            "getMetaModel().requestMetaContext",
            &json!([data_path, self.metadata_url]),
        ))
    }

    async fn request_object(&self, meta_path: &str, context: &MetaContext) -> Result<Value> {
        Err(DataAccessError::not_implemented(
            "getMetaModel().requestObject",
            &json!([meta_path, context.path, self.metadata_url]),
        ))
    }
}
