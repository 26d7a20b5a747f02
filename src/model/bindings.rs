//! Bindings created by the orchestrator. Only listings take part in path
//! resolution; context and property bindings just carry their paths.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::listing_registry::ListingHandle;
use crate::error::{DataAccessError, Result};
use crate::model::orchestrator::RequestOrchestrator;
use crate::parser::path::resolve;

/// Base for resolving relative binding paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    path: String,
}

impl Context {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct ContextBinding {
    path: String,
    context: Option<Context>,
}

impl ContextBinding {
    pub(crate) fn new(path: &str, context: Option<&Context>) -> Self {
        Self {
            path: path.to_owned(),
            context: context.cloned(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    pub fn resolved_path(&self) -> Option<String> {
        resolve(&self.path, self.context.as_ref().map(Context::path))
    }

    /// The bound element as a context for nested bindings.
    pub fn bound_context(&self) -> Option<Context> {
        self.resolved_path().map(Context::new)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyBinding {
    path: String,
    context: Option<Context>,
}

impl PropertyBinding {
    pub(crate) fn new(path: &str, context: Option<&Context>) -> Self {
        Self {
            path: path.to_owned(),
            context: context.cloned(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn resolved_path(&self) -> Option<String> {
        resolve(&self.path, self.context.as_ref().map(Context::path))
    }

    /// Reads the primitive value behind this binding.
    pub async fn request_value(&self, model: &RequestOrchestrator) -> Result<Value> {
        let path = self
            .resolved_path()
            .ok_or_else(|| DataAccessError::InvalidPath(self.path.to_owned()))?;
        let payload = model.read(&path, false).await?;
        if let Some(value) = payload.get("value") {
            return Ok(value.clone());
        }
        Ok(payload)
    }
}

/// A fetched entity collection, registered under `id` so that
/// `<path>[<row>];list=<id>/<property>` reads are answered from memory.
pub struct ListBinding {
    id: usize,
    path: String,
    context: Option<Context>,
    parameters: HashMap<String, String>,
    rows: RwLock<Vec<Value>>,
}

impl ListBinding {
    pub(crate) fn new(
        id: usize,
        path: &str,
        context: Option<&Context>,
        parameters: HashMap<String, String>,
    ) -> Self {
        Self {
            id,
            path: path.to_owned(),
            context: context.cloned(),
            parameters,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn resolved_path(&self) -> Option<String> {
        resolve(&self.path, self.context.as_ref().map(Context::path))
    }

    /// Context of row `index`, e.g. `/TEAMS[2];list=0`.
    pub fn row_context(&self, index: usize) -> Option<Context> {
        self.resolved_path()
            .map(|path| Context::new(format!("{}[{}];list={}", path, index, self.id)))
    }

    pub async fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.write().await = rows;
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// System query options (`$expand`, `$select`, ...) in name order.
    /// Parameters without a `$` prefix only configure the binding.
    pub fn query_options(&self) -> Option<String> {
        let mut options: Vec<_> = self
            .parameters
            .iter()
            .filter(|(name, _)| name.starts_with('$'))
            .collect();
        if options.is_empty() {
            return None;
        }
        options.sort();
        Some(
            options
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("&"),
        )
    }

    /// Reads the collection through `model` and caches its rows.
    pub async fn load(&self, model: &RequestOrchestrator) -> Result<usize> {
        let mut path = self
            .resolved_path()
            .ok_or_else(|| DataAccessError::InvalidPath(self.path.to_owned()))?;
        if let Some(query) = self.query_options() {
            path = format!("{}?{}", path, query);
        }

        let payload = model.read(&path, true).await?;
        let rows = payload
            .get("value")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| {
                DataAccessError::InvalidPayload(format!("'{}' returned no 'value' array", path))
            })?;

        debug!(listing = self.id, rows = rows.len(), "listing loaded");
        let count = rows.len();
        self.set_rows(rows).await;
        Ok(count)
    }
}

#[async_trait]
impl ListingHandle for ListBinding {
    async fn read_row(
        &self,
        index: usize,
        relative_path: &str,
        allow_object_access: bool,
    ) -> Result<Value> {
        let rows = self.rows.read().await;
        let mut value = rows.get(index).ok_or_else(|| DataAccessError::RowNotFound {
            path: self.path.to_owned(),
            index,
        })?;

        for segment in relative_path.split('/').filter(|s| !s.is_empty()) {
            value = value
                .get(segment)
                .ok_or_else(|| DataAccessError::PropertyNotFound {
                    path: self.path.to_owned(),
                    index,
                    property: relative_path.to_owned(),
                })?;
        }

        if !allow_object_access && (value.is_object() || value.is_array()) {
            return Err(DataAccessError::ObjectAccess {
                property: relative_path.to_owned(),
            });
        }
        Ok(value.clone())
    }
}
