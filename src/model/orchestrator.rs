//! Entry point of the data-access layer.
//!
//! Reads and creates go to the backend with the current security token;
//! reads of `<path>[<row>];list=<id>/<property>` are answered by registered
//! listings. A create rejected with `403` + `X-CSRF-Token: required` is
//! replayed once after a token refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::cache::listing_registry::{ListingHandle, ListingRegistry};
use crate::cache::token_store::TokenStore;
use crate::config::service::ServiceConfig;
use crate::config::ClientConfig;
use crate::error::{DataAccessError, Result};
use crate::model::bindings::{Context, ContextBinding, ListBinding, PropertyBinding};
use crate::model::capability::Capability;
use crate::model::meta::{MetaModel, UnavailableMetaModel};
use crate::observability::metrics::get_metrics;
use crate::parser::path::{self, ParsedPath};
use crate::sources::request::send_request;
use crate::sources::token_refresher::{RefreshHandle, SecurityTokenRefresher, TokenState};
use crate::utils::constants::LOG_SOURCE;

pub struct RequestOrchestrator {
    service: ServiceConfig,
    client: Client,
    store: Arc<TokenStore>,
    refresher: SecurityTokenRefresher,
    listings: ListingRegistry,
    meta_model: Arc<dyn MetaModel>,
}

impl RequestOrchestrator {
    pub fn new(service: ServiceConfig) -> Result<Self> {
        Self::with_client(service, Client::new())
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout_ms) = config.settings.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|e| DataAccessError::InvalidConfig(e.to_string()))?;
        Self::with_client(config.service.clone(), client)
    }

    pub fn with_client(service: ServiceConfig, client: Client) -> Result<Self> {
        service.check()?;
        let store = Arc::new(TokenStore::new(&service));
        let refresher = SecurityTokenRefresher::new(client.clone(), service.url.clone(), store.clone());
        let meta_model = Arc::new(UnavailableMetaModel::new(service.metadata_url()));
        Ok(Self {
            service,
            client,
            store,
            refresher,
            listings: ListingRegistry::new(),
            meta_model,
        })
    }

    pub fn with_meta_model(mut self, meta_model: Arc<dyn MetaModel>) -> Self {
        self.meta_model = meta_model;
        self
    }

    pub fn service(&self) -> &ServiceConfig {
        &self.service
    }

    pub fn token_store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn listings(&self) -> &ListingRegistry {
        &self.listings
    }

    pub fn get_meta_model(&self) -> Arc<dyn MetaModel> {
        self.meta_model.clone()
    }

    pub async fn token_state(&self) -> TokenState {
        self.refresher.state().await
    }

    /// Creates an entity in the collection at `path`, e.g. `/EMPLOYEES`, and
    /// returns the server's representation of it.
    pub async fn create(&self, path: &str, entity: &Value) -> Result<Value> {
        ensure_absolute(path)?;
        let url = self.service.resource_url(path);

        // set once, after the single permitted refresh
        let mut fresh_token: Option<String> = None;
        loop {
            let headers = match &fresh_token {
                Some(token) => self.store.headers_with_token(token),
                None => self.store.headers().await,
            };
            let response = send_request(
                &self.client,
                &self.service.url,
                Method::POST,
                &url,
                headers,
                Some(entity),
            )
            .await?;

            if response.is_success() {
                return response.payload();
            }
            if fresh_token.is_none() && response.is_token_required() {
                warn!("create({}) needs a fresh security token", url);
                fresh_token = Some(self.refresher.refresh().await?);
                get_metrics()
                    .await
                    .request_retries
                    .with_label_values(&[self.service.url.as_str()])
                    .inc();
                continue;
            }
            return Err(DataAccessError::Backend(response.backend_error()));
        }
    }

    /// Reads the data at `path`.
    ///
    /// Listing rows are answered from memory as `{"value": ...}`; structured
    /// values need `allow_object_access`.
    pub async fn read(&self, path: &str, allow_object_access: bool) -> Result<Value> {
        ensure_absolute(path)?;
        match path::parse(path) {
            ParsedPath::Indexed {
                row,
                listing_id,
                sub_path,
                ..
            } => {
                let listing = self.listings.get(listing_id)?;
                let value = listing
                    .read_row(row, &sub_path, allow_object_access)
                    .await?;
                Ok(json!({ "value": value }))
            }
            ParsedPath::Direct(path) => self.read_direct(&path).await,
        }
    }

    async fn read_direct(&self, path: &str) -> Result<Value> {
        let url = self.service.resource_url(path);
        self.fetch(&url).await.inspect_err(|err| {
            let message = match err.backend() {
                Some(backend) => backend.message.to_owned(),
                None => err.to_string(),
            };
            error!(
                operation = %format!("read({})", url),
                source = LOG_SOURCE,
                "{}",
                message
            );
        })
    }

    async fn fetch(&self, url: &str) -> Result<Value> {
        let headers = self.store.headers().await;
        let response = send_request(
            &self.client,
            &self.service.url,
            Method::GET,
            url,
            headers,
            None,
        )
        .await?;

        if !response.is_success() {
            return Err(DataAccessError::Backend(response.structured_backend_error()));
        }
        if self.service.adopt_rotated_tokens {
            self.adopt_token(response.token()).await;
        }
        response.payload()
    }

    async fn adopt_token(&self, token: Option<String>) {
        let Some(token) = token else { return };
        if token == self.store.current_token().await {
            return;
        }
        debug!("adopting security token rotated by the service");
        self.store.set_token(&token).await;
        get_metrics()
            .await
            .token_rotations
            .with_label_values(&[self.service.url.as_str()])
            .inc();
    }

    /// Fetches a new security token, sharing an already running fetch.
    pub fn refresh_security_token(&self) -> RefreshHandle {
        self.refresher.refresh()
    }

    /// Requests the object at `path`, which must contain a `/#` meta part,
    /// e.g. `/Employees('1')/#Name/@sap:label`.
    pub async fn request_object(&self, path: &str, context: Option<&Context>) -> Result<Value> {
        let Some(split) = path::split_meta_path(path) else {
            return Err(not_implemented(
                Capability::RequestDataObject,
                json!([path, context.map(Context::path)]),
            ));
        };

        let data_path = path::resolve(&split.data_path, context.map(Context::path))
            .ok_or_else(|| DataAccessError::InvalidPath(split.data_path.to_owned()))?;
        let meta_context = self.meta_model.request_meta_context(&data_path).await?;
        self.meta_model
            .request_object(&split.meta_path, &meta_context)
            .await
    }

    pub fn supports(&self, capability: Capability) -> bool {
        capability.is_supported()
    }

    // -------------------------------
    // Binding factory
    // -------------------------------

    pub fn bind_context(&self, path: &str, context: Option<&Context>) -> ContextBinding {
        ContextBinding::new(path, context)
    }

    pub fn bind_property(&self, path: &str, context: Option<&Context>) -> PropertyBinding {
        PropertyBinding::new(path, context)
    }

    /// Creates and registers a listing; its id addresses rows in indexed paths.
    pub fn bind_list(
        &self,
        path: &str,
        context: Option<&Context>,
        parameters: Option<HashMap<String, String>>,
    ) -> Arc<ListBinding> {
        self.listings.register_with(|id| {
            debug!(listing = id, "bind list {}", path);
            Arc::new(ListBinding::new(
                id,
                path,
                context,
                parameters.unwrap_or_default(),
            ))
        })
    }

    /// Registers a listing implemented elsewhere.
    pub fn register_listing(&self, listing: &Arc<dyn ListingHandle>) -> usize {
        self.listings.register(listing)
    }

    pub fn bind_tree(&self, path: &str, context: Option<&Context>) -> Result<()> {
        Err(not_implemented(
            Capability::BindTree,
            json!([path, context.map(Context::path)]),
        ))
    }

    pub fn create_binding_context(&self, path: &str, context: Option<&Context>) -> Result<Context> {
        Err(not_implemented(
            Capability::CreateBindingContext,
            json!([path, context.map(Context::path)]),
        ))
    }

    pub fn destroy_binding_context(&self, context: &Context) -> Result<()> {
        Err(not_implemented(
            Capability::DestroyBindingContext,
            json!([context.path()]),
        ))
    }

    pub fn get_property(&self, path: &str, context: Option<&Context>) -> Result<Value> {
        Err(not_implemented(
            Capability::GetProperty,
            json!([path, context.map(Context::path)]),
        ))
    }
}

fn ensure_absolute(path: &str) -> Result<()> {
    if path::is_absolute(path) {
        Ok(())
    } else {
        Err(DataAccessError::InvalidPath(path.to_owned()))
    }
}

fn not_implemented(capability: Capability, arguments: Value) -> DataAccessError {
    DataAccessError::not_implemented(capability.method_name(), &arguments)
}
