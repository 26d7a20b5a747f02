use std::collections::HashMap;

use http::header::{ACCEPT, ACCEPT_LANGUAGE};
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::service::ServiceConfig;
use crate::helpers::time::now_i64;
use crate::utils::constants::{CSRF_TOKEN_FETCH, CSRF_TOKEN_HEADER};

/// A security token handed out by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    pub value: String,
    pub fetched_at_unix_ts: i64,
}

impl SecurityToken {
    pub fn new(value: String) -> Self {
        Self {
            value,
            fetched_at_unix_ts: now_i64(),
        }
    }
}

/// Current security token plus the default headers of one service.
#[derive(Debug)]
pub struct TokenStore {
    default_headers: HashMap<String, String>,
    token: RwLock<Option<SecurityToken>>,
}

impl TokenStore {
    pub fn new(config: &ServiceConfig) -> Self {
        let mut default_headers = HashMap::new();
        default_headers.insert(ACCEPT_LANGUAGE.as_str().to_owned(), config.language.to_owned());
        default_headers.insert(ACCEPT.as_str().to_owned(), config.accept.to_owned());
        Self {
            default_headers,
            token: RwLock::new(None),
        }
    }

    /// The token to send, or the `Fetch` sentinel while none is known.
    pub async fn current_token(&self) -> String {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.value.to_owned())
            .unwrap_or_else(|| CSRF_TOKEN_FETCH.to_owned())
    }

    pub async fn token(&self) -> Option<SecurityToken> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, value: &str) {
        debug!("security token replaced");
        *self.token.write().await = Some(SecurityToken::new(value.to_owned()));
    }

    pub async fn clear(&self) {
        *self.token.write().await = None;
    }

    /// Snapshot of the default headers with the current token.
    pub async fn headers(&self) -> HeaderMap {
        let token = self.current_token().await;
        self.headers_with_token(&token)
    }

    /// Snapshot of the default headers carrying `token` instead of the stored one.
    pub fn headers_with_token(&self, token: &str) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.default_headers.len() + 1);
        for (key, value) in self.default_headers.iter() {
            insert_header(&mut headers, key, value);
        }
        insert_header(&mut headers, CSRF_TOKEN_HEADER, token);
        headers
    }
}

fn insert_header(headers: &mut HeaderMap, key: &str, value: &str) {
    match (
        HeaderName::from_bytes(key.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(val)) => {
            headers.insert(name, val);
        }
        _ => warn!("skipping invalid header '{}'", key),
    }
}
