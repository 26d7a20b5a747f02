//! Shared constants and invariants

use http::HeaderName;

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_ACCEPT: &str = "application/json";

// Security token handshake
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";
pub const CSRF_TOKEN_HEADER_NAME: HeaderName = HeaderName::from_static("x-csrf-token");
pub const CSRF_TOKEN_FETCH: &str = "Fetch";
pub const CSRF_TOKEN_REQUIRED: &str = "required";

// Path grammar
pub const META_PATH_SEPARATOR: &str = "/#";
pub const LIST_MARKER: &str = ";list=";

/// Source tag attached to logged backend failures.
pub const LOG_SOURCE: &str = "odata_access::model::orchestrator";
