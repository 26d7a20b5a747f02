use serde::Deserialize;

use crate::error::{DataAccessError, Result};
use crate::utils::constants::{DEFAULT_ACCEPT, DEFAULT_LANGUAGE};

/// Where the backend lives and which default headers go out with every request.
///
/// Immutable once handed to the orchestrator; the token header is the only
/// mutable part and it lives in the token store, not here.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// service root, must end with '/'
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_accept")]
    pub accept: String,
    /// adopt an X-CSRF-Token header found on a successful read response
    #[serde(default = "default_adopt_rotated_tokens")]
    pub adopt_rotated_tokens: bool,
}

impl ServiceConfig {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let config = Self {
            url: url.into(),
            language: default_language(),
            accept: default_accept(),
            adopt_rotated_tokens: default_adopt_rotated_tokens(),
        };
        config.check()?;
        Ok(config)
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_adopt_rotated_tokens(mut self, adopt: bool) -> Self {
        self.adopt_rotated_tokens = adopt;
        self
    }

    pub fn check(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(DataAccessError::InvalidConfig(
                "Missing service root URL".to_owned(),
            ));
        }
        if !self.url.ends_with('/') {
            return Err(DataAccessError::InvalidConfig(format!(
                "Service root URL must end with '/': {}",
                self.url
            )));
        }
        Ok(())
    }

    /// `<base><path without its leading '/'>`
    pub fn resource_url(&self, absolute_path: &str) -> String {
        let relative = absolute_path.strip_prefix('/').unwrap_or(absolute_path);
        format!("{}{}", self.url, relative)
    }

    pub fn metadata_url(&self) -> String {
        format!("{}$metadata", self.url)
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_owned()
}

fn default_accept() -> String {
    DEFAULT_ACCEPT.to_owned()
}

fn default_adopt_rotated_tokens() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_url_must_end_with_slash() {
        let err = ServiceConfig::new("http://localhost/service").unwrap_err();
        assert!(matches!(err, DataAccessError::InvalidConfig(_)));

        let err = ServiceConfig::new("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid service configuration: Missing service root URL"
        );
    }

    #[test]
    fn resource_url_drops_leading_slash() {
        let config = ServiceConfig::new("http://localhost/service/").unwrap();
        assert_eq!(
            config.resource_url("/TEAMS('1')/Name"),
            "http://localhost/service/TEAMS('1')/Name"
        );
        assert_eq!(config.metadata_url(), "http://localhost/service/$metadata");
    }
}
