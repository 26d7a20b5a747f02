//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - service root: present, absolute http(s) URL, ends with '/'
//! - default headers: non-empty language and accept values
//! - settings: timeout and logging level

use tracing::{error, info};
use url::Url;

use crate::config::service::ServiceConfig;
use crate::config::settings::SettingsConfig;
use crate::config::ClientConfig;
use crate::observability::metrics::get_metrics;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_client_config(cfg: &ClientConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_service(&cfg.service, &mut errors);
    validate_settings(&cfg.settings, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        return Ok(());
    }

    let metrics = get_metrics().await;
    for e in &errors {
        error!("config validation: {}", e);
        metrics.config_validation_errors.inc();
    }
    Err(errors)
}

fn validate_service(service: &ServiceConfig, errors: &mut Vec<String>) {
    if let Err(e) = service.check() {
        errors.push(format!("service.url: {}", e));
    }
    if !service.url.is_empty() {
        match Url::parse(&service.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(format!(
                "service.url: unsupported scheme '{}'",
                url.scheme()
            )),
            Err(e) => errors.push(format!("service.url: '{}' is not a URL: {}", service.url, e)),
        }
    }
    if service.language.trim().is_empty() {
        errors.push("service.language must not be empty".to_owned());
    }
    if service.accept.trim().is_empty() {
        errors.push("service.accept must not be empty".to_owned());
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.timeout_ms == Some(0) {
        errors.push("settings.timeout_ms must be > 0".to_owned());
    }
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' is not one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
}
