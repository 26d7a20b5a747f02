pub mod proc_loader;
pub mod proc_validator;
pub mod service;
pub mod settings;

use serde::Deserialize;

use crate::config::{service::ServiceConfig, settings::SettingsConfig};

/// ================================
/// Full client configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}
