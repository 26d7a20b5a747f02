//! # OData Access Library
//!
//! Client-side data access for OData services: resolves binding paths into
//! requests, keeps the CSRF security token fresh with a single in-flight
//! refresh, and answers reads of listing rows from memory.
//!
//! Modules:
//! - `config`: client configuration, YAML loading and validation
//! - `cache`: security token store and listing registry
//! - `sources`: backend requests and the token refresher
//! - `parser`: binding path grammar
//! - `model`: request orchestrator, bindings and meta model seam

pub mod config;
pub mod cache;
pub mod error;
pub mod sources;
pub mod parser;
pub mod model;
pub mod observability;
pub mod helpers;
pub mod utils;
#[cfg(test)]
pub mod tests;


pub use crate::config::{service::ServiceConfig, ClientConfig};
pub use crate::error::{DataAccessError, Result};
pub use crate::model::orchestrator::RequestOrchestrator;
