//! Configuration management for the agent gateway.
//!
//! [`GatewayConfig::from_env`] reads every setting from the process
//! environment; [`GatewayConfig::from_lookup`] accepts any key lookup so the
//! loader can be driven from tests or other sources.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigResult, keys};
pub use schema::{
    DEFAULT_MAX_CONCURRENT_TURNS, DEFAULT_NAMESPACE, DEFAULT_TIMEOUT, GatewayConfig,
    ObservabilityConfig, ServiceConfig, ToolsConfig,
};
