//! Tool adapter bootstrapping.
//!
//! Tool adapters (MCP servers and similar plugins) are installed from source
//! repositories once, before the gateway serves any turn. The resulting
//! [`ToolDescriptor`]s are registered with the remote agent.

#![warn(missing_docs, clippy::pedantic)]

pub mod bootstrap;
mod error;
pub mod fetcher;
pub mod repository;

pub use bootstrap::{Bootstrapper, DEFAULT_INSTALL_DIR};
pub use error::{BootstrapError, ToolResult};
pub use fetcher::{GitFetcher, SourceFetcher};
pub use repository::{DEFAULT_MANIFEST_FILE, DEFAULT_REVISION, ToolDescriptor, ToolRepositoryConfig};
