//! Tool repository configuration and the descriptors produced from it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BootstrapError, ToolResult};

/// Revision checked out when none is configured.
pub const DEFAULT_REVISION: &str = "main";

/// Manifest file expected at the root of every tool checkout.
pub const DEFAULT_MANIFEST_FILE: &str = "mcp-manifest.json";

fn default_revision() -> String {
    DEFAULT_REVISION.to_owned()
}

/// One tool adapter source to install at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRepositoryConfig {
    name: String,
    source_url: String,
    #[serde(default = "default_revision")]
    revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    setup_command: Option<Vec<String>>,
}

impl ToolRepositoryConfig {
    /// Creates a repository entry tracking [`DEFAULT_REVISION`].
    #[must_use]
    pub fn new(name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_url: source_url.into(),
            revision: default_revision(),
            setup_command: None,
        }
    }

    /// Pins a revision (branch, tag or commit).
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Sets the command run inside the checkout after a fresh install. The
    /// first element is the program, the rest its arguments.
    #[must_use]
    pub fn with_setup_command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.setup_command = Some(argv.into_iter().map(Into::into).collect());
        self
    }

    /// Repository name, also the checkout directory name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location the source is cloned from.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Revision to check out.
    #[must_use]
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Setup command argv, if configured.
    #[must_use]
    pub fn setup_command(&self) -> Option<&[String]> {
        self.setup_command.as_deref()
    }

    /// Checks the entry can be installed safely under an install directory.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::InvalidRepository`] when the name could
    /// escape the install directory or a required field is blank.
    pub fn validate(&self) -> ToolResult<()> {
        let invalid = |reason: &str| BootstrapError::InvalidRepository {
            name: self.name.clone(),
            reason: reason.to_owned(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if self.name == "." || self.name == ".." || self.name.contains(['/', '\\']) {
            return Err(invalid("name must be a single path component"));
        }
        if self.source_url.trim().is_empty() {
            return Err(invalid("source url cannot be empty"));
        }
        if self.revision.trim().is_empty() {
            return Err(invalid("revision cannot be empty"));
        }
        if self
            .setup_command
            .as_ref()
            .is_some_and(|argv| argv.first().is_none_or(|program| program.trim().is_empty()))
        {
            return Err(invalid("setup command must name a program"));
        }
        Ok(())
    }

    /// Directory this repository is installed into.
    #[must_use]
    pub fn checkout_dir(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(&self.name)
    }
}

/// Locally prepared tool adapter handed to the remote agent at registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    name: String,
    manifest_path: PathBuf,
}

impl ToolDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            manifest_path: manifest_path.into(),
        }
    }

    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute location of the tool manifest.
    #[must_use]
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }
}
