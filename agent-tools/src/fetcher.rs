//! Source fetchers used to install tool repositories.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{BootstrapError, ToolResult};
use crate::repository::ToolRepositoryConfig;

/// Installs repository sources on the local filesystem.
///
/// Implementations are blocking; the gateway runs bootstrap on the blocking
/// thread pool.
pub trait SourceFetcher: Send + Sync {
    /// Clones `repository` into `destination` and checks out its revision.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Fetch`] when the source cannot be obtained.
    fn fetch(&self, repository: &ToolRepositoryConfig, destination: &Path) -> ToolResult<()>;

    /// Runs the repository setup command inside `checkout`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Setup`] when the command fails.
    fn setup(
        &self,
        repository: &ToolRepositoryConfig,
        argv: &[String],
        checkout: &Path,
    ) -> ToolResult<()>;
}

/// Fetcher shelling out to the `git` binary on `PATH`.
#[derive(Clone, Debug, Default)]
pub struct GitFetcher;

impl GitFetcher {
    /// `git clone -- <url> <destination>`; the separator keeps a URL that
    /// starts with `-` from being read as an option.
    fn clone_command(repository: &ToolRepositoryConfig, destination: &Path) -> Command {
        let mut clone = Command::new("git");
        clone
            .arg("clone")
            .arg("--")
            .arg(repository.source_url())
            .arg(destination);
        clone
    }

    fn run(mut command: Command) -> Result<(), String> {
        debug!(command = ?command, "running bootstrap command");
        let output = command.output().map_err(|err| err.to_string())?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("{} ({})", stderr.trim(), output.status))
    }
}

impl SourceFetcher for GitFetcher {
    fn fetch(&self, repository: &ToolRepositoryConfig, destination: &Path) -> ToolResult<()> {
        let fetch_error = |reason| BootstrapError::Fetch {
            name: repository.name().to_owned(),
            reason,
        };

        Self::run(Self::clone_command(repository, destination)).map_err(fetch_error)?;

        let mut checkout = Command::new("git");
        checkout
            .arg("checkout")
            .arg(repository.revision())
            .current_dir(destination);
        Self::run(checkout).map_err(fetch_error)
    }

    fn setup(
        &self,
        repository: &ToolRepositoryConfig,
        argv: &[String],
        checkout: &Path,
    ) -> ToolResult<()> {
        let setup_error = |reason| BootstrapError::Setup {
            name: repository.name().to_owned(),
            reason,
        };
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| setup_error("empty setup command".to_owned()))?;

        let mut command = Command::new(program);
        command.args(args).current_dir(checkout);
        Self::run(command).map_err(setup_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn clone_separates_options_from_the_url() {
        let repository = ToolRepositoryConfig::new("evil", "--upload-pack=touch /tmp/x");
        let command = GitFetcher::clone_command(&repository, Path::new("/opt/mcp/evil"));
        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(
            args,
            [
                OsStr::new("clone"),
                OsStr::new("--"),
                OsStr::new("--upload-pack=touch /tmp/x"),
                OsStr::new("/opt/mcp/evil"),
            ]
        );
    }
}
