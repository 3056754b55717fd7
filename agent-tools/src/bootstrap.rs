//! One-shot installation of tool adapters at gateway construction.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{BootstrapError, ToolResult};
use crate::fetcher::{GitFetcher, SourceFetcher};
use crate::repository::{DEFAULT_MANIFEST_FILE, ToolDescriptor, ToolRepositoryConfig};

/// Default install directory for tool checkouts.
pub const DEFAULT_INSTALL_DIR: &str = "/opt/mcp";

/// Installs configured tool repositories and collects their descriptors.
pub struct Bootstrapper {
    install_dir: PathBuf,
    manifest_file: String,
    repositories: Vec<ToolRepositoryConfig>,
    fetcher: Arc<dyn SourceFetcher>,
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("install_dir", &self.install_dir)
            .field("manifest_file", &self.manifest_file)
            .field("repositories", &self.repositories)
            .finish_non_exhaustive()
    }
}

impl Bootstrapper {
    /// Creates a bootstrapper using [`GitFetcher`].
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>, repositories: Vec<ToolRepositoryConfig>) -> Self {
        Self {
            install_dir: install_dir.into(),
            manifest_file: DEFAULT_MANIFEST_FILE.to_owned(),
            repositories,
            fetcher: Arc::new(GitFetcher),
        }
    }

    /// Replaces the source fetcher.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Overrides the manifest file name looked up in each checkout.
    #[must_use]
    pub fn with_manifest_file(mut self, manifest_file: impl Into<String>) -> Self {
        self.manifest_file = manifest_file.into();
        self
    }

    /// Install directory.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Configured repositories.
    #[must_use]
    pub fn repositories(&self) -> &[ToolRepositoryConfig] {
        &self.repositories
    }

    /// Installs missing repositories and returns one descriptor per entry, in
    /// configuration order.
    ///
    /// A repository whose checkout directory already exists is not fetched
    /// again, but its manifest is still required.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid entry, fetch or setup failure, or missing
    /// manifest. Nothing is returned for the entries that did succeed.
    pub fn bootstrap(&self) -> ToolResult<Vec<ToolDescriptor>> {
        self.validate()?;

        if !self.repositories.is_empty() {
            std::fs::create_dir_all(&self.install_dir)
                .map_err(|err| BootstrapError::io(&self.install_dir, err))?;
        }

        let mut descriptors = Vec::with_capacity(self.repositories.len());
        for repository in &self.repositories {
            let checkout = repository.checkout_dir(&self.install_dir);
            if checkout.exists() {
                info!(repository = repository.name(), path = %checkout.display(), "tool repository already installed");
            } else {
                self.install(repository, &checkout)?;
            }

            let manifest_path = checkout.join(&self.manifest_file);
            if !manifest_path.is_file() {
                return Err(BootstrapError::ManifestMissing {
                    name: repository.name().to_owned(),
                    path: manifest_path,
                });
            }
            descriptors.push(ToolDescriptor::new(repository.name(), manifest_path));
        }

        info!(tools = descriptors.len(), "tool adapters bootstrapped");
        Ok(descriptors)
    }

    fn validate(&self) -> ToolResult<()> {
        let mut seen = HashSet::new();
        for repository in &self.repositories {
            repository.validate()?;
            if !seen.insert(repository.name()) {
                return Err(BootstrapError::DuplicateRepository {
                    name: repository.name().to_owned(),
                });
            }
        }
        Ok(())
    }

    fn install(&self, repository: &ToolRepositoryConfig, checkout: &Path) -> ToolResult<()> {
        info!(
            repository = repository.name(),
            source = repository.source_url(),
            revision = repository.revision(),
            "installing tool repository"
        );

        let result = self.fetcher.fetch(repository, checkout).and_then(|()| {
            match repository.setup_command() {
                Some(argv) => self.fetcher.setup(repository, argv, checkout),
                None => Ok(()),
            }
        });

        if let Err(err) = result {
            // A leftover directory would be treated as installed on the next start.
            if checkout.exists() {
                if let Err(cleanup) = std::fs::remove_dir_all(checkout) {
                    warn!(
                        repository = repository.name(),
                        error = %cleanup,
                        "failed to remove partial tool checkout"
                    );
                }
            }
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use uuid::Uuid;

    #[derive(Default)]
    struct FakeFetcher {
        fetched: Mutex<Vec<String>>,
        setups: Mutex<Vec<Vec<String>>>,
        write_manifest: bool,
        fail_setup: bool,
    }

    impl SourceFetcher for FakeFetcher {
        fn fetch(&self, repository: &ToolRepositoryConfig, destination: &Path) -> ToolResult<()> {
            self.fetched
                .lock()
                .unwrap()
                .push(repository.name().to_owned());
            std::fs::create_dir_all(destination).unwrap();
            if self.write_manifest {
                std::fs::write(destination.join(DEFAULT_MANIFEST_FILE), b"{}").unwrap();
            }
            Ok(())
        }

        fn setup(
            &self,
            repository: &ToolRepositoryConfig,
            argv: &[String],
            _checkout: &Path,
        ) -> ToolResult<()> {
            self.setups.lock().unwrap().push(argv.to_vec());
            if self.fail_setup {
                return Err(BootstrapError::Setup {
                    name: repository.name().to_owned(),
                    reason: "exit status 1".into(),
                });
            }
            Ok(())
        }
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("tool-bootstrap-{}", Uuid::new_v4()))
    }

    fn repo(name: &str) -> ToolRepositoryConfig {
        ToolRepositoryConfig::new(name, format!("https://example.com/{name}.git"))
    }

    #[test]
    fn installs_and_describes_each_repository() {
        let dir = temp_dir();
        let fetcher = Arc::new(FakeFetcher {
            write_manifest: true,
            ..FakeFetcher::default()
        });
        let bootstrapper = Bootstrapper::new(
            &dir,
            vec![repo("terraform").with_setup_command(["make", "install"]), repo("devops")],
        )
        .with_fetcher(fetcher.clone());

        let descriptors = bootstrapper.bootstrap().unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].name(), "terraform");
        assert_eq!(
            descriptors[1].manifest_path(),
            dir.join("devops").join(DEFAULT_MANIFEST_FILE)
        );
        assert_eq!(*fetcher.setups.lock().unwrap(), vec![vec!["make".to_owned(), "install".to_owned()]]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn existing_checkout_is_not_fetched_again() {
        let dir = temp_dir();
        let checkout = dir.join("terraform");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(checkout.join(DEFAULT_MANIFEST_FILE), b"{}").unwrap();

        let fetcher = Arc::new(FakeFetcher::default());
        let descriptors = Bootstrapper::new(&dir, vec![repo("terraform")])
            .with_fetcher(fetcher.clone())
            .bootstrap()
            .unwrap();

        assert_eq!(descriptors.len(), 1);
        assert!(fetcher.fetched.lock().unwrap().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_manifest_aborts() {
        let dir = temp_dir();
        let err = Bootstrapper::new(&dir, vec![repo("terraform")])
            .with_fetcher(Arc::new(FakeFetcher::default()))
            .bootstrap()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::ManifestMissing { ref name, .. } if name == "terraform"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_setup_removes_partial_checkout() {
        let dir = temp_dir();
        let fetcher = Arc::new(FakeFetcher {
            write_manifest: true,
            fail_setup: true,
            ..FakeFetcher::default()
        });
        let err = Bootstrapper::new(&dir, vec![repo("terraform").with_setup_command(["false"])])
            .with_fetcher(fetcher)
            .bootstrap()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::Setup { .. }));
        assert!(!dir.join("terraform").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn duplicate_names_are_rejected_before_fetching() {
        let dir = temp_dir();
        let fetcher = Arc::new(FakeFetcher::default());
        let err = Bootstrapper::new(&dir, vec![repo("a"), repo("a")])
            .with_fetcher(fetcher.clone())
            .bootstrap()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::DuplicateRepository { .. }));
        assert!(fetcher.fetched.lock().unwrap().is_empty());
        assert!(!dir.exists());
    }

    #[test]
    fn custom_manifest_file_is_honoured() {
        let dir = temp_dir();
        let checkout = dir.join("plugin");
        std::fs::create_dir_all(&checkout).unwrap();
        std::fs::write(checkout.join("tools.json"), b"{}").unwrap();

        let descriptors = Bootstrapper::new(&dir, vec![repo("plugin")])
            .with_fetcher(Arc::new(FakeFetcher::default()))
            .with_manifest_file("tools.json")
            .bootstrap()
            .unwrap();
        assert_eq!(descriptors[0].manifest_path(), checkout.join("tools.json"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
