use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

/// External database generator run against each freshly built repository.
#[derive(Clone, Debug)]
pub struct Companion {
    pub bin: String,
    pub output: PathBuf,
    pub timeout: Duration,
}

impl Companion {
    /// Runs `<bin> repo --root <repo> db <output>`. Any failure only means the
    /// prebuilt database is unavailable for this snapshot.
    pub async fn generate(&self, repo: &Path) -> Option<PathBuf> {
        if let Err(err) = tokio::fs::create_dir_all(&self.output).await {
            warn!(
                "Failed to create prebuilt directory {}: {}",
                self.output.display(),
                err
            );
            return None;
        }

        let mut command = Command::new(&self.bin);
        command
            .arg("repo")
            .arg("--root")
            .arg(repo)
            .arg("db")
            .arg(&self.output)
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                info!("Prebuilt database written to {}", self.output.display());
                Some(self.output.clone())
            }
            Ok(Ok(output)) => {
                warn!(
                    "{} exited with {}: {}",
                    self.bin,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Ok(Err(err)) if err.kind() == ErrorKind::NotFound => {
                info!("{} not found; prebuilt database unavailable", self.bin);
                None
            }
            Ok(Err(err)) => {
                warn!("Failed to run {}: {}", self.bin, err);
                None
            }
            Err(_) => {
                warn!(
                    "{} timed out after {}s",
                    self.bin,
                    self.timeout.as_secs()
                );
                None
            }
        }
    }
}
