use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Where the metadata repository comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepoSource {
    /// A plain directory managed by someone else; nothing to fetch.
    Local,
    Git { url: String },
}

impl RepoSource {
    pub fn from_url(url: &str) -> Self {
        let url = url.trim();
        if url.is_empty() {
            RepoSource::Local
        } else {
            RepoSource::Git {
                url: url.to_string(),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    Cloned,
    Updated,
    UpToDate,
    Local,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },
    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{} must be a dir", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} is not empty and is not a git checkout", .0.display())]
    NotACheckout(PathBuf),
}

/// Brings `path` up to date with `source`, bounded by `timeout`.
pub async fn fetch(
    path: &Path,
    source: &RepoSource,
    timeout: Duration,
) -> Result<FetchStatus, FetchError> {
    match source {
        RepoSource::Local => Ok(FetchStatus::Local),
        RepoSource::Git { url } => tokio::time::timeout(timeout, fetch_git(path, url))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?,
    }
}

async fn fetch_git(path: &Path, url: &str) -> Result<FetchStatus, FetchError> {
    if !path.exists() {
        clone(url, path).await?;
        return Ok(FetchStatus::Cloned);
    }
    if !path.is_dir() {
        return Err(FetchError::NotADirectory(path.to_path_buf()));
    }
    if !is_git_checkout(path) {
        if !is_empty_dir(path)? {
            return Err(FetchError::NotACheckout(path.to_path_buf()));
        }
        tokio::fs::remove_dir(path).await?;
        clone(url, path).await?;
        return Ok(FetchStatus::Cloned);
    }
    if !has_head(path).await? {
        warn!("{} has no commits; cloning again", path.display());
        tokio::fs::remove_dir_all(path).await?;
        clone(url, path).await?;
        return Ok(FetchStatus::Cloned);
    }

    let before = rev_parse(path).await?;
    run_git(Some(path), ["pull", "--ff-only", "origin"]).await?;
    let after = rev_parse(path).await?;
    debug!("HEAD {} -> {}", before, after);
    if before == after {
        Ok(FetchStatus::UpToDate)
    } else {
        Ok(FetchStatus::Updated)
    }
}

/// Clones next to `path` and renames into place, so an interrupted clone
/// never leaves a half-written checkout at `path`.
async fn clone(url: &str, path: &Path) -> Result<(), FetchError> {
    let staging = staging_path(path);
    if let Some(parent) = staging.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    if staging.exists() {
        tokio::fs::remove_dir_all(&staging).await?;
    }

    info!("Cloning {} into {}", url, path.display());
    let cloned = run_git(
        None,
        [OsStr::new("clone"), OsStr::new(url), staging.as_os_str()],
    )
    .await;
    if let Err(err) = cloned {
        if staging.exists() {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                warn!("Failed to remove {}: {}", staging.display(), cleanup);
            }
        }
        return Err(err);
    }
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "meta".to_string());
    path.with_file_name(format!(".{}.clone", name))
}

async fn has_head(path: &Path) -> Result<bool, FetchError> {
    let status = Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", "HEAD"])
        .current_dir(path)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await?;
    Ok(status.success())
}

async fn rev_parse(path: &Path) -> Result<String, FetchError> {
    let out = run_git(Some(path), ["rev-parse", "HEAD"]).await?;
    Ok(out.trim().to_string())
}

async fn run_git<I, S>(dir: Option<&Path>, args: I) -> Result<String, FetchError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let mut command = Command::new("git");
    command
        .args(&args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let output = command.output().await?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let name = args
            .first()
            .map(|arg| arg.as_ref().to_string_lossy().into_owned())
            .unwrap_or_default();
        Err(FetchError::Git {
            command: name,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn is_git_checkout(path: &Path) -> bool {
    path.join(".git").exists()
}

fn is_empty_dir(path: &Path) -> Result<bool, FetchError> {
    Ok(std::fs::read_dir(path)?.next().is_none())
}
