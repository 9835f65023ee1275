use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use library::{Catalog, IndexError, Snapshot, SnapshotStats};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::companion::Companion;
use crate::source::{fetch, FetchError, FetchStatus, RepoSource};

#[derive(Clone, Debug)]
pub struct SyncSettings {
    pub repo_path: PathBuf,
    pub source: RepoSource,
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub companion: Option<Companion>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Unchanged,
    Published(SnapshotStats),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to update repo: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to index repo: {0}")]
    Index(#[from] IndexError),
    #[error("index task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Keeps a [`Catalog`] in step with the metadata repository.
///
/// Fetching and building happen without any lock held; only the final
/// publish takes the catalog's write lock.
#[derive(Clone)]
pub struct SyncController {
    catalog: Catalog,
    settings: Arc<SyncSettings>,
}

impl SyncController {
    pub fn new(catalog: Catalog, settings: SyncSettings) -> Self {
        Self {
            catalog,
            settings: Arc::new(settings),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// First cycle. Unlike later cycles it always builds, and its failure is fatal to the caller.
    pub async fn init(&self) -> Result<SnapshotStats, SyncError> {
        info!("Initializing meta index...");
        let status = self.fetch().await?;
        log_fetch(status);
        self.rebuild().await?;
        let stats = self.catalog.stats();
        info!(
            "Meta initialization complete: {} albums, {} tracks, {} tags.",
            stats.albums, stats.tracks, stats.tags
        );
        Ok(stats)
    }

    pub async fn run_cycle(&self) -> Result<CycleOutcome, SyncError> {
        let status = self.fetch().await?;
        log_fetch(status);
        if status == FetchStatus::UpToDate {
            return Ok(CycleOutcome::Unchanged);
        }
        self.rebuild().await
    }

    /// Starts the periodic refresh. The first run happens one interval from now.
    pub fn spawn(&self) -> SyncHandle {
        let token = CancellationToken::new();
        let controller = self.clone();
        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            controller.run_loop(cancelled).await;
        });
        SyncHandle { token, task }
    }

    async fn run_loop(self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            info!("Syncing meta repo...");
            tokio::select! {
                _ = token.cancelled() => break,
                result = self.run_cycle() => match result {
                    Ok(CycleOutcome::Unchanged) => {}
                    Ok(CycleOutcome::Published(_)) => {}
                    Err(err) => warn!("{}; keeping the current index", err),
                },
            }
        }
        info!("Meta sync stopped.");
    }

    async fn fetch(&self) -> Result<FetchStatus, FetchError> {
        fetch(
            &self.settings.repo_path,
            &self.settings.source,
            self.settings.fetch_timeout,
        )
        .await
    }

    async fn rebuild(&self) -> Result<CycleOutcome, SyncError> {
        info!("Indexing repo...");
        let start = Instant::now();
        let root = self.settings.repo_path.clone();
        let snapshot = tokio::task::spawn_blocking(move || Snapshot::build(&root)).await??;

        let current = self.catalog.snapshot();
        if !current.is_empty() && snapshot.revision() == current.revision() {
            info!("Repository content unchanged; keeping the current index.");
            return Ok(CycleOutcome::Unchanged);
        }
        drop(current);

        let prebuilt = match &self.settings.companion {
            Some(companion) => companion.generate(&self.settings.repo_path).await,
            None => None,
        };
        let snapshot = snapshot.with_prebuilt_db(prebuilt);
        let stats = snapshot.stats();
        self.catalog.publish(snapshot);
        info!(
            "Index done, took {} ms: {} albums, {} discs, {} tracks, {} tags.",
            start.elapsed().as_millis(),
            stats.albums,
            stats.discs,
            stats.tracks,
            stats.tags
        );
        Ok(CycleOutcome::Published(stats))
    }
}

fn log_fetch(status: FetchStatus) {
    match status {
        FetchStatus::Cloned => info!("Cloned meta repo."),
        FetchStatus::Updated => info!("Pulled new revision."),
        FetchStatus::UpToDate => info!("Already up to date."),
        FetchStatus::Local => {}
    }
}

/// Running background refresh; dropping it leaves the task running.
pub struct SyncHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            error!("Meta sync task failed: {}", err);
        }
    }
}
