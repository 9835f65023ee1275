mod companion;
mod config;
mod source;
mod sync;
#[cfg(test)]
mod testing;

use companion::Companion;
use config::{config_path_from_env, load_or_create_config, resolve_path};
use library::Catalog;
use source::RepoSource;
use sync::{SyncController, SyncSettings};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }

    let repo_path = resolve_path(&config_path, &config.repo_path);
    let source = RepoSource::from_url(&config.repo_url);
    match &source {
        RepoSource::Local => info!("Serving local repo at {}", repo_path.display()),
        RepoSource::Git { url } => info!("Syncing {} into {}", url, repo_path.display()),
    }

    let companion = if config.companion_enabled {
        Some(Companion {
            bin: config.companion_bin.clone(),
            output: resolve_path(&config_path, &config.prebuilt_path),
            timeout: config.fetch_timeout(),
        })
    } else {
        None
    };

    let settings = SyncSettings {
        repo_path,
        source,
        interval: config.sync_interval(),
        fetch_timeout: config.fetch_timeout(),
        companion,
    };
    let controller = SyncController::new(Catalog::new(), settings);

    if let Err(err) = controller.init().await {
        error!("Failed to initialize meta index: {}", err);
        return Err(err.into());
    }

    let handle = controller.spawn();
    info!(
        "Meta index ready at revision {}; refreshing every {}s.",
        controller.catalog().revision().unwrap_or_default(),
        config.sync_interval_secs
    );

    shutdown_signal().await;
    handle.stop().await;
    Ok(())
}

/// Resolves on ctrl-c, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Interrupted; stopping meta sync."),
        _ = terminate => info!("Terminated; stopping meta sync."),
    }
}
