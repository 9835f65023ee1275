use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use library::Snapshot;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(repo) = env::args()
        .nth(1)
        .or_else(|| env::var("META_REPO").ok())
        .filter(|value| !value.trim().is_empty())
    else {
        eprintln!("usage: meta_check <repo> (or set META_REPO)");
        return ExitCode::from(2);
    };

    match Snapshot::build(&PathBuf::from(repo)) {
        Ok(snapshot) => {
            let stats = snapshot.stats();
            println!(
                "{} albums, {} discs, {} tracks, {} tags in total",
                stats.albums, stats.discs, stats.tracks, stats.tags
            );
            if let Some(revision) = snapshot.revision() {
                println!("revision {}", revision);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
