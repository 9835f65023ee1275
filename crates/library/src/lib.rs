//! Versioned in-memory index over a metadata repository: album trees, the
//! tag taxonomy, tag membership closures and full-text search, published
//! as immutable snapshots through a [`Catalog`].

pub mod album;
pub mod catalog;
pub mod closure;
pub mod search;
pub mod snapshot;
pub mod tags;

use std::path::PathBuf;

pub use catalog::Catalog;
pub use metadata::MetadataError;
pub use snapshot::{Snapshot, SnapshotStats};
pub use tags::{ResolveError, TagError, TagId, TagRef, TagSet};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("duplicated album id {album_id}: {} and {}", .first.display(), .second.display())]
    DuplicatedAlbum {
        album_id: String,
        first: PathBuf,
        second: PathBuf,
    },
}
