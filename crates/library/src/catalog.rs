use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use common::{AlbumDetails, Tag, TrackInfoWithAlbum};
use parking_lot::RwLock;

use crate::snapshot::{Snapshot, SnapshotStats};
use crate::tags::{ResolveError, TagRef};

/// Shared handle to the currently published [`Snapshot`].
///
/// Readers hold the lock only long enough to clone the `Arc`; a publish
/// swaps the pointer under the write lock. A reader therefore sees either
/// the old snapshot or the new one in full, and a snapshot stays alive for
/// as long as any reader still holds it.
#[derive(Clone, Default)]
pub struct Catalog {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Replaces the published snapshot and returns the one it replaced.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write();
        std::mem::replace(&mut *guard, next)
    }

    pub fn is_ready(&self) -> bool {
        !self.current.read().is_empty()
    }

    pub fn revision(&self) -> Option<String> {
        self.snapshot().revision().map(str::to_string)
    }

    pub fn stats(&self) -> SnapshotStats {
        self.snapshot().stats()
    }

    pub fn get_album(&self, album_id: &str) -> Option<Arc<AlbumDetails>> {
        self.snapshot().album(album_id)
    }

    pub fn get_albums<'a, I>(&self, album_ids: I) -> BTreeMap<String, Option<Arc<AlbumDetails>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.snapshot().albums(album_ids)
    }

    pub fn get_albums_by_tag(&self, tag: &str, recursive: bool) -> Option<Vec<Arc<AlbumDetails>>> {
        self.snapshot().albums_by_tag(tag, recursive)
    }

    pub fn get_tags(&self) -> Vec<Tag> {
        self.snapshot().tags()
    }

    pub fn get_tag_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.snapshot().tag_graph()
    }

    pub fn resolve_tag(&self, tag_ref: &TagRef) -> Result<Tag, ResolveError> {
        self.snapshot().resolve_tag(tag_ref)
    }

    pub fn search_albums(&self, keyword: &str) -> Vec<Arc<AlbumDetails>> {
        self.snapshot().search_albums(keyword)
    }

    pub fn search_tracks(&self, keyword: &str) -> Vec<TrackInfoWithAlbum> {
        self.snapshot().search_tracks(keyword)
    }

    /// Path of the companion tool's database, `None` when the feature is unavailable.
    pub fn prebuilt_db(&self) -> Option<PathBuf> {
        self.snapshot().prebuilt_db().map(PathBuf::from)
    }
}
