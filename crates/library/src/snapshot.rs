use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use common::{AlbumDetails, AlbumIdentifier, Tag, TrackInfoWithAlbum};
use metadata::{read_repository, RepositoryRecords};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::album::normalize_album;
use crate::closure::{compute_membership, Membership};
use crate::search::SearchIndex;
use crate::tags::{ResolveError, TagRef, TagSet};
use crate::IndexError;

/// One immutable, fully validated view of a metadata repository.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    revision: Option<String>,
    albums: BTreeMap<AlbumIdentifier, Arc<AlbumDetails>>,
    tags: TagSet,
    membership: Membership,
    search: SearchIndex,
    prebuilt_db: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub albums: usize,
    pub discs: usize,
    pub tracks: usize,
    pub tags: usize,
}

impl Snapshot {
    /// The snapshot served before any build has succeeded: answers every query with nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(root: &Path) -> Result<Self, IndexError> {
        let start = Instant::now();
        let records = read_repository(root)?;
        let snapshot = Self::from_records(records)?;
        let stats = snapshot.stats();
        info!(
            "Indexed {} albums, {} tracks, {} tags in {} ms",
            stats.albums,
            stats.tracks,
            stats.tags,
            start.elapsed().as_millis()
        );
        Ok(snapshot)
    }

    pub fn from_records(records: RepositoryRecords) -> Result<Self, IndexError> {
        let RepositoryRecords {
            albums: album_records,
            tags: tag_files,
            revision,
        } = records;

        let mut sources: HashMap<AlbumIdentifier, PathBuf> = HashMap::new();
        let mut albums: BTreeMap<AlbumIdentifier, Arc<AlbumDetails>> = BTreeMap::new();
        for record in album_records {
            let source = record.source.clone();
            let album = normalize_album(record);
            match albums.entry(album.info.album_id.clone()) {
                Entry::Occupied(entry) => {
                    let first = sources.remove(entry.key()).unwrap_or_default();
                    return Err(IndexError::DuplicatedAlbum {
                        album_id: entry.key().clone(),
                        first,
                        second: source,
                    });
                }
                Entry::Vacant(entry) => {
                    sources.insert(entry.key().clone(), source);
                    entry.insert(Arc::new(album));
                }
            }
        }

        let tags = TagSet::build(&tag_files)?;
        let membership = compute_membership(&tags, albums.values().map(Arc::as_ref))?;

        let start = Instant::now();
        let search = SearchIndex::build(albums.values().map(Arc::as_ref), &tags);
        debug!(
            "Search index: {} albums, {} tracks in {} ms",
            search.album_count(),
            search.track_count(),
            start.elapsed().as_millis()
        );

        Ok(Self {
            revision: Some(revision),
            albums,
            tags,
            membership,
            search,
            prebuilt_db: None,
        })
    }

    /// Attaches the companion tool's output. Only called before publishing.
    pub fn with_prebuilt_db(mut self, path: Option<PathBuf>) -> Self {
        self.prebuilt_db = path;
        self
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.revision.is_none()
    }

    pub fn stats(&self) -> SnapshotStats {
        let mut stats = SnapshotStats {
            albums: self.albums.len(),
            tags: self.tags.len(),
            ..SnapshotStats::default()
        };
        for album in self.albums.values() {
            stats.discs += album.discs.len();
            stats.tracks += album.track_count();
        }
        stats
    }

    pub fn album(&self, album_id: &str) -> Option<Arc<AlbumDetails>> {
        self.albums.get(album_id).cloned()
    }

    /// Looks up every id, keeping unknown ids as `None`.
    pub fn albums<'a, I>(&self, album_ids: I) -> BTreeMap<String, Option<Arc<AlbumDetails>>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        album_ids
            .into_iter()
            .map(|id| (id.to_string(), self.album(id)))
            .collect()
    }

    /// `None` when no tag matches. A bare name shared across types yields
    /// the union of every match; `type:name` is exact.
    pub fn albums_by_tag(&self, tag: &str, recursive: bool) -> Option<Vec<Arc<AlbumDetails>>> {
        let matches = self.tags.matching(tag).ok()?;
        let mut ids: BTreeSet<&AlbumIdentifier> = BTreeSet::new();
        for id in matches {
            let members = if recursive {
                self.membership.recursive(id)
            } else {
                self.membership.direct(id)
            };
            ids.extend(members);
        }
        Some(ids.into_iter().filter_map(|id| self.album(id)).collect())
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.tags.tags()
    }

    pub fn tag_set(&self) -> &TagSet {
        &self.tags
    }

    pub fn resolve_tag(&self, tag_ref: &TagRef) -> Result<Tag, ResolveError> {
        let id = self.tags.resolve(tag_ref)?;
        Ok(self.tags.node(id).tag().clone())
    }

    pub fn tag_graph(&self) -> BTreeMap<String, Vec<String>> {
        self.tags.graph()
    }

    pub fn search_albums(&self, keyword: &str) -> Vec<Arc<AlbumDetails>> {
        self.search
            .search_albums(keyword)
            .into_iter()
            .filter_map(|id| self.album(id))
            .collect()
    }

    pub fn search_tracks(&self, keyword: &str) -> Vec<TrackInfoWithAlbum> {
        self.search
            .search_tracks(keyword)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn prebuilt_db(&self) -> Option<&Path> {
        self.prebuilt_db.as_deref()
    }
}
