use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use common::{stable_id, ArtistCredits};
use serde::Deserialize;
use toml::value::Datetime;
use toml::Value;
use walkdir::WalkDir;

pub const ALBUM_DIR: &str = "album";
pub const TAG_DIR: &str = "tag";
const RECORD_EXT: &str = "toml";

/// One album file, with its date already resolved to text.
#[derive(Debug, Clone)]
pub struct AlbumRecord {
    pub source: PathBuf,
    pub album: AlbumHeader,
    pub discs: Vec<DiscRecord>,
}

#[derive(Debug, Clone)]
pub struct AlbumHeader {
    pub album_id: String,
    pub title: String,
    pub edition: Option<String>,
    pub catalog: String,
    pub artist: String,
    pub date: String,
    pub album_type: String,
    pub artists: Option<ArtistCredits>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub catalog: String,
    #[serde(default, rename = "type")]
    pub disc_type: Option<String>,
    #[serde(default)]
    pub artists: Option<ArtistCredits>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackRecord {
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default, rename = "type")]
    pub track_type: Option<String>,
    #[serde(default)]
    pub artists: Option<ArtistCredits>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Every `[[tag]]` entry of one tag file.
#[derive(Debug, Clone)]
pub struct TagFile {
    pub source: PathBuf,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: String,
    #[serde(default)]
    pub alias: Vec<String>,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
    /// Child type to child names.
    #[serde(default)]
    pub includes: BTreeMap<String, Vec<String>>,
    #[serde(default, rename = "included-by")]
    pub included_by: Vec<TagRefRecord>,
}

/// A parent reference as written in a tag file: `"name"`, `"type:name"`
/// or a path array `["name", "type"?, parent...]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TagRefRecord {
    Name(String),
    Path(Vec<String>),
}

/// Everything read from one repository checkout.
#[derive(Debug, Clone)]
pub struct RepositoryRecords {
    pub albums: Vec<AlbumRecord>,
    pub tags: Vec<TagFile>,
    /// BLAKE3 over every record file, in path order.
    pub revision: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {}", .path.display(), .source)]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("{}: {}", .path.display(), .source)]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{}: invalid date", .path.display())]
    InvalidDate { path: PathBuf },
}

impl MetadataError {
    pub fn path(&self) -> &Path {
        match self {
            MetadataError::Io { path, .. }
            | MetadataError::Walk { path, .. }
            | MetadataError::Toml { path, .. }
            | MetadataError::InvalidDate { path } => path,
        }
    }
}

#[derive(Deserialize)]
struct AlbumFileDef {
    album: AlbumDef,
    #[serde(default)]
    discs: Vec<DiscRecord>,
}

#[derive(Deserialize)]
struct AlbumDef {
    album_id: String,
    title: String,
    #[serde(default)]
    edition: Option<String>,
    #[serde(default)]
    catalog: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    date: Option<Value>,
    #[serde(default, rename = "type")]
    album_type: String,
    #[serde(default)]
    artists: Option<ArtistCredits>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct TagFileDef {
    #[serde(default)]
    tag: Vec<TagRecord>,
}

pub fn read_repository(root: &Path) -> Result<RepositoryRecords, MetadataError> {
    let mut digest = Vec::new();

    let mut albums = Vec::new();
    for path in record_files(&root.join(ALBUM_DIR))? {
        let text = read_text(&path)?;
        push_digest(&mut digest, root, &path, &text);
        albums.push(parse_album(&path, &text)?);
    }

    let mut tags = Vec::new();
    for path in record_files(&root.join(TAG_DIR))? {
        let text = read_text(&path)?;
        push_digest(&mut digest, root, &path, &text);
        tags.push(parse_tag_file(&path, &text)?);
    }

    Ok(RepositoryRecords {
        albums,
        tags,
        revision: stable_id(&digest),
    })
}

pub fn parse_album(source: &Path, text: &str) -> Result<AlbumRecord, MetadataError> {
    let def: AlbumFileDef = toml::from_str(text).map_err(|source_err| MetadataError::Toml {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    let date = match def.album.date.as_ref().and_then(date_text) {
        Some(date) => date,
        None => {
            return Err(MetadataError::InvalidDate {
                path: source.to_path_buf(),
            })
        }
    };

    Ok(AlbumRecord {
        source: source.to_path_buf(),
        album: AlbumHeader {
            album_id: def.album.album_id,
            title: def.album.title,
            edition: def.album.edition,
            catalog: def.album.catalog,
            artist: def.album.artist,
            date,
            album_type: def.album.album_type,
            artists: def.album.artists,
            tags: def.album.tags,
        },
        discs: def.discs,
    })
}

pub fn parse_tag_file(source: &Path, text: &str) -> Result<TagFile, MetadataError> {
    let def: TagFileDef = toml::from_str(text).map_err(|source_err| MetadataError::Toml {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    Ok(TagFile {
        source: source.to_path_buf(),
        tags: def.tag,
    })
}

/// Record files directly under `dir`, sorted by file name.
pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>, MetadataError> {
    if !dir.is_dir() {
        return Err(MetadataError::Io {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|err| MetadataError::Walk {
            path: dir.to_path_buf(),
            source: err,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_record = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(RECORD_EXT))
            .unwrap_or(false);
        if is_record {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn read_text(path: &Path) -> Result<String, MetadataError> {
    fs::read_to_string(path).map_err(|err| MetadataError::Io {
        path: path.to_path_buf(),
        source: err,
    })
}

fn push_digest(digest: &mut Vec<u8>, root: &Path, path: &Path, text: &str) {
    let rel = path.strip_prefix(root).unwrap_or(path);
    digest.extend_from_slice(rel.to_string_lossy().as_bytes());
    digest.push(0);
    digest.extend_from_slice(text.as_bytes());
    digest.push(0);
}

/// Accepts a bare TOML local date or any string; everything else is rejected.
fn date_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Datetime(datetime) => local_date(datetime),
        _ => None,
    }
}

fn local_date(datetime: &Datetime) -> Option<String> {
    if datetime.time.is_some() || datetime.offset.is_some() {
        return None;
    }
    datetime.date.map(|date| date.to_string())
}
