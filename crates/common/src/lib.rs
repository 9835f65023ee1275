use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub type AlbumIdentifier = String;

/// Role name to artist name, e.g. `"vocal" -> "..."`.
pub type ArtistCredits = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub album_id: AlbumIdentifier,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    pub catalog: String,
    pub artist: String,
    pub date: String,
    #[serde(rename = "type")]
    pub album_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumDetails {
    #[serde(flatten)]
    pub info: AlbumInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<ArtistCredits>,
    pub tags: BTreeSet<String>,
    pub discs: Vec<DiscDetails>,
}

impl AlbumDetails {
    pub fn track_count(&self) -> usize {
        self.discs.iter().map(|disc| disc.tracks.len()).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub artist: String,
    pub catalog: String,
    #[serde(rename = "type")]
    pub disc_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<ArtistCredits>,
    pub tags: BTreeSet<String>,
    pub tracks: Vec<TrackDetail>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDetail {
    pub title: String,
    pub artist: String,
    #[serde(rename = "type")]
    pub track_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<ArtistCredits>,
    pub tags: BTreeSet<String>,
}

/// A track located inside its album, as returned by track search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfoWithAlbum {
    pub album_id: AlbumIdentifier,
    pub disc_id: u32,
    pub track_id: u32,
    pub title: String,
    pub artist: String,
    #[serde(rename = "type")]
    pub track_type: String,
    pub album_title: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    Artist,
    Group,
    Animation,
    Series,
    Project,
    Game,
    Organization,
    Default,
    Category,
}

impl TagType {
    pub const ALL: [TagType; 9] = [
        TagType::Artist,
        TagType::Group,
        TagType::Animation,
        TagType::Series,
        TagType::Project,
        TagType::Game,
        TagType::Organization,
        TagType::Default,
        TagType::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Artist => "artist",
            TagType::Group => "group",
            TagType::Animation => "animation",
            TagType::Series => "series",
            TagType::Project => "project",
            TagType::Game => "game",
            TagType::Organization => "organization",
            TagType::Default => "default",
            TagType::Category => "category",
        }
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid tag type: {0}")]
pub struct UnknownTagType(pub String);

impl FromStr for TagType {
    type Err = UnknownTagType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TagType::ALL
            .iter()
            .copied()
            .find(|tag_type| tag_type.as_str() == value)
            .ok_or_else(|| UnknownTagType(value.to_string()))
    }
}

/// Identity of a tag: the `(type, name)` pair.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagKey {
    #[serde(rename = "type")]
    pub tag_type: TagType,
    pub name: String,
}

impl TagKey {
    pub fn new(tag_type: TagType, name: impl Into<String>) -> Self {
        Self {
            tag_type,
            name: name.into(),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag_type, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(rename = "type")]
    pub tag_type: TagType,
    #[serde(default)]
    pub alias: Vec<String>,
    /// Localised display names keyed by locale.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub names: BTreeMap<String, String>,
}

impl Tag {
    pub fn key(&self) -> TagKey {
        TagKey::new(self.tag_type, self.name.clone())
    }
}

/// Content hash used as a snapshot revision.
pub fn stable_id(input: &[u8]) -> String {
    blake3::hash(input).to_hex().to_string()
}
