use common::{AlbumDetails, AlbumIdentifier, TrackInfoWithAlbum};

use crate::tags::TagSet;

const TITLE_BOOST: u32 = 10;
const CONTEXT_BOOST: u32 = 5;

/// Full-text index over albums and tracks. Built once per snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchIndex {
    albums: Vec<Document<AlbumIdentifier>>,
    tracks: Vec<Document<TrackInfoWithAlbum>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Document<T> {
    item: T,
    fields: Vec<Field>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Field {
    text: String,
    boost: u32,
}

impl Field {
    fn new(text: &str, boost: u32) -> Option<Field> {
        let text = normalize_search(text);
        if text.is_empty() {
            None
        } else {
            Some(Field { text, boost })
        }
    }
}

impl<T> Document<T> {
    fn score(&self, query: &str) -> u32 {
        self.fields
            .iter()
            .map(|field| match score_match(query, &field.text) {
                0 => 0,
                score => score + field.boost,
            })
            .max()
            .unwrap_or(0)
    }
}

impl SearchIndex {
    pub fn build<'a, I>(albums: I, tags: &TagSet) -> SearchIndex
    where
        I: IntoIterator<Item = &'a AlbumDetails>,
    {
        let mut index = SearchIndex::default();
        for album in albums {
            let album_tags = tag_fields(tags, album.tags.iter());

            let mut fields: Vec<Field> = Field::new(&album.info.title, TITLE_BOOST)
                .into_iter()
                .collect();
            fields.extend(album_tags.iter().cloned());
            index.albums.push(Document {
                item: album.info.album_id.clone(),
                fields,
            });

            for (disc_idx, disc) in album.discs.iter().enumerate() {
                for (track_idx, track) in disc.tracks.iter().enumerate() {
                    let mut fields: Vec<Field> = Field::new(&track.title, TITLE_BOOST)
                        .into_iter()
                        .chain(Field::new(&album.info.title, CONTEXT_BOOST))
                        .collect();
                    fields.extend(tag_fields(
                        tags,
                        track.tags.iter().filter(|tag| !album.tags.contains(*tag)),
                    ));
                    fields.extend(album_tags.iter().cloned());
                    index.tracks.push(Document {
                        item: TrackInfoWithAlbum {
                            album_id: album.info.album_id.clone(),
                            disc_id: disc_idx as u32 + 1,
                            track_id: track_idx as u32 + 1,
                            title: track.title.clone(),
                            artist: track.artist.clone(),
                            track_type: track.track_type.clone(),
                            album_title: album.info.title.clone(),
                        },
                        fields,
                    });
                }
            }
        }
        index
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn search_albums(&self, keyword: &str) -> Vec<&AlbumIdentifier> {
        search(&self.albums, keyword)
    }

    pub fn search_tracks(&self, keyword: &str) -> Vec<&TrackInfoWithAlbum> {
        search(&self.tracks, keyword)
    }
}

/// Hits ordered by score, ties kept in document order.
fn search<'a, T>(documents: &'a [Document<T>], keyword: &str) -> Vec<&'a T> {
    let query = normalize_search(keyword);
    if query.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<(u32, &T)> = documents
        .iter()
        .filter_map(|doc| match doc.score(&query) {
            0 => None,
            score => Some((score, &doc.item)),
        })
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0));
    hits.into_iter().map(|(_, item)| item).collect()
}

/// Tag names, aliases and localised names of every resolvable tag.
fn tag_fields<'a, I>(tags: &TagSet, names: I) -> Vec<Field>
where
    I: Iterator<Item = &'a String>,
{
    let mut fields = Vec::new();
    for name in names {
        let Ok(ids) = tags.matching(name) else {
            fields.extend(Field::new(name, 0));
            continue;
        };
        for id in ids {
            let tag = tags.node(id).tag();
            fields.extend(Field::new(&tag.name, 0));
            for alias in &tag.alias {
                fields.extend(Field::new(alias, 0));
            }
            for localized in tag.names.values() {
                fields.extend(Field::new(localized, 0));
            }
        }
    }
    fields
}

pub(crate) fn normalize_search(value: &str) -> String {
    let mut out = String::new();
    let mut last_space = false;
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim().to_string()
}

fn score_match(query: &str, target: &str) -> u32 {
    if target == query {
        return 100;
    }
    if target.starts_with(query) {
        return 90;
    }
    if target.contains(query) {
        return 80;
    }

    let mut tokens = query.split_whitespace().peekable();
    if tokens.peek().is_some() && tokens.all(|token| target.contains(token)) {
        return 70;
    }

    0
}
