use std::collections::BTreeSet;

use common::{AlbumDetails, AlbumInfo, DiscDetails, TrackDetail};
use metadata::{AlbumRecord, DiscRecord, TrackRecord};

/// Resolves one album record into its full tree.
///
/// Unset disc fields inherit from the album and unset track fields from the
/// (already resolved) disc. Tags flow the other way: a track carries its own
/// tags plus its disc's declared tags, a disc carries the union of its tracks,
/// and the album carries the union of its discs.
pub fn normalize_album(record: AlbumRecord) -> AlbumDetails {
    let AlbumRecord { album, discs, .. } = record;

    let info = AlbumInfo {
        album_id: album.album_id,
        title: album.title,
        edition: album.edition,
        catalog: album.catalog,
        artist: album.artist,
        date: album.date,
        album_type: album.album_type,
    };

    let mut album_tags: BTreeSet<String> = album.tags.into_iter().collect();
    let discs: Vec<DiscDetails> = discs
        .into_iter()
        .map(|disc| normalize_disc(&info, album.artists.as_ref(), disc))
        .collect();
    for disc in &discs {
        album_tags.extend(disc.tags.iter().cloned());
    }

    AlbumDetails {
        info,
        artists: album.artists,
        tags: album_tags,
        discs,
    }
}

fn normalize_disc(
    album: &AlbumInfo,
    album_artists: Option<&common::ArtistCredits>,
    disc: DiscRecord,
) -> DiscDetails {
    let DiscRecord {
        title,
        artist,
        catalog,
        disc_type,
        artists,
        tags,
        tracks,
    } = disc;

    let artist = artist.unwrap_or_else(|| album.artist.clone());
    let disc_type = disc_type.unwrap_or_else(|| album.album_type.clone());
    let artists = artists.or_else(|| album_artists.cloned());
    let declared: BTreeSet<String> = tags.into_iter().collect();

    let tracks: Vec<TrackDetail> = tracks
        .into_iter()
        .map(|track| normalize_track(&artist, &disc_type, artists.as_ref(), &declared, track))
        .collect();

    let mut effective = declared;
    for track in &tracks {
        effective.extend(track.tags.iter().cloned());
    }

    DiscDetails {
        title,
        artist,
        catalog,
        disc_type,
        artists,
        tags: effective,
        tracks,
    }
}

fn normalize_track(
    disc_artist: &str,
    disc_type: &str,
    disc_artists: Option<&common::ArtistCredits>,
    disc_tags: &BTreeSet<String>,
    track: TrackRecord,
) -> TrackDetail {
    let mut tags: BTreeSet<String> = track.tags.into_iter().collect();
    tags.extend(disc_tags.iter().cloned());

    TrackDetail {
        title: track.title,
        artist: track.artist.unwrap_or_else(|| disc_artist.to_string()),
        track_type: track.track_type.unwrap_or_else(|| disc_type.to_string()),
        artists: track.artists.or_else(|| disc_artists.cloned()),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;

    use metadata::parse_album;

    use super::normalize_album;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn track_and_disc_tags_union_upwards() {
        let text = r#"
[album]
album_id = "a1"
title = "Live"
catalog = "C-1"
artist = "X"
date = "2021"
type = "normal"

[[discs]]
catalog = "C-1"
tags = ["live"]

[[discs.tracks]]
title = "One"
tags = ["vocal"]
"#;
        let album = normalize_album(parse_album(Path::new("a1.toml"), text).unwrap());
        assert_eq!(album.tags, set(&["vocal", "live"]));
        assert_eq!(album.discs[0].tags, set(&["vocal", "live"]));
        assert_eq!(album.discs[0].tracks[0].tags, set(&["vocal", "live"]));
    }

    #[test]
    fn fields_inherit_top_down() {
        let text = r#"
[album]
album_id = "a2"
title = "Split"
catalog = "C-2"
artist = "Album Artist"
date = 2019-01-01
type = "normal"
tags = ["split", "split"]

[album.artists]
vocal = "Singer"

[[discs]]
catalog = "C-2-1"
artist = "Disc Artist"

[[discs.tracks]]
title = "Inherits Disc"

[[discs.tracks]]
title = "Own"
artist = "Track Artist"
type = "instrumental"
tags = ["split"]

[[discs]]
catalog = "C-2-2"
type = "drama"

[[discs.tracks]]
title = "Inherits Album"
"#;
        let album = normalize_album(parse_album(Path::new("a2.toml"), text).unwrap());
        let first = &album.discs[0];
        assert_eq!(first.artist, "Disc Artist");
        assert_eq!(first.disc_type, "normal");
        assert_eq!(first.tracks[0].artist, "Disc Artist");
        assert_eq!(first.tracks[0].track_type, "normal");
        assert_eq!(
            first.tracks[0]
                .artists
                .as_ref()
                .and_then(|credits| credits.get("vocal"))
                .map(String::as_str),
            Some("Singer")
        );
        assert_eq!(first.tracks[1].artist, "Track Artist");
        assert_eq!(first.tracks[1].track_type, "instrumental");

        let second = &album.discs[1];
        assert_eq!(second.artist, "Album Artist");
        assert_eq!(second.disc_type, "drama");
        assert_eq!(second.tracks[0].track_type, "drama");
        assert_eq!(album.tags, set(&["split"]));
        assert!(second.tags.is_empty());
    }
}
