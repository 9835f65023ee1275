use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use library::{Catalog, IndexError, Snapshot, TagError};
use tempfile::TempDir;

const TAGS: &str = r#"
[[tag]]
name = "groupX"
type = "category"

[tag.includes]
artist = ["memberY"]

[[tag]]
name = "vocal"
type = "default"

[[tag]]
name = "live"
type = "default"
"#;

fn album(id: &str, title: &str, tags: &[&str]) -> String {
    let tags: Vec<String> = tags.iter().map(|tag| format!("\"{}\"", tag)).collect();
    format!(
        r#"[album]
album_id = "{id}"
title = "{title}"
catalog = "CAT-{id}"
artist = "Someone"
date = 2021-05-05
type = "normal"
tags = [{tags}]

[[discs]]
catalog = "CAT-{id}"

[[discs.tracks]]
title = "{title} (Main)"
"#,
        tags = tags.join(", ")
    )
}

fn write_repo(root: &Path, albums: &[(&str, String)], tags: &[(&str, &str)]) {
    fs::create_dir_all(root.join("album")).unwrap();
    fs::create_dir_all(root.join("tag")).unwrap();
    for (name, text) in albums {
        fs::write(root.join("album").join(name), text).unwrap();
    }
    for (name, text) in tags {
        fs::write(root.join("tag").join(name), text).unwrap();
    }
}

fn ids(albums: Option<Vec<Arc<common::AlbumDetails>>>) -> Vec<String> {
    albums
        .expect("tag should exist")
        .iter()
        .map(|album| album.info.album_id.clone())
        .collect()
}

fn scenario_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_repo(
        dir.path(),
        &[
            ("a1.toml", album("A1", "Spring Breeze", &["groupX"])),
            ("a2.toml", album("A2", "Night Drive", &["memberY"])),
        ],
        &[("tags.toml", TAGS)],
    );
    dir
}

#[test]
fn parent_tag_accumulates_child_albums() {
    let repo = scenario_repo();
    let snapshot = Snapshot::build(repo.path()).unwrap();

    assert_eq!(ids(snapshot.albums_by_tag("memberY", true)), vec!["A2"]);
    assert_eq!(ids(snapshot.albums_by_tag("groupX", true)), vec!["A1", "A2"]);
    assert_eq!(ids(snapshot.albums_by_tag("groupX", false)), vec!["A1"]);
}

#[test]
fn recursive_sets_contain_every_descendant_set() {
    let repo = TempDir::new().unwrap();
    write_repo(
        repo.path(),
        &[
            ("a.toml", album("A", "A", &["root"])),
            ("b.toml", album("B", "B", &["mid"])),
            ("c.toml", album("C", "C", &["leaf"])),
            ("d.toml", album("D", "D", &["side"])),
        ],
        &[(
            "tree.toml",
            r#"
[[tag]]
name = "root"
type = "organization"
[tag.includes]
group = ["mid", "side"]

[[tag]]
name = "leaf"
type = "artist"
included-by = ["mid"]
"#,
        )],
    );
    let snapshot = Snapshot::build(repo.path()).unwrap();
    let tags = snapshot.tag_set();

    for (id, node) in tags.iter() {
        let name = node.tag().key().to_string();
        let own = ids(snapshot.albums_by_tag(&name, true));
        let mut pending: Vec<_> = node.children().to_vec();
        while let Some(child) = pending.pop() {
            let child_node = tags.node(child);
            let child_albums = ids(snapshot.albums_by_tag(&child_node.tag().key().to_string(), true));
            for album in child_albums {
                assert!(own.contains(&album), "{name} is missing {album} from {child:?} (from {id:?})");
            }
            pending.extend_from_slice(child_node.children());
        }
    }
    assert_eq!(ids(snapshot.albums_by_tag("root", true)), vec!["A", "B", "C", "D"]);
}

#[test]
fn track_and_disc_tags_reach_album() {
    let repo = TempDir::new().unwrap();
    let text = r#"[album]
album_id = "L1"
title = "Live Tour"
catalog = "L-1"
artist = "Someone"
date = "2022"
type = "normal"

[[discs]]
catalog = "L-1"
tags = ["live"]

[[discs.tracks]]
title = "Encore"
tags = ["vocal"]
"#;
    write_repo(repo.path(), &[("l1.toml", text.to_string())], &[("tags.toml", TAGS)]);
    let snapshot = Snapshot::build(repo.path()).unwrap();
    let album = snapshot.album("L1").unwrap();

    let expected: Vec<&str> = vec!["live", "vocal"];
    assert_eq!(album.tags.iter().collect::<Vec<_>>(), expected);
    assert_eq!(album.discs[0].tags.iter().collect::<Vec<_>>(), expected);
    assert_eq!(ids(snapshot.albums_by_tag("vocal", false)), vec!["L1"]);
}

#[test]
fn rebuild_is_independent_of_file_creation_order() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let albums = vec![
        ("a1.toml", album("A1", "Spring Breeze", &["groupX"])),
        ("a2.toml", album("A2", "Night Drive", &["memberY"])),
    ];
    let mut reversed = albums.clone();
    reversed.reverse();
    write_repo(first.path(), &albums, &[("tags.toml", TAGS)]);
    write_repo(second.path(), &reversed, &[("tags.toml", TAGS)]);

    let a = Snapshot::build(first.path()).unwrap();
    let b = Snapshot::build(second.path()).unwrap();
    let again = Snapshot::build(first.path()).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, again);
    assert_eq!(a.revision(), b.revision());
}

#[test]
fn tag_cycle_is_rejected() {
    let repo = TempDir::new().unwrap();
    write_repo(
        repo.path(),
        &[],
        &[(
            "loop.toml",
            r#"
[[tag]]
name = "A"
type = "category"
[tag.includes]
category = ["B"]

[[tag]]
name = "B"
type = "category"
[tag.includes]
category = ["A"]
"#,
        )],
    );
    let err = Snapshot::build(repo.path()).unwrap_err();
    assert!(matches!(err, IndexError::Tag(TagError::Loop(_))));
}

#[test]
fn duplicated_tag_is_rejected_by_name() {
    let repo = TempDir::new().unwrap();
    let tag = "[[tag]]\nname = \"X\"\ntype = \"artist\"\n";
    write_repo(repo.path(), &[], &[("a.toml", tag), ("b.toml", tag)]);
    let err = Snapshot::build(repo.path()).unwrap_err();
    assert!(matches!(err, IndexError::Tag(TagError::Duplicated(_))));
    assert!(err.to_string().contains("X"));
}

#[test]
fn bare_name_shared_across_types_still_builds() {
    let repo = TempDir::new().unwrap();
    write_repo(
        repo.path(),
        &[
            ("a1.toml", album("A1", "First Step", &["Aqours"])),
            ("a2.toml", album("A2", "Second Step", &["group:Aqours"])),
        ],
        &[(
            "tags.toml",
            r#"
[[tag]]
name = "label"
type = "organization"
[tag.includes]
artist = ["Aqours"]

[[tag]]
name = "Aqours"
type = "group"
"#,
        )],
    );
    let snapshot = Snapshot::build(repo.path()).unwrap();

    assert_eq!(ids(snapshot.albums_by_tag("Aqours", true)), vec!["A1", "A2"]);
    assert_eq!(ids(snapshot.albums_by_tag("Aqours", false)), vec!["A1", "A2"]);
    assert_eq!(ids(snapshot.albums_by_tag("artist:Aqours", true)), vec!["A1"]);
    assert_eq!(ids(snapshot.albums_by_tag("group:Aqours", true)), vec!["A1", "A2"]);
    assert_eq!(ids(snapshot.albums_by_tag("label", true)), vec!["A1"]);
    assert!(snapshot.albums_by_tag("Aqours Sunshine", true).is_none());
}

#[test]
fn search_sees_only_published_snapshots() {
    let repo = scenario_repo();
    let catalog = Catalog::new();
    assert!(catalog.search_albums("spring").is_empty());

    catalog.publish(Snapshot::build(repo.path()).unwrap());
    let hits = catalog.search_albums("spring");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].info.title, "Spring Breeze");
    assert_eq!(catalog.search_tracks("night drive")[0].album_id, "A2");
}

#[test]
fn broken_album_keeps_previous_snapshot() {
    let repo = scenario_repo();
    let catalog = Catalog::new();
    catalog.publish(Snapshot::build(repo.path()).unwrap());
    let revision = catalog.revision();

    fs::write(repo.path().join("album").join("zz.toml"), "[album\nbroken").unwrap();
    let err = Snapshot::build(repo.path()).unwrap_err();
    assert!(err.to_string().contains("zz.toml"));

    assert_eq!(catalog.revision(), revision);
    assert!(catalog.get_album("A1").is_some());
    assert_eq!(catalog.search_albums("spring").len(), 1);
}

#[test]
fn readers_never_see_mixed_snapshots() {
    let small = scenario_repo();
    let large = TempDir::new().unwrap();
    write_repo(
        large.path(),
        &[
            ("a1.toml", album("A1", "Spring Breeze", &["groupX"])),
            ("a2.toml", album("A2", "Night Drive", &["memberY"])),
            ("a3.toml", album("A3", "Spring Rain", &["memberY"])),
        ],
        &[("tags.toml", TAGS)],
    );
    let small = Snapshot::build(small.path()).unwrap();
    let large = Snapshot::build(large.path()).unwrap();

    let catalog = Catalog::new();
    catalog.publish(small.clone());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let catalog = catalog.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let snapshot = catalog.snapshot();
                    let stats = snapshot.stats();
                    let by_tag = snapshot.albums_by_tag("groupX", true).unwrap();
                    assert_eq!(by_tag.len(), stats.albums);
                    assert_eq!(snapshot.search_albums("spring").len(), stats.albums - 1);
                }
            })
        })
        .collect();

    for round in 0..50 {
        if round % 2 == 0 {
            catalog.publish(large.clone());
        } else {
            catalog.publish(small.clone());
        }
    }
    for reader in readers {
        reader.join().unwrap();
    }
}
