use std::collections::BTreeSet;

use common::{AlbumDetails, AlbumIdentifier};

use crate::tags::{TagError, TagRef, TagSet};

/// Albums carried by each tag, indexed by [`crate::TagId`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Membership {
    direct: Vec<Vec<AlbumIdentifier>>,
    recursive: Vec<Vec<AlbumIdentifier>>,
}

impl Membership {
    pub fn direct(&self, id: crate::TagId) -> &[AlbumIdentifier] {
        &self.direct[id.index()]
    }

    pub fn recursive(&self, id: crate::TagId) -> &[AlbumIdentifier] {
        &self.recursive[id.index()]
    }
}

/// Assigns every album to the tags it carries (a bare name shared across
/// types counts for each of them), then folds each tag's
/// descendants into it so a general tag holds every album below it.
pub fn compute_membership<'a, I>(tags: &TagSet, albums: I) -> Result<Membership, TagError>
where
    I: IntoIterator<Item = &'a AlbumDetails>,
{
    let mut direct: Vec<BTreeSet<AlbumIdentifier>> = vec![BTreeSet::new(); tags.len()];
    for album in albums {
        for name in &album.tags {
            let ids = tags
                .matching(name)
                .map_err(|err| TagError::from_resolve(err, &TagRef::parse(name)))?;
            for id in ids {
                direct[id.index()].insert(album.info.album_id.clone());
            }
        }
    }

    // Post-order puts every child ahead of its parents, so one sweep suffices.
    let mut recursive = direct.clone();
    for &id in tags.post_order() {
        let inherited: Vec<AlbumIdentifier> = tags
            .node(id)
            .children()
            .iter()
            .flat_map(|child| recursive[child.index()].iter().cloned())
            .collect();
        recursive[id.index()].extend(inherited);
    }

    Ok(Membership {
        direct: direct.into_iter().map(|set| set.into_iter().collect()).collect(),
        recursive: recursive
            .into_iter()
            .map(|set| set.into_iter().collect())
            .collect(),
    })
}
