use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use common::{Tag, TagKey, TagType};
use metadata::{TagFile, TagRefRecord};
use tracing::debug;

/// Index of a tag inside its [`TagSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(usize);

impl TagId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A reference to a tag, as written in tag files, album records or queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagRef {
    ByName(String),
    ByQualifiedName(TagType, String),
    /// `[tag, parent, grandparent, ...]`: the head is the tag, the tail names its parent.
    ByPath(Vec<TagRef>),
}

impl TagRef {
    /// `"type:name"` with a known type is qualified, anything else is a bare name.
    pub fn parse(text: &str) -> TagRef {
        if let Some((prefix, name)) = text.split_once(':') {
            if let Ok(tag_type) = prefix.parse::<TagType>() {
                return TagRef::ByQualifiedName(tag_type, name.to_string());
            }
        }
        TagRef::ByName(text.to_string())
    }

    /// A path written as `["name", "type"?, parent...]`, where a type right
    /// after a name qualifies that name.
    pub fn from_parts(parts: &[String]) -> TagRef {
        let mut refs = Vec::new();
        let mut idx = 0;
        while idx < parts.len() {
            let name = &parts[idx];
            match parts.get(idx + 1).and_then(|next| next.parse::<TagType>().ok()) {
                Some(tag_type) => {
                    refs.push(TagRef::ByQualifiedName(tag_type, name.clone()));
                    idx += 2;
                }
                None => {
                    refs.push(TagRef::parse(name));
                    idx += 1;
                }
            }
        }
        TagRef::ByPath(refs)
    }

    pub fn from_record(record: &TagRefRecord) -> TagRef {
        match record {
            TagRefRecord::Name(text) => TagRef::parse(text),
            TagRefRecord::Path(parts) => TagRef::from_parts(parts),
        }
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagRef::ByName(name) => f.write_str(name),
            TagRef::ByQualifiedName(tag_type, name) => write!(f, "{}:{}", tag_type, name),
            TagRef::ByPath(path) => {
                let parts: Vec<String> = path.iter().map(|part| part.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("tag not found")]
    NotFound,
    #[error("ambiguous tag")]
    Ambiguous,
    #[error("invalid tag ref")]
    InvalidRef,
}

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("{}: invalid tag type: {}", .path.display(), .value)]
    InvalidTagType { path: PathBuf, value: String },
    #[error("duplicated tags detected: {}", .0.join(","))]
    Duplicated(Vec<String>),
    #[error("unknown tag: {0}")]
    Undefined(String),
    #[error("ambiguous tag: {0}")]
    Ambiguous(String),
    #[error("invalid tag ref: {0}")]
    InvalidRef(String),
    #[error("loop detected: {}", .0.join(" -> "))]
    Loop(Vec<String>),
}

impl TagError {
    pub(crate) fn from_resolve(err: ResolveError, tag_ref: &TagRef) -> TagError {
        match err {
            ResolveError::NotFound => TagError::Undefined(tag_ref.to_string()),
            ResolveError::Ambiguous => TagError::Ambiguous(tag_ref.to_string()),
            ResolveError::InvalidRef => TagError::InvalidRef(tag_ref.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagNode {
    tag: Tag,
    parents: Vec<TagId>,
    children: Vec<TagId>,
}

impl TagNode {
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn parents(&self) -> &[TagId] {
        &self.parents
    }

    pub fn children(&self) -> &[TagId] {
        &self.children
    }
}

/// The validated tag taxonomy: an arena of tags, `includes` edges as
/// indices, and the lookup indices used to resolve [`TagRef`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    nodes: Vec<TagNode>,
    by_name: HashMap<String, Vec<TagId>>,
    by_key: HashMap<TagKey, TagId>,
    /// Children always come before their parents.
    post_order: Vec<TagId>,
}

impl TagSet {
    pub fn build(files: &[TagFile]) -> Result<TagSet, TagError> {
        let mut declared: BTreeMap<TagKey, Tag> = BTreeMap::new();
        let mut counts: BTreeMap<TagKey, usize> = BTreeMap::new();
        let mut implied: BTreeSet<TagKey> = BTreeSet::new();
        let mut includes: Vec<(TagKey, TagKey)> = Vec::new();
        let mut included_by: Vec<(TagRef, TagKey)> = Vec::new();

        for file in files {
            for record in &file.tags {
                let tag_type = parse_tag_type(&file.source, &record.tag_type)?;
                let key = TagKey::new(tag_type, record.name.clone());
                *counts.entry(key.clone()).or_default() += 1;
                declared.entry(key.clone()).or_insert_with(|| Tag {
                    name: record.name.clone(),
                    tag_type,
                    alias: record.alias.clone(),
                    names: record.names.clone(),
                });

                for (child_type, names) in &record.includes {
                    let child_type = parse_tag_type(&file.source, child_type)?;
                    for name in names {
                        let child = TagKey::new(child_type, name.clone());
                        implied.insert(child.clone());
                        includes.push((key.clone(), child));
                    }
                }
                for parent in &record.included_by {
                    included_by.push((TagRef::from_record(parent), key.clone()));
                }
            }
        }

        let duplicated: Vec<String> = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(key, _)| key.to_string())
            .collect();
        if !duplicated.is_empty() {
            return Err(TagError::Duplicated(duplicated));
        }

        for key in implied {
            if !declared.contains_key(&key) {
                debug!("Tag {} only appears in includes", key);
                declared.insert(
                    key.clone(),
                    Tag {
                        name: key.name,
                        tag_type: key.tag_type,
                        alias: Vec::new(),
                        names: BTreeMap::new(),
                    },
                );
            }
        }

        let mut set = TagSet::default();
        for (key, tag) in declared {
            let id = TagId(set.nodes.len());
            set.by_name.entry(tag.name.clone()).or_default().push(id);
            set.by_key.insert(key, id);
            set.nodes.push(TagNode {
                tag,
                parents: Vec::new(),
                children: Vec::new(),
            });
        }

        for (parent, child) in &includes {
            let parent = set.id_of(parent)?;
            let child = set.id_of(child)?;
            set.link(parent, child);
        }

        // Path refs are matched against parent edges, so they resolve last.
        let (paths, plain): (Vec<_>, Vec<_>) = included_by
            .into_iter()
            .partition(|(parent, _)| matches!(parent, TagRef::ByPath(_)));
        for (parent_ref, child) in plain.iter().chain(paths.iter()) {
            let parent = set
                .resolve(parent_ref)
                .map_err(|err| TagError::from_resolve(err, parent_ref))?;
            let child = set.id_of(child)?;
            set.link(parent, child);
        }

        set.post_order = post_order(&set.nodes)?;
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: TagId) -> &TagNode {
        &self.nodes[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TagId, &TagNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (TagId(idx), node))
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.nodes.iter().map(|node| node.tag.clone()).collect()
    }

    /// Every tag sharing a bare name; more than one entry means the name is ambiguous.
    pub fn with_name(&self, name: &str) -> &[TagId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn post_order(&self) -> &[TagId] {
        &self.post_order
    }

    pub fn resolve(&self, tag_ref: &TagRef) -> Result<TagId, ResolveError> {
        match self.candidates(tag_ref)?.as_slice() {
            [] => Err(ResolveError::NotFound),
            [id] => Ok(*id),
            _ => Err(ResolveError::Ambiguous),
        }
    }

    pub fn resolve_str(&self, text: &str) -> Result<TagId, ResolveError> {
        self.resolve(&TagRef::parse(text))
    }

    /// Every tag an album tag string can stand for: all tags sharing a bare
    /// name, or exactly one for `type:name`.
    pub fn matching(&self, text: &str) -> Result<Vec<TagId>, ResolveError> {
        match self.resolve_str(text) {
            Ok(id) => Ok(vec![id]),
            Err(ResolveError::Ambiguous) => Ok(self.with_name(text).to_vec()),
            Err(err) => Err(err),
        }
    }

    /// Adjacency view: each tag's qualified key mapped to its direct children.
    pub fn graph(&self) -> BTreeMap<String, Vec<String>> {
        self.nodes
            .iter()
            .map(|node| {
                let children = node
                    .children
                    .iter()
                    .map(|child| self.nodes[child.0].tag.key().to_string())
                    .collect();
                (node.tag.key().to_string(), children)
            })
            .collect()
    }

    fn candidates(&self, tag_ref: &TagRef) -> Result<Vec<TagId>, ResolveError> {
        match tag_ref {
            TagRef::ByName(name) => Ok(self.with_name(name).to_vec()),
            TagRef::ByQualifiedName(tag_type, name) => Ok(self
                .by_key
                .get(&TagKey::new(*tag_type, name.clone()))
                .copied()
                .into_iter()
                .collect()),
            TagRef::ByPath(path) => self.path_candidates(path),
        }
    }

    fn path_candidates(&self, path: &[TagRef]) -> Result<Vec<TagId>, ResolveError> {
        let (head, rest) = path.split_first().ok_or(ResolveError::InvalidRef)?;
        if matches!(head, TagRef::ByPath(_)) {
            return Err(ResolveError::InvalidRef);
        }
        let heads = self.candidates(head)?;
        if rest.is_empty() {
            return Ok(heads);
        }
        let parent = match self.path_candidates(rest)?.as_slice() {
            [] => return Err(ResolveError::NotFound),
            [id] => *id,
            _ => return Err(ResolveError::Ambiguous),
        };
        Ok(heads
            .into_iter()
            .filter(|id| self.nodes[id.0].parents.contains(&parent))
            .collect())
    }

    fn id_of(&self, key: &TagKey) -> Result<TagId, TagError> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| TagError::Undefined(key.to_string()))
    }

    fn link(&mut self, parent: TagId, child: TagId) {
        if !self.nodes[parent.0].children.contains(&child) {
            self.nodes[parent.0].children.push(child);
        }
        if !self.nodes[child.0].parents.contains(&parent) {
            self.nodes[child.0].parents.push(parent);
        }
    }
}

fn parse_tag_type(path: &Path, value: &str) -> Result<TagType, TagError> {
    value.parse().map_err(|_| TagError::InvalidTagType {
        path: path.to_path_buf(),
        value: value.to_string(),
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Depth-first over every root; fails on the first edge back into the
/// current stack, otherwise returns nodes in post-order.
fn post_order(nodes: &[TagNode]) -> Result<Vec<TagId>, TagError> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut order = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..nodes.len() {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        marks[root] = Mark::OnStack;
        stack.push((root, 0));

        while let Some(&(node, next)) = stack.last() {
            let Some(child) = nodes[node].children.get(next).map(|id| id.0) else {
                marks[node] = Mark::Done;
                order.push(TagId(node));
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            match marks[child] {
                Mark::Unvisited => {
                    marks[child] = Mark::OnStack;
                    stack.push((child, 0));
                }
                Mark::OnStack => {
                    let start = stack
                        .iter()
                        .position(|(idx, _)| *idx == child)
                        .unwrap_or(0);
                    let mut cycle: Vec<String> = stack[start..]
                        .iter()
                        .map(|(idx, _)| nodes[*idx].tag.key().to_string())
                        .collect();
                    cycle.push(nodes[child].tag.key().to_string());
                    return Err(TagError::Loop(cycle));
                }
                Mark::Done => {}
            }
        }
    }

    Ok(order)
}
