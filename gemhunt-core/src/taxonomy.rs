//! Taxonomy model and whole-file JSON persistence.
//!
//! Taxonomy files are nested JSON objects (domain, subdomain, optionally a
//! language) whose leaves hold image links in one of three layouts: a bare
//! list, an object with an `image_gems` list, or a language-keyed object of
//! those. [`TaxonomyNode`] gives each layout its own variant; the only place
//! that looks at raw JSON shapes is the `From<Value>` conversion below.
//!
//! Files are read in full and written in full. There is no locking, so two
//! jobs writing the same file at once will lose one job's work.

use crate::error::{CoreError, Result};
use gemhunt_scanner::LinkRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const IMAGE_GEMS_KEY: &str = "image_gems";

/// The three ways a leaf can be present but empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blank {
    EmptyMap,
    EmptyList,
    Null,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum TaxonomyNode {
    /// `{}`, `[]` or `null`.
    Unenriched(Blank),
    /// A non-empty list of link records.
    FlatLinks(Vec<LinkRecord>),
    /// An object carrying an `image_gems` list. Other keys are kept as siblings.
    ///
    /// `gems_at` is the position of `image_gems` among the object's keys, so
    /// a file read and written back keeps its key order.
    TaggedLinks {
        image_gems: Vec<LinkRecord>,
        siblings: IndexMap<String, TaxonomyNode>,
        gems_at: usize,
    },
    /// An object of further taxonomy levels.
    Branch(IndexMap<String, TaxonomyNode>),
    /// Anything else (strings, numbers, lists that are not link records).
    Opaque(Value),
}

fn parse_links(items: &[Value]) -> Option<Vec<LinkRecord>> {
    items.iter().map(LinkRecord::from_stored).collect()
}

fn links_to_value(links: Vec<LinkRecord>) -> Value {
    Value::Array(links.into_iter().map(LinkRecord::into_value).collect())
}

fn convert_children(map: Map<String, Value>) -> IndexMap<String, TaxonomyNode> {
    map.into_iter()
        .map(|(key, value)| (key, TaxonomyNode::from(value)))
        .collect()
}

impl From<Value> for TaxonomyNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => TaxonomyNode::Unenriched(Blank::Null),
            Value::Array(items) if items.is_empty() => TaxonomyNode::Unenriched(Blank::EmptyList),
            Value::Array(items) => match parse_links(&items) {
                Some(links) => TaxonomyNode::FlatLinks(links),
                None => TaxonomyNode::Opaque(Value::Array(items)),
            },
            Value::Object(map) if map.is_empty() => TaxonomyNode::Unenriched(Blank::EmptyMap),
            Value::Object(mut map) => {
                let gems = match map.get(IMAGE_GEMS_KEY) {
                    Some(Value::Array(items)) => parse_links(items),
                    _ => None,
                };
                match gems {
                    Some(image_gems) => {
                        let gems_at = map
                            .keys()
                            .position(|key| key == IMAGE_GEMS_KEY)
                            .unwrap_or(map.len());
                        map.shift_remove(IMAGE_GEMS_KEY);
                        TaxonomyNode::TaggedLinks {
                            image_gems,
                            siblings: convert_children(map),
                            gems_at,
                        }
                    }
                    None => TaxonomyNode::Branch(convert_children(map)),
                }
            }
            other => TaxonomyNode::Opaque(other),
        }
    }
}

impl From<TaxonomyNode> for Value {
    fn from(node: TaxonomyNode) -> Self {
        match node {
            TaxonomyNode::Unenriched(Blank::EmptyMap) => Value::Object(Map::new()),
            TaxonomyNode::Unenriched(Blank::EmptyList) => Value::Array(Vec::new()),
            TaxonomyNode::Unenriched(Blank::Null) => Value::Null,
            TaxonomyNode::FlatLinks(links) => links_to_value(links),
            TaxonomyNode::TaggedLinks {
                image_gems,
                siblings,
                gems_at,
            } => {
                let mut gems = Some(links_to_value(image_gems));
                let mut map = Map::new();
                for (idx, (key, child)) in siblings.into_iter().enumerate() {
                    if idx == gems_at
                        && let Some(gems) = gems.take()
                    {
                        map.insert(IMAGE_GEMS_KEY.to_string(), gems);
                    }
                    map.insert(key, Value::from(child));
                }
                if let Some(gems) = gems {
                    map.insert(IMAGE_GEMS_KEY.to_string(), gems);
                }
                Value::Object(map)
            }
            TaxonomyNode::Branch(children) => Value::Object(
                children
                    .into_iter()
                    .map(|(key, child)| (key, Value::from(child)))
                    .collect(),
            ),
            TaxonomyNode::Opaque(value) => value,
        }
    }
}

impl Default for TaxonomyNode {
    fn default() -> Self {
        TaxonomyNode::Unenriched(Blank::EmptyMap)
    }
}

impl TaxonomyNode {
    pub fn empty_branch() -> Self {
        TaxonomyNode::Branch(IndexMap::new())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, TaxonomyNode::Unenriched(_))
    }

    /// True when the node itself holds at least one link record.
    pub fn has_links(&self) -> bool {
        match self {
            TaxonomyNode::FlatLinks(links) => !links.is_empty(),
            TaxonomyNode::TaggedLinks { image_gems, .. } => !image_gems.is_empty(),
            _ => false,
        }
    }

    /// Named children, if the node is an object.
    pub fn children(&self) -> Option<&IndexMap<String, TaxonomyNode>> {
        match self {
            TaxonomyNode::Branch(children) => Some(children),
            TaxonomyNode::TaggedLinks { siblings, .. } => Some(siblings),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut IndexMap<String, TaxonomyNode>> {
        match self {
            TaxonomyNode::Branch(children) => Some(children),
            TaxonomyNode::TaggedLinks { siblings, .. } => Some(siblings),
            _ => None,
        }
    }

    pub fn get_path(&self, path: &[String]) -> Option<&TaxonomyNode> {
        let mut node = self;
        for key in path {
            node = node.children()?.get(key)?;
        }
        Some(node)
    }

    /// Walk `path`, creating empty objects for missing or blank steps.
    ///
    /// Fails if the path runs through a list or scalar, since nesting there
    /// would throw away data.
    pub fn entry_path(&mut self, path: &[String]) -> Result<&mut TaxonomyNode> {
        let mut node = self;
        for (depth, key) in path.iter().enumerate() {
            if node.is_blank() {
                *node = TaxonomyNode::empty_branch();
            }
            let children = node.children_mut().ok_or_else(|| {
                CoreError::InvalidOption(format!(
                    "path '{}' runs through a non-object node",
                    path[..=depth].join(" > ")
                ))
            })?;
            node = children
                .entry(key.clone())
                .or_insert(TaxonomyNode::Unenriched(Blank::EmptyMap));
        }
        Ok(node)
    }

    /// Total number of link records anywhere below this node.
    pub fn link_count(&self) -> usize {
        match self {
            TaxonomyNode::FlatLinks(links) => links.len(),
            TaxonomyNode::TaggedLinks {
                image_gems, siblings, ..
            } => image_gems.len() + siblings.values().map(TaxonomyNode::link_count).sum::<usize>(),
            TaxonomyNode::Branch(children) => children.values().map(TaxonomyNode::link_count).sum(),
            _ => 0,
        }
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&Value::from(self.clone()))
    }
}

pub fn parse_taxonomy(text: &str, origin: &Path) -> Result<TaxonomyNode> {
    let value: Value = serde_json::from_str(text).map_err(|source| CoreError::Json {
        path: origin.to_path_buf(),
        source,
    })?;
    Ok(TaxonomyNode::from(value))
}

pub fn load_taxonomy(path: &Path) -> Result<TaxonomyNode> {
    let text = fs::read_to_string(path).map_err(|source| CoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_taxonomy(&text, path)
}

/// Like [`load_taxonomy`], but a file that does not exist yet is an empty taxonomy.
pub fn load_or_empty(path: &Path) -> Result<TaxonomyNode> {
    if !path.exists() {
        return Ok(TaxonomyNode::empty_branch());
    }
    load_taxonomy(path)
}

/// Write the whole taxonomy as indented UTF-8 JSON (non-ASCII left unescaped).
pub fn save_taxonomy(path: &Path, node: &TaxonomyNode) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| CoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = node.to_pretty_json().map_err(|source| CoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| CoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_variants() {
        assert_eq!(TaxonomyNode::from(json!({})), TaxonomyNode::Unenriched(Blank::EmptyMap));
        assert_eq!(TaxonomyNode::from(json!([])), TaxonomyNode::Unenriched(Blank::EmptyList));
        assert_eq!(TaxonomyNode::from(json!(null)), TaxonomyNode::Unenriched(Blank::Null));
    }

    #[test]
    fn test_tagged_links_keep_siblings() {
        let node = TaxonomyNode::from(json!({
            "notes": "keep me",
            "image_gems": [{"url": "https://a.com/x.jpg", "desc": "d"}]
        }));
        match &node {
            TaxonomyNode::TaggedLinks {
                image_gems, siblings, ..
            } => {
                assert_eq!(image_gems.len(), 1);
                assert!(siblings.contains_key("notes"));
            }
            other => panic!("expected tagged links, got {:?}", other),
        }
        assert!(node.has_links());
    }

    #[test]
    fn test_unrecognised_lists_are_opaque() {
        let node = TaxonomyNode::from(json!(["just", "strings"]));
        assert!(matches!(node, TaxonomyNode::Opaque(_)));
        assert_eq!(Value::from(node), json!(["just", "strings"]));
    }

    #[test]
    fn test_malformed_image_gems_is_a_branch() {
        let node = TaxonomyNode::from(json!({"image_gems": "oops"}));
        assert!(matches!(node, TaxonomyNode::Branch(_)));
        assert_eq!(Value::from(node), json!({"image_gems": "oops"}));
    }

    #[test]
    fn test_entry_path_creates_levels() {
        let mut root = TaxonomyNode::empty_branch();
        let path = vec!["Physics".to_string(), "Optics".to_string()];
        root.entry_path(&path).unwrap();
        assert_eq!(Value::from(root), json!({"Physics": {"Optics": {}}}));
    }

    #[test]
    fn test_entry_path_refuses_to_nest_in_lists() {
        let mut root = TaxonomyNode::from(json!({
            "Physics": [{"url": "https://a.com", "desc": "d"}]
        }));
        let path = vec!["Physics".to_string(), "Optics".to_string()];
        assert!(root.entry_path(&path).is_err());
    }

    #[test]
    fn test_link_count() {
        let node = TaxonomyNode::from(json!({
            "A": {"a1": [{"url": "u1", "desc": ""}, {"url": "u2", "desc": ""}]},
            "B": {"b1": {"image_gems": [{"url": "u3", "desc": ""}]}, "b2": {}}
        }));
        assert_eq!(node.link_count(), 3);
    }
}
