use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate image link, as stored in taxonomy files.
///
/// Provider-specific keys beyond `url` and `desc` (an LLM's `reason`, for
/// instance) are kept in `extra` and written back unchanged. Records read
/// from a file remember their key order; records built here are written as
/// `url`, `desc`, then extras.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    #[serde(default)]
    pub desc: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    layout: Vec<String>,
}

impl PartialEq for LinkRecord {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.desc == other.desc && self.extra == other.extra
    }
}

impl LinkRecord {
    pub fn new(url: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            desc: desc.into(),
            extra: Map::new(),
            layout: Vec::new(),
        }
    }

    pub fn into_value(mut self) -> Value {
        if self.layout.is_empty() {
            let mut map = Map::new();
            map.insert("url".to_string(), Value::String(self.url));
            map.insert("desc".to_string(), Value::String(self.desc));
            map.append(&mut self.extra);
            return Value::Object(map);
        }

        let had_desc = self.layout.iter().any(|key| key == "desc");
        let mut url = Some(self.url);
        // an absent desc stays absent unless something filled it in
        let mut desc = (had_desc || !self.desc.is_empty()).then_some(self.desc);
        let mut map = Map::new();
        for key in &self.layout {
            let value = match key.as_str() {
                "url" => url.take().map(Value::String),
                "desc" => desc.take().map(Value::String),
                other => self.extra.remove(other),
            };
            if let Some(value) = value {
                map.insert(key.clone(), value);
            }
        }
        if let Some(url) = url {
            map.insert("url".to_string(), Value::String(url));
        }
        if let Some(desc) = desc {
            map.insert("desc".to_string(), Value::String(desc));
        }
        map.append(&mut self.extra);
        Value::Object(map)
    }

    /// Parse a JSON value as a link record, rejecting records without a url.
    pub fn from_value(value: &Value) -> Option<Self> {
        let record: LinkRecord = serde_json::from_value(value.clone()).ok()?;
        if record.url.trim().is_empty() {
            return None;
        }
        Some(record)
    }

    /// Like [`LinkRecord::from_value`], but the record is written back with
    /// the keys in the order they had in `value`.
    pub fn from_stored(value: &Value) -> Option<Self> {
        let mut record = Self::from_value(value)?;
        if let Value::Object(map) = value {
            record.layout = map.keys().cloned().collect();
        }
        Some(record)
    }
}

/// Outcome of a collaborator call.
///
/// `Empty` means the provider answered but had nothing usable; `Transient`
/// means the call itself broke and a later run may succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    Empty,
    Transient(String),
}

impl<T: Default> Lookup<T> {
    /// Collapse to a plain value, treating both failure kinds as empty.
    pub fn unwrap_or_empty(self) -> T {
        match self {
            Lookup::Found(value) => value,
            _ => T::default(),
        }
    }
}

impl<T> Lookup<Vec<T>> {
    /// Wrap a list, mapping an empty list to `Lookup::Empty`.
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            Lookup::Empty
        } else {
            Lookup::Found(items)
        }
    }
}

impl<T> From<crate::error::Result<Vec<T>>> for Lookup<Vec<T>> {
    fn from(result: crate::error::Result<Vec<T>>) -> Self {
        match result {
            Ok(items) => Lookup::from_vec(items),
            Err(e) => Lookup::Transient(e.to_string()),
        }
    }
}
