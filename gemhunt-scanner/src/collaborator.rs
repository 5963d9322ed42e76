//! Seams between the taxonomy/download logic and the outside world.
//!
//! Every provider call is hidden behind one of these traits so the walker and
//! the downloader can be driven by in-memory fakes in tests.

use crate::error::Result;
use crate::result::{LinkRecord, Lookup};
use async_trait::async_trait;

/// Where in the taxonomy a leaf sits, plus the language the images should show.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafContext {
    pub path: Vec<String>,
    pub language: String,
}

impl LeafContext {
    pub fn new(path: Vec<String>, language: impl Into<String>) -> Self {
        Self {
            path,
            language: language.into(),
        }
    }

    /// Top-level domain name, or an empty string for a root leaf.
    pub fn domain(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or("")
    }

    /// Everything below the domain, joined as `a > b`.
    pub fn subdomain(&self) -> String {
        self.path
            .iter()
            .skip(1)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    pub fn display_path(&self) -> String {
        self.path.join(" > ")
    }
}

#[async_trait]
pub trait KeywordSuggester: Send + Sync {
    /// A handful of short search phrases for the leaf.
    async fn suggest(&self, context: &LeafContext) -> Lookup<Vec<String>>;
}

#[async_trait]
pub trait LinkDiscoverer: Send + Sync {
    async fn discover(&self, query: &str) -> Lookup<Vec<LinkRecord>>;
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    fn name(&self) -> &str;

    async fn image_urls(&self, query: &str, limit: usize) -> Lookup<Vec<String>>;
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Raw response body for a successful (2xx) fetch.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
