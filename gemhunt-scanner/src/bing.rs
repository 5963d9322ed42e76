use crate::client::build_client;
use crate::collaborator::ImageSource;
use crate::error::{Result, ScanError};
use crate::result::Lookup;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const BING_BASE: &str = "https://www.bing.com";

const PAGE_SIZE: usize = 35;
const MAX_PAGES: usize = 10;

/// Metadata blob Bing stores in the `m` attribute of each result anchor.
#[derive(Deserialize)]
struct ResultMeta {
    murl: Option<String>,
}

/// Bing image search, scraped from the async results endpoint.
pub struct BingImages {
    client: Client,
    base_url: String,
}

impl BingImages {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: BING_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch_page(&self, query: &str, offset: usize) -> Result<String> {
        let url = format!("{}/images/async", self.base_url);
        let first = offset.to_string();
        let count = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("first", first.as_str()),
                ("count", count.as_str()),
                ("adlt", "off"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Page through results until `limit` urls are found. A page that fails
    /// after earlier pages produced urls ends the walk with what was found.
    async fn collect(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();

        for page in 0..MAX_PAGES {
            if urls.len() >= limit {
                break;
            }
            let html = match self.fetch_page(query, page * PAGE_SIZE).await {
                Ok(html) => html,
                Err(e) if !urls.is_empty() => {
                    warn!("[Bing] Page {} for '{}' failed, keeping {} urls: {}", page, query, urls.len(), e);
                    break;
                }
                Err(e) => return Err(e),
            };
            let found = extract_media_urls(&html);
            debug!("Bing page {} for '{}': {} urls", page, query, found.len());

            let before = urls.len();
            for url in found {
                if urls.len() >= limit {
                    break;
                }
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
            if urls.len() == before {
                break;
            }
        }

        Ok(urls)
    }
}

/// Pull full-size image URLs out of a Bing results fragment.
pub fn extract_media_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("a.iusc") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("m"))
        .filter_map(|meta| serde_json::from_str::<ResultMeta>(meta).ok())
        .filter_map(|meta| meta.murl)
        .filter(|url| url.starts_with("http"))
        .collect()
}

#[async_trait]
impl ImageSource for BingImages {
    fn name(&self) -> &str {
        "bing"
    }

    async fn image_urls(&self, query: &str, limit: usize) -> Lookup<Vec<String>> {
        match self.collect(query, limit).await {
            Ok(urls) => Lookup::from_vec(urls),
            Err(e) => {
                warn!("[Bing] Failed for '{}': {}", query, e);
                Lookup::Transient(e.to_string())
            }
        }
    }
}
