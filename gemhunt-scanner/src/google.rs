use crate::client::build_client;
use crate::collaborator::{ImageSource, LinkDiscoverer};
use crate::error::{Result, ScanError};
use crate::result::{LinkRecord, Lookup};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::warn;

pub const GOOGLE_BASE: &str = "https://www.google.com";

/// Google Images, scraped straight from the results page. No API key needed,
/// but the markup only carries thumbnails.
pub struct GoogleImages {
    client: Client,
    base_url: String,
    links_per_query: usize,
}

impl GoogleImages {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: GOOGLE_BASE.to_string(),
            links_per_query: 5,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_links_per_query(mut self, count: usize) -> Self {
        self.links_per_query = count;
        self
    }

    async fn scrape(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("tbm", "isch"), ("q", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        let mut urls = extract_image_sources(&html);
        urls.truncate(limit);
        Ok(urls)
    }
}

/// `img[src]` values that point at a remote resource.
pub fn extract_image_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("img[src]") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("src"))
        .filter(|src| src.contains("http"))
        .map(String::from)
        .collect()
}

#[async_trait]
impl LinkDiscoverer for GoogleImages {
    async fn discover(&self, query: &str) -> Lookup<Vec<LinkRecord>> {
        match self.scrape(query, self.links_per_query).await {
            Ok(urls) => Lookup::from_vec(
                urls.into_iter()
                    .map(|url| LinkRecord::new(url, format!("Image for query: {}", query)))
                    .collect(),
            ),
            Err(e) => {
                warn!("Google scrape failed for '{}': {}", query, e);
                Lookup::Transient(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ImageSource for GoogleImages {
    fn name(&self) -> &str {
        "google"
    }

    async fn image_urls(&self, query: &str, limit: usize) -> Lookup<Vec<String>> {
        self.scrape(query, limit).await.into()
    }
}
