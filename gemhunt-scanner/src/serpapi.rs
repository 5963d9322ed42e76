use crate::client::build_client;
use crate::collaborator::{ImageSource, LinkDiscoverer};
use crate::error::{Result, ScanError};
use crate::result::{LinkRecord, Lookup};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

pub const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    images_results: Vec<ImageResult>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    original: Option<String>,
    thumbnail: Option<String>,
}

impl ImageResult {
    /// Full-size image first, thumbnail as a fallback.
    fn best_url(self) -> Option<String> {
        self.original
            .filter(|u| !u.is_empty())
            .or(self.thumbnail.filter(|u| !u.is_empty()))
    }
}

/// Google Images through SerpAPI.
pub struct SerpApiImages {
    client: Client,
    endpoint: String,
    api_key: String,
    links_per_query: usize,
}

impl SerpApiImages {
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self> {
        if api_key.is_empty() {
            return Err(ScanError::MissingCredential("SERPAPI_KEY"));
        }
        Ok(Self {
            client: build_client(timeout_secs)?,
            endpoint: SERPAPI_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
            links_per_query: 5,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_links_per_query(mut self, count: usize) -> Self {
        self.links_per_query = count;
        self
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        debug!("SerpAPI image search: {}", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("tbm", "isch"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .images_results
            .into_iter()
            .filter_map(ImageResult::best_url)
            .collect())
    }
}

#[async_trait]
impl LinkDiscoverer for SerpApiImages {
    async fn discover(&self, query: &str) -> Lookup<Vec<LinkRecord>> {
        match self.search(query).await {
            Ok(urls) => Lookup::from_vec(
                urls.into_iter()
                    .take(self.links_per_query)
                    .map(|url| LinkRecord::new(url, format!("Image for query: {}", query)))
                    .collect(),
            ),
            Err(e) => {
                warn!("SerpAPI error for '{}': {}", query, e);
                Lookup::Transient(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ImageSource for SerpApiImages {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn image_urls(&self, query: &str, limit: usize) -> Lookup<Vec<String>> {
        self.search(query)
            .await
            .map(|mut urls| {
                urls.truncate(limit);
                urls
            })
            .into()
    }
}
