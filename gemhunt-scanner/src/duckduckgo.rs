use crate::client::build_client;
use crate::collaborator::ImageSource;
use crate::error::{Result, ScanError};
use crate::result::Lookup;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DUCKDUCKGO_BASE: &str = "https://duckduckgo.com";

const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct ImagePage {
    #[serde(default)]
    results: Vec<ImageHit>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageHit {
    image: Option<String>,
}

/// DuckDuckGo image search.
///
/// The JSON endpoint needs a per-query `vqd` token that is only handed out
/// in the HTML of a regular search page, so every query costs one extra
/// request.
pub struct DuckDuckGoImages {
    client: Client,
    base_url: String,
}

impl DuckDuckGoImages {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: DUCKDUCKGO_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn token(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[("q", query), ("iax", "images"), ("ia", "images")])
            .send()
            .await?;
        let html = response.text().await?;
        extract_vqd(&html).ok_or_else(|| ScanError::ParseError("vqd token not found".to_string()))
    }

    async fn fetch_page(&self, query: &str, vqd: &str, page: usize) -> Result<ImagePage> {
        let url = format!("{}/i.js", self.base_url);
        let page_param = page.to_string();
        let response = self
            .client
            .get(&url)
            .header("Referer", format!("{}/", self.base_url))
            .query(&[
                ("l", "us-en"),
                ("o", "json"),
                ("q", query),
                ("vqd", vqd),
                ("f", ",,,,,"),
                ("p", page_param.as_str()),
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
        Ok(response.json().await?)
    }

    /// Page through results until `limit` urls are found. A page that fails
    /// after earlier pages produced urls ends the walk with what was found.
    async fn collect(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let vqd = self.token(query).await?;

        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        let mut next_page = Some(1usize);

        for _ in 0..MAX_PAGES {
            let Some(page) = next_page.take() else { break };
            if urls.len() >= limit {
                break;
            }

            let body = match self.fetch_page(query, &vqd, page).await {
                Ok(body) => body,
                Err(e) if !urls.is_empty() => {
                    warn!("[DuckDuckGo] Page {} for '{}' failed, keeping {} urls: {}", page, query, urls.len(), e);
                    break;
                }
                Err(e) => return Err(e),
            };
            debug!("DuckDuckGo page {} for '{}': {} hits", page, query, body.results.len());

            for url in body.results.into_iter().filter_map(|hit| hit.image) {
                if urls.len() >= limit {
                    break;
                }
                if seen.insert(url.clone()) {
                    urls.push(url);
                }
            }

            if body.next.is_some() {
                next_page = Some(page + 1);
            }
        }

        Ok(urls)
    }
}

/// Find the `vqd` token in a DuckDuckGo search page.
pub fn extract_vqd(html: &str) -> Option<String> {
    for (start, _) in html.match_indices("vqd=") {
        let rest = &html[start + 4..];
        let (body, stops) = match rest.chars().next() {
            Some('"') => (&rest[1..], "\""),
            Some('\'') => (&rest[1..], "'"),
            _ => (rest, "&\"' ;)"),
        };
        let token: String = body.chars().take_while(|c| !stops.contains(*c)).collect();
        if !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Some(token);
        }
    }
    None
}

#[async_trait]
impl ImageSource for DuckDuckGoImages {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn image_urls(&self, query: &str, limit: usize) -> Lookup<Vec<String>> {
        match self.collect(query, limit).await {
            Ok(urls) => Lookup::from_vec(urls),
            Err(e) => {
                warn!("[DuckDuckGo] Error for '{}': {}", query, e);
                Lookup::Transient(e.to_string())
            }
        }
    }
}
