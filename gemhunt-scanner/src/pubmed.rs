//! Figures from PubMed Central open-access articles.
//!
//! `esearch` finds article ids for the query, `efetch` returns each
//! article's JATS XML, and every `<fig>` contributes its first `<graphic>`
//! whose `xlink:href` names a jpg or png file.

use crate::client::build_client;
use crate::collaborator::ImageSource;
use crate::error::{Result, ScanError};
use crate::result::Lookup;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};

pub const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
pub const PMC_ARTICLES_BASE: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

const MAX_ARTICLES: usize = 15;
const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];

#[derive(Deserialize)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

pub struct PubMedCentral {
    client: Client,
    eutils_base: String,
    articles_base: String,
}

impl PubMedCentral {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            eutils_base: EUTILS_BASE.to_string(),
            articles_base: PMC_ARTICLES_BASE.to_string(),
        })
    }

    pub fn with_base_urls(mut self, eutils_base: &str, articles_base: &str) -> Self {
        self.eutils_base = eutils_base.trim_end_matches('/').to_string();
        self.articles_base = articles_base.trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{}", self.eutils_base, endpoint);
        let response = self.client.get(&url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let retmax = MAX_ARTICLES.to_string();
        let body = self
            .get_text(
                "esearch.fcgi",
                &[
                    ("db", "pmc"),
                    ("term", query),
                    ("retmax", retmax.as_str()),
                    ("retmode", "json"),
                    ("tool", "gemhunt"),
                ],
            )
            .await?;
        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ScanError::ParseError(format!("esearch reply: {}", e)))?;
        Ok(parsed.esearchresult.idlist)
    }

    async fn figure_urls(&self, pmc_id: &str) -> Result<Vec<String>> {
        let xml = self
            .get_text(
                "efetch.fcgi",
                &[("db", "pmc"), ("id", pmc_id), ("rettype", "full"), ("retmode", "xml")],
            )
            .await?;
        Ok(extract_figure_graphics(&xml)
            .into_iter()
            .map(|href| format!("{}/PMC{}/bin/{}", self.articles_base, pmc_id, href))
            .collect())
    }

    async fn collect(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let ids = self.search(query).await?;
        debug!("PubMed Central: {} articles for '{}'", ids.len(), query);

        let mut urls = Vec::new();
        let mut failures = 0;
        for id in &ids {
            if urls.len() >= limit {
                break;
            }
            match self.figure_urls(id).await {
                Ok(found) => urls.extend(found),
                Err(e) => {
                    warn!("[PubMed] Error with article {}: {}", id, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == ids.len() {
            return Err(ScanError::Other(format!("all {} article fetches failed", failures)));
        }
        urls.truncate(limit);
        Ok(urls)
    }
}

/// First graphic of every figure whose href looks like a jpg or png file.
pub fn extract_figure_graphics(xml: &str) -> Vec<String> {
    let document = Html::parse_document(xml);
    let (Ok(figures), Ok(graphic)) = (Selector::parse("fig"), Selector::parse("graphic")) else {
        return Vec::new();
    };

    document
        .select(&figures)
        .filter_map(|fig| fig.select(&graphic).next())
        .filter_map(|element| element.value().attr("xlink:href"))
        .filter(|href| {
            let lower = href.to_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ImageSource for PubMedCentral {
    fn name(&self) -> &str {
        "pubmed"
    }

    async fn image_urls(&self, query: &str, limit: usize) -> Lookup<Vec<String>> {
        match self.collect(query, limit).await {
            Ok(urls) => Lookup::from_vec(urls),
            Err(e) => {
                warn!("[PubMed] Search failed for '{}': {}", query, e);
                Lookup::Transient(e.to_string())
            }
        }
    }
}
