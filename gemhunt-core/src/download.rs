//! Batch image downloader.
//!
//! For each query of each category, URLs from every configured
//! [`ImageSource`] are merged into one ordered, duplicate-free set and then
//! fetched by a bounded pool. Every image is decoded and re-encoded as an
//! RGB JPEG at `{root}/{category}/img_{slug}_{seq:04}.jpg`.

use crate::error::{CoreError, Result};
use gemhunt_scanner::{ImageFetcher, ImageSource, Lookup};
use indexmap::{IndexMap, IndexSet};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_PER_QUERY_LIMIT: usize = 100;

/// Appended to every query unless the caller sets its own decoration.
pub const DEFAULT_DECORATION: &str = "صور تعليمية مكتوبة باللغة العربية بدون علامات مائية";

/// Optional size constraints applied after decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImageFilter {
    /// Reject images whose shorter side is below this many pixels.
    pub min_side: Option<u32>,
    /// Reject images whose long/short side ratio exceeds this.
    pub max_aspect: Option<f32>,
}

impl ImageFilter {
    pub fn check(&self, width: u32, height: u32) -> std::result::Result<(), String> {
        let short = width.min(height);
        let long = width.max(height);

        if let Some(min_side) = self.min_side
            && short < min_side
        {
            return Err(format!("{}x{} is smaller than {}px", width, height, min_side));
        }
        if let Some(max_aspect) = self.max_aspect
            && short > 0
            && long as f32 / short as f32 > max_aspect
        {
            return Err(format!("{}x{} exceeds aspect ratio {}", width, height, max_aspect));
        }
        if short == 0 {
            return Err("image has no pixels".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub root: PathBuf,
    /// Results requested from each source per query. Not applied to the union.
    pub per_query_limit: usize,
    pub concurrency: usize,
    /// Appended to each query before searching.
    pub decoration: Option<String>,
    pub filter: ImageFilter,
    pub show_progress_bars: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("raw_images"),
            per_query_limit: DEFAULT_PER_QUERY_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            decoration: Some(DEFAULT_DECORATION.to_string()),
            filter: ImageFilter::default(),
            show_progress_bars: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadResult {
    pub url: String,
    pub path: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub category: String,
    pub query: String,
    pub total: usize,
    pub successes: usize,
    pub results: Vec<DownloadResult>,
}

impl QuerySummary {
    pub fn failures(&self) -> usize {
        self.total - self.successes
    }

    /// Both sources came back empty.
    pub fn no_candidates(&self) -> bool {
        self.total == 0
    }
}

/// `"{query} {decoration}"`, or the query unchanged when there is no decoration.
pub fn decorate_query(query: &str, decoration: Option<&str>) -> String {
    match decoration.map(str::trim) {
        Some(decoration) if !decoration.is_empty() => format!("{} {}", query, decoration),
        _ => query.to_string(),
    }
}

/// Query text made safe for a file name: spaces and path separators become `_`.
pub fn slugify(query: &str) -> String {
    query
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

pub fn image_path(category_dir: &Path, query: &str, seq: usize) -> PathBuf {
    category_dir.join(format!("img_{}_{:04}.jpg", slugify(query), seq))
}

/// Decode `bytes`, check them against `filter` and save as RGB JPEG.
pub fn save_image(bytes: &[u8], path: &Path, filter: ImageFilter) -> std::result::Result<(u32, u32), String> {
    let image = image::load_from_memory(bytes).map_err(|e| format!("Decode failed: {}", e))?;
    filter.check(image.width(), image.height())?;

    let rgb = image.to_rgb8();
    rgb.save_with_format(path, image::ImageFormat::Jpeg)
        .map_err(|e| format!("Failed to save {}: {}", path.display(), e))?;
    Ok((rgb.width(), rgb.height()))
}

async fn fetch_and_save(
    fetcher: &dyn ImageFetcher,
    url: &str,
    path: PathBuf,
    filter: ImageFilter,
) -> std::result::Result<(), String> {
    let bytes = fetcher.fetch(url).await.map_err(|e| e.to_string())?;
    tokio::task::spawn_blocking(move || save_image(&bytes, &path, filter))
        .await
        .map_err(|e| format!("Encoder task failed: {}", e))??;
    Ok(())
}

pub struct BatchDownloader {
    sources: Vec<Arc<dyn ImageSource>>,
    fetcher: Arc<dyn ImageFetcher>,
    options: DownloadOptions,
    cancel: CancellationToken,
}

impl BatchDownloader {
    pub fn new(
        sources: Vec<Arc<dyn ImageSource>>,
        fetcher: Arc<dyn ImageFetcher>,
        options: DownloadOptions,
    ) -> Self {
        Self {
            sources,
            fetcher,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Union of every source's results for `query`, in source order, first occurrence wins.
    pub async fn resolve_urls(&self, query: &str) -> IndexSet<String> {
        let mut urls = IndexSet::new();
        for source in &self.sources {
            match source.image_urls(query, self.options.per_query_limit).await {
                Lookup::Found(found) => {
                    debug!("{} returned {} urls for '{}'", source.name(), found.len(), query);
                    urls.extend(found);
                }
                Lookup::Empty => info!("{} found nothing for '{}'", source.name(), query),
                Lookup::Transient(reason) => {
                    warn!("{} search for '{}' failed: {}", source.name(), query, reason)
                }
            }
        }
        urls
    }

    /// Fetch every URL for one query into `category_dir`.
    pub async fn download_query(&self, category: &str, query: &str) -> Result<QuerySummary> {
        let category_dir = self.options.root.join(category);
        fs::create_dir_all(&category_dir).map_err(|source| CoreError::Write {
            path: category_dir.clone(),
            source,
        })?;

        let decorated = decorate_query(query, self.options.decoration.as_deref());
        let urls = self.resolve_urls(&decorated).await;

        if urls.is_empty() {
            warn!("No candidate images for '{}'", query);
            return Ok(QuerySummary {
                category: category.to_string(),
                query: query.to_string(),
                total: 0,
                successes: 0,
                results: Vec::new(),
            });
        }

        // Pre-filled so a panicked task still reports as a failure
        let mut results: Vec<DownloadResult> = urls
            .iter()
            .enumerate()
            .map(|(idx, url)| DownloadResult {
                url: url.clone(),
                path: image_path(&category_dir, query, idx + 1),
                success: false,
                error: Some("task did not complete".to_string()),
            })
            .collect();

        let progress_bar = if self.options.show_progress_bars {
            let pb = ProgressBar::new(results.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{bar:40.cyan/blue}] {msg} {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb.set_message(query.to_string());
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, result) in results.iter().enumerate() {
            let url = result.url.clone();
            let path = result.path.clone();
            let fetcher = self.fetcher.clone();
            let semaphore_clone = semaphore.clone();
            let token = self.cancel.clone();
            let filter = self.options.filter;

            tasks.spawn(async move {
                let outcome = match semaphore_clone.acquire_owned().await {
                    Ok(_permit) if token.is_cancelled() => Err("cancelled".to_string()),
                    Ok(_permit) => fetch_and_save(fetcher.as_ref(), &url, path, filter).await,
                    Err(_) => Err("worker pool closed".to_string()),
                };
                (idx, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    let result = &mut results[idx];
                    match outcome {
                        Ok(()) => {
                            result.success = true;
                            result.error = None;
                        }
                        Err(e) => {
                            warn!("Failed {}: {}", result.url, e);
                            result.error = Some(e);
                        }
                    }
                }
                Err(e) => warn!("Download task failed: {}", e),
            }
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }
        }

        let successes = results.iter().filter(|r| r.success).count();
        if let Some(pb) = progress_bar {
            pb.finish_with_message(format!("{}: {} saved", query, successes));
        }
        info!("'{}': saved {}/{} images", query, successes, results.len());

        Ok(QuerySummary {
            category: category.to_string(),
            query: query.to_string(),
            total: results.len(),
            successes,
            results,
        })
    }

    /// Run every query of every category, one query at a time.
    ///
    /// Summaries come back in category then query order. Only failing to
    /// create an output directory aborts the run.
    pub async fn run(&self, categories: &IndexMap<String, Vec<String>>) -> Result<Vec<QuerySummary>> {
        let mut summaries = Vec::new();
        for (category, queries) in categories {
            info!("Category '{}': {} queries", category, queries.len());
            for query in queries {
                if self.cancel.is_cancelled() {
                    info!("Download cancelled");
                    return Ok(summaries);
                }
                summaries.push(self.download_query(category, query).await?);
            }
        }
        Ok(summaries)
    }
}
