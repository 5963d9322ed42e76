use crate::error::{CoreError, Result};
use crate::taxonomy::{Blank, TaxonomyNode, load_or_empty, load_taxonomy, save_taxonomy};
use gemhunt_scanner::{KeywordSuggester, LeafContext, LinkDiscoverer, LinkRecord, Lookup};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which nodes count as "not yet enriched". One policy per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafPolicy {
    /// Empty objects, at any depth.
    EmptyMap,
    /// Empty lists, at any depth.
    EmptyList,
    /// Leaf-level nodes that hold no links in the configured shape.
    MissingGems,
}

impl FromStr for LeafPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empty-map" => Ok(LeafPolicy::EmptyMap),
            "empty-list" => Ok(LeafPolicy::EmptyList),
            "missing-gems" => Ok(LeafPolicy::MissingGems),
            other => Err(format!("unknown leaf policy '{}'", other)),
        }
    }
}

/// How discovered links are written into a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafShape {
    /// `leaf: [links]`
    Flat,
    /// `leaf: {"image_gems": [links]}`
    Tagged,
    /// `leaf: {language: {"image_gems": [links]}}`
    ByLanguage(String),
}

impl LeafShape {
    pub fn parse(name: &str, language: &str) -> std::result::Result<Self, String> {
        match name.to_lowercase().as_str() {
            "flat" => Ok(LeafShape::Flat),
            "tagged" => Ok(LeafShape::Tagged),
            "by-language" => Ok(LeafShape::ByLanguage(language.to_string())),
            other => Err(format!("unknown leaf shape '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Enrich the loaded taxonomy itself and write all of it back.
    InPlace,
    /// Write only the enriched leaves, at their original paths, into a fresh tree.
    Separate,
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-place" => Ok(WriteMode::InPlace),
            "separate" => Ok(WriteMode::Separate),
            other => Err(format!("unknown write mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub policy: LeafPolicy,
    pub shape: LeafShape,
    pub language: String,
    /// Cap on records taken from a single keyword lookup.
    pub links_per_query: usize,
    /// Pause between two leaf enrichments.
    pub delay: Duration,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            policy: LeafPolicy::MissingGems,
            shape: LeafShape::Tagged,
            language: "Arabic".to_string(),
            links_per_query: 5,
            delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LeafStatus {
    Enriched { links: usize },
    AlreadyEnriched,
    NoKeywords,
    KeywordsFailed { reason: String },
    NoLinks,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeafReport {
    pub path: Vec<String>,
    #[serde(flatten)]
    pub status: LeafStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichReport {
    pub leaves: Vec<LeafReport>,
    pub cancelled: bool,
}

impl EnrichReport {
    pub fn enriched_count(&self) -> usize {
        self.leaves
            .iter()
            .filter(|leaf| matches!(leaf.status, LeafStatus::Enriched { .. }))
            .count()
    }

    pub fn links_added(&self) -> usize {
        self.leaves
            .iter()
            .map(|leaf| match leaf.status {
                LeafStatus::Enriched { links } => links,
                _ => 0,
            })
            .sum()
    }
}

/// Callback for human-readable status lines
pub type EnrichProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Depth-first taxonomy enrichment.
///
/// Candidate leaves are found first, then enriched one at a time in
/// document order. Runs are strictly sequential to stay inside provider
/// rate limits.
pub struct TaxonomyWalker {
    suggester: Arc<dyn KeywordSuggester>,
    discoverer: Arc<dyn LinkDiscoverer>,
    config: WalkerConfig,
    cancel: CancellationToken,
    progress_callback: Option<EnrichProgressCallback>,
}

impl TaxonomyWalker {
    pub fn new(
        suggester: Arc<dyn KeywordSuggester>,
        discoverer: Arc<dyn LinkDiscoverer>,
        config: WalkerConfig,
    ) -> Self {
        Self {
            suggester,
            discoverer,
            config,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress_callback(mut self, callback: EnrichProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    fn report_progress(&self, msg: String) {
        if let Some(ref callback) = self.progress_callback {
            callback(msg);
        }
    }

    /// Whether `node` already holds links in the configured shape.
    pub fn is_enriched(&self, node: &TaxonomyNode) -> bool {
        match (&self.config.shape, node) {
            (_, TaxonomyNode::FlatLinks(links)) => !links.is_empty(),
            (LeafShape::ByLanguage(language), _) => node
                .children()
                .and_then(|children| children.get(language))
                .is_some_and(TaxonomyNode::has_links),
            (_, TaxonomyNode::TaggedLinks { image_gems, .. }) => !image_gems.is_empty(),
            _ => false,
        }
    }

    /// A node with no taxonomy levels below it.
    ///
    /// Object, blank-object and link-bearing children are levels. Under the
    /// by-language shape, link-bearing children are leaf content instead.
    fn is_leaf_like(&self, node: &TaxonomyNode) -> bool {
        let children = match node {
            TaxonomyNode::Branch(children) => children,
            TaxonomyNode::TaggedLinks { siblings, .. } => siblings,
            _ => return true,
        };
        if self.config.shape == LeafShape::Flat {
            // Replacing a populated object with a list would drop its keys
            return children.is_empty();
        }
        let by_language = match &self.config.shape {
            LeafShape::ByLanguage(language) => Some(language.as_str()),
            _ => None,
        };
        children.iter().all(|(key, child)| match child {
            _ if by_language == Some(key.as_str()) => true,
            TaxonomyNode::Branch(_) | TaxonomyNode::Unenriched(Blank::EmptyMap) => false,
            // Link-bearing children are per-language entries under the
            // by-language shape and enriched leaves otherwise
            TaxonomyNode::TaggedLinks { .. } | TaxonomyNode::FlatLinks(_) => by_language.is_some(),
            _ => true,
        })
    }

    pub fn is_candidate(&self, node: &TaxonomyNode) -> bool {
        match self.config.policy {
            LeafPolicy::EmptyMap => matches!(node, TaxonomyNode::Unenriched(Blank::EmptyMap)),
            LeafPolicy::EmptyList => matches!(node, TaxonomyNode::Unenriched(Blank::EmptyList)),
            LeafPolicy::MissingGems => {
                !matches!(node, TaxonomyNode::Opaque(_))
                    && self.is_leaf_like(node)
                    && !self.is_enriched(node)
            }
        }
    }

    fn should_descend(&self, node: &TaxonomyNode) -> bool {
        node.children().is_some()
            && (self.config.policy != LeafPolicy::MissingGems || !self.is_leaf_like(node))
    }

    /// Paths of every candidate leaf below `root`, in depth-first order.
    /// The root itself is never a candidate.
    pub fn candidate_paths(&self, root: &TaxonomyNode) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_candidates(root, &mut path, &mut out);
        out
    }

    fn collect_candidates(
        &self,
        node: &TaxonomyNode,
        path: &mut Vec<String>,
        out: &mut Vec<Vec<String>>,
    ) {
        let Some(children) = node.children() else {
            return;
        };
        for (key, child) in children {
            path.push(key.clone());
            if self.is_candidate(child) {
                out.push(path.clone());
            } else if self.should_descend(child) {
                self.collect_candidates(child, path, out);
            }
            path.pop();
        }
    }

    /// Store `links` into `node` according to the configured shape.
    pub fn write_links(&self, node: &mut TaxonomyNode, links: Vec<LinkRecord>) {
        match &self.config.shape {
            LeafShape::Flat => *node = TaxonomyNode::FlatLinks(links),
            LeafShape::Tagged => write_tagged(node, links),
            LeafShape::ByLanguage(language) => {
                if node.children().is_none() {
                    *node = TaxonomyNode::empty_branch();
                }
                if let Some(children) = node.children_mut() {
                    let slot = children.entry(language.clone()).or_default();
                    write_tagged(slot, links);
                }
            }
        }
    }

    /// Ask the collaborators for links for one leaf.
    async fn discover_leaf(&self, path: &[String]) -> std::result::Result<Vec<LinkRecord>, LeafStatus> {
        let context = LeafContext::new(path.to_vec(), self.config.language.clone());

        let keywords = match self.suggester.suggest(&context).await {
            Lookup::Found(keywords) => keywords,
            Lookup::Empty => return Err(LeafStatus::NoKeywords),
            Lookup::Transient(reason) => return Err(LeafStatus::KeywordsFailed { reason }),
        };

        let mut links = Vec::new();
        for keyword in &keywords {
            debug!("Searching for: {}", keyword);
            match self.discoverer.discover(keyword).await {
                Lookup::Found(mut records) => {
                    records.truncate(self.config.links_per_query);
                    links.extend(records);
                }
                Lookup::Empty => debug!("No links for keyword '{}'", keyword),
                Lookup::Transient(reason) => warn!("Link lookup for '{}' failed: {}", keyword, reason),
            }
        }

        if links.is_empty() {
            Err(LeafStatus::NoLinks)
        } else {
            Ok(links)
        }
    }

    /// Politeness pause; returns early on cancellation.
    async fn pause(&self) {
        if self.config.delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Enrich every candidate leaf of `source`, writing results into `target`.
    async fn enrich_paths(
        &self,
        source: &TaxonomyNode,
        target: &mut TaxonomyNode,
    ) -> EnrichReport {
        let paths = self.candidate_paths(source);
        info!("Found {} leaves to enrich", paths.len());

        let mut report = EnrichReport::default();
        let total = paths.len();

        for (idx, path) in paths.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                report.leaves.push(LeafReport {
                    path,
                    status: LeafStatus::Cancelled,
                });
                continue;
            }

            let shown = path.join(" > ");
            self.report_progress(format!("Enriching {}/{}: {}", idx + 1, total, shown));

            let status = match self.discover_leaf(&path).await {
                Ok(links) => {
                    let count = links.len();
                    match target.entry_path(&path) {
                        Ok(node) => {
                            self.write_links(node, links);
                            info!("Added {} links to {}", count, shown);
                            LeafStatus::Enriched { links: count }
                        }
                        Err(e) => {
                            warn!("Could not store links for {}: {}", shown, e);
                            LeafStatus::NoLinks
                        }
                    }
                }
                Err(status) => {
                    warn!("Leaving {} unenriched: {:?}", shown, status);
                    status
                }
            };
            report.leaves.push(LeafReport { path, status });

            if idx + 1 < total {
                self.pause().await;
            }
        }

        report
    }

    /// Enrich `root` itself.
    pub async fn enrich_in_place(&self, root: &mut TaxonomyNode) -> EnrichReport {
        let source = root.clone();
        self.enrich_paths(&source, root).await
    }

    /// Enrich into a new tree holding only the leaves that got links.
    pub async fn enrich_into(&self, root: &TaxonomyNode) -> (TaxonomyNode, EnrichReport) {
        let mut out = TaxonomyNode::empty_branch();
        let report = self.enrich_paths(root, &mut out).await;
        (out, report)
    }

    /// Run one enrichment pass in the given write mode and return the tree to persist.
    pub async fn enrich(&self, root: TaxonomyNode, mode: WriteMode) -> (TaxonomyNode, EnrichReport) {
        match mode {
            WriteMode::InPlace => {
                let mut root = root;
                let report = self.enrich_in_place(&mut root).await;
                (root, report)
            }
            WriteMode::Separate => self.enrich_into(&root).await,
        }
    }

    /// Enrich the single leaf at `path`, creating it if needed.
    pub async fn enrich_target(&self, root: &mut TaxonomyNode, path: &[String]) -> Result<EnrichReport> {
        let mut report = EnrichReport::default();
        let shown = path.join(" > ");

        if root.get_path(path).is_some_and(|node| self.is_enriched(node)) {
            info!("Already enriched: {}", shown);
            report.leaves.push(LeafReport {
                path: path.to_vec(),
                status: LeafStatus::AlreadyEnriched,
            });
            return Ok(report);
        }

        self.report_progress(format!("Enriching {}", shown));
        let status = match self.discover_leaf(path).await {
            Ok(links) => {
                let count = links.len();
                let node = root.entry_path(path)?;
                self.write_links(node, links);
                LeafStatus::Enriched { links: count }
            }
            Err(status) => status,
        };
        report.leaves.push(LeafReport {
            path: path.to_vec(),
            status,
        });
        Ok(report)
    }
}

fn write_tagged(node: &mut TaxonomyNode, links: Vec<LinkRecord>) {
    let (siblings, gems_at) = match std::mem::take(node) {
        TaxonomyNode::Branch(children) => {
            let end = children.len();
            (children, end)
        }
        TaxonomyNode::TaggedLinks { siblings, gems_at, .. } => (siblings, gems_at),
        _ => (IndexMap::new(), 0),
    };
    *node = TaxonomyNode::TaggedLinks {
        image_gems: links,
        siblings,
        gems_at,
    };
}

impl fmt::Display for LeafStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafStatus::Enriched { links } => write!(f, "added {} links", links),
            LeafStatus::AlreadyEnriched => write!(f, "already enriched"),
            LeafStatus::NoKeywords => write!(f, "no keywords"),
            LeafStatus::KeywordsFailed { reason } => write!(f, "keyword lookup failed: {}", reason),
            LeafStatus::NoLinks => write!(f, "no links found"),
            LeafStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Options for one enrichment job
pub struct EnrichOptions {
    pub taxonomy_path: PathBuf,
    /// Where to write; defaults to `taxonomy_path` for in-place runs.
    pub output_path: Option<PathBuf>,
    pub mode: WriteMode,
    /// Only enrich this path (domain, subdomain), creating it if missing.
    pub target: Option<Vec<String>>,
}

/// Load, enrich and persist a taxonomy file. Returns the report and the path written.
///
/// The file is written exactly once, after the walk. A crash part-way
/// through loses that run's work.
pub async fn execute_enrichment(
    options: EnrichOptions,
    walker: &TaxonomyWalker,
) -> Result<(EnrichReport, PathBuf)> {
    let EnrichOptions {
        taxonomy_path,
        output_path,
        mode,
        target,
    } = options;

    let (tree, report, destination) = match target {
        Some(path) => {
            // Single-subject runs start from an empty taxonomy when the file is new
            let mut root = load_or_empty(&taxonomy_path)?;
            let report = walker.enrich_target(&mut root, &path).await?;
            (root, report, output_path.unwrap_or(taxonomy_path))
        }
        None => {
            let destination = match (mode, output_path) {
                (_, Some(path)) => path,
                (WriteMode::InPlace, None) => taxonomy_path.clone(),
                (WriteMode::Separate, None) => {
                    return Err(CoreError::InvalidOption(
                        "separate write mode needs an output path".to_string(),
                    ));
                }
            };
            let root = load_taxonomy(&taxonomy_path)?;
            let (tree, report) = walker.enrich(root, mode).await;
            (tree, report, destination)
        }
    };

    info!("Writing {}", destination.display());
    save_taxonomy(&destination, &tree)?;

    Ok((report, destination))
}
