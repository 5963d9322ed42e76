use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use gemhunt_core::download::{BatchDownloader, DownloadOptions, ImageFilter};
use gemhunt_core::enrich::{
    EnrichOptions, LeafPolicy, LeafShape, TaxonomyWalker, WalkerConfig, WriteMode,
    execute_enrichment,
};
use gemhunt_core::metadata::generate_metadata;
use gemhunt_core::report::{ReportFormat, generate_download_report, generate_enrich_report};
use gemhunt_scanner::bing::BingImages;
use gemhunt_scanner::duckduckgo::DuckDuckGoImages;
use gemhunt_scanner::fetcher::HttpFetcher;
use gemhunt_scanner::google::GoogleImages;
use gemhunt_scanner::llm::{
    ChatClient, DEFAULT_GROQ_MODELS, DEFAULT_OPENROUTER_MODELS, GROQ_ENDPOINT,
    LlmKeywordSuggester, LlmLinkDiscoverer, OPENROUTER_ENDPOINT, suggest_sources,
};
use gemhunt_scanner::pubmed::PubMedCentral;
use gemhunt_scanner::serpapi::SerpApiImages;
use gemhunt_scanner::{ImageSource, LeafContext, LinkDiscoverer, Lookup};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const OPENROUTER_KEY_VAR: &str = "OPENROUTER_API_KEY";
pub const GROQ_KEY_VAR: &str = "GROQ_API_KEY";
pub const SERPAPI_KEY_VAR: &str = "SERPAPI_KEY";

pub const OPENROUTER_TEMPERATURE: f32 = 0.7;
pub const GROQ_TEMPERATURE: f32 = 0.5;

/// API keys for the hosted collaborators. Built once and handed to constructors.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub openrouter: Option<String>,
    pub groq: Option<String>,
    pub serpapi: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            openrouter: get(OPENROUTER_KEY_VAR),
            groq: get(GROQ_KEY_VAR),
            serpapi: get(SERPAPI_KEY_VAR),
        }
    }
}

// Helper functions for the handlers

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Split a comma-separated option into trimmed, non-empty items
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Load the download job description: `{"category": ["query", ...], ...}`
pub fn load_categories_from_file(path: &Path) -> Result<IndexMap<String, Vec<String>>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read categories file {}: {}", path.display(), e))?;

    let raw: IndexMap<String, Vec<String>> = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid categories file {}: {}", path.display(), e))?;

    let categories: IndexMap<String, Vec<String>> = raw
        .into_iter()
        .map(|(category, queries)| {
            let queries = queries
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect::<Vec<_>>();
            (category, queries)
        })
        .filter(|(_, queries)| !queries.is_empty())
        .collect();

    if categories.is_empty() {
        return Err(format!("No queries found in {}", path.display()));
    }

    Ok(categories)
}

/// Both `--domain` and `--subdomain`, or neither
pub fn target_path(domain: Option<&String>, subdomain: Option<&String>) -> Option<Vec<String>> {
    match (domain, subdomain) {
        (Some(domain), Some(subdomain)) => Some(vec![domain.clone(), subdomain.clone()]),
        _ => None,
    }
}

/// `raw_images/<domain>_<language>` and `metadata/<domain>_<language>.json`
pub fn default_metadata_paths(domain: &str, language: &str) -> (PathBuf, PathBuf) {
    let stem = format!("{}_{}", domain, language);
    (
        PathBuf::from("raw_images").join(&stem),
        PathBuf::from("metadata").join(format!("{}.json", stem)),
    )
}

pub fn walker_config_from_args(args: &ArgMatches) -> Result<WalkerConfig, String> {
    let defaults = WalkerConfig::default();
    let language = args
        .get_one::<String>("language")
        .cloned()
        .unwrap_or(defaults.language);

    let policy = match args.get_one::<String>("policy") {
        Some(name) => name.parse::<LeafPolicy>()?,
        None => defaults.policy,
    };
    let shape = match args.get_one::<String>("shape") {
        Some(name) => LeafShape::parse(name, &language)?,
        None => defaults.shape,
    };

    let delay = match args.get_one::<f64>("delay") {
        Some(secs) if *secs >= 0.0 && secs.is_finite() => Duration::from_secs_f64(*secs),
        Some(secs) => return Err(format!("Invalid delay: {}", secs)),
        None => defaults.delay,
    };

    Ok(WalkerConfig {
        policy,
        shape,
        language,
        links_per_query: args
            .get_one::<usize>("limit")
            .copied()
            .unwrap_or(defaults.links_per_query),
        delay,
    })
}

pub fn build_chat_client(
    service: &str,
    credentials: &Credentials,
    models: Option<&str>,
    temperature: Option<f32>,
    timeout_secs: u64,
) -> Result<ChatClient, String> {
    let (endpoint, key, var, default_models, default_temperature) = match service {
        "groq" => (
            GROQ_ENDPOINT,
            &credentials.groq,
            GROQ_KEY_VAR,
            DEFAULT_GROQ_MODELS,
            GROQ_TEMPERATURE,
        ),
        "openrouter" => (
            OPENROUTER_ENDPOINT,
            &credentials.openrouter,
            OPENROUTER_KEY_VAR,
            DEFAULT_OPENROUTER_MODELS,
            OPENROUTER_TEMPERATURE,
        ),
        other => return Err(format!("Unknown chat service '{}'", other)),
    };
    let key = key
        .as_deref()
        .ok_or_else(|| format!("{} is not set", var))?;

    let models = models
        .map(parse_list)
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| default_models.iter().map(|m| m.to_string()).collect());

    let chat = ChatClient::new(endpoint, key, models, timeout_secs).map_err(|e| e.to_string())?;
    Ok(chat.with_temperature(temperature.unwrap_or(default_temperature)))
}

pub fn build_link_discoverer(
    provider: &str,
    credentials: &Credentials,
    chat: &ChatClient,
    language: &str,
    links_per_query: usize,
    timeout_secs: u64,
) -> Result<Arc<dyn LinkDiscoverer>, String> {
    match provider {
        "serpapi" => {
            let key = credentials
                .serpapi
                .as_deref()
                .ok_or_else(|| format!("{} is not set", SERPAPI_KEY_VAR))?;
            let serpapi = SerpApiImages::new(key, timeout_secs)
                .map_err(|e| e.to_string())?
                .with_links_per_query(links_per_query);
            Ok(Arc::new(serpapi))
        }
        "llm" => Ok(Arc::new(LlmLinkDiscoverer::new(
            chat.clone(),
            language,
            links_per_query,
        ))),
        "google" => {
            let google = GoogleImages::new(timeout_secs)
                .map_err(|e| e.to_string())?
                .with_links_per_query(links_per_query);
            Ok(Arc::new(google))
        }
        other => Err(format!("Unknown link provider '{}'", other)),
    }
}

/// Build the named image sources. Sources that need a missing key are skipped with a warning.
pub fn build_image_sources(
    names: &[String],
    credentials: &Credentials,
    timeout_secs: u64,
) -> Result<Vec<Arc<dyn ImageSource>>, String> {
    let mut sources: Vec<Arc<dyn ImageSource>> = Vec::new();
    for name in names {
        match name.to_lowercase().as_str() {
            "duckduckgo" | "ddg" => sources.push(Arc::new(
                DuckDuckGoImages::new(timeout_secs).map_err(|e| e.to_string())?,
            )),
            "bing" => sources.push(Arc::new(
                BingImages::new(timeout_secs).map_err(|e| e.to_string())?,
            )),
            "google" => sources.push(Arc::new(
                GoogleImages::new(timeout_secs).map_err(|e| e.to_string())?,
            )),
            "pubmed" => sources.push(Arc::new(
                PubMedCentral::new(timeout_secs).map_err(|e| e.to_string())?,
            )),
            "serpapi" => match credentials.serpapi.as_deref() {
                Some(key) => sources.push(Arc::new(
                    SerpApiImages::new(key, timeout_secs).map_err(|e| e.to_string())?,
                )),
                None => warn!("{} is not set, skipping the serpapi source", SERPAPI_KEY_VAR),
            },
            other => return Err(format!("Unknown image source '{}'", other)),
        }
    }

    if sources.is_empty() {
        return Err("No usable image sources".to_string());
    }
    Ok(sources)
}

pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Cancel `token` on Ctrl-C so running jobs can wind down and still persist.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupted, finishing up...", "⚠".yellow().bold());
            token.cancel();
        }
    });
}

fn report_format(args: &ArgMatches) -> ReportFormat {
    args.get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text)
}

fn print_setting(name: &str, value: impl std::fmt::Display) {
    println!("{} {} {}", "→".blue(), format!("{}:", name).dimmed(), value);
}

pub async fn handle_enrich(args: &ArgMatches, quiet: bool) -> Result<()> {
    let taxonomy_path = args
        .get_one::<String>("taxonomy")
        .map(|p| expand_path(p))
        .context("--taxonomy is required")?;
    let output_path = args.get_one::<String>("output").map(|p| expand_path(p));
    let mode = args
        .get_one::<String>("mode")
        .map(|m| m.parse::<WriteMode>())
        .transpose()
        .map_err(|e| anyhow!(e))?
        .unwrap_or(WriteMode::InPlace);
    let target = target_path(args.get_one::<String>("domain"), args.get_one::<String>("subdomain"));
    let provider = args.get_one::<String>("provider").map_or("serpapi", String::as_str);
    let service = args.get_one::<String>("llm").map_or("openrouter", String::as_str);
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);

    let config = walker_config_from_args(args).map_err(|e| anyhow!(e))?;
    let credentials = Credentials::from_env();

    let chat = build_chat_client(
        service,
        &credentials,
        args.get_one::<String>("models").map(String::as_str),
        args.get_one::<f32>("temperature").copied(),
        timeout,
    )
    .map_err(|e| anyhow!(e))
    .context("Keyword suggestions need a chat completion service")?;
    let discoverer = build_link_discoverer(
        provider,
        &credentials,
        &chat,
        &config.language,
        config.links_per_query,
        timeout,
    )
    .map_err(|e| anyhow!(e))
    .context("Link discovery is not available")?;

    if !quiet {
        println!("\n{} Enriching {}", "✓".green().bold(), taxonomy_path.display().to_string().bright_white());
        print_setting("Language", &config.language);
        print_setting("Policy", format!("{:?}", config.policy));
        print_setting("Shape", format!("{:?}", config.shape));
        print_setting("Links from", provider);
        print_setting("Models", chat.models().join(", "));
        if let Some(temperature) = chat.temperature() {
            print_setting("Temperature", temperature.to_string());
        }
        if let Some(ref path) = target {
            print_setting("Target", path.join(" > "));
        }
        println!();
    }

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let walker = TaxonomyWalker::new(Arc::new(LlmKeywordSuggester::new(chat)), discoverer, config)
        .with_cancellation(token)
        .with_progress_callback(Arc::new(move |msg: String| {
            if !quiet {
                println!("{} {}", "→".blue(), msg);
            }
        }));

    let options = EnrichOptions {
        taxonomy_path,
        output_path,
        mode,
        target,
    };

    let (report, written) = execute_enrichment(options, &walker)
        .await
        .context("Enrichment failed")?;

    println!(
        "\n{} Enrichment complete: {}",
        "✓".green().bold(),
        written.display().to_string().bright_white()
    );
    let rendered = generate_enrich_report(&report, report_format(args))?;
    println!("{}", rendered);
    Ok(())
}

pub async fn handle_download(args: &ArgMatches, quiet: bool) -> Result<()> {
    let categories_path = args
        .get_one::<PathBuf>("categories")
        .context("--categories is required")?;
    let root = args
        .get_one::<String>("root")
        .map(|p| expand_path(p))
        .unwrap_or_else(|| PathBuf::from("raw_images"));
    let concurrency = args.get_one::<usize>("threads").copied().unwrap_or(10);
    let per_query_limit = args.get_one::<usize>("limit").copied().unwrap_or(100);
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(10);
    let source_names = args
        .get_one::<String>("sources")
        .map(|s| parse_list(s))
        .unwrap_or_default();

    let categories = load_categories_from_file(categories_path).map_err(|e| anyhow!(e))?;
    let credentials = Credentials::from_env();
    let sources = build_image_sources(&source_names, &credentials, timeout).map_err(|e| anyhow!(e))?;
    let fetcher = Arc::new(HttpFetcher::new(timeout)?);

    let options = DownloadOptions {
        root: root.clone(),
        per_query_limit,
        concurrency,
        decoration: args.get_one::<String>("decoration").cloned(),
        filter: ImageFilter {
            min_side: args.get_one::<u32>("min-side").copied(),
            max_aspect: args.get_one::<f32>("max-aspect").copied(),
        },
        show_progress_bars: !quiet,
    };

    if !quiet {
        let query_count: usize = categories.values().map(Vec::len).sum();
        println!(
            "\n{} Downloading {} queries in {} categories",
            "✓".green().bold(),
            query_count,
            categories.len()
        );
        print_setting("Output", root.display());
        print_setting(
            "Sources",
            sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>().join(", "),
        );
        print_setting("Workers", concurrency);
        println!();
    }

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let downloader = BatchDownloader::new(sources, fetcher, options).with_cancellation(token);
    let summaries = downloader
        .run(&categories)
        .await
        .context("Download failed")?;

    println!("\n{} Download complete!\n", "✓".green().bold());
    let rendered = generate_download_report(&summaries, report_format(args))?;
    println!("{}", rendered);
    Ok(())
}

pub fn handle_metadata(args: &ArgMatches) -> Result<()> {
    let domain = args.get_one::<String>("domain").context("--domain is required")?;
    let language = args.get_one::<String>("language").map_or("Arabic", String::as_str);
    let (default_folder, default_output) = default_metadata_paths(domain, language);

    let folder = args
        .get_one::<String>("folder")
        .map(|p| expand_path(p))
        .unwrap_or(default_folder);
    let output = args
        .get_one::<String>("output")
        .map(|p| expand_path(p))
        .unwrap_or(default_output);

    let count = generate_metadata(&folder, &output, domain, language)
        .context("Metadata generation failed")?;

    println!(
        "{} Wrote metadata for {} images to {}",
        "✓".green().bold(),
        count.to_string().cyan(),
        output.display().to_string().bright_white()
    );
    Ok(())
}

pub async fn handle_sources(args: &ArgMatches) -> Result<()> {
    let domain = args.get_one::<String>("domain").context("--domain is required")?;
    let subdomain = args
        .get_one::<String>("subdomain")
        .context("--subdomain is required")?;
    let language = args.get_one::<String>("language").map_or("Arabic", String::as_str);
    let service = args.get_one::<String>("llm").map_or("openrouter", String::as_str);
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(30);

    let chat = build_chat_client(
        service,
        &Credentials::from_env(),
        args.get_one::<String>("models").map(String::as_str),
        args.get_one::<f32>("temperature").copied(),
        timeout,
    )
    .map_err(|e| anyhow!(e))?;

    let context = LeafContext::new(vec![domain.clone(), subdomain.clone()], language);
    match suggest_sources(&chat, &context).await {
        Lookup::Found(records) => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Lookup::Empty => {
            println!("{} No sources suggested for {}", "→".yellow(), context.display_path());
        }
        Lookup::Transient(reason) => {
            eprintln!("{} Source lookup failed: {}", "✗".red().bold(), reason);
        }
    }
    Ok(())
}
