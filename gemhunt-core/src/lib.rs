pub mod download;
pub mod enrich;
pub mod error;
pub mod metadata;
pub mod report;
pub mod taxonomy;

use colored::Colorize;

pub use download::{BatchDownloader, DownloadOptions, DownloadResult, ImageFilter, QuerySummary};
pub use enrich::{
    EnrichOptions, EnrichReport, LeafPolicy, LeafShape, TaxonomyWalker, WalkerConfig, WriteMode,
    execute_enrichment,
};
pub use error::CoreError;
pub use taxonomy::TaxonomyNode;

pub fn print_banner() {
    let banner = r#"
   ____                 _                 _
  / ___| ___ _ __ ___ | |__  _   _ _ __ | |_
 | |  _ / _ \ '_ ` _ \| '_ \| | | | '_ \| __|
 | |_| |  __/ | | | | | | | | |_| | | | | |_
  \____|\___|_| |_| |_|_| |_|\__,_|_| |_|\__|
"#;
    println!("{}", banner.bright_cyan());
    println!(
        "  {} {}\n",
        "taxonomy enrichment and image harvesting".dimmed(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
