// Run reports for enrichment and download jobs

use crate::download::QuerySummary;
use crate::enrich::{EnrichReport, LeafStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

fn status_color(status: &LeafStatus) -> &'static str {
    match status {
        LeafStatus::Enriched { .. } => "\x1b[32m",        // Green
        LeafStatus::AlreadyEnriched => "\x1b[36m",        // Cyan
        LeafStatus::Cancelled => "\x1b[90m",              // Grey
        LeafStatus::KeywordsFailed { .. } => "\x1b[31m",  // Red
        LeafStatus::NoKeywords | LeafStatus::NoLinks => "\x1b[33m",
    }
}

pub fn generate_enrich_report(report: &EnrichReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(report),
        ReportFormat::Text => Ok(enrich_text(report)),
        ReportFormat::Markdown => Ok(enrich_markdown(report)),
    }
}

fn enrich_text(report: &EnrichReport) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Leaves visited: {}\n", report.leaves.len()));
    out.push_str(&format!("  Leaves enriched: {}\n", report.enriched_count()));
    out.push_str(&format!("  Links added: {}\n", report.links_added()));
    if report.cancelled {
        out.push_str("  Run was cancelled before finishing\n");
    }
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');

    for leaf in &report.leaves {
        out.push_str(&format!(
            "  {}{}\x1b[0m {}\n",
            status_color(&leaf.status),
            leaf.status,
            leaf.path.join(" > ")
        ));
    }
    out
}

fn enrich_markdown(report: &EnrichReport) -> String {
    let mut out = String::from("# Enrichment report\n\n");
    out.push_str(&format!(
        "{} of {} leaves enriched, {} links added.\n\n",
        report.enriched_count(),
        report.leaves.len(),
        report.links_added()
    ));
    out.push_str("| Path | Result |\n|------|--------|\n");
    for leaf in &report.leaves {
        out.push_str(&format!("| {} | {} |\n", leaf.path.join(" > "), leaf.status));
    }
    out
}

pub fn generate_download_report(summaries: &[QuerySummary], format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(summaries),
        ReportFormat::Text => Ok(download_text(summaries)),
        ReportFormat::Markdown => Ok(download_markdown(summaries)),
    }
}

fn download_text(summaries: &[QuerySummary]) -> String {
    let total: usize = summaries.iter().map(|s| s.total).sum();
    let saved: usize = summaries.iter().map(|s| s.successes).sum();

    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Queries: {}\n", summaries.len()));
    out.push_str(&format!("  Images attempted: {}\n", total));
    out.push_str(&format!("  Images saved: {}\n", saved));
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');

    let mut current_category: Option<&str> = None;
    for summary in summaries {
        if current_category != Some(summary.category.as_str()) {
            out.push_str(&format!("## {}\n", summary.category));
            current_category = Some(summary.category.as_str());
        }
        let line = if summary.no_candidates() {
            format!("  \x1b[33mno candidates\x1b[0m {}", summary.query)
        } else if summary.failures() == 0 {
            format!("  \x1b[32m{}/{}\x1b[0m {}", summary.successes, summary.total, summary.query)
        } else {
            format!("  \x1b[31m{}/{}\x1b[0m {}", summary.successes, summary.total, summary.query)
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn download_markdown(summaries: &[QuerySummary]) -> String {
    let mut out = String::from("# Download report\n\n| Category | Query | Saved | Attempted |\n|----------|-------|-------|-----------|\n");
    for summary in summaries {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            summary.category, summary.query, summary.successes, summary.total
        ));
    }
    out
}
