// Tests for report generation

use gemhunt_core::download::{DownloadResult, QuerySummary};
use gemhunt_core::enrich::{EnrichReport, LeafReport, LeafStatus};
use gemhunt_core::report::{ReportFormat, generate_download_report, generate_enrich_report};
use serde_json::Value;
use std::path::PathBuf;

fn sample_enrich_report() -> EnrichReport {
    EnrichReport {
        leaves: vec![
            LeafReport {
                path: vec!["Physics".to_string(), "Optics".to_string()],
                status: LeafStatus::Enriched { links: 4 },
            },
            LeafReport {
                path: vec!["Physics".to_string(), "Mechanics".to_string()],
                status: LeafStatus::NoKeywords,
            },
        ],
        cancelled: false,
    }
}

fn sample_summaries() -> Vec<QuerySummary> {
    vec![
        QuerySummary {
            category: "Animals".to_string(),
            query: "cats".to_string(),
            total: 2,
            successes: 1,
            results: vec![
                DownloadResult {
                    url: "http://u1".to_string(),
                    path: PathBuf::from("raw/Animals/img_cats_0001.jpg"),
                    success: true,
                    error: None,
                },
                DownloadResult {
                    url: "http://u2".to_string(),
                    path: PathBuf::from("raw/Animals/img_cats_0002.jpg"),
                    success: false,
                    error: Some("404".to_string()),
                },
            ],
        },
        QuerySummary {
            category: "Animals".to_string(),
            query: "dogs".to_string(),
            total: 0,
            successes: 0,
            results: Vec::new(),
        },
    ]
}

#[test]
fn test_report_format_from_str() {
    assert_eq!(ReportFormat::from_str("text"), Some(ReportFormat::Text));
    assert_eq!(ReportFormat::from_str("JSON"), Some(ReportFormat::Json));
    assert_eq!(ReportFormat::from_str("md"), Some(ReportFormat::Markdown));
    assert_eq!(ReportFormat::from_str("csv"), None);
}

#[test]
fn test_enrich_text_report_counts() {
    let text = generate_enrich_report(&sample_enrich_report(), ReportFormat::Text).unwrap();
    assert!(text.contains("Leaves visited: 2"));
    assert!(text.contains("Leaves enriched: 1"));
    assert!(text.contains("Links added: 4"));
    assert!(text.contains("Physics > Mechanics"));
}

#[test]
fn test_enrich_json_report_tags_status() {
    let json = generate_enrich_report(&sample_enrich_report(), ReportFormat::Json).unwrap();
    let value: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["leaves"][0]["status"], "enriched");
    assert_eq!(value["leaves"][0]["links"], 4);
    assert_eq!(value["leaves"][1]["status"], "no_keywords");
}

#[test]
fn test_download_text_report() {
    let text = generate_download_report(&sample_summaries(), ReportFormat::Text).unwrap();
    assert!(text.contains("Images attempted: 2"));
    assert!(text.contains("Images saved: 1"));
    assert!(text.contains("## Animals"));
    assert!(text.contains("no candidates"));
}

#[test]
fn test_download_markdown_report() {
    let md = generate_download_report(&sample_summaries(), ReportFormat::Markdown).unwrap();
    assert!(md.contains("| Animals | cats | 1 | 2 |"));
}
