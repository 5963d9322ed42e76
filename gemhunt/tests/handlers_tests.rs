use gemhunt::handlers::*;
use gemhunt_core::enrich::{LeafPolicy, LeafShape};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn enrich_matches(args: &[&str]) -> clap::ArgMatches {
    clap::Command::new("enrich")
        .arg(clap::arg!(-l --"language" <LANGUAGE>).default_value("Arabic"))
        .arg(clap::arg!(--"policy" <POLICY>).default_value("missing-gems"))
        .arg(clap::arg!(--"shape" <SHAPE>).default_value("tagged"))
        .arg(
            clap::arg!(--"limit" <NUM>)
                .value_parser(clap::value_parser!(usize))
                .default_value("5"),
        )
        .arg(
            clap::arg!(--"delay" <SECONDS>)
                .value_parser(clap::value_parser!(f64))
                .default_value("3"),
        )
        .get_matches_from(std::iter::once("enrich").chain(args.iter().copied()))
}

#[test]
fn test_parse_list() {
    assert_eq!(
        parse_list(" duckduckgo, bing ,,"),
        vec!["duckduckgo".to_string(), "bing".to_string()]
    );
    assert!(parse_list("").is_empty());
}

#[test]
fn test_expand_path_plain() {
    assert_eq!(expand_path("data/tax.json"), PathBuf::from("data/tax.json"));
}

#[test]
fn test_target_path_needs_both() {
    let domain = "Physics".to_string();
    let subdomain = "Optics".to_string();
    assert_eq!(
        target_path(Some(&domain), Some(&subdomain)),
        Some(vec!["Physics".to_string(), "Optics".to_string()])
    );
    assert_eq!(target_path(Some(&domain), None), None);
    assert_eq!(target_path(None, None), None);
}

#[test]
fn test_default_metadata_paths() {
    let (folder, output) = default_metadata_paths("Physics", "Arabic");
    assert_eq!(folder, PathBuf::from("raw_images/Physics_Arabic"));
    assert_eq!(output, PathBuf::from("metadata/Physics_Arabic.json"));
}

#[test]
fn test_credentials_ignore_blank_values() {
    let credentials = Credentials::from_lookup(|key| match key {
        "OPENROUTER_API_KEY" => Some("sk-test".to_string()),
        "SERPAPI_KEY" => Some("   ".to_string()),
        _ => None,
    });
    assert_eq!(credentials.openrouter.as_deref(), Some("sk-test"));
    assert_eq!(credentials.serpapi, None);
    assert_eq!(credentials.groq, None);
}

#[test]
fn test_chat_client_needs_key() {
    let result = build_chat_client("openrouter", &Credentials::default(), None, None, 10);
    let err = result.err().unwrap();
    assert!(err.contains("OPENROUTER_API_KEY"));
}

#[test]
fn test_chat_client_model_override() {
    let credentials = Credentials {
        groq: Some("gsk-test".to_string()),
        ..Credentials::default()
    };
    let chat = build_chat_client("groq", &credentials, Some("model-a, model-b"), None, 10).unwrap();
    assert_eq!(chat.models(), ["model-a".to_string(), "model-b".to_string()]);
}

#[test]
fn test_chat_client_temperature_defaults_per_service() {
    let credentials = Credentials {
        openrouter: Some("sk-test".to_string()),
        groq: Some("gsk-test".to_string()),
        ..Credentials::default()
    };
    let groq = build_chat_client("groq", &credentials, None, None, 10).unwrap();
    assert_eq!(groq.temperature(), Some(GROQ_TEMPERATURE));
    let openrouter = build_chat_client("openrouter", &credentials, None, None, 10).unwrap();
    assert_eq!(openrouter.temperature(), Some(OPENROUTER_TEMPERATURE));
    let custom = build_chat_client("groq", &credentials, None, Some(0.1), 10).unwrap();
    assert_eq!(custom.temperature(), Some(0.1));
}

#[test]
fn test_image_sources_include_pubmed() {
    let names = parse_list("pubmed,duckduckgo");
    let sources = build_image_sources(&names, &Credentials::default(), 5).unwrap();
    let names: Vec<&str> = sources.iter().map(|source| source.name()).collect();
    assert_eq!(names, vec!["pubmed", "duckduckgo"]);
}

#[test]
fn test_image_sources_skip_serpapi_without_key() {
    let names = parse_list("serpapi,bing");
    let sources = build_image_sources(&names, &Credentials::default(), 5).unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].name(), "bing");
}

#[test]
fn test_image_sources_none_usable() {
    let names = parse_list("serpapi");
    assert!(build_image_sources(&names, &Credentials::default(), 5).is_err());
}

#[test]
fn test_image_sources_unknown_name() {
    let names = parse_list("altavista");
    assert!(build_image_sources(&names, &Credentials::default(), 5).is_err());
}

#[test]
fn test_link_discoverer_serpapi_needs_key() {
    let credentials = Credentials {
        openrouter: Some("sk-test".to_string()),
        ..Credentials::default()
    };
    let chat = build_chat_client("openrouter", &credentials, None, None, 10).unwrap();
    assert!(build_link_discoverer("serpapi", &credentials, &chat, "Arabic", 5, 10).is_err());
    assert!(build_link_discoverer("llm", &credentials, &chat, "Arabic", 5, 10).is_ok());
}

#[test]
fn test_walker_config_defaults() {
    let config = walker_config_from_args(&enrich_matches(&[])).unwrap();
    assert_eq!(config.policy, LeafPolicy::MissingGems);
    assert_eq!(config.shape, LeafShape::Tagged);
    assert_eq!(config.language, "Arabic");
    assert_eq!(config.links_per_query, 5);
    assert_eq!(config.delay, Duration::from_secs(3));
}

#[test]
fn test_walker_config_by_language_uses_language() {
    let config = walker_config_from_args(&enrich_matches(&[
        "--shape",
        "by-language",
        "--language",
        "French",
        "--delay",
        "0.5",
        "--policy",
        "empty-list",
    ]))
    .unwrap();
    assert_eq!(config.shape, LeafShape::ByLanguage("French".to_string()));
    assert_eq!(config.policy, LeafPolicy::EmptyList);
    assert_eq!(config.delay, Duration::from_millis(500));
}

#[test]
fn test_walker_config_rejects_negative_delay() {
    let result = walker_config_from_args(&enrich_matches(&["--delay=-1"]));
    assert!(result.is_err());
}

#[test]
fn test_load_categories_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    write!(
        temp_file,
        r#"{{"Animals": ["cat photos", "  ", "red fox"], "Empty": [], "Plants": ["ferns"]}}"#
    )?;

    let categories = load_categories_from_file(temp_file.path())?;

    let names: Vec<&String> = categories.keys().collect();
    assert_eq!(names, vec!["Animals", "Plants"]);
    assert_eq!(categories["Animals"], vec!["cat photos", "red fox"]);
    Ok(())
}

#[test]
fn test_load_categories_rejects_bad_json() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "cat photos")?;

    let result = load_categories_from_file(temp_file.path());
    assert!(result.is_err());
    Ok(())
}

#[test]
fn test_load_categories_missing_file() {
    let result = load_categories_from_file(&PathBuf::from("/nonexistent/categories.json"));
    assert!(result.is_err());
}

#[test]
fn test_load_categories_all_empty() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    write!(temp_file, r#"{{"Animals": []}}"#)?;

    let result = load_categories_from_file(temp_file.path());
    assert!(result.is_err());
    Ok(())
}
