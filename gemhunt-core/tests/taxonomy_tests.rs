// Tests for taxonomy persistence

use gemhunt_core::error::CoreError;
use gemhunt_core::taxonomy::{
    TaxonomyNode, load_or_empty, load_taxonomy, parse_taxonomy, save_taxonomy,
};
use gemhunt_scanner::LinkRecord;
use serde_json::{Value, json};
use std::path::Path;

#[test]
fn test_round_trip_preserves_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taxonomy.json");
    let text = r#"{"Zoology": {"Birds": {}, "Apes": []}, "Art": {"Sculpture": null}}"#;
    std::fs::write(&path, text).unwrap();

    let node = load_taxonomy(&path).unwrap();
    save_taxonomy(&path, &node).unwrap();
    let reloaded = load_taxonomy(&path).unwrap();

    assert_eq!(node, reloaded);
    let value = Value::from(reloaded);
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["Zoology", "Art"]);
    let inner: Vec<&String> = value["Zoology"].as_object().unwrap().keys().collect();
    assert_eq!(inner, vec!["Birds", "Apes"]);
}

#[test]
fn test_round_trip_keeps_extra_record_fields() {
    let original = json!({
        "Physics": {"Optics": {"image_gems": [
            {"url": "https://a.com/x.jpg", "desc": "d", "reason": "clear labels"}
        ]}}
    });
    let node = TaxonomyNode::from(original.clone());
    assert_eq!(Value::from(node), original);
}

#[test]
fn test_missing_desc_reads_as_empty_and_stays_absent() {
    let original = json!({"A": [{"url": "https://a.com/x.jpg"}]});
    let node = TaxonomyNode::from(original.clone());
    match node.get_path(&["A".to_string()]) {
        Some(TaxonomyNode::FlatLinks(links)) => assert_eq!(links[0].desc, ""),
        other => panic!("expected flat links, got {:?}", other),
    }
    assert_eq!(Value::from(node), original);
}

#[test]
fn test_image_gems_keeps_its_position() {
    let text = r#"{
  "Optics": {
    "image_gems": [
      {
        "url": "https://a.com/x.jpg",
        "desc": "d"
      }
    ],
    "notes": "x"
  }
}"#;
    let node = parse_taxonomy(text, Path::new("t.json")).unwrap();
    assert_eq!(node.to_pretty_json().unwrap(), text);
}

#[test]
fn test_record_key_order_is_kept() {
    let text = r#"{
  "Optics": [
    {
      "reason": "labelled",
      "desc": "d",
      "url": "https://a.com/x.jpg"
    }
  ]
}"#;
    let node = parse_taxonomy(text, Path::new("t.json")).unwrap();
    assert_eq!(node.to_pretty_json().unwrap(), text);
}

#[test]
fn test_new_records_use_canonical_order() {
    let mut record = LinkRecord::new("https://a.com/x.jpg", "d");
    record.extra.insert("reason".to_string(), json!("labelled"));
    let keys: Vec<String> = match record.into_value() {
        Value::Object(map) => map.keys().cloned().collect(),
        other => panic!("expected object, got {:?}", other),
    };
    assert_eq!(keys, vec!["url", "desc", "reason"]);
}

#[test]
fn test_non_ascii_is_written_unescaped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ar.json");
    let node = TaxonomyNode::from(json!({"فيزياء": {"بصريات": {}}}));

    save_taxonomy(&path, &node).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("فيزياء"));
    assert!(!text.contains("\\u"));
}

#[test]
fn test_save_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.json");
    save_taxonomy(&path, &TaxonomyNode::empty_branch()).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
}

#[test]
fn test_save_replaces_existing_file_with_full_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taxonomy.json");
    std::fs::write(&path, r#"{"Old": {}}"#).unwrap();
    let node = TaxonomyNode::from(json!({"Physics": {"Optics": {}}}));

    save_taxonomy(&path, &node).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, node.to_pretty_json().unwrap());
    assert_eq!(load_taxonomy(&path).unwrap(), node);
}

#[test]
fn test_load_or_empty_on_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let node = load_or_empty(&dir.path().join("absent.json")).unwrap();
    assert_eq!(node, TaxonomyNode::empty_branch());
}

#[test]
fn test_invalid_json_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(load_taxonomy(&path), Err(CoreError::Json { .. })));
}
