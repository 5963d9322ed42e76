// Tests for image metadata generation

use gemhunt_core::error::CoreError;
use gemhunt_core::metadata::{ImageMetadata, collect_metadata, generate_metadata};
use std::path::Path;

fn save_jpeg(dir: &Path, name: &str, width: u32, height: u32) {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    img.save(dir.join(name)).unwrap();
}

#[test]
fn test_collect_metadata_reads_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    save_jpeg(dir.path(), "img_b_0001.jpg", 40, 20);
    save_jpeg(dir.path(), "img_a_0001.jpg", 16, 16);
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    let records = collect_metadata(dir.path(), "Physics", "Arabic").unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0],
        ImageMetadata {
            file_name: "img_a_0001.jpg".to_string(),
            width: 16,
            height: 16,
            language: "Arabic".to_string(),
            domain: "Physics".to_string(),
        }
    );
    assert_eq!((records[1].width, records[1].height), (40, 20));
}

#[test]
fn test_unreadable_jpeg_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    save_jpeg(dir.path(), "good.jpg", 8, 8);
    std::fs::write(dir.path().join("broken.jpg"), b"garbage").unwrap();

    let records = collect_metadata(dir.path(), "Physics", "Arabic").unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_name, "good.jpg");
}

#[test]
fn test_missing_folder_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = collect_metadata(&dir.path().join("nope"), "Physics", "Arabic");
    assert!(matches!(result, Err(CoreError::Read { .. })));
}

#[test]
fn test_generate_metadata_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let images = dir.path().join("raw_images");
    std::fs::create_dir_all(&images).unwrap();
    save_jpeg(&images, "img_x_0001.jpg", 12, 9);
    let output = dir.path().join("metadata").join("Physics_Arabic.json");

    let count = generate_metadata(&images, &output, "Physics", "Arabic").unwrap();

    assert_eq!(count, 1);
    let saved: Vec<ImageMetadata> =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(saved[0].file_name, "img_x_0001.jpg");
    assert_eq!(saved[0].width, 12);
}
