// Per-image metadata for a folder of downloaded images

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub language: String,
    pub domain: String,
}

fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
}

/// Read the dimensions of every `.jpg` in `folder`, sorted by file name.
///
/// Files whose header cannot be read are skipped with a warning.
pub fn collect_metadata(folder: &Path, domain: &str, language: &str) -> Result<Vec<ImageMetadata>> {
    let entries = fs::read_dir(folder).map_err(|source| CoreError::Read {
        path: folder.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_jpeg(&path) {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        match image::image_dimensions(&path) {
            Ok((width, height)) => records.push(ImageMetadata {
                file_name,
                width,
                height,
                language: language.to_string(),
                domain: domain.to_string(),
            }),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(records)
}

pub fn write_metadata(path: &Path, records: &[ImageMetadata]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| CoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(records).map_err(|source| CoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| CoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect and write metadata in one go. Returns the number of records written.
pub fn generate_metadata(folder: &Path, output: &Path, domain: &str, language: &str) -> Result<usize> {
    let records = collect_metadata(folder, domain, language)?;
    write_metadata(output, &records)?;
    Ok(records.len())
}
