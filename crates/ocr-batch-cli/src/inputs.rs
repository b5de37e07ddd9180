//! Collects input documents from the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use ocr_batch::batch::UploadedFile;
use ocr_batch::processor::{detect_mime_type, DocumentFormat};

/// Expands files and directories into supported documents, sorted per
/// directory. Explicit files with an unsupported extension are skipped too.
pub fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let max_depth = if recursive { usize::MAX } else { 1 };
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .max_depth(max_depth)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        log::warn!("Skipping unreadable entry: {}", e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_supported(path))
                .collect();
            found.sort();
            files.extend(found);
        } else if input.is_file() && is_supported(input) {
            files.push(input.clone());
        } else {
            log::warn!("Ignoring input {}", input.display());
        }
    }

    files
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(DocumentFormat::from_extension)
        .is_some()
}

/// Reads a collected file into an upload, declaring its type from the
/// extension.
pub fn to_upload(path: &Path) -> Result<UploadedFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("file name is not valid UTF-8: {}", path.display()))?;
    let declared_type =
        detect_mime_type(path).unwrap_or_else(|| "application/octet-stream".to_string());
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;

    Ok(UploadedFile::new(name, bytes, declared_type))
}
