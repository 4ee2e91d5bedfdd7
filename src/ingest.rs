//! File ingestion.
//!
//! Turns paths given on the command line into [`IngestedFile`]s the
//! registry can accept. Directories are walked recursively; hidden entries
//! are skipped and only extensions with a compiled-in decoder are kept.

use crate::imaging::supported_input_extensions;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("not a supported image: {0}")]
    Unsupported(PathBuf),
}

/// A file handed to the registry: name, declared media type, raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl IngestedFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving its media type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let media_type = media_type_for_path(path)
            .ok_or_else(|| IngestError::Unsupported(path.to_path_buf()))?;
        let bytes = fs::read(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, media_type, bytes))
    }
}

/// Media type for a file extension, case-insensitive.
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn media_type_for_path(path: &Path) -> Option<&'static str> {
    media_type_for_extension(&path.extension()?.to_string_lossy())
}

fn is_supported_image(path: &Path) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    supported_input_extensions().contains(&ext.as_str())
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Expand files and directories into a sorted list of decodable images.
///
/// Files named explicitly are kept only if their extension is supported;
/// an unsupported explicit file is an error rather than a silent skip.
pub fn collect_image_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input).into_iter().filter_entry(|e| !is_hidden(e)) {
                let entry = entry?;
                if entry.file_type().is_file() && is_supported_image(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            paths.extend(found);
        } else if !input.exists() {
            return Err(IngestError::Io {
                path: input.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        } else if is_supported_image(input) {
            paths.push(input.clone());
        } else {
            return Err(IngestError::Unsupported(input.clone()));
        }
    }
    Ok(paths)
}
