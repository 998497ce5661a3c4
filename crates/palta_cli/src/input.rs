//! Turns command-line paths into uploads.

use anyhow::Result;
use palta_core::ImageUpload;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expands directories into their image files; plain files are taken as-is
/// so that an unsupported file still reaches the runner and gets reported.
pub fn collect_paths(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if !path.exists() {
            anyhow::bail!("Path does not exist: {}", path.display());
        }
        if path.is_file() {
            out.push(path.clone());
            continue;
        }
        let walker = if recursive {
            WalkDir::new(path).sort_by_file_name().into_iter()
        } else {
            WalkDir::new(path).max_depth(1).sort_by_file_name().into_iter()
        };
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("walkdir error: {}", e);
                    continue;
                }
            };
            let p = entry.path();
            if p.is_file() && is_supported_image(p) {
                out.push(p.to_path_buf());
            }
        }
    }
    Ok(out)
}

/// Reads every file into memory, one upload per path. A file that cannot be
/// read stays in the batch as an unreadable upload so it is counted and
/// reported like any other failed image.
pub fn read_uploads(paths: &[PathBuf]) -> Vec<ImageUpload> {
    paths
        .iter()
        .map(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string());
            match fs::read(p) {
                Ok(bytes) => ImageUpload::new(name, bytes),
                Err(e) => {
                    tracing::warn!("cannot read {}: {e}", p.display());
                    ImageUpload::unreadable(name, e)
                }
            }
        })
        .collect()
}

fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp" | "bmp")
        }
        None => false,
    }
}
