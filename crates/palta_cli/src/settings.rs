//! Locating and loading the configuration file.

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use palta_core::DiagnosisConfig;
use std::path::{Path, PathBuf};

/// `config.toml` in the platform configuration directory.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("cl", "palta", "palta-vision").map(|d| d.config_dir().join("config.toml"))
}

/// An explicit path must exist. Without one, the default location is used
/// when present, otherwise built-in defaults.
pub fn load(explicit: Option<&Path>) -> Result<DiagnosisConfig> {
    load_from(explicit, default_config_path().as_deref())
}

fn load_from(explicit: Option<&Path>, fallback: Option<&Path>) -> Result<DiagnosisConfig> {
    if let Some(path) = explicit {
        return DiagnosisConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    match fallback {
        Some(path) if path.exists() => {
            tracing::debug!("using config {}", path.display());
            DiagnosisConfig::from_toml_file(path)
                .with_context(|| format!("loading config {}", path.display()))
        }
        _ => Ok(DiagnosisConfig::default()),
    }
}
