//! Runtime configuration consumed by the diagnosis pipeline.

use crate::error::{DiagnosisError, Result};
use crate::labels::{LabelSet, Language};
use crate::preprocess::TensorLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default upper bound on images per batch.
pub const DEFAULT_MAX_IMAGES: usize = 10;

/// Which language the front end should render in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguagePreference {
    /// Follow the operating system locale.
    System,
    #[default]
    Spanish,
    English,
}

impl LanguagePreference {
    /// Resolves the preference, using `system_locale` for [`LanguagePreference::System`].
    pub fn resolve(self, system_locale: Option<&str>) -> Language {
        match self {
            LanguagePreference::Spanish => Language::Spanish,
            LanguagePreference::English => Language::English,
            LanguagePreference::System => system_locale
                .map(Language::from_locale)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosisConfig {
    /// Maximum images accepted in a single batch.
    pub max_images: usize,
    /// Labels in classifier output order.
    pub labels: LabelSet,
    /// Square edge length the model expects, in pixels.
    pub input_size: u32,
    pub layout: TensorLayout,
    /// Per-image processing limit in seconds; 0 disables the limit.
    pub image_timeout_secs: u64,
    /// Classify the images of a batch on the rayon pool.
    pub parallel: bool,
    /// Directory uploaded images are written to.
    pub upload_dir: PathBuf,
    pub model_path: PathBuf,
    pub language: LanguagePreference,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            labels: LabelSet::default(),
            input_size: 224,
            layout: TensorLayout::default(),
            image_timeout_secs: 30,
            parallel: false,
            upload_dir: PathBuf::from("uploads"),
            model_path: PathBuf::from("models/modelo_plagas_palta.onnx"),
            language: LanguagePreference::default(),
        }
    }
}

impl DiagnosisConfig {
    /// Reads and validates a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DiagnosisError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| DiagnosisError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(content)
            .map_err(|e| DiagnosisError::Config(format!("failed to parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_images == 0 {
            return Err(DiagnosisError::Config("max_images must be at least 1".into()));
        }
        if self.input_size == 0 {
            return Err(DiagnosisError::Config("input_size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn image_timeout(&self) -> Option<Duration> {
        (self.image_timeout_secs > 0).then(|| Duration::from_secs(self.image_timeout_secs))
    }
}
