//! Avocado crop diagnosis: per-image classification aggregated by majority
//! vote into one diagnosis with care guidance.

pub mod classifier;
pub mod config;
pub mod consensus;
pub mod error;
pub mod knowledge;
pub mod labels;
#[cfg(feature = "ort")]
pub mod onnx;
pub mod preprocess;
pub mod report;
pub mod runner;
pub mod storage;
pub mod users;

pub use classifier::{Classifier, ClassifierService, ImageResult};
pub use config::{DiagnosisConfig, LanguagePreference};
pub use consensus::{
    ConfidenceTier, ConsensusResult, LabelBreakdown, compute_consensus, compute_consensus_in,
};
pub use error::{DiagnosisError, ImageError, UserError};
pub use knowledge::{CareGuide, Category, care_guide};
pub use labels::{LabelSet, Language};
pub use report::export_csv;
pub use runner::{BatchOutcome, BatchRunner, ImageFailure, ImageUpload};
pub use storage::{FsImageStore, ImageStore, MemoryImageStore};
pub use users::{Actor, Role, User, UserAdmin, UserForm, UserStore, is_admin};

/// A batch's consensus plus the care guide for the winning label.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Diagnosis {
    pub consensus: ConsensusResult,
    pub guide: CareGuide,
    pub results: Vec<ImageResult>,
    /// File names of uploads that were skipped.
    pub skipped: Vec<String>,
}

/// Runs a batch end to end: inference, consensus, care-guide lookup.
pub fn diagnose(
    runner: &BatchRunner,
    uploads: &[ImageUpload],
    lang: Language,
) -> Result<Diagnosis, DiagnosisError> {
    let outcome = runner.run(uploads)?;
    let consensus = compute_consensus_in(&outcome.results, lang)?;
    tracing::info!("{}", consensus.interpretation);
    let guide = care_guide(&consensus.label, lang);
    Ok(Diagnosis {
        consensus,
        guide,
        results: outcome.results,
        skipped: outcome
            .failures
            .into_iter()
            .map(|f| f.filename)
            .collect(),
    })
}
