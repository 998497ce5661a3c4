use crate::classifier::ImageResult;
use crate::consensus::ConsensusResult;
use anyhow::Result;
use std::path::Path;

/// Export the per-image votes of a batch to CSV with headers:
/// source,label,confidence,agrees
pub fn export_csv(
    results: &[ImageResult],
    consensus: &ConsensusResult,
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["source", "label", "confidence", "agrees"])?;

    for r in results {
        let confidence = format!("{:.2}", r.confidence);
        let agrees = r.label == consensus.label;
        wtr.write_record([
            r.source.as_str(),
            r.label.as_str(),
            confidence.as_str(),
            if agrees { "true" } else { "false" },
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
