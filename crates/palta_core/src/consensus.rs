//! Majority-vote consensus over the per-image results of one batch.
//!
//! The reported confidence is a discretized trust signal derived from how
//! many images agree, not an average of softmax scores. The mean model
//! confidence of the agreeing images is reported separately as
//! [`ConsensusResult::raw_probability`].

use crate::classifier::ImageResult;
use crate::error::{DiagnosisError, Result};
use crate::labels::Language;
use serde::{Deserialize, Serialize};

/// Agreement band of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    /// 80% or more of the images agree.
    VeryHigh,
    /// At least 70% and below 80%.
    High,
    /// Above 50% and below 70%.
    Moderate,
    /// Exactly half.
    LowTie,
    /// Below half; the winner is only a plurality.
    LowNoMajority,
}

impl ConfidenceTier {
    pub fn from_majority(majority_percentage: f64) -> Self {
        if majority_percentage >= 80.0 {
            ConfidenceTier::VeryHigh
        } else if majority_percentage >= 70.0 {
            ConfidenceTier::High
        } else if majority_percentage > 50.0 {
            ConfidenceTier::Moderate
        } else if majority_percentage == 50.0 {
            ConfidenceTier::LowTie
        } else {
            ConfidenceTier::LowNoMajority
        }
    }

    /// Displayed confidence for the tier, in percent.
    pub fn confidence_final(self) -> f64 {
        match self {
            ConfidenceTier::VeryHigh => 95.0,
            ConfidenceTier::High => 85.0,
            ConfidenceTier::Moderate => 75.0,
            ConfidenceTier::LowTie => 50.0,
            ConfidenceTier::LowNoMajority => 40.0,
        }
    }

    pub fn name(self, lang: Language) -> &'static str {
        match self {
            ConfidenceTier::VeryHigh => lang.tr("MUY ALTA", "VERY HIGH"),
            ConfidenceTier::High => lang.tr("ALTA", "HIGH"),
            ConfidenceTier::Moderate => lang.tr("MODERADA", "MODERATE"),
            ConfidenceTier::LowTie => lang.tr("BAJA - Empate", "LOW - Tie"),
            ConfidenceTier::LowNoMajority => {
                lang.tr("BAJA - No hay mayoría", "LOW - No majority")
            }
        }
    }
}

/// Votes received by one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelBreakdown {
    pub label: String,
    pub count: usize,
    /// Share of the batch, in percent.
    pub percentage: f64,
    pub average_confidence: f64,
    pub sources: Vec<String>,
}

/// Aggregated diagnosis for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub label: String,
    pub tier: ConfidenceTier,
    pub confidence_final: f64,
    /// Mean confidence of the images that voted for `label`.
    pub raw_probability: f64,
    pub majority_percentage: f64,
    pub total_images: usize,
    pub votes: usize,
    pub has_contradiction: bool,
    /// One entry per distinct label, in order of first appearance.
    pub breakdown: Vec<LabelBreakdown>,
    pub interpretation: String,
}

impl ConsensusResult {
    pub fn breakdown_for(&self, label: &str) -> Option<&LabelBreakdown> {
        self.breakdown.iter().find(|b| b.label == label)
    }
}

/// [`compute_consensus_in`] with Spanish interpretation text.
pub fn compute_consensus(results: &[ImageResult]) -> Result<ConsensusResult> {
    compute_consensus_in(results, Language::default())
}

/// Majority vote over `results`. Ties go to the label seen first in input
/// order, so the order of `results` is part of the input.
pub fn compute_consensus_in(results: &[ImageResult], lang: Language) -> Result<ConsensusResult> {
    if results.is_empty() {
        return Err(DiagnosisError::EmptyResultSet { submitted: 0 });
    }
    let total = results.len();

    let mut groups: Vec<Group<'_>> = Vec::new();
    for r in results {
        match groups.iter_mut().find(|g| g.label == r.label) {
            Some(g) => g.members.push(r),
            None => groups.push(Group {
                label: &r.label,
                members: vec![r],
            }),
        }
    }

    // Strictly greater keeps the earliest label on equal counts.
    let mut winner = &groups[0];
    for g in &groups[1..] {
        if g.members.len() > winner.members.len() {
            winner = g;
        }
    }

    let votes = winner.members.len();
    let majority_percentage = percent(votes, total);
    let tier = ConfidenceTier::from_majority(majority_percentage);
    let raw_probability = winner.mean_confidence();
    let label = winner.label.to_string();
    tracing::debug!(
        "consensus tally: {:?}",
        groups
            .iter()
            .map(|g| (g.label, g.members.len()))
            .collect::<Vec<_>>()
    );

    let breakdown = groups
        .iter()
        .map(|g| LabelBreakdown {
            label: g.label.to_string(),
            count: g.members.len(),
            percentage: percent(g.members.len(), total),
            average_confidence: g.mean_confidence(),
            sources: g.members.iter().map(|r| r.source.clone()).collect(),
        })
        .collect();

    let interpretation = interpret(&label, votes, total, majority_percentage, tier, lang);

    Ok(ConsensusResult {
        label,
        tier,
        confidence_final: tier.confidence_final(),
        raw_probability,
        majority_percentage,
        total_images: total,
        votes,
        has_contradiction: groups.len() > 1,
        breakdown,
        interpretation,
    })
}

struct Group<'a> {
    label: &'a str,
    members: Vec<&'a ImageResult>,
}

impl Group<'_> {
    fn mean_confidence(&self) -> f64 {
        let sum: f64 = self.members.iter().map(|r| r.confidence).sum();
        sum / self.members.len() as f64
    }
}

fn percent(count: usize, total: usize) -> f64 {
    count as f64 * 100.0 / total as f64
}

fn interpret(
    label: &str,
    votes: usize,
    total: usize,
    majority_percentage: f64,
    tier: ConfidenceTier,
    lang: Language,
) -> String {
    let tier_name = tier.name(lang);
    match lang {
        Language::Spanish => {
            if majority_percentage > 50.0 {
                format!(
                    "✓ {votes} de {total} imágenes ({majority_percentage:.0}%) coinciden en '{label}'. Confianza: {tier_name}"
                )
            } else if majority_percentage == 50.0 {
                format!(
                    "⚠ Empate: {votes}/{total} imágenes. Resultado incierto. Se recomienda análisis manual."
                )
            } else {
                format!(
                    "⚠ No hay mayoría clara. La clase más común es '{label}' con {votes}/{total} votos."
                )
            }
        }
        Language::English => {
            if majority_percentage > 50.0 {
                format!(
                    "✓ {votes} of {total} images ({majority_percentage:.0}%) agree on '{label}'. Confidence: {tier_name}"
                )
            } else if majority_percentage == 50.0 {
                format!(
                    "⚠ Tie: {votes}/{total} images. Result uncertain. Manual review is recommended."
                )
            } else {
                format!(
                    "⚠ No clear majority. The most common class is '{label}' with {votes}/{total} votes."
                )
            }
        }
    }
}
