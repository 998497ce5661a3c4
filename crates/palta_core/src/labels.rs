use crate::error::DiagnosisError;
use serde::{Deserialize, Serialize};

/// Labels in the order of the bundled model's output vector.
pub const DEFAULT_LABELS: [&str; 5] = [
    "Huevos",
    "No Relacionado",
    "Palta Dañada",
    "Palta Sana",
    "Plaga",
];

/// Ordered, non-empty set of unique labels. Position `i` names the
/// classifier output at index `i`; the order carries no ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Result<Self, DiagnosisError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into().trim().to_string();
            if label.is_empty() {
                return Err(DiagnosisError::Config("label set contains an empty label".into()));
            }
            if out.contains(&label) {
                return Err(DiagnosisError::Config(format!(
                    "label '{label}' appears more than once"
                )));
            }
            out.push(label);
        }
        if out.is_empty() {
            return Err(DiagnosisError::Config("label set is empty".into()));
        }
        Ok(Self(out))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect())
    }
}

impl TryFrom<Vec<String>> for LabelSet {
    type Error = DiagnosisError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LabelSet> for Vec<String> {
    fn from(value: LabelSet) -> Self {
        value.0
    }
}

/// Language used for interpretation messages and care guides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Spanish,
    English,
}

impl Language {
    /// Maps a BCP-47 style locale ("es-CL", "en_US") to a supported language.
    pub fn from_locale(locale: &str) -> Self {
        let lower = locale.to_ascii_lowercase();
        if lower.starts_with("en") {
            Language::English
        } else {
            Language::Spanish
        }
    }

    /// Picks the string for this language.
    pub fn tr(self, es: &'static str, en: &'static str) -> &'static str {
        match self {
            Language::Spanish => es,
            Language::English => en,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_keeps_model_order() {
        let set = LabelSet::default();
        assert_eq!(set.len(), 5);
        assert_eq!(set.get(0), Some("Huevos"));
        assert_eq!(set.get(4), Some("Plaga"));
        assert_eq!(set.get(5), None);
    }

    #[test]
    fn rejects_duplicates_and_blanks() {
        assert!(LabelSet::new(["Pest", "Pest"]).is_err());
        assert!(LabelSet::new(["Pest", "  "]).is_err());
        assert!(LabelSet::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn deserializes_through_validation() {
        let ok: LabelSet = serde_json::from_str(r#"["Eggs","Pest"]"#).unwrap();
        assert_eq!(ok.iter().collect::<Vec<_>>(), vec!["Eggs", "Pest"]);
        assert!(serde_json::from_str::<LabelSet>(r#"["Pest","Pest"]"#).is_err());
    }

    #[test]
    fn locale_selects_language() {
        assert_eq!(Language::from_locale("en-US"), Language::English);
        assert_eq!(Language::from_locale("es_CL"), Language::Spanish);
        assert_eq!(Language::from_locale("nl-NL"), Language::Spanish);
    }

    #[test]
    fn tr_picks_by_language() {
        assert_eq!(Language::Spanish.tr("Votos", "Votes"), "Votos");
        assert_eq!(Language::English.tr("Votos", "Votes"), "Votes");
    }
}
