//! Record: one analyzed text and its labels.

use serde::{Deserialize, Serialize};

use crate::label::{DatasetCode, LabelMapping, ModelCode, SemanticClass};
use crate::scores::SentimentScores;

/// Lifecycle status, derived from which labels are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Raw,
    Predicted,
    Corrected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Predicted => "predicted",
            Self::Corrected => "corrected",
        }
    }
}

/// One analyzed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Backend prediction from the latest analysis run.
    #[serde(default)]
    pub predicted: Option<ModelCode>,
    /// Manual correction; overrides `predicted` for display and export.
    #[serde(default)]
    pub corrected: Option<ModelCode>,
    /// Ground truth in the dataset's own encoding.
    #[serde(default)]
    pub true_label: Option<DatasetCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<SentimentScores>,
}

impl Record {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            src: None,
            predicted: None,
            corrected: None,
            true_label: None,
            scores: None,
        }
    }

    pub fn status(&self) -> RecordStatus {
        if self.corrected.is_some() {
            RecordStatus::Corrected
        } else if self.predicted.is_some() {
            RecordStatus::Predicted
        } else {
            RecordStatus::Raw
        }
    }

    /// Corrected label if present, else predicted.
    pub fn effective_label(&self) -> Option<ModelCode> {
        self.corrected.or(self.predicted)
    }

    pub fn effective_concept(&self) -> Option<SemanticClass> {
        self.effective_label().map(ModelCode::to_semantic_class)
    }

    pub fn true_concept(&self, mapping: &LabelMapping) -> Option<SemanticClass> {
        self.true_label.map(|code| mapping.to_semantic_class(code))
    }

    /// Effective label re-encoded into the dataset convention of `mapping`.
    pub fn export_label(&self, mapping: &LabelMapping) -> Option<DatasetCode> {
        self.effective_concept()
            .map(|class| mapping.to_dataset_code(class))
    }

    /// Whether the true label and effective label agree by meaning.
    /// `None` when either side is absent.
    pub fn matches_by_concept(&self, mapping: &LabelMapping) -> Option<bool> {
        Some(self.true_concept(mapping)? == self.effective_concept()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: i64) -> ModelCode {
        ModelCode::new(raw).unwrap()
    }

    #[test]
    fn test_status_is_derived() {
        let mut r = Record::new("1", "hello");
        assert_eq!(r.status(), RecordStatus::Raw);
        r.predicted = Some(code(2));
        assert_eq!(r.status(), RecordStatus::Predicted);
        r.corrected = Some(code(0));
        assert_eq!(r.status(), RecordStatus::Corrected);
        r.corrected = None;
        assert_eq!(r.status(), RecordStatus::Predicted);
    }

    #[test]
    fn test_effective_prefers_correction() {
        let mut r = Record::new("1", "hello");
        assert_eq!(r.effective_label(), None);
        r.predicted = Some(code(1));
        assert_eq!(r.effective_label(), Some(code(1)));
        r.corrected = Some(code(2));
        assert_eq!(r.effective_label(), Some(code(2)));
    }

    #[test]
    fn test_export_label_uses_dataset_convention() {
        let mapping = LabelMapping::from_classes([
            SemanticClass::Positive,
            SemanticClass::Neutral,
            SemanticClass::Negative,
        ]);
        let mut r = Record::new("1", "great");
        r.predicted = Some(code(2));
        assert_eq!(r.export_label(&mapping), DatasetCode::new(0));
    }

    #[test]
    fn test_matches_by_concept() {
        let mapping = LabelMapping::default();
        let mut r = Record::new("1", "meh");
        assert_eq!(r.matches_by_concept(&mapping), None);
        r.true_label = DatasetCode::new(1);
        r.predicted = Some(code(1));
        assert_eq!(r.matches_by_concept(&mapping), Some(true));
        r.corrected = Some(code(0));
        assert_eq!(r.matches_by_concept(&mapping), Some(false));
    }

    #[test]
    fn test_record_json_round_trip() {
        let mut r = Record::new("x1", "text");
        r.predicted = Some(code(0));
        let json = serde_json::to_string(&r).unwrap();
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(!json.contains("status"));
    }
}
