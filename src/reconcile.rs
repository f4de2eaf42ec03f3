//! Attaching predictions, corrections and ground truth to records.
//!
//! Every operation takes the current records by reference and returns a new
//! record sequence; the input is never mutated.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::Prediction;
use crate::codec::ValidationRow;
use crate::label::{DatasetCode, ModelCode};
use crate::record::Record;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("no record with id `{0}`")]
    UnknownRecord(String),

    #[error("expected {expected} predictions, got {actual}")]
    PredictionCount { expected: usize, actual: usize },
}

/// Collapse whitespace runs to one space and trim.
pub fn normalize_text(s: &str) -> String {
    WHITESPACE_RE.replace_all(s.trim(), " ").into_owned()
}

// ---------------------------------------------------------------------------
// Predictions and corrections
// ---------------------------------------------------------------------------

/// Attach one analysis run's predictions, in record order.
///
/// A new run replaces earlier predictions and drops manual corrections made
/// against them.
pub fn apply_predictions(
    records: &[Record],
    predictions: &[Prediction],
) -> Result<Vec<Record>, ReconcileError> {
    if records.len() != predictions.len() {
        return Err(ReconcileError::PredictionCount {
            expected: records.len(),
            actual: predictions.len(),
        });
    }
    let updated = records
        .iter()
        .zip(predictions)
        .map(|(r, p)| Record {
            predicted: Some(p.label),
            corrected: None,
            scores: p.scores,
            ..r.clone()
        })
        .collect();
    info!(records = records.len(), "attached predictions");
    Ok(updated)
}

/// Set or clear the manual correction of the record with `id`.
///
/// Setting a value makes the record `corrected`; clearing it falls back to
/// `predicted` or `raw` depending on whether a prediction exists.
pub fn set_correction(
    records: &[Record],
    id: &str,
    label: Option<ModelCode>,
) -> Result<Vec<Record>, ReconcileError> {
    if !records.iter().any(|r| r.id == id) {
        return Err(ReconcileError::UnknownRecord(id.to_string()));
    }
    Ok(records
        .iter()
        .map(|r| {
            if r.id == id {
                Record {
                    corrected: label,
                    ..r.clone()
                }
            } else {
                r.clone()
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Which rule matched a record to a validation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Id,
    Text,
    Position,
}

/// Lookup tables built once per validation file.
#[derive(Debug, Default)]
pub struct ValidationIndex {
    by_id: HashMap<String, DatasetCode>,
    by_text: HashMap<String, DatasetCode>,
    by_position: Vec<DatasetCode>,
}

impl ValidationIndex {
    /// Later rows overwrite earlier ones on id or normalized-text collisions.
    pub fn build(rows: &[ValidationRow]) -> Self {
        let mut index = ValidationIndex {
            by_position: rows.iter().map(|row| row.label).collect(),
            ..Default::default()
        };
        for row in rows {
            if let Some(id) = &row.id {
                index.by_id.insert(id.clone(), row.label);
            }
            index.by_text.insert(normalize_text(&row.text), row.label);
        }
        index
    }

    /// Match by identifier, then normalized text, then zero-based position.
    pub fn lookup(&self, record: &Record, position: usize) -> Option<(DatasetCode, MatchKind)> {
        if let Some(label) = self.by_id.get(&record.id) {
            return Some((*label, MatchKind::Id));
        }
        if let Some(label) = self.by_text.get(&normalize_text(&record.text)) {
            return Some((*label, MatchKind::Text));
        }
        self.by_position
            .get(position)
            .map(|label| (*label, MatchKind::Position))
    }
}

/// Result of applying a validation file.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub records: Vec<Record>,
    pub stats: MatchStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub by_id: usize,
    pub by_text: usize,
    pub by_position: usize,
    pub unmatched: usize,
}

impl MatchStats {
    pub fn matched(&self) -> usize {
        self.by_id + self.by_text + self.by_position
    }
}

/// Attach true labels from a validation file.
///
/// Records that match no row keep whatever true label they had.
pub fn apply_validation(records: &[Record], rows: &[ValidationRow]) -> ValidationOutcome {
    let index = ValidationIndex::build(rows);
    let mut stats = MatchStats::default();

    let records = records
        .iter()
        .enumerate()
        .map(|(position, r)| match index.lookup(r, position) {
            Some((label, kind)) => {
                match kind {
                    MatchKind::Id => stats.by_id += 1,
                    MatchKind::Text => stats.by_text += 1,
                    MatchKind::Position => stats.by_position += 1,
                }
                Record {
                    true_label: Some(label),
                    ..r.clone()
                }
            }
            None => {
                stats.unmatched += 1;
                r.clone()
            }
        })
        .collect();

    info!(
        rows = rows.len(),
        by_id = stats.by_id,
        by_text = stats.by_text,
        by_position = stats.by_position,
        "applied validation labels"
    );
    if stats.unmatched > 0 {
        debug!(unmatched = stats.unmatched, "records left without a validation match");
    }
    ValidationOutcome { records, stats }
}

/// Clear every record's true label.
pub fn reset_validation(records: &[Record]) -> Vec<Record> {
    info!(records = records.len(), "validation reset");
    records
        .iter()
        .map(|r| Record {
            true_label: None,
            ..r.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordStatus;
    use crate::scores::SentimentScores;

    fn row(id: Option<&str>, text: &str, label: i64) -> ValidationRow {
        ValidationRow {
            id: id.map(str::to_string),
            text: text.to_string(),
            label: DatasetCode::new(label).unwrap(),
        }
    }

    fn pred(label: i64) -> Prediction {
        Prediction {
            label: ModelCode::new(label).unwrap(),
            scores: None,
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn test_apply_predictions_clears_corrections() {
        let mut r = Record::new("1", "x");
        r.predicted = ModelCode::new(0);
        r.corrected = ModelCode::new(1);
        let p = Prediction {
            label: ModelCode::new(2).unwrap(),
            scores: Some(SentimentScores::from_array([0.1, 0.1, 0.8])),
        };
        let out = apply_predictions(&[r], &[p]).unwrap();
        assert_eq!(out[0].predicted, ModelCode::new(2));
        assert_eq!(out[0].corrected, None);
        assert!(out[0].scores.is_some());
    }

    #[test]
    fn test_apply_predictions_length_mismatch() {
        let err = apply_predictions(&[Record::new("1", "x")], &[]).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::PredictionCount {
                expected: 1,
                actual: 0
            }
        );
    }

    #[test]
    fn test_correction_status_transitions() {
        let records = apply_predictions(
            &[Record::new("1", "x"), Record::new("2", "y")],
            &[pred(0), pred(1)],
        )
        .unwrap();
        let corrected = set_correction(&records, "2", ModelCode::new(2)).unwrap();
        assert_eq!(corrected[1].status(), RecordStatus::Corrected);
        assert_eq!(corrected[0].status(), RecordStatus::Predicted);

        let cleared = set_correction(&corrected, "2", None).unwrap();
        assert_eq!(cleared[1].status(), RecordStatus::Predicted);

        let raw = set_correction(&[Record::new("9", "z")], "9", None).unwrap();
        assert_eq!(raw[0].status(), RecordStatus::Raw);
    }

    #[test]
    fn test_correction_unknown_id() {
        let err = set_correction(&[Record::new("1", "x")], "2", None).unwrap_err();
        assert_eq!(err, ReconcileError::UnknownRecord("2".into()));
    }

    #[test]
    fn test_match_priority_id_then_text_then_position() {
        let records = vec![
            Record::new("a", "first text"),
            Record::new("b", "second   text"),
            Record::new("c", "unrelated"),
            Record::new("d", "no match at all"),
        ];
        let rows = vec![
            // id match for "a" even though the text belongs to "b"
            row(Some("a"), "second text", 2),
            row(None, "  second\ttext ", 1),
            row(Some("zz"), "something", 0),
        ];
        let outcome = apply_validation(&records, &rows);
        let labels: Vec<_> = outcome.records.iter().map(|r| r.true_label).collect();
        assert_eq!(
            labels,
            [
                DatasetCode::new(2),
                DatasetCode::new(1),
                DatasetCode::new(0),
                None
            ]
        );
        assert_eq!(
            outcome.stats,
            MatchStats {
                by_id: 1,
                by_text: 1,
                by_position: 1,
                unmatched: 1
            }
        );
    }

    #[test]
    fn test_text_collision_last_write_wins() {
        let rows = vec![row(None, "same", 0), row(None, " same ", 2)];
        let outcome = apply_validation(&[Record::new("x", "same")], &rows);
        assert_eq!(outcome.records[0].true_label, DatasetCode::new(2));
        assert_eq!(outcome.stats.by_text, 1);
    }

    #[test]
    fn test_unmatched_keeps_previous_label() {
        let mut r = Record::new("1", "keep me");
        r.true_label = DatasetCode::new(1);
        let outcome = apply_validation(&[r], &[]);
        assert_eq!(outcome.records[0].true_label, DatasetCode::new(1));
        assert_eq!(outcome.stats.unmatched, 1);
    }

    #[test]
    fn test_id_match_is_case_sensitive() {
        let rows = vec![row(Some("A1"), "other", 2), row(None, "filler", 0)];
        let outcome = apply_validation(
            &[Record::new("x", "nothing"), Record::new("a1", "nope")],
            &rows,
        );
        // "a1" falls through to position 1
        assert_eq!(outcome.records[1].true_label, DatasetCode::new(0));
        assert_eq!(outcome.stats.by_id, 0);
    }

    #[test]
    fn test_reset_clears_all_true_labels() {
        let mut a = Record::new("1", "a");
        a.true_label = DatasetCode::new(0);
        a.predicted = ModelCode::new(1);
        let out = reset_validation(&[a, Record::new("2", "b")]);
        assert!(out.iter().all(|r| r.true_label.is_none()));
        assert_eq!(out[0].predicted, ModelCode::new(1));
    }
}
