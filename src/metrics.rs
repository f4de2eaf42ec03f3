//! Classification metrics over reconciled records.
//!
//! Metrics measure the model, not the reviewer: the predicted side of every
//! pair is the backend prediction, and manual corrections are ignored here
//! even though display and export prefer them.

use serde::Serialize;
use tracing::{debug, info};

use crate::label::{LabelMapping, ModelCode, SemanticClass, NUM_CLASSES};
use crate::record::Record;

/// `3x3` confusion matrix indexed `[truth][predicted]` by class index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfusionMatrix {
    counts: [[u32; NUM_CLASSES]; NUM_CLASSES],
}

impl ConfusionMatrix {
    pub fn add(&mut self, truth: SemanticClass, predicted: SemanticClass) {
        let cell = &mut self.counts[truth.index()][predicted.index()];
        *cell = cell.saturating_add(1);
    }

    pub fn get(&self, truth: SemanticClass, predicted: SemanticClass) -> u32 {
        self.counts[truth.index()][predicted.index()]
    }

    pub fn rows(&self) -> [[u32; NUM_CLASSES]; NUM_CLASSES] {
        self.counts
    }

    pub fn total(&self) -> u32 {
        saturating_sum(self.counts.iter().flatten().copied())
    }

    /// Sum of the diagonal.
    pub fn correct(&self) -> u32 {
        saturating_sum((0..NUM_CLASSES).map(|i| self.counts[i][i]))
    }

    /// Counts for one class, read off its row, column and diagonal cell.
    fn tally(&self, class: SemanticClass) -> Tally {
        let i = class.index();
        let tp = self.counts[i][i];
        let row = saturating_sum(self.counts[i].iter().copied());
        let column = saturating_sum(self.counts.iter().map(|r| r[i]));
        Tally {
            tp,
            fp: column - tp,
            fn_: row - tp,
        }
    }
}

// Every count saturates at `u32::MAX` instead of wrapping.
fn saturating_sum(values: impl Iterator<Item = u32>) -> u32 {
    values.fold(0, u32::saturating_add)
}

/// Precision/recall/F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub class: SemanticClass,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Records whose true class is `class`.
    pub support: u32,
}

/// Derived metrics; recomputed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Unweighted mean of the three per-class F1 scores.
    pub macro_f1: f64,
    pub accuracy: f64,
    /// Records that had both a resolvable true and predicted class.
    pub evaluated: u32,
    pub per_class: [ClassMetrics; NUM_CLASSES],
    pub confusion_matrix: ConfusionMatrix,
}

impl MetricsSnapshot {
    pub fn class(&self, class: SemanticClass) -> &ClassMetrics {
        &self.per_class[class.index()]
    }
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    tp: u32,
    fp: u32,
    fn_: u32,
}

fn ratio(num: u32, denom: u32) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Compute metrics from `(truth, predicted)` class pairs.
///
/// Returns `None` when there are no pairs, so "no data" is never confused
/// with an all-zero score.
pub fn compute_from_pairs<I>(pairs: I) -> Option<MetricsSnapshot>
where
    I: IntoIterator<Item = (SemanticClass, SemanticClass)>,
{
    let mut matrix = ConfusionMatrix::default();
    for (truth, predicted) in pairs {
        matrix.add(truth, predicted);
    }
    snapshot_from_matrix(matrix)
}

fn snapshot_from_matrix(matrix: ConfusionMatrix) -> Option<MetricsSnapshot> {
    let evaluated = matrix.total();
    if evaluated == 0 {
        return None;
    }

    let per_class = SemanticClass::ALL.map(|class| {
        let t = matrix.tally(class);
        let precision = ratio(t.tp, t.tp.saturating_add(t.fp));
        let recall = ratio(t.tp, t.tp.saturating_add(t.fn_));
        ClassMetrics {
            class,
            precision,
            recall,
            f1: f1_score(precision, recall),
            support: t.tp.saturating_add(t.fn_),
        }
    });
    let macro_f1 = per_class.iter().map(|m| m.f1).sum::<f64>() / NUM_CLASSES as f64;

    Some(MetricsSnapshot {
        macro_f1,
        accuracy: ratio(matrix.correct(), evaluated),
        evaluated,
        per_class,
        confusion_matrix: matrix,
    })
}

/// Compute metrics over records.
///
/// A record counts only when its true label resolves through `mapping` and it
/// has a backend prediction; everything else is skipped silently.
pub fn compute_metrics(records: &[Record], mapping: &LabelMapping) -> Option<MetricsSnapshot> {
    let pairs: Vec<_> = records
        .iter()
        .filter_map(|r| {
            let truth = r.true_concept(mapping)?;
            let predicted = r.predicted.map(ModelCode::to_semantic_class)?;
            Some((truth, predicted))
        })
        .collect();

    debug!(
        evaluated = pairs.len(),
        excluded = records.len() - pairs.len(),
        "metrics input"
    );
    let snapshot = compute_from_pairs(pairs);
    if snapshot.is_none() {
        info!(records = records.len(), "no metrics available");
    }
    snapshot
}
