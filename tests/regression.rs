//! Regression tests for label mapping and metrics behavior that downstream
//! dashboards depend on.

use tesa::codec::{self, ParseError};
use tesa::label::{
    from_model_code, labels_equal_by_concept, DatasetCode, LabelMapping, ModelCode, SemanticClass,
};
use tesa::metrics::compute_metrics;
use tesa::record::Record;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn permutations() -> Vec<LabelMapping> {
    use SemanticClass::*;
    [
        [Negative, Neutral, Positive],
        [Negative, Positive, Neutral],
        [Neutral, Negative, Positive],
        [Neutral, Positive, Negative],
        [Positive, Negative, Neutral],
        [Positive, Neutral, Negative],
    ]
    .into_iter()
    .map(LabelMapping::from_classes)
    .collect()
}

fn scored(truth: i64, predicted: i64) -> Record {
    let mut r = Record::new("r", "text");
    r.true_label = DatasetCode::new(truth);
    r.predicted = ModelCode::new(predicted);
    r
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

#[test]
fn test_dataset_code_round_trip_through_any_bijection() {
    for m in permutations() {
        for class in SemanticClass::ALL {
            assert_eq!(m.to_semantic_class(m.to_dataset_code(class)), class);
        }
        for code in DatasetCode::ALL {
            assert_eq!(m.to_dataset_code(m.to_semantic_class(code)), code);
        }
    }
}

#[test]
fn test_repeated_updates_stay_bijective() {
    // Walk every (code, class) update from every start, twice over.
    for start in permutations() {
        let mut m = start;
        for _ in 0..2 {
            for code in DatasetCode::ALL {
                for class in SemanticClass::ALL {
                    m = m.set(code, class);
                    assert!(m.is_bijective(), "{:?}", m.classes());
                }
            }
        }
    }
}

#[test]
fn test_concept_equality_under_non_identity_mapping() {
    use SemanticClass::*;
    let m = LabelMapping::from_classes([Positive, Neutral, Negative]);
    assert!(labels_equal_by_concept(Some(1), Some(1), &m));
    assert!(!labels_equal_by_concept(Some(2), Some(2), &m));
}

#[test]
fn test_model_codes_ignore_mapping() {
    assert_eq!(from_model_code(0), Some(SemanticClass::Negative));
    assert_eq!(from_model_code(1), Some(SemanticClass::Neutral));
    assert_eq!(from_model_code(2), Some(SemanticClass::Positive));
    assert_eq!(from_model_code(3), None);
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn test_input_parse_reference_file() {
    let parsed = codec::parse_input("text,src,label,id\n\"A\",s1,0,x1\n\"B\",s2,2,x2\n").unwrap();
    let got: Vec<_> = parsed
        .rows
        .iter()
        .map(|r| (r.id.as_str(), r.text.as_str(), r.true_label.map(|c| c.value())))
        .collect();
    assert_eq!(got, [("x1", "A", Some(0)), ("x2", "B", Some(2))]);
}

#[test]
fn test_header_without_text_is_rejected() {
    let result = codec::parse_input("id,label\nx1,0\n");
    assert!(matches!(result, Err(ParseError::MissingColumn { .. })));
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[test]
fn test_all_wrong_single_record() {
    use SemanticClass::*;
    let snap = compute_metrics(&[scored(0, 2)], &LabelMapping::default()).unwrap();
    let rows = snap.confusion_matrix.rows();
    assert_eq!(rows, [[0, 0, 1], [0, 0, 0], [0, 0, 0]]);
    assert_eq!(snap.class(Negative).recall, 0.0);
    assert_eq!(snap.class(Positive).precision, 0.0);
    assert_eq!(snap.macro_f1, 0.0);
}

#[test]
fn test_unavailable_is_distinct_from_zero() {
    let mut unresolvable = Record::new("1", "a");
    unresolvable.predicted = ModelCode::new(1);
    assert!(compute_metrics(&[unresolvable], &LabelMapping::default()).is_none());

    let perfectly_wrong = compute_metrics(&[scored(1, 0)], &LabelMapping::default());
    assert_eq!(perfectly_wrong.map(|s| s.macro_f1), Some(0.0));
}

#[test]
fn test_macro_f1_always_divides_by_three() {
    // Only the neutral class has support, and it is predicted perfectly.
    let records = [scored(1, 1), scored(1, 1)];
    let snap = compute_metrics(&records, &LabelMapping::default()).unwrap();
    assert_eq!(snap.class(SemanticClass::Neutral).f1, 1.0);
    assert!((snap.macro_f1 - 1.0 / 3.0).abs() < 1e-12);
}
