//! Text and JSON rendering of metrics and session state.

use eyre::{Result, WrapErr};

use crate::label::{LabelMapping, SemanticClass};
use crate::metrics::MetricsSnapshot;
use crate::session::SessionSummary;

pub const NO_METRICS_MESSAGE: &str =
    "No metrics available: no record has both a true label and a model prediction.";

/// JSON document for `metrics --format json`. `metrics` is `null` when
/// unavailable.
pub fn format_metrics_json(snapshot: Option<&MetricsSnapshot>) -> Result<String> {
    let output = serde_json::json!({
        "available": snapshot.is_some(),
        "metrics": snapshot,
    });
    serde_json::to_string_pretty(&output).wrap_err("Failed to serialize metrics report")
}

pub fn format_metrics_summary(snapshot: Option<&MetricsSnapshot>) -> String {
    let Some(m) = snapshot else {
        return format!("{NO_METRICS_MESSAGE}\n");
    };

    let mut out = String::new();
    out.push_str("Model Metrics\n");
    out.push_str("=============\n\n");
    out.push_str(&format!("Evaluated:  {}\n", m.evaluated));
    out.push_str(&format!("Accuracy:   {:.1}%\n", m.accuracy * 100.0));
    out.push_str(&format!("Macro-F1:   {:.3}\n\n", m.macro_f1));

    out.push_str(&format!(
        "{:<10} {:>9} {:>9} {:>9} {:>8}\n",
        "CLASS", "PRECISION", "RECALL", "F1", "SUPPORT"
    ));
    out.push_str(&"-".repeat(49));
    out.push('\n');
    for c in &m.per_class {
        out.push_str(&format!(
            "{:<10} {:>9.3} {:>9.3} {:>9.3} {:>8}\n",
            c.class.as_str(),
            c.precision,
            c.recall,
            c.f1,
            c.support
        ));
    }

    out.push_str("\nConfusion matrix (rows = true, columns = predicted):\n");
    out.push_str(&format!("{:<10}", ""));
    for class in SemanticClass::ALL {
        out.push_str(&format!(" {:>9}", class.as_str()));
    }
    out.push('\n');
    for (truth, row) in SemanticClass::ALL.iter().zip(m.confusion_matrix.rows()) {
        out.push_str(&format!("{:<10}", truth.as_str()));
        for count in row {
            out.push_str(&format!(" {:>9}", count));
        }
        out.push('\n');
    }
    out
}

pub fn format_session_summary(summary: &SessionSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Records:          {}\n", summary.total));
    out.push_str(&format!("  raw:            {}\n", summary.raw));
    out.push_str(&format!("  predicted:      {}\n", summary.predicted));
    out.push_str(&format!("  corrected:      {}\n", summary.corrected));
    out.push_str(&format!("With true label:  {}\n", summary.with_true_label));
    out.push_str(&format!("Uncertain:        {}\n", summary.uncertain));
    if let Some(mean) = summary.mean_confidence {
        out.push_str(&format!("Mean confidence:  {:.1}%\n", mean * 100.0));
    }
    out
}

pub fn format_mapping(mapping: &LabelMapping) -> String {
    let mut out = String::new();
    for (code, class) in mapping.entries() {
        out.push_str(&format!("{} -> {}\n", code, class));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::compute_from_pairs;
    use SemanticClass::*;

    #[test]
    fn test_summary_unavailable() {
        assert_eq!(format_metrics_summary(None), format!("{NO_METRICS_MESSAGE}\n"));
    }

    #[test]
    fn test_summary_lists_every_class() {
        let snap = compute_from_pairs([(Negative, Negative), (Positive, Neutral)]).unwrap();
        let text = format_metrics_summary(Some(&snap));
        assert!(text.contains("Macro-F1:"));
        for class in SemanticClass::ALL {
            assert!(text.contains(class.as_str()));
        }
        assert!(text.contains("Evaluated:  2"));
    }

    #[test]
    fn test_json_unavailable() {
        let json: serde_json::Value =
            serde_json::from_str(&format_metrics_json(None).unwrap()).unwrap();
        assert_eq!(json["available"], false);
        assert!(json["metrics"].is_null());
    }

    #[test]
    fn test_session_summary_mean_confidence() {
        let mut summary = SessionSummary {
            total: 2,
            raw: 2,
            ..Default::default()
        };
        assert!(!format_session_summary(&summary).contains("Mean confidence"));

        summary.mean_confidence = Some(0.75);
        let text = format_session_summary(&summary);
        assert!(text.contains("Records:          2\n"));
        assert!(text.contains("Mean confidence:  75.0%\n"), "{text}");
    }

    #[test]
    fn test_format_mapping() {
        let mapping = LabelMapping::from_classes([Positive, Neutral, Negative]);
        assert_eq!(
            format_mapping(&mapping),
            "0 -> positive\n1 -> neutral\n2 -> negative\n"
        );
    }
}
