//! Review session: the current record set, persisted as JSON between runs.

use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use crate::codec::{self, ParseError};
use crate::record::{Record, RecordStatus};

/// Default session file name, relative to the working directory.
pub const DEFAULT_SESSION_FILE: &str = "tesa-session.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Name of the input file the records came from.
    #[serde(default)]
    pub source: Option<String>,
    /// `sha256:<hex>` of the input file contents.
    #[serde(default)]
    pub source_sha256: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            source: None,
            source_sha256: None,
            created_at: Utc::now(),
            records: Vec::new(),
        }
    }
}

/// Counts by derived status and label availability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total: usize,
    pub raw: usize,
    pub predicted: usize,
    pub corrected: usize,
    pub with_true_label: usize,
    pub uncertain: usize,
    /// Mean top-class probability over records with scores.
    pub mean_confidence: Option<f64>,
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

impl Session {
    /// Start a new session from input CSV text, replacing any earlier records.
    ///
    /// On a parse failure nothing is created.
    pub fn from_input(source: Option<&str>, text: &str) -> Result<Self, ParseError> {
        let parsed = codec::parse_input(text)?;
        info!(
            source = source.unwrap_or("-"),
            records = parsed.count(),
            dropped = parsed.dropped(),
            "input loaded"
        );
        Ok(Self {
            source: source.map(str::to_string),
            source_sha256: Some(content_hash(text)),
            created_at: Utc::now(),
            records: parsed.rows,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read session {:?}", path))?;
        serde_json::from_str(&data).wrap_err_with(|| format!("Corrupt session file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self).wrap_err("Failed to serialize session")?;
        std::fs::write(path, data).wrap_err_with(|| format!("Failed to write session {:?}", path))?;
        info!(path = %path.display(), records = self.records.len(), "session saved");
        Ok(())
    }

    pub fn texts(&self) -> Vec<String> {
        self.records.iter().map(|r| r.text.clone()).collect()
    }

    pub fn summary(&self) -> SessionSummary {
        let mut summary = SessionSummary {
            total: self.records.len(),
            ..Default::default()
        };
        let mut confidence_sum = 0.0;
        let mut scored = 0usize;
        for r in &self.records {
            match r.status() {
                RecordStatus::Raw => summary.raw += 1,
                RecordStatus::Predicted => summary.predicted += 1,
                RecordStatus::Corrected => summary.corrected += 1,
            }
            if r.true_label.is_some() {
                summary.with_true_label += 1;
            }
            if let Some(scores) = r.scores {
                scored += 1;
                confidence_sum += scores.confidence();
                if scores.is_uncertain() {
                    summary.uncertain += 1;
                }
            }
        }
        if scored > 0 {
            summary.mean_confidence = Some(confidence_sum / scored as f64);
        }
        summary
    }
}
