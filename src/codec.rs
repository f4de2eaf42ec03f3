//! CSV import and export.
//!
//! Import is permissive per field: a row without text is dropped, and a label
//! cell that is not exactly `0`, `1` or `2` is treated as absent. Only a
//! missing required header column fails the whole file.
//!
//! Export always re-encodes the effective label into the dataset convention of
//! the active [`LabelMapping`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::label::{DatasetCode, LabelMapping};
use crate::record::Record;

/// Default file name for the configurable export.
pub const EXPORT_FILE_NAME: &str = "tesa_results.csv";
/// Default file name for the full diagnostic export.
pub const FULL_EXPORT_FILE_NAME: &str = "tesa_results_full.csv";

/// Header names accepted for the ground-truth column of a validation file.
pub const VALIDATION_LABEL_COLUMNS: &[&str] = &[
    "label",
    "true_label",
    "gold",
    "gold_label",
    "ground_truth",
    "target",
    "sentiment",
];

const FULL_EXPORT_HEADER: &str = "id,src,text,predicted_label,corrected_label,final_label_concept,final_label_export,true_label_raw,true_label_concept,match_by_concept";

static LINE_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]+").unwrap());

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which kind of file was being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Input,
    Validation,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Validation => f.write_str("validation"),
        }
    }
}

/// Failure to parse a whole file. No rows are returned on failure.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0} file is empty")]
    EmptyInput(FileKind),

    #[error("{kind} file header has no `{column}` column")]
    MissingColumn { column: &'static str, kind: FileKind },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

// ---------------------------------------------------------------------------
// Parsed types
// ---------------------------------------------------------------------------

/// Rows parsed from one file, in file order.
#[derive(Debug, Clone)]
pub struct ParsedFile<T> {
    pub rows: Vec<T>,
    /// Data rows read, including dropped ones.
    pub rows_read: usize,
}

impl<T> ParsedFile<T> {
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn dropped(&self) -> usize {
        self.rows_read - self.rows.len()
    }
}

/// One usable row of a validation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRow {
    pub id: Option<String>,
    pub text: String,
    pub label: DatasetCode,
}

/// Column layout of an export produced by [`export_csv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub include_id: bool,
    pub include_text: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_id: true,
            include_text: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

/// Column indices resolved once from the header row.
#[derive(Debug, Default)]
struct Columns {
    text: Option<usize>,
    label: Option<usize>,
    src: Option<usize>,
    id: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, label_names: &[&str]) -> Self {
        let mut cols = Columns::default();
        for (idx, raw) in headers.iter().enumerate() {
            let name = raw.trim_start_matches('\u{feff}').trim().to_ascii_lowercase();
            let slot = match name.as_str() {
                "text" => &mut cols.text,
                "src" => &mut cols.src,
                "id" => &mut cols.id,
                other if label_names.contains(&other) => &mut cols.label,
                _ => continue,
            };
            // First matching column wins.
            slot.get_or_insert(idx);
        }
        cols
    }
}

fn cell(record: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn open_reader(text: &str, kind: FileKind) -> Result<csv::Reader<&[u8]>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyInput(kind));
    }
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes()))
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse an input file into fresh records.
///
/// Requires a `text` column; `src`, `label` and `id` are optional. Rows with
/// empty text are dropped. Records without an identifier are numbered
/// `1, 2, 3, ...` over the kept rows, skipping any number already taken by an
/// explicit `id` in the same file. An input `label` becomes the record's
/// initial true label.
pub fn parse_input(text: &str) -> Result<ParsedFile<Record>, ParseError> {
    let mut reader = open_reader(text, FileKind::Input)?;
    let cols = Columns::resolve(reader.headers()?, &["label"]);
    let Some(text_col) = cols.text else {
        warn!("input file rejected: no text column");
        return Err(ParseError::MissingColumn {
            column: "text",
            kind: FileKind::Input,
        });
    };

    // Identifiers are assigned after the whole file is read so generated
    // numbers can avoid every explicit id.
    let mut pending: Vec<(Option<String>, Record)> = Vec::new();
    let mut rows_read = 0;
    for result in reader.records() {
        let record = result?;
        rows_read += 1;

        let body = LINE_BREAK_RE.replace_all(cell(&record, Some(text_col)), " ");
        let Some(body) = non_empty(&body) else {
            continue;
        };

        let mut parsed = Record::new(String::new(), body);
        parsed.src = non_empty(cell(&record, cols.src));
        parsed.true_label = DatasetCode::parse(cell(&record, cols.label));
        pending.push((non_empty(cell(&record, cols.id)), parsed));
    }

    let mut used: HashSet<String> = pending.iter().filter_map(|(id, _)| id.clone()).collect();
    let mut rows = Vec::with_capacity(pending.len());
    for (position, (explicit, mut parsed)) in pending.into_iter().enumerate() {
        parsed.id = match explicit {
            Some(id) => id,
            None => {
                let mut n = position + 1;
                while used.contains(&n.to_string()) {
                    n += 1;
                }
                let id = n.to_string();
                used.insert(id.clone());
                id
            }
        };
        rows.push(parsed);
    }

    debug!(rows = rows.len(), rows_read, "parsed input file");
    Ok(ParsedFile { rows, rows_read })
}

/// Parse a validation (ground truth) file.
///
/// Requires `text` and a label column (see [`VALIDATION_LABEL_COLUMNS`]);
/// `id` is optional. Rows with empty text or without a valid label are
/// dropped, so positions in the result count usable rows only.
pub fn parse_validation(text: &str) -> Result<ParsedFile<ValidationRow>, ParseError> {
    let mut reader = open_reader(text, FileKind::Validation)?;
    let cols = Columns::resolve(reader.headers()?, VALIDATION_LABEL_COLUMNS);
    let (Some(text_col), Some(label_col)) = (cols.text, cols.label) else {
        let column = if cols.text.is_none() { "text" } else { "label" };
        warn!(column, "validation file rejected: missing column");
        return Err(ParseError::MissingColumn {
            column,
            kind: FileKind::Validation,
        });
    };

    let mut rows = Vec::new();
    let mut rows_read = 0;
    for result in reader.records() {
        let record = result?;
        rows_read += 1;

        let Some(body) = non_empty(cell(&record, Some(text_col))) else {
            continue;
        };
        let Some(label) = DatasetCode::parse(cell(&record, Some(label_col))) else {
            continue;
        };
        rows.push(ValidationRow {
            id: non_empty(cell(&record, cols.id)),
            text: body,
            label,
        });
    }

    debug!(rows = rows.len(), rows_read, "parsed validation file");
    Ok(ParsedFile { rows, rows_read })
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Quote only when the value needs it.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        quote(s)
    } else {
        s.to_string()
    }
}

/// Always quote, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn push_row(out: &mut String, fields: &[String]) {
    out.push_str(&fields.join(","));
    out.push('\n');
}

fn opt_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Export records as `[ID?, text?, label]`.
///
/// `label` is always present: the effective label converted to the dataset
/// code that `mapping` assigns to its class, or empty when unlabeled.
pub fn export_csv(records: &[Record], mapping: &LabelMapping, options: ExportOptions) -> String {
    let mut out = String::new();

    let mut header = Vec::with_capacity(3);
    if options.include_id {
        header.push("ID".to_string());
    }
    if options.include_text {
        header.push("text".to_string());
    }
    header.push("label".to_string());
    push_row(&mut out, &header);

    for r in records {
        let mut fields = Vec::with_capacity(3);
        if options.include_id {
            fields.push(escape_csv(&r.id));
        }
        if options.include_text {
            fields.push(quote(&r.text));
        }
        fields.push(opt_string(r.export_label(mapping)));
        push_row(&mut out, &fields);
    }
    out
}

/// Export every label view of each record for diagnostics.
pub fn export_full_csv(records: &[Record], mapping: &LabelMapping) -> String {
    let mut out = String::new();
    out.push_str(FULL_EXPORT_HEADER);
    out.push('\n');

    for r in records {
        let fields = [
            escape_csv(&r.id),
            escape_csv(r.src.as_deref().unwrap_or("")),
            quote(&r.text),
            opt_string(r.predicted),
            opt_string(r.corrected),
            opt_string(r.effective_concept()),
            opt_string(r.export_label(mapping)),
            opt_string(r.true_label),
            opt_string(r.true_concept(mapping)),
            opt_string(r.matches_by_concept(mapping)),
        ];
        push_row(&mut out, &fields);
    }
    out
}
