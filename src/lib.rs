//! TESA: review machine-predicted sentiment labels against ground truth.
//!
//! Three label encodings are reconciled into one semantic space:
//! - the prediction backend's fixed codes ([`label::ModelCode`])
//! - the dataset's own codes ([`label::DatasetCode`]), whose meaning is set by
//!   a user-configurable [`label::LabelMapping`]
//! - raw codes read from CSV files ([`codec`])
//!
//! On top of that the crate attaches ground truth to records
//! ([`reconcile`]) and computes per-class precision/recall/F1, macro-F1 and a
//! confusion matrix ([`metrics`]).
//!
//! Everything except [`client`] is synchronous and pure: operations take
//! their inputs (including the active mapping) explicitly and return new
//! values.
//!
//! Uses structured logging via [`tracing`]. Set the `RUST_LOG` environment
//! variable to control log verbosity (e.g., `RUST_LOG=tesa=debug`).

pub mod client;
pub mod codec;
pub mod config;
pub mod label;
pub mod metrics;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod scores;
pub mod session;

pub use codec::{ExportOptions, ParseError};
pub use label::{DatasetCode, LabelMapping, ModelCode, SemanticClass};
pub use metrics::MetricsSnapshot;
pub use record::{Record, RecordStatus};
