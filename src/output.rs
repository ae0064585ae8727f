//! Command Output
//!
//! Reports are printed either as plain text (one line per step followed by the
//! change summary) or, with `--json`, as a JSON envelope.
//!
//! # JSON Contract
//! - Success: `{"ok": true, "command": "...", "data": {...}, "meta": {...}}`
//! - Error: `{"ok": false, "command": "...", "error": {"code": "...", "message": "..."}}`,
//!   plus `"data"` with the steps completed before the failure, if any

use serde::{Deserialize, Serialize};

use crate::error::WardenError;
use crate::reconcile::Report;

/// Success envelope for command results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope<T> {
    /// Always true for success envelopes
    pub ok: bool,

    /// Command that was executed (adduser, deluser, master-info)
    pub command: String,

    /// Command-specific data
    pub data: T,

    /// Execution metadata
    pub meta: Metadata,
}

impl<T> SuccessEnvelope<T> {
    pub fn new(command: impl Into<String>, data: T, meta: Metadata) -> Self {
        Self { ok: true, command: command.into(), data, meta }
    }
}

/// Error envelope for command failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always false for error envelopes
    pub ok: bool,

    /// Command that was attempted
    pub command: String,

    pub error: ErrorInfo,

    /// Steps completed before the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Report>,
}

impl ErrorEnvelope {
    pub fn new(command: impl Into<String>, error: ErrorInfo) -> Self {
        Self { ok: false, command: command.into(), error, data: None }
    }

    /// Attach the partial report of a failed run; an empty one is left out
    #[must_use]
    pub fn with_report(mut self, report: &Report) -> Self {
        if !report.steps.is_empty() {
            self.data = Some(report.clone());
        }
        self
    }

    /// Create error envelope from a [`WardenError`]
    pub fn from_error(command: impl Into<String>, err: &WardenError) -> Self {
        Self::new(command, ErrorInfo { code: err.error_code().to_string(), message: err.message() })
    }
}

/// Error information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (e.g., "VALIDATION_ERROR", "CLIENT_ERROR")
    pub code: String,

    /// Human-readable message with its causes
    pub message: String,
}

/// Execution metadata included in all success responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    /// Execution time in milliseconds
    pub execution_ms: u64,

    /// Whether the run was in check mode
    pub dry_run: bool,
}

impl Metadata {
    pub fn new(execution_ms: u64, dry_run: bool) -> Self {
        Self { execution_ms, dry_run }
    }
}

/// Plain-text rendering: one line per step, then the change summary
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    for step in &report.steps {
        out.push_str(&step.message);
        out.push('\n');
    }
    out.push_str(&report.summary());
    out
}

/// JSON rendering of a successful run
pub fn render_json(command: &str, report: &Report, meta: Metadata) -> serde_json::Result<String> {
    serde_json::to_string(&SuccessEnvelope::new(command, report, meta))
}

/// JSON rendering of a failed run, with the steps it completed
pub fn render_json_error(
    command: &str,
    err: &WardenError,
    report: &Report,
) -> serde_json::Result<String> {
    serde_json::to_string(&ErrorEnvelope::from_error(command, err).with_report(report))
}
