//! Error types for the greenreport library.
//!
//! The pipeline has no local recovery: any stage failure aborts the whole
//! project record. What the taxonomy buys us is a *distinguishable* failure
//! kind at the API boundary: a caller can tell a missing record field from
//! an unreadable template from a dead SMTP relay without parsing message
//! strings. The CLI maps these to exit messages; embedding callers can match
//! on the variant.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the greenreport library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Record errors ─────────────────────────────────────────────────────
    /// A project record lacks a key the selected layout requires.
    #[error("Project '{project}' is missing required field '{key}'\nCheck the record source document for this reporting period.")]
    MissingField { project: String, key: String },

    /// No record matched a requested project id.
    #[error("No report record found for project '{project}'")]
    UnknownProject { project: String },

    // ── Template errors ───────────────────────────────────────────────────
    /// Template path unreadable or the file is not a parseable PDF form.
    #[error("Cannot use PDF template '{path}': {detail}")]
    InvalidTemplate { path: PathBuf, detail: String },

    // ── Asset errors ──────────────────────────────────────────────────────
    /// An image a descriptor points at is absent from the working directory.
    #[error("Image asset not found: '{path}'\nThe project folder fetch may have failed or the file was purged.")]
    AssetMissing { path: PathBuf },

    /// A descriptor targets a page beyond the rasterised template.
    #[error("Image '{key}' targets page {page} but the template has {total} pages")]
    PageOutOfRange {
        key: String,
        page: usize,
        total: usize,
    },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// pdfium returned an error for a specific page of the filled template.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Chart input rejected before drawing (negative magnitude,
    /// out-of-range percentage, NaN).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Collaborator errors ───────────────────────────────────────────────
    /// A network call to an external collaborator (SMTP relay, drive,
    /// spreadsheet, asset folder) failed.
    #[error("{service} call failed: {detail}")]
    TransportFailure { service: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a working file or the final PDF.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Install pdfium system-wide or put its directory on the library search path."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    /// Shorthand for a [`ReportError::TransportFailure`].
    pub fn transport(service: impl Into<String>, detail: impl ToString) -> Self {
        ReportError::TransportFailure {
            service: service.into(),
            detail: detail.to_string(),
        }
    }
}
