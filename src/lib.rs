//! # greenreport
//!
//! Generate and distribute monthly investor progress reports.
//!
//! ## Why this crate?
//!
//! Investor reports are visual documents: photos of the works, progress
//! donuts, a capital bar chart, all placed at exact positions on a branded
//! page. Driving a word processor or HTML-to-PDF stack for that is fragile,
//! so this crate treats the report as an imaging problem: fill a PDF form
//! template, rasterise it, composite charts and photos onto the page
//! rasters at fixed pixel positions, and bind the pages back into a PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! per project record
//!  │
//!  ├─ 1. Assets    purge stale photos, fetch the project's 1.* / 2.* images
//!  ├─ 2. Charts    render donuts / capital bar / product pie via resvg
//!  ├─ 3. Fill      fill the form template's fields from the record (lopdf)
//!  ├─ 4. Render    rasterise the filled PDF via pdfium (spawn_blocking)
//!  ├─ 5. Compose   paste charts and photos onto the page rasters
//!  ├─ 6. Assemble  bind the planned pages into the final PDF
//!  ├─ 7. Mail      HTML body + inline previews + PDF attachment over SMTP
//!  └─ 8. Archive   production only: drive upload + history sheet entry
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use greenreport::{
//!     distribute, DriveAssetSource, GoogleArchiver, JsonRecordSource, RunConfig, SmtpConfig,
//!     SmtpMailer,
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::builder("/tmp/report-run", "templates").build()?;
//!     let source = JsonRecordSource::load(Path::new("projects.json"))?;
//!     let assets = DriveAssetSource::new("<token>");
//!     let mailer = SmtpMailer::new(&SmtpConfig::new(
//!         "smtp.example.com",
//!         "user",
//!         "secret",
//!         "Reports <reports@example.com>",
//!     ))?;
//!     let archiver = GoogleArchiver::new("<token>", "<spreadsheet id>", "History");
//!
//!     // Test run: mails go to the internal address only.
//!     let out = distribute(&[], false, &config, &source, &assets, &mailer, &archiver).await?;
//!     for project in &out.projects {
//!         println!("{}: {}", project.project_id, project.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `greenreport` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! greenreport = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod config;
pub mod distribute;
pub mod error;
pub mod layout;
pub mod mail;
pub mod pipeline;
pub mod record;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{Archiver, GoogleArchiver};
pub use config::{RunConfig, RunConfigBuilder, RECIPIENT_BATCH_CAP};
pub use distribute::{distribute, DistributionOutput, ProjectOutcome};
pub use error::ReportError;
pub use layout::{ChartJob, ReportLayout};
pub use mail::{ComposedMessage, Mailer, SmtpConfig, SmtpMailer};
pub use pipeline::assets::{AssetSource, DriveAssetSource, FetchedAssets, LocalAssetSource};
pub use record::{CapitalInExecution, ImageDescriptor, ProjectRecord};
pub use source::{JsonRecordSource, RecordSource};
