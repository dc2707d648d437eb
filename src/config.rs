//! Configuration for a report distribution run.
//!
//! All pipeline behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. Keeping every knob in one struct makes it trivial to
//! share configs across runs and diff two runs to understand why their
//! outputs differ.
//!
//! The working directory is an explicit per-run parameter rather than a fixed
//! shared path: two invocations with distinct working directories cannot
//! corrupt each other's scratch files, and tests can point a run at a
//! temporary directory without leaking state between cases.

use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recipients per message batch. SMTP relays commonly reject messages with
/// more than ~100 envelope recipients, so larger lists are chunked.
pub const RECIPIENT_BATCH_CAP: usize = 98;

/// Configuration for a distribution run.
///
/// Built via [`RunConfig::builder()`].
///
/// # Example
/// ```rust
/// use greenreport::RunConfig;
///
/// let config = RunConfig::builder("/tmp/run-42", "templates")
///     .dpi(200)
///     .internal_address("ops@example.com")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Per-run working directory for fetched assets, chart images, the
    /// filled template, composited page images and the final PDF.
    ///
    /// Created on demand. Reusing one directory across concurrent runs is
    /// not safe; every scratch file name in it is fixed.
    pub workdir: PathBuf,

    /// Directory holding the fillable PDF templates, one per layout.
    pub template_dir: PathBuf,

    /// Rasterisation DPI for the filled template. Range: 72–400. Default: 200.
    ///
    /// Descriptor geometry is expressed in absolute pixels of a 200-DPI
    /// letter page (1700 × 2200 px). Changing the DPI without rescaling the
    /// layout tables misplaces every pasted image, so this knob exists for
    /// template redesigns, not per-run tuning.
    pub dpi: u32,

    /// Project id selecting the town layout. Every other id gets the
    /// standard layout. Default: `"PM-SC1"`.
    pub town_project_id: String,

    /// Address that receives the report on non-production (test) runs, and
    /// is prepended to the real list on production runs so the team keeps a
    /// copy of everything that went out.
    pub internal_address: String,

    /// Maximum envelope recipients per message. Default: [`RECIPIENT_BATCH_CAP`].
    pub batch_cap: usize,

    /// JPEG quality for page images embedded in the final PDF. Default: 90.
    pub jpeg_quality: u8,
}

impl RunConfig {
    /// Create a new builder with the two required paths.
    pub fn builder(
        workdir: impl Into<PathBuf>,
        template_dir: impl Into<PathBuf>,
    ) -> RunConfigBuilder {
        RunConfigBuilder {
            config: RunConfig {
                workdir: workdir.into(),
                template_dir: template_dir.into(),
                dpi: 200,
                town_project_id: "PM-SC1".to_string(),
                internal_address: "reports@greenreport.invalid".to_string(),
                batch_cap: RECIPIENT_BATCH_CAP,
                jpeg_quality: 90,
            },
        }
    }
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn town_project_id(mut self, id: impl Into<String>) -> Self {
        self.config.town_project_id = id.into();
        self
    }

    pub fn internal_address(mut self, addr: impl Into<String>) -> Self {
        self.config.internal_address = addr.into();
        self
    }

    pub fn batch_cap(mut self, cap: usize) -> Self {
        self.config.batch_cap = cap;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, ReportError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ReportError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.batch_cap == 0 {
            return Err(ReportError::InvalidConfig(
                "Recipient batch cap must be ≥ 1".into(),
            ));
        }
        if c.internal_address.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "Internal address must not be empty".into(),
            ));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ReportError::InvalidConfig(format!(
                "JPEG quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        Ok(self.config)
    }
}
