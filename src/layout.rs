//! Report layouts: which template, charts and image placements a project
//! type uses.
//!
//! The project-type branch lives here as a tagged variant instead of being
//! scattered through the pipeline. One project id (the town sentinel,
//! [`crate::config::RunConfig::town_project_id`]) selects the town layout;
//! every other id selects the standard layout. The two differ in template,
//! chart set, descriptor geometry and page plan.
//!
//! Geometry is absolute pixels on a 200-DPI letter-page raster (1700 × 2200)
//! and must stay in lockstep with the fillable templates.

use crate::config::RunConfig;
use crate::error::ReportError;
use crate::record::{self, ImageDescriptor, ProjectRecord};
use std::path::{Path, PathBuf};

// Working-file names for rendered charts.
pub const CHART_PROJECT_PROGRESS: &str = "chart_project_progress.png";
pub const CHART_PHASE_PROGRESS: &str = "chart_phase_progress.png";
pub const CHART_CAPITAL: &str = "chart_capital.png";
pub const CHART_PRODUCT_MIX: &str = "chart_product_mix.png";

/// One chart the layout needs rendered before compositing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartJob {
    /// Donut for a single percentage field.
    Donut {
        pct_key: &'static str,
        file: &'static str,
    },
    /// Horizontal bar over the capital-in-execution triple.
    CapitalBar { file: &'static str },
    /// Product-mix pie over the four category percentage fields.
    ProductMixPie { file: &'static str },
}

/// Per-project-type report layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// The sentinel town project: bar + pie charts, four fixed pages.
    Town,
    /// Everything else: two donuts + bar, page 4 behind a record flag.
    Standard,
}

impl ReportLayout {
    /// Select the layout for a project id.
    pub fn for_project(project_id: &str, config: &RunConfig) -> Self {
        if project_id == config.town_project_id {
            ReportLayout::Town
        } else {
            ReportLayout::Standard
        }
    }

    /// The fillable template for this layout, under the template directory.
    pub fn template_path(&self, config: &RunConfig) -> PathBuf {
        let name = match self {
            ReportLayout::Town => "template_town.pdf",
            ReportLayout::Standard => "template_standard.pdf",
        };
        config.template_dir.join(name)
    }

    /// Charts to render for this layout, in render order.
    pub fn chart_jobs(&self) -> &'static [ChartJob] {
        match self {
            ReportLayout::Town => &[
                ChartJob::CapitalBar {
                    file: CHART_CAPITAL,
                },
                ChartJob::ProductMixPie {
                    file: CHART_PRODUCT_MIX,
                },
            ],
            ReportLayout::Standard => &[
                ChartJob::Donut {
                    pct_key: record::KEY_PROJECT_PROGRESS,
                    file: CHART_PROJECT_PROGRESS,
                },
                ChartJob::Donut {
                    pct_key: record::KEY_PHASE_PROGRESS,
                    file: CHART_PHASE_PROGRESS,
                },
                ChartJob::CapitalBar {
                    file: CHART_CAPITAL,
                },
            ],
        }
    }

    /// Inject this layout's image descriptors into the record.
    ///
    /// `main_asset` is the fetched hero photo (required); `statement_asset`
    /// is the optional "what the company says" illustration, only placed by
    /// the standard layout and only when present. Insertion order here is
    /// paste order in the compositor.
    pub fn inject_descriptors(
        &self,
        record: &mut ProjectRecord,
        workdir: &Path,
        main_asset: Option<&Path>,
        statement_asset: Option<&Path>,
    ) -> Result<(), ReportError> {
        let main = main_asset.ok_or_else(|| ReportError::AssetMissing {
            path: workdir.join("1.*"),
        })?;

        match self {
            ReportLayout::Town => {
                record.insert_image(
                    "img_main",
                    ImageDescriptor {
                        path: main.to_path_buf(),
                        width: 530,
                        height: 530,
                        x: 950,
                        y: 200,
                        page: 4,
                    },
                );
                record.insert_image(
                    "img_capital_chart",
                    ImageDescriptor {
                        path: workdir.join(CHART_CAPITAL),
                        width: 1350,
                        height: 400,
                        x: 160,
                        y: 1620,
                        page: 2,
                    },
                );
                record.insert_image(
                    "img_product_mix",
                    ImageDescriptor {
                        path: workdir.join(CHART_PRODUCT_MIX),
                        width: 715,
                        height: 550,
                        x: 880,
                        y: 1320,
                        page: 3,
                    },
                );
            }
            ReportLayout::Standard => {
                record.insert_image(
                    "img_main",
                    ImageDescriptor {
                        path: main.to_path_buf(),
                        width: 400,
                        height: 400,
                        x: 1110,
                        y: 320,
                        page: 2,
                    },
                );
                record.insert_image(
                    "img_project_progress",
                    ImageDescriptor {
                        path: workdir.join(CHART_PROJECT_PROGRESS),
                        width: 220,
                        height: 220,
                        x: 180,
                        y: 1810,
                        page: 2,
                    },
                );
                record.insert_image(
                    "img_phase_progress",
                    ImageDescriptor {
                        path: workdir.join(CHART_PHASE_PROGRESS),
                        width: 220,
                        height: 220,
                        x: 555,
                        y: 1810,
                        page: 2,
                    },
                );
                record.insert_image(
                    "img_capital_chart",
                    ImageDescriptor {
                        path: workdir.join(CHART_CAPITAL),
                        width: 1350,
                        height: 400,
                        x: 180,
                        y: 460,
                        page: 3,
                    },
                );
                if let Some(statement) = statement_asset {
                    record.insert_image(
                        "img_company_statement",
                        ImageDescriptor {
                            path: statement.to_path_buf(),
                            width: 475,
                            height: 475,
                            x: 1080,
                            y: 1280,
                            page: 3,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    /// 1-based pages of the rasterised template that make up the final PDF.
    ///
    /// The town report is always four pages. The standard report ships three
    /// pages plus a conditional fourth behind the record's page-4 flag.
    pub fn page_plan(&self, record: &ProjectRecord) -> Vec<usize> {
        match self {
            ReportLayout::Town => vec![1, 2, 3, 4],
            ReportLayout::Standard => {
                if record.flag(record::KEY_INCLUDE_PAGE4) {
                    vec![1, 2, 3, 4]
                } else {
                    vec![1, 2, 3]
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> RunConfig {
        RunConfig::builder("/tmp/w", "/tmp/templates").build().unwrap()
    }

    #[test]
    fn sentinel_id_selects_town_layout() {
        let cfg = config();
        assert_eq!(ReportLayout::for_project("PM-SC1", &cfg), ReportLayout::Town);
        assert_eq!(
            ReportLayout::for_project("standard-42", &cfg),
            ReportLayout::Standard
        );
    }

    #[test]
    fn town_chart_set_is_bar_plus_pie() {
        let jobs = ReportLayout::Town.chart_jobs();
        assert_eq!(jobs.len(), 2);
        assert!(matches!(jobs[0], ChartJob::CapitalBar { .. }));
        assert!(matches!(jobs[1], ChartJob::ProductMixPie { .. }));
    }

    #[test]
    fn standard_chart_set_is_two_donuts_plus_bar() {
        let jobs = ReportLayout::Standard.chart_jobs();
        assert_eq!(jobs.len(), 3);
        assert!(matches!(jobs[0], ChartJob::Donut { .. }));
        assert!(matches!(jobs[1], ChartJob::Donut { .. }));
        assert!(matches!(jobs[2], ChartJob::CapitalBar { .. }));
    }

    #[test]
    fn descriptor_order_matches_table_order() {
        let mut record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        ReportLayout::Standard
            .inject_descriptors(
                &mut record,
                Path::new("/tmp/w"),
                Some(Path::new("/tmp/w/1.png")),
                Some(Path::new("/tmp/w/2.png")),
            )
            .unwrap();
        let keys: Vec<&str> = record.images().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "img_main",
                "img_project_progress",
                "img_phase_progress",
                "img_capital_chart",
                "img_company_statement"
            ]
        );
    }

    #[test]
    fn statement_descriptor_skipped_without_asset() {
        let mut record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        ReportLayout::Standard
            .inject_descriptors(
                &mut record,
                Path::new("/tmp/w"),
                Some(Path::new("/tmp/w/1.png")),
                None,
            )
            .unwrap();
        assert!(!record.has_image("img_company_statement"));
    }

    #[test]
    fn missing_main_asset_is_an_error() {
        let mut record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        let err = ReportLayout::Town
            .inject_descriptors(&mut record, Path::new("/tmp/w"), None, None)
            .unwrap_err();
        assert!(matches!(err, ReportError::AssetMissing { .. }));
    }

    #[test]
    fn standard_page_plan_honours_page4_flag() {
        let with_flag = ProjectRecord::from_document(&json!({"include_page4": true}));
        let without = ProjectRecord::from_document(&json!({"include_page4": false}));
        assert_eq!(ReportLayout::Standard.page_plan(&with_flag), vec![1, 2, 3, 4]);
        assert_eq!(ReportLayout::Standard.page_plan(&without), vec![1, 2, 3]);
        assert_eq!(ReportLayout::Town.page_plan(&without), vec![1, 2, 3, 4]);
    }
}
