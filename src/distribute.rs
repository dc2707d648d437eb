//! The distribution driver: runs the whole pipeline for each selected
//! project, strictly sequentially.
//!
//! Stage order per record: purge stale assets, fetch project photos, pick
//! the layout, render charts, inject image descriptors, fill the template,
//! rasterise, composite, assemble the PDF, mail it, and on production runs
//! archive and log it. There are no retries and no partial-success
//! recovery: the first failing stage aborts the run with its typed error.

use crate::archive::Archiver;
use crate::config::RunConfig;
use crate::error::ReportError;
use crate::layout::{ChartJob, ReportLayout};
use crate::mail::{compose_report_message, dispatch_report, Mailer};
use crate::pipeline::assemble::{images_to_pdf, REPORT_PDF};
use crate::pipeline::assets::{purge_stale_assets, AssetSource, FetchedAssets};
use crate::pipeline::charts;
use crate::pipeline::compose::{composite_pages, page_file};
use crate::pipeline::fill::fill_template;
use crate::pipeline::render::rasterise_pages;
use crate::record::{ProjectRecord, KEY_IMAGES_FOLDER, KEY_STATEMENT};
use crate::source::RecordSource;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, Instrument};

/// What happened to one project's report.
#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub project_id: String,
    /// Human-readable delivery summary, e.g. `"sent to 42 recipient(s)"`.
    pub message: String,
    pub recipients: Vec<String>,
    pub pdf_path: PathBuf,
    /// Shareable archive link, present on production runs.
    pub archive_link: Option<String>,
}

/// Outcome of a whole distribution run.
#[derive(Debug, Clone, Default)]
pub struct DistributionOutput {
    pub projects: Vec<ProjectOutcome>,
}

/// Generate and distribute reports for the selected projects.
///
/// An empty `project_ids` slice selects every record the source returns.
pub async fn distribute<S, A, M, R>(
    project_ids: &[String],
    production: bool,
    config: &RunConfig,
    source: &S,
    assets: &A,
    mailer: &M,
    archiver: &R,
) -> Result<DistributionOutput, ReportError>
where
    S: RecordSource + Sync,
    A: AssetSource + Sync,
    M: Mailer + Sync,
    R: Archiver + Sync,
{
    std::fs::create_dir_all(&config.workdir).map_err(|e| ReportError::OutputWriteFailed {
        path: config.workdir.clone(),
        source: e,
    })?;

    let records = select_records(source.records().await?, project_ids)?;
    info!(
        "Distributing {} report(s) ({} run)",
        records.len(),
        if production { "production" } else { "test" }
    );

    let mut output = DistributionOutput::default();
    for record in records {
        let span = info_span!("report", project = %record.project_id());
        let outcome =
            process_record(record, production, config, assets, mailer, archiver, source)
                .instrument(span)
                .await?;
        output.projects.push(outcome);
    }
    Ok(output)
}

#[allow(clippy::too_many_arguments)]
async fn process_record<A, M, R, S>(
    mut record: ProjectRecord,
    production: bool,
    config: &RunConfig,
    assets: &A,
    mailer: &M,
    archiver: &R,
    source: &S,
) -> Result<ProjectOutcome, ReportError>
where
    A: AssetSource + Sync,
    M: Mailer + Sync,
    R: Archiver + Sync,
    S: RecordSource + Sync,
{
    let project_id = record.project_id().to_string();
    let workdir = &config.workdir;

    purge_stale_assets(workdir)?;
    let folder_url = record.text(KEY_IMAGES_FOLDER)?;
    let fetched = assets.fetch(&folder_url, workdir).await?;

    let layout = ReportLayout::for_project(&project_id, config);
    render_charts(&record, layout, workdir)?;
    let statement = statement_asset(&record, &fetched);
    layout.inject_descriptors(&mut record, workdir, fetched.main.as_deref(), statement)?;

    let template = layout.template_path(config);
    let filled = fill_template(&record, &template, workdir)?;
    let rasters = rasterise_pages(&filled, config.dpi).await?;
    let page_count = rasters.len();
    composite_pages(rasters, &record, workdir)?;

    let mut selected: Vec<PathBuf> = Vec::new();
    for page in layout.page_plan(&record) {
        if page == 0 || page > page_count {
            return Err(ReportError::PageOutOfRange {
                key: "page plan".to_string(),
                page,
                total: page_count,
            });
        }
        selected.push(page_file(workdir, page));
    }

    let pdf_path = workdir.join(REPORT_PDF);
    images_to_pdf(&selected, &pdf_path, config.jpeg_quality)?;

    let recipients = source.recipients(&project_id).await?;
    let message = compose_report_message(&record, &selected, &pdf_path)?;
    let summary = dispatch_report(mailer, &message, &recipients, config, production).await?;

    let archive_link = if production {
        Some(archiver.archive(&record, &pdf_path).await?)
    } else {
        None
    };

    info!("Report done: {summary}");
    Ok(ProjectOutcome {
        project_id,
        message: summary,
        recipients,
        pdf_path,
        archive_link,
    })
}

/// Render every chart the layout asks for into the working directory.
fn render_charts(
    record: &ProjectRecord,
    layout: ReportLayout,
    workdir: &Path,
) -> Result<(), ReportError> {
    for job in layout.chart_jobs() {
        match job {
            ChartJob::Donut { pct_key, file } => {
                charts::donut(record.number(pct_key)?, &workdir.join(file))?;
            }
            ChartJob::CapitalBar { file } => {
                let capital = record.capital()?;
                charts::capital_bar(
                    capital.funded,
                    capital.executed_to_date,
                    capital.remaining,
                    &workdir.join(file),
                )?;
            }
            ChartJob::ProductMixPie { file } => {
                charts::product_mix_pie(
                    record.number(crate::record::KEY_WOOD_PLASTIC)?,
                    record.number(crate::record::KEY_RAW_MATERIAL)?,
                    record.number(crate::record::KEY_INJECTION)?,
                    record.number(crate::record::KEY_OTHER)?,
                    &workdir.join(file),
                )?;
            }
        }
    }
    Ok(())
}

/// The statement photo only renders when the record carries non-empty
/// statement text and the photo was actually fetched.
fn statement_asset<'a>(record: &ProjectRecord, fetched: &'a FetchedAssets) -> Option<&'a Path> {
    let has_text = record
        .get(KEY_STATEMENT)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if has_text {
        fetched.statement.as_deref()
    } else {
        None
    }
}

/// Keep the records matching the requested ids, in request order. An empty
/// request keeps everything in source order.
fn select_records(
    records: Vec<ProjectRecord>,
    project_ids: &[String],
) -> Result<Vec<ProjectRecord>, ReportError> {
    if project_ids.is_empty() {
        return Ok(records);
    }
    let mut records: Vec<Option<ProjectRecord>> = records.into_iter().map(Some).collect();
    let mut selected = Vec::with_capacity(project_ids.len());
    for id in project_ids {
        let found = records
            .iter_mut()
            .find(|r| r.as_ref().is_some_and(|r| r.project_id() == id))
            .and_then(Option::take)
            .ok_or_else(|| ReportError::UnknownProject {
                project: id.clone(),
            })?;
        selected.push(found);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::KEY_PROJECT_ID;
    use serde_json::json;

    fn record(id: &str, extra: Value) -> ProjectRecord {
        let mut doc = json!({ KEY_PROJECT_ID: id });
        if let (Value::Object(base), Value::Object(more)) = (&mut doc, extra) {
            base.extend(more);
        }
        ProjectRecord::from_document(&doc)
    }

    #[test]
    fn empty_selection_keeps_source_order() {
        let records = vec![record("a", json!({})), record("b", json!({}))];
        let out = select_records(records, &[]).unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.project_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn selection_follows_request_order_and_rejects_unknown_ids() {
        let records = vec![record("a", json!({})), record("b", json!({}))];
        let out = select_records(records.clone(), &["b".into(), "a".into()]).unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.project_id()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let err = select_records(records, &["z".into()]).unwrap_err();
        assert!(matches!(err, ReportError::UnknownProject { .. }));
    }

    #[test]
    fn statement_asset_needs_both_text_and_photo() {
        let with_photo = FetchedAssets {
            main: Some(PathBuf::from("/w/1.png")),
            statement: Some(PathBuf::from("/w/2.png")),
        };
        let without_photo = FetchedAssets {
            main: Some(PathBuf::from("/w/1.png")),
            statement: None,
        };

        let with_text = record("p", json!({ KEY_STATEMENT: "We are on track." }));
        let blank_text = record("p", json!({ KEY_STATEMENT: "   " }));
        let no_text = record("p", json!({}));

        assert_eq!(
            statement_asset(&with_text, &with_photo),
            Some(Path::new("/w/2.png"))
        );
        assert!(statement_asset(&blank_text, &with_photo).is_none());
        assert!(statement_asset(&no_text, &with_photo).is_none());
        assert!(statement_asset(&with_text, &without_photo).is_none());
    }
}
