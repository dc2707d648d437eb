//! Production-run archival: upload the final PDF to the project's history
//! folder on the shared drive and log the shareable link in the history
//! spreadsheet.
//!
//! The spreadsheet is addressed by labels, not fixed coordinates: the row
//! whose first cell is the project id, the column whose header is
//! `Month {report_number}`. Reordering rows or inserting months in the
//! sheet therefore never corrupts the log.

use crate::error::ReportError;
use crate::pipeline::assets::folder_id_from_url;
use crate::record::{ProjectRecord, KEY_HISTORY_FOLDER, KEY_REPORT_NUMBER};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::info;

/// Archival seam. Returns the shareable link of the uploaded report.
pub trait Archiver {
    fn archive(
        &self,
        record: &ProjectRecord,
        pdf_path: &Path,
    ) -> impl std::future::Future<Output = Result<String, ReportError>> + Send;
}

/// Google Drive + Sheets archiver over the REST APIs.
pub struct GoogleArchiver {
    client: reqwest::Client,
    token: String,
    spreadsheet_id: String,
    sheet_tab: String,
}

#[derive(Deserialize)]
struct UploadedFile {
    #[serde(rename = "webViewLink")]
    web_view_link: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl GoogleArchiver {
    pub fn new(
        token: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        sheet_tab: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            spreadsheet_id: spreadsheet_id.into(),
            sheet_tab: sheet_tab.into(),
        }
    }

    async fn upload_pdf(
        &self,
        folder_id: &str,
        name: &str,
        pdf_path: &Path,
    ) -> Result<String, ReportError> {
        let bytes = std::fs::read(pdf_path).map_err(|_| ReportError::AssetMissing {
            path: pdf_path.to_path_buf(),
        })?;
        let metadata = json!({ "name": name, "parents": [folder_id] }).to_string();
        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata)
                    .mime_str("application/json")
                    .map_err(|e| ReportError::transport("drive", e.to_string()))?,
            )
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes)
                    .file_name(name.to_string())
                    .mime_str("application/pdf")
                    .map_err(|e| ReportError::transport("drive", e.to_string()))?,
            );
        let uploaded: UploadedFile = self
            .client
            .post("https://www.googleapis.com/upload/drive/v3/files")
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id,webViewLink")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReportError::transport("drive", e.to_string()))?
            .error_for_status()
            .map_err(|e| ReportError::transport("drive", e.to_string()))?
            .json()
            .await
            .map_err(|e| ReportError::transport("drive", e.to_string()))?;
        Ok(uploaded.web_view_link)
    }

    async fn log_link(
        &self,
        project_id: &str,
        column_label: &str,
        link: &str,
    ) -> Result<(), ReportError> {
        let grid: ValueRange = self
            .client
            .get(format!(
                "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}",
                self.spreadsheet_id, self.sheet_tab
            ))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ReportError::transport("sheets", e.to_string()))?
            .error_for_status()
            .map_err(|e| ReportError::transport("sheets", e.to_string()))?
            .json()
            .await
            .map_err(|e| ReportError::transport("sheets", e.to_string()))?;

        let (row, col) = locate_cell(&grid.values, project_id, column_label).ok_or_else(|| {
            ReportError::transport(
                "sheets",
                format!("no cell for row '{project_id}' and column '{column_label}'"),
            )
        })?;
        let cell = format!("{}!{}{}", self.sheet_tab, column_letter(col), row + 1);

        self.client
            .put(format!(
                "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}",
                self.spreadsheet_id, cell
            ))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [[link]] }))
            .send()
            .await
            .map_err(|e| ReportError::transport("sheets", e.to_string()))?
            .error_for_status()
            .map_err(|e| ReportError::transport("sheets", e.to_string()))?;
        Ok(())
    }
}

impl Archiver for GoogleArchiver {
    async fn archive(&self, record: &ProjectRecord, pdf_path: &Path) -> Result<String, ReportError> {
        let project_id = record.project_id().to_string();
        let report_number = record.text(KEY_REPORT_NUMBER)?;
        let folder_url = record.text(KEY_HISTORY_FOLDER)?;
        let folder_id = folder_id_from_url(&folder_url).ok_or_else(|| {
            ReportError::InvalidInput(format!("cannot parse folder id from '{folder_url}'"))
        })?;

        let name = format!("Report_{report_number}_{project_id}");
        let link = self.upload_pdf(folder_id, &name, pdf_path).await?;
        info!("Archived {name} → {link}");

        self.log_link(&project_id, &format!("Month {report_number}"), &link)
            .await?;
        Ok(link)
    }
}

/// Find the 0-based (row, column) whose row label (first cell) and header
/// label (first row) match.
fn locate_cell(values: &[Vec<String>], row_label: &str, col_label: &str) -> Option<(usize, usize)> {
    let header = values.first()?;
    let col = header.iter().position(|c| c.trim() == col_label)?;
    let row = values
        .iter()
        .position(|r| r.first().is_some_and(|c| c.trim() == row_label))?;
    Some((row, col))
}

/// 0-based column index to A1 letters (0 → A, 25 → Z, 26 → AA).
fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<Vec<String>> {
        vec![
            vec!["Project".into(), "Month 1".into(), "Month 2".into()],
            vec!["PM-A1".into(), "link-a1".into()],
            vec!["PM-SC1".into()],
        ]
    }

    #[test]
    fn locates_cell_by_row_and_column_labels() {
        assert_eq!(locate_cell(&grid(), "PM-SC1", "Month 2"), Some((2, 2)));
        assert_eq!(locate_cell(&grid(), "PM-A1", "Month 1"), Some((1, 1)));
        assert_eq!(locate_cell(&grid(), "PM-Z9", "Month 1"), None);
        assert_eq!(locate_cell(&grid(), "PM-A1", "Month 9"), None);
    }

    #[test]
    fn labels_are_trimmed_before_matching() {
        let grid = vec![
            vec!["Project".into(), " Month 1 ".into()],
            vec!["  PM-A1".into()],
        ];
        assert_eq!(locate_cell(&grid, "PM-A1", "Month 1"), Some((1, 1)));
    }

    #[test]
    fn column_letters_cover_multi_letter_columns() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
    }
}
