//! Record and recipient lookup.
//!
//! The production database sits behind [`RecordSource`]; the crate ships a
//! JSON-file-backed implementation usable from the CLI and in tests. A
//! source file holds one document per project plus a recipient list:
//!
//! ```json
//! {
//!   "projects": [ { "id_project": "PM-X7", ... }, ... ],
//!   "recipients": { "PM-X7": ["ana@example.com", "luis@example.com"] }
//! }
//! ```

use crate::error::ReportError;
use crate::record::ProjectRecord;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Where project records and their recipient lists come from.
pub trait RecordSource {
    /// All project records for the current period, in source order.
    fn records(&self) -> impl std::future::Future<Output = Result<Vec<ProjectRecord>, ReportError>> + Send;

    /// Investor addresses subscribed to a project. Unknown project ids are
    /// an error, an empty list is not.
    fn recipients(
        &self,
        project_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, ReportError>> + Send;
}

#[derive(Deserialize)]
struct SourceFile {
    #[serde(default)]
    projects: Vec<serde_json::Value>,
    #[serde(default)]
    recipients: HashMap<String, Vec<String>>,
}

/// JSON-file-backed record source.
#[derive(Debug)]
pub struct JsonRecordSource {
    projects: Vec<serde_json::Value>,
    recipients: HashMap<String, Vec<String>>,
}

impl JsonRecordSource {
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReportError::InvalidInput(format!("cannot read '{}': {e}", path.display()))
        })?;
        let file: SourceFile = serde_json::from_str(&raw).map_err(|e| {
            ReportError::InvalidInput(format!("malformed source file '{}': {e}", path.display()))
        })?;
        debug!(
            "Loaded {} project documents from {}",
            file.projects.len(),
            path.display()
        );
        Ok(Self {
            projects: file.projects,
            recipients: file.recipients,
        })
    }
}

impl RecordSource for JsonRecordSource {
    async fn records(&self) -> Result<Vec<ProjectRecord>, ReportError> {
        Ok(self
            .projects
            .iter()
            .map(ProjectRecord::from_document)
            .collect())
    }

    async fn recipients(&self, project_id: &str) -> Result<Vec<String>, ReportError> {
        let raw = self.recipients.get(project_id).ok_or_else(|| {
            ReportError::UnknownProject {
                project: project_id.to_string(),
            }
        })?;
        Ok(clean_addresses(raw))
    }
}

/// Trim addresses and drop empties; sheet exports are full of both.
pub(crate) fn clean_addresses(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn source_file(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[tokio::test]
    async fn loads_records_and_recipients() {
        let f = source_file(
            r#"{
                "projects": [
                    { "id_project": "PM-A1", "project_name": "Alpha" },
                    { "id_project": "PM-B2", "project_name": "Beta" }
                ],
                "recipients": { "PM-A1": [" ana@example.com ", "", "luis@example.com"] }
            }"#,
        );
        let source = JsonRecordSource::load(f.path()).unwrap();
        let records = source.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].project_id(), "PM-A1");

        let recipients = source.recipients("PM-A1").await.unwrap();
        assert_eq!(recipients, vec!["ana@example.com", "luis@example.com"]);
    }

    #[tokio::test]
    async fn unknown_project_is_an_error_but_empty_list_is_not() {
        let f = source_file(r#"{ "projects": [], "recipients": { "PM-A1": [] } }"#);
        let source = JsonRecordSource::load(f.path()).unwrap();
        assert!(source.recipients("PM-A1").await.unwrap().is_empty());
        let err = source.recipients("PM-Z9").await.unwrap_err();
        assert!(matches!(err, ReportError::UnknownProject { .. }));
    }

    #[test]
    fn malformed_file_is_invalid_input() {
        let f = source_file("not json");
        let err = JsonRecordSource::load(f.path()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidInput(_)));
    }
}
