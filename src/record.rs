//! The project record: one project's report contents for one period.
//!
//! A record starts life as a nested source document (JSON-shaped), gets
//! flattened so template field names can be looked up directly, and is then
//! enriched in place: the layout injects image descriptors carrying the
//! fetched photo and chart paths. It is consumed by the pipeline and
//! discarded; nothing in it is persisted beyond the generated PDF.
//!
//! Both maps are insertion-ordered ([`indexmap`]): descriptor order decides
//! paste order in the compositor, and later pastes occlude earlier ones
//! where regions overlap.

use crate::error::ReportError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

// ── Well-known field names ───────────────────────────────────────────────

pub const KEY_PROJECT_ID: &str = "id_project";
pub const KEY_REPORT_NUMBER: &str = "report_number";
pub const KEY_PROJECT_NUMBER: &str = "project_number";
pub const KEY_PROJECT_NAME: &str = "project_name";
pub const KEY_PROJECT_PROGRESS: &str = "project_progress_pct";
pub const KEY_PHASE_PROGRESS: &str = "phase_progress_pct";
/// The one sub-object the flattener deliberately keeps nested: the bar
/// chart consumes its three monetary fields as a unit.
pub const KEY_CAPITAL: &str = "capital_in_execution";
pub const CAPITAL_FUNDED: &str = "funded";
pub const CAPITAL_EXECUTED: &str = "executed_to_date";
pub const CAPITAL_REMAINING: &str = "remaining";
pub const KEY_WOOD_PLASTIC: &str = "wood_plastic_pct";
pub const KEY_RAW_MATERIAL: &str = "raw_material_pct";
pub const KEY_INJECTION: &str = "injection_products_pct";
pub const KEY_OTHER: &str = "other_pct";
pub const KEY_STATEMENT: &str = "company_statement_with_image";
pub const KEY_INCLUDE_PAGE4: &str = "include_page4";
pub const KEY_IMAGES_FOLDER: &str = "images_folder";
pub const KEY_HISTORY_FOLDER: &str = "history_folder";

/// Placement of one raster image on one output page.
///
/// `x`/`y` are the top-left pixel offset on the rasterised page; `page` is
/// 1-based and must be within the template's page count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub x: i64,
    pub y: i64,
    pub page: usize,
}

/// The three monetary magnitudes of the capital-in-execution sub-object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapitalInExecution {
    pub funded: f64,
    pub executed_to_date: f64,
    pub remaining: f64,
}

/// Flat per-project, per-period data bundle driving one report.
#[derive(Debug, Clone, Default)]
pub struct ProjectRecord {
    fields: IndexMap<String, Value>,
    images: IndexMap<String, ImageDescriptor>,
}

impl ProjectRecord {
    /// Build a record by flattening a nested source document.
    ///
    /// Every nested object is merged into the top level, recursively,
    /// except [`KEY_CAPITAL`] which stays intact. Non-object documents
    /// produce an empty record.
    pub fn from_document(doc: &Value) -> Self {
        let mut fields = IndexMap::new();
        if let Value::Object(map) = doc {
            flatten_into(&mut fields, map);
        }
        ProjectRecord {
            fields,
            images: IndexMap::new(),
        }
    }

    /// The project id, or an empty string when the record lacks one.
    pub fn project_id(&self) -> &str {
        self.fields
            .get(KEY_PROJECT_ID)
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Field value rendered as template text, or `MissingField`.
    pub fn text(&self, key: &str) -> Result<String, ReportError> {
        self.fields
            .get(key)
            .map(value_to_text)
            .ok_or_else(|| self.missing(key))
    }

    /// Numeric field, or `MissingField` when absent or non-numeric.
    pub fn number(&self, key: &str) -> Result<f64, ReportError> {
        self.fields
            .get(key)
            .and_then(Value::as_f64)
            .ok_or_else(|| self.missing(key))
    }

    /// Boolean field; absent defaults to `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.fields
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The nested capital-in-execution sub-object.
    pub fn capital(&self) -> Result<CapitalInExecution, ReportError> {
        let obj = self
            .fields
            .get(KEY_CAPITAL)
            .and_then(Value::as_object)
            .ok_or_else(|| self.missing(KEY_CAPITAL))?;
        let field = |k: &str| -> Result<f64, ReportError> {
            obj.get(k).and_then(Value::as_f64).ok_or_else(|| {
                ReportError::MissingField {
                    project: self.project_id().to_string(),
                    key: format!("{KEY_CAPITAL}.{k}"),
                }
            })
        };
        Ok(CapitalInExecution {
            funded: field(CAPITAL_FUNDED)?,
            executed_to_date: field(CAPITAL_EXECUTED)?,
            remaining: field(CAPITAL_REMAINING)?,
        })
    }

    /// Scalar fields rendered as text, for the template filler.
    ///
    /// The nested capital object is skipped; its values reach the page
    /// through the bar chart, not through form fields.
    pub fn display_fields(&self) -> impl Iterator<Item = (&str, String)> {
        self.fields
            .iter()
            .filter(|(k, v)| k.as_str() != KEY_CAPITAL && !v.is_object())
            .map(|(k, v)| (k.as_str(), value_to_text(v)))
    }

    pub fn insert_image(&mut self, key: impl Into<String>, desc: ImageDescriptor) {
        self.images.insert(key.into(), desc);
    }

    /// Remove a descriptor, preserving the order of the rest.
    pub fn remove_image(&mut self, key: &str) -> Option<ImageDescriptor> {
        self.images.shift_remove(key)
    }

    /// Descriptors in insertion order.
    pub fn images(&self) -> impl Iterator<Item = (&str, &ImageDescriptor)> {
        self.images.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_image(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

    fn missing(&self, key: &str) -> ReportError {
        ReportError::MissingField {
            project: self.project_id().to_string(),
            key: key.to_string(),
        }
    }
}

fn flatten_into(out: &mut IndexMap<String, Value>, map: &serde_json::Map<String, Value>) {
    for (key, value) in map {
        match value {
            Value::Object(sub) if key != KEY_CAPITAL => flatten_into(out, sub),
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Render a scalar field the way it should appear in a form field.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ProjectRecord {
        ProjectRecord::from_document(&json!({
            "id_project": "PM-X7",
            "details": {
                "project_name": "Solar Farm",
                "metrics": { "project_progress_pct": 62.5 }
            },
            "capital_in_execution": {
                "funded": 350.0,
                "executed_to_date": 120.5,
                "remaining": 229.5
            },
            "include_page4": true
        }))
    }

    #[test]
    fn flattens_nested_objects_to_top_level() {
        let r = sample();
        assert_eq!(r.text("project_name").unwrap(), "Solar Farm");
        assert_eq!(r.number("project_progress_pct").unwrap(), 62.5);
        assert!(r.get("details").is_none());
        assert!(r.get("metrics").is_none());
    }

    #[test]
    fn capital_sub_object_stays_nested() {
        let r = sample();
        assert!(r.get(KEY_CAPITAL).unwrap().is_object());
        assert!(r.get(CAPITAL_FUNDED).is_none());
        let cap = r.capital().unwrap();
        assert_eq!(cap.funded, 350.0);
        assert_eq!(cap.remaining, 229.5);
    }

    #[test]
    fn missing_field_error_names_project() {
        let r = sample();
        let err = r.text("numero_magico").unwrap_err();
        match err {
            ReportError::MissingField { project, key } => {
                assert_eq!(project, "PM-X7");
                assert_eq!(key, "numero_magico");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn display_fields_skip_capital_object() {
        let r = sample();
        let keys: Vec<&str> = r.display_fields().map(|(k, _)| k).collect();
        assert!(keys.contains(&"id_project"));
        assert!(!keys.contains(&KEY_CAPITAL));
    }

    #[test]
    fn image_order_is_insertion_order_and_survives_removal() {
        let mut r = sample();
        let desc = |page| ImageDescriptor {
            path: PathBuf::from("/x.png"),
            width: 10,
            height: 10,
            x: 0,
            y: 0,
            page,
        };
        r.insert_image("img_a", desc(1));
        r.insert_image("img_b", desc(1));
        r.insert_image("img_c", desc(2));
        r.remove_image("img_b");
        let keys: Vec<&str> = r.images().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["img_a", "img_c"]);
    }

    #[test]
    fn flag_defaults_false_when_absent() {
        let r = sample();
        assert!(r.flag(KEY_INCLUDE_PAGE4));
        assert!(!r.flag("no_such_flag"));
    }
}
