//! Template filling: write record values into a fillable PDF form.
//!
//! Two passes over each page's widget annotations, mirroring how the
//! template is authored: first set `/V` for every field whose name matches
//! a record key, then hide every widget that stayed unfilled so optional
//! fields other project types use don't leave stray empty boxes on the
//! rendered page. A record key with no matching field is silently ignored.
//!
//! `NeedAppearances` is set on the AcroForm so the rasteriser regenerates
//! field appearance streams from the new values.

use crate::error::ReportError;
use crate::record::ProjectRecord;
use lopdf::{Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the filled intermediate PDF inside the working directory.
pub const FILLED_PDF: &str = "filled_template.pdf";

/// Annotation flag bit 2 (Hidden). Bit 1 (Invisible) only suppresses
/// annotations without a known handler, which widgets always have.
const FLAG_HIDDEN: i64 = 2;

/// Fill `template` with the record's scalar fields and write the result to
/// the working directory, returning its path.
pub fn fill_template(
    record: &ProjectRecord,
    template: &Path,
    workdir: &Path,
) -> Result<PathBuf, ReportError> {
    let mut doc = Document::load(template).map_err(|e| ReportError::InvalidTemplate {
        path: template.to_path_buf(),
        detail: e.to_string(),
    })?;

    let values: HashMap<String, String> = record
        .display_fields()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    let mut filled_total = 0usize;
    let mut hidden_total = 0usize;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in pages {
        let annots = page_annotation_ids(&doc, page_id);

        // Pass 1: fill matching fields.
        let mut filled: HashSet<String> = HashSet::new();
        for &annot_id in &annots {
            let Some(name) = widget_field_name(&doc, annot_id) else {
                continue;
            };
            if let Some(value) = values.get(&name) {
                if let Ok(dict) = doc
                    .get_object_mut(annot_id)
                    .and_then(Object::as_dict_mut)
                {
                    dict.set("V", Object::string_literal(value.as_str()));
                    // Drop a stale appearance stream so NeedAppearances wins.
                    dict.remove(b"AP");
                    filled.insert(name);
                    filled_total += 1;
                }
            }
        }

        // Pass 2: hide every widget on the page that stayed unfilled.
        for &annot_id in &annots {
            let Some(name) = widget_field_name(&doc, annot_id) else {
                continue;
            };
            if !filled.contains(&name) {
                if let Ok(dict) = doc
                    .get_object_mut(annot_id)
                    .and_then(Object::as_dict_mut)
                {
                    dict.set("F", Object::Integer(FLAG_HIDDEN));
                    hidden_total += 1;
                }
            }
        }
    }

    set_need_appearances(&mut doc);

    std::fs::create_dir_all(workdir).map_err(|e| ReportError::OutputWriteFailed {
        path: workdir.to_path_buf(),
        source: e,
    })?;
    let out = workdir.join(FILLED_PDF);
    doc.save(&out).map_err(|e| ReportError::OutputWriteFailed {
        path: out.clone(),
        source: std::io::Error::other(e),
    })?;

    info!(
        "Filled template {}: {filled_total} fields set, {hidden_total} hidden",
        template.display()
    );
    Ok(out)
}

/// Annotation object ids of a page, resolving an indirect `/Annots` array.
fn page_annotation_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let annots = match page.get(b"Annots") {
        Ok(Object::Array(a)) => a.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(a)) => a.clone(),
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    annots
        .iter()
        .filter_map(|o| match o {
            Object::Reference(id) => Some(*id),
            _ => None,
        })
        .collect()
}

/// The `/T` field name of a widget annotation, or `None` for anything else.
fn widget_field_name(doc: &Document, annot_id: ObjectId) -> Option<String> {
    let dict = doc.get_object(annot_id).ok()?.as_dict().ok()?;
    match dict.get(b"Subtype") {
        Ok(Object::Name(n)) if n == b"Widget" => {}
        _ => return None,
    }
    match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

fn set_need_appearances(doc: &mut Document) {
    let root_id = match doc.trailer.get(b"Root") {
        Ok(Object::Reference(id)) => *id,
        _ => return,
    };
    let acro_form = doc
        .get_dictionary(root_id)
        .ok()
        .and_then(|cat| cat.get(b"AcroForm").ok().cloned());
    match acro_form {
        Some(Object::Reference(form_id)) => {
            if let Ok(dict) = doc.get_object_mut(form_id).and_then(Object::as_dict_mut) {
                dict.set("NeedAppearances", Object::Boolean(true));
            }
        }
        Some(Object::Dictionary(mut dict)) => {
            dict.set("NeedAppearances", Object::Boolean(true));
            if let Ok(cat) = doc.get_object_mut(root_id).and_then(Object::as_dict_mut) {
                cat.set("AcroForm", Object::Dictionary(dict));
            }
        }
        _ => debug!("Template has no AcroForm dictionary"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};
    use serde_json::json;

    /// Minimal one-page form with the given text-field names.
    fn form_pdf(field_names: &[&str]) -> Document {
        let mut doc = Document::with_version("1.5");

        let annot_ids: Vec<ObjectId> = field_names
            .iter()
            .map(|name| {
                doc.add_object(dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Widget",
                    "FT" => "Tx",
                    "T" => Object::string_literal(*name),
                    "Rect" => vec![100.into(), 600.into(), 300.into(), 620.into()],
                })
            })
            .collect();

        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Annots" => annot_ids
                .iter()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<_>>(),
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        });
        if let Ok(dict) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut) {
            dict.set("Parent", Object::Reference(pages_id));
        }
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => annot_ids
                .iter()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<_>>(),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
            "AcroForm" => Object::Reference(acroform_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc
    }

    fn field_entry(doc: &Document, name: &str, key: &[u8]) -> Option<Object> {
        for page_id in doc.get_pages().into_values() {
            for annot_id in page_annotation_ids(doc, page_id) {
                if widget_field_name(doc, annot_id).as_deref() == Some(name) {
                    let dict = doc.get_object(annot_id).ok()?.as_dict().ok()?;
                    return dict.get(key).ok().cloned();
                }
            }
        }
        None
    }

    #[test]
    fn matching_field_gets_value_and_others_are_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        form_pdf(&["project_name", "optional_note"])
            .save(&template)
            .unwrap();

        let record = ProjectRecord::from_document(&json!({
            "id_project": "PM-X7",
            "project_name": "Solar Farm"
        }));
        let out = fill_template(&record, &template, dir.path()).unwrap();

        let filled = Document::load(&out).unwrap();
        match field_entry(&filled, "project_name", b"V") {
            Some(Object::String(bytes, _)) => assert_eq!(bytes, b"Solar Farm"),
            other => panic!("expected filled value, got {other:?}"),
        }
        assert_eq!(
            field_entry(&filled, "optional_note", b"F"),
            Some(Object::Integer(FLAG_HIDDEN))
        );
        // The filled field keeps its default flags.
        assert_eq!(field_entry(&filled, "project_name", b"F"), None);
    }

    #[test]
    fn empty_record_hides_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        form_pdf(&["a", "b", "c"]).save(&template).unwrap();

        let record = ProjectRecord::from_document(&json!({}));
        let out = fill_template(&record, &template, dir.path()).unwrap();

        let filled = Document::load(&out).unwrap();
        for name in ["a", "b", "c"] {
            assert_eq!(
                field_entry(&filled, name, b"F"),
                Some(Object::Integer(FLAG_HIDDEN)),
                "field {name} should be hidden"
            );
        }
    }

    #[test]
    fn record_key_without_template_field_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.pdf");
        form_pdf(&["present"]).save(&template).unwrap();

        let record = ProjectRecord::from_document(&json!({
            "present": "yes",
            "absent_from_template": "whatever"
        }));
        // Must not error.
        fill_template(&record, &template, dir.path()).unwrap();
    }

    #[test]
    fn unreadable_template_is_invalid_template() {
        let dir = tempfile::tempdir().unwrap();
        let record = ProjectRecord::from_document(&json!({}));
        let err = fill_template(
            &record,
            &dir.path().join("no_such_template.pdf"),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::InvalidTemplate { .. }));
    }
}
