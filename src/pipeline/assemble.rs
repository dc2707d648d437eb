//! PDF reassembly: the ordered page images become one multi-page PDF.
//!
//! Page geometry follows the first image: its pixel dimensions convert to
//! points at a fixed 0.75 factor (96-DPI pixels into 72-point PDF space),
//! and every image is placed full-bleed at (0,0) at that size. Pages are
//! embedded as JPEG XObjects; the pages are photographic rasters, so DCT
//! keeps a four-page report at a mail-attachment-friendly size.

use crate::error::ReportError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// File name of the final report inside the working directory.
pub const REPORT_PDF: &str = "monthly_report.pdf";

/// Pixel-to-point conversion for page geometry.
const PX_TO_PT: f32 = 0.75;

/// Build a single PDF from the ordered page images, overwriting `out`.
///
/// An empty image list is a caller error ([`ReportError::InvalidInput`]),
/// not an empty document.
pub fn images_to_pdf<P: AsRef<Path>>(
    image_paths: &[P],
    out: &Path,
    jpeg_quality: u8,
) -> Result<(), ReportError> {
    let first = image_paths
        .first()
        .ok_or_else(|| ReportError::InvalidInput("no page images to assemble".into()))?;

    let first_image = open_page_image(first.as_ref())?;
    let width_pt = first_image.width() as f32 * PX_TO_PT;
    let height_pt = first_image.height() as f32 * PX_TO_PT;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(image_paths.len());

    for (idx, path) in image_paths.iter().enumerate() {
        let image = if idx == 0 {
            first_image.clone()
        } else {
            open_page_image(path.as_ref())?
        };
        let rgb = image.to_rgb8();

        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut Cursor::new(&mut jpeg),
            jpeg_quality,
        )
        .encode_image(&rgb)
        .map_err(|e| ReportError::Internal(format!("JPEG encode failed: {e}")))?;

        let xobject_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => rgb.width() as i64,
                "Height" => rgb.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width_pt),
                        0.into(),
                        0.into(),
                        Object::Real(height_pt),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content
                .encode()
                .map_err(|e| ReportError::Internal(format!("content encode failed: {e}")))?,
        ));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width_pt),
                Object::Real(height_pt),
            ],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => Object::Reference(xobject_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    doc.save(out).map_err(|e| ReportError::OutputWriteFailed {
        path: out.to_path_buf(),
        source: std::io::Error::other(e),
    })?;

    info!(
        "Assembled {page_count}-page report ({width_pt:.0}x{height_pt:.0} pt) → {}",
        out.display()
    );
    Ok(())
}

fn open_page_image(path: &Path) -> Result<image::DynamicImage, ReportError> {
    if !path.exists() {
        return Err(ReportError::AssetMissing {
            path: path.to_path_buf(),
        });
    }
    image::open(path)
        .map_err(|e| ReportError::Internal(format!("cannot decode '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::path::PathBuf;

    fn page_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 220, 200, 255])))
            .save(&path)
            .unwrap();
        path
    }

    fn media_box(doc: &Document, page_id: lopdf::ObjectId) -> Vec<f32> {
        let dict = doc.get_dictionary(page_id).unwrap();
        let Ok(Object::Array(arr)) = dict.get(b"MediaBox") else {
            panic!("page without MediaBox");
        };
        arr.iter()
            .map(|o| match o {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r,
                other => panic!("unexpected MediaBox entry {other:?}"),
            })
            .collect()
    }

    #[test]
    fn k_images_give_k_pages_scaled_to_three_quarters() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![
            page_png(dir.path(), "p1.png", 200, 100),
            page_png(dir.path(), "p2.png", 200, 100),
            page_png(dir.path(), "p3.png", 200, 100),
        ];
        let out = dir.path().join(REPORT_PDF);
        images_to_pdf(&pages, &out, 90).unwrap();

        let doc = Document::load(&out).unwrap();
        let page_ids: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(page_ids.len(), 3);
        for id in page_ids {
            assert_eq!(media_box(&doc, id), vec![0.0, 0.0, 150.0, 75.0]);
        }
    }

    #[test]
    fn page_size_follows_first_image() {
        let dir = tempfile::tempdir().unwrap();
        let pages = vec![
            page_png(dir.path(), "big.png", 400, 200),
            page_png(dir.path(), "small.png", 100, 40),
        ];
        let out = dir.path().join(REPORT_PDF);
        images_to_pdf(&pages, &out, 90).unwrap();

        let doc = Document::load(&out).unwrap();
        for id in doc.get_pages().into_values() {
            assert_eq!(media_box(&doc, id), vec![0.0, 0.0, 300.0, 150.0]);
        }
    }

    #[test]
    fn empty_image_list_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(REPORT_PDF);
        let err = images_to_pdf::<PathBuf>(&[], &out, 90).unwrap_err();
        assert!(matches!(err, ReportError::InvalidInput(_)));
        assert!(!out.exists());
    }

    #[test]
    fn output_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(REPORT_PDF);
        std::fs::write(&out, b"stale").unwrap();
        let pages = vec![page_png(dir.path(), "p1.png", 80, 80)];
        images_to_pdf(&pages, &out, 90).unwrap();
        assert!(std::fs::read(&out).unwrap().starts_with(b"%PDF"));
    }
}
