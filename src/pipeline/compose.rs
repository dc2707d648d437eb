//! Image compositing: paste descriptor images onto the rasterised pages.
//!
//! Pastes run in the record's descriptor insertion order, so when two
//! descriptors overlap on a page the later one occludes the earlier one.
//! Pixels outside pasted rectangles keep the rendered page content.
//!
//! Every rasterised page is persisted as `page{N}.png` in the working
//! directory whether or not anything was pasted onto it; the page plan
//! decides later which of them reach the final PDF and the email body.

use crate::error::ReportError;
use crate::record::ProjectRecord;
use image::{imageops, imageops::FilterType, DynamicImage};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Working-file name of a composed page, 1-based.
pub fn page_file(workdir: &Path, page: usize) -> PathBuf {
    workdir.join(format!("page{page}.png"))
}

/// Paste the record's images onto the page rasters and persist every page.
///
/// Returns the composed page paths in page order.
pub fn composite_pages(
    mut pages: Vec<DynamicImage>,
    record: &ProjectRecord,
    workdir: &Path,
) -> Result<Vec<PathBuf>, ReportError> {
    let total = pages.len();

    for (key, desc) in record.images() {
        if desc.page == 0 || desc.page > total {
            return Err(ReportError::PageOutOfRange {
                key: key.to_string(),
                page: desc.page,
                total,
            });
        }
        if !desc.path.exists() {
            return Err(ReportError::AssetMissing {
                path: desc.path.clone(),
            });
        }
        let asset = image::open(&desc.path).map_err(|e| {
            ReportError::Internal(format!("cannot decode '{}': {e}", desc.path.display()))
        })?;
        let resized = asset.resize_exact(desc.width, desc.height, FilterType::Triangle);
        imageops::overlay(&mut pages[desc.page - 1], &resized, desc.x, desc.y);
        debug!(
            "Pasted {key} ({}x{}) at ({},{}) on page {}",
            desc.width, desc.height, desc.x, desc.y, desc.page
        );
    }

    let mut paths = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let path = page_file(workdir, idx + 1);
        page.save(&path).map_err(|e| ReportError::OutputWriteFailed {
            path: path.clone(),
            source: std::io::Error::other(e),
        })?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ImageDescriptor;
    use image::{Rgba, RgbaImage};
    use serde_json::json;

    fn solid(w: u32, h: u32, px: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(px)))
    }

    fn descriptor(path: PathBuf, x: i64, y: i64, page: usize) -> ImageDescriptor {
        ImageDescriptor {
            path,
            width: 20,
            height: 20,
            x,
            y,
            page,
        }
    }

    #[test]
    fn later_paste_occludes_earlier_on_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let red = dir.path().join("red.png");
        let blue = dir.path().join("blue.png");
        solid(20, 20, [255, 0, 0, 255]).save(&red).unwrap();
        solid(20, 20, [0, 0, 255, 255]).save(&blue).unwrap();

        let mut record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        record.insert_image("img_a", descriptor(red, 0, 0, 1));
        record.insert_image("img_b", descriptor(blue, 10, 0, 1));

        let pages = vec![solid(100, 100, [255, 255, 255, 255])];
        let paths = composite_pages(pages, &record, dir.path()).unwrap();

        let composed = image::open(&paths[0]).unwrap().to_rgba8();
        // Only-red region, overlap region (blue wins), untouched background.
        assert_eq!(composed.get_pixel(5, 5).0, [255, 0, 0, 255]);
        assert_eq!(composed.get_pixel(15, 5).0, [0, 0, 255, 255]);
        assert_eq!(composed.get_pixel(60, 60).0, [255, 255, 255, 255]);
    }

    #[test]
    fn descriptor_beyond_page_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("a.png");
        solid(20, 20, [0, 255, 0, 255]).save(&asset).unwrap();

        let mut record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        record.insert_image("img_a", descriptor(asset, 0, 0, 3));

        let pages = vec![solid(50, 50, [255, 255, 255, 255])];
        let err = composite_pages(pages, &record, dir.path()).unwrap_err();
        match err {
            ReportError::PageOutOfRange { key, page, total } => {
                assert_eq!(key, "img_a");
                assert_eq!(page, 3);
                assert_eq!(total, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_asset_is_asset_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        record.insert_image(
            "img_a",
            descriptor(dir.path().join("gone.png"), 0, 0, 1),
        );
        let pages = vec![solid(50, 50, [255, 255, 255, 255])];
        let err = composite_pages(pages, &record, dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::AssetMissing { .. }));
    }

    #[test]
    fn pages_without_descriptors_are_still_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let record = ProjectRecord::from_document(&json!({"id_project": "p"}));
        let pages = vec![
            solid(30, 30, [1, 2, 3, 255]),
            solid(30, 30, [4, 5, 6, 255]),
        ];
        let paths = composite_pages(pages, &record, dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("page1.png"));
        assert!(paths[1].ends_with("page2.png"));
        assert!(paths.iter().all(|p| p.exists()));
    }
}
