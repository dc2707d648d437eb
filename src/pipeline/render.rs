//! Rasterisation of the filled template: every page to a `DynamicImage`
//! via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves the work onto a dedicated
//! blocking-pool thread so the async workers don't stall during CPU-heavy
//! rendering.
//!
//! ## Why a fixed DPI?
//!
//! Downstream pasting uses absolute pixel coordinates from the descriptor
//! tables, so every page of every report must rasterise at the same scale.
//! The DPI knob lives in [`crate::config::RunConfig`] and defaults to the
//! 200 DPI the layout geometry was measured against.

use crate::error::ReportError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tokio::task;
use tracing::{debug, info};

/// Rasterise every page of the filled template, in page order.
///
/// Form field data is rendered so the values written by the filler appear
/// in the output. Runs inside `spawn_blocking` since pdfium is CPU-bound.
pub async fn rasterise_pages(
    pdf_path: &Path,
    dpi: u32,
) -> Result<Vec<DynamicImage>, ReportError> {
    let path = pdf_path.to_path_buf();
    let result = task::spawn_blocking(move || rasterise_pages_blocking(&path, dpi))
        .await
        .map_err(|e| ReportError::Internal(format!("Render task panicked: {e}")))?;
    result
}

fn rasterise_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
) -> Result<Vec<DynamicImage>, ReportError> {
    let bindings = Pdfium::bind_to_system_library()
        .map_err(|e| ReportError::PdfiumBindingFailed(format!("{e:?}")))?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| ReportError::InvalidTemplate {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    info!("Filled template loaded: {} pages", pages.len());

    let scale = dpi as f32 / 72.0;
    let mut results = Vec::with_capacity(pages.len() as usize);

    for (idx, page) in pages.iter().enumerate() {
        let width_px = (page.width().value * scale).round() as i32;
        let height_px = (page.height().value * scale).round() as i32;
        let render_config = PdfRenderConfig::new()
            .set_target_width(width_px)
            .set_maximum_height(height_px)
            .render_form_data(true);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ReportError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(image);
    }

    Ok(results)
}
