//! Pipeline stages for report generation.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! assets ──▶ charts ──▶ fill ──▶ render ──▶ compose ──▶ assemble
//! (photos)   (SVG/PNG)  (lopdf)  (pdfium)   (paste)     (pages → PDF)
//! ```
//!
//! 1. [`assets`]   purge stale working images and fetch the project photos
//! 2. [`charts`]   render the layout's charts as PNGs via resvg
//! 3. [`fill`]     fill the form template's fields from the record
//! 4. [`render`]   rasterise the filled PDF; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 5. [`compose`]  paste descriptor images onto the page rasters
//! 6. [`assemble`] bind the composed pages into the final PDF

pub mod assemble;
pub mod assets;
pub mod charts;
pub mod compose;
pub mod fill;
pub mod render;
