//! Chart rendering: fixed-size PNG charts from numeric record fields.
//!
//! Charts are composed as SVG documents and rasterised through resvg +
//! tiny-skia, with text set from system fonts (fontdb). Output dimensions
//! are fixed per chart kind; the descriptor tables place them at their
//! native size, so the compositor's resize is a no-op for charts.
//!
//! Inputs are validated before drawing: a negative magnitude or an
//! out-of-range percentage is an [`ReportError::InvalidInput`], not a
//! garbage chart.

use crate::error::ReportError;
use resvg::{
    tiny_skia::{Color, Pixmap, Transform},
    usvg::{self, Options, Tree},
};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::debug;

pub const DONUT_SIZE: u32 = 220;
pub const BAR_WIDTH: u32 = 1350;
pub const BAR_HEIGHT: u32 = 400;
pub const PIE_WIDTH: u32 = 715;
pub const PIE_HEIGHT: u32 = 550;

// Brand palette.
const ORANGE: &str = "#E4550C";
const GREEN: &str = "#1A8900";
const PIE_COLORS: [&str; 4] = ["#78C505", "#C1FF72", "#7ED957", "#00BF63"];

/// Render a two-segment progress donut with the percentage in the centre.
///
/// 0% and 100% are legal and render a single-colour ring.
pub fn donut(percent: f64, out: &Path) -> Result<(), ReportError> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(ReportError::InvalidInput(format!(
            "donut percentage must be 0–100, got {percent}"
        )));
    }
    let svg = donut_svg(percent);
    rasterise_svg(&svg, DONUT_SIZE, DONUT_SIZE, out)
}

/// Render the capital-in-execution horizontal bar chart.
///
/// Values are monetary magnitudes in millions; axis ticks are labelled
/// `$NM` with the value truncated, not rounded, to an integer.
pub fn capital_bar(
    funded: f64,
    executed: f64,
    remaining: f64,
    out: &Path,
) -> Result<(), ReportError> {
    for (name, v) in [
        ("funded", funded),
        ("executed", executed),
        ("remaining", remaining),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(ReportError::InvalidInput(format!(
                "capital bar '{name}' value must be a non-negative number, got {v}"
            )));
        }
    }
    let svg = capital_bar_svg(funded, executed, remaining);
    rasterise_svg(&svg, BAR_WIDTH, BAR_HEIGHT, out)
}

/// Render the town product-mix pie over four category percentages.
///
/// When all four are exactly zero, each slice is drawn at a quarter of the
/// area but labelled `0%`, so an idle month doesn't imply false progress.
pub fn product_mix_pie(
    wood_plastic: f64,
    raw_material: f64,
    injection: f64,
    other: f64,
    out: &Path,
) -> Result<(), ReportError> {
    for (name, v) in [
        ("wood_plastic", wood_plastic),
        ("raw_material", raw_material),
        ("injection", injection),
        ("other", other),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(ReportError::InvalidInput(format!(
                "pie '{name}' percentage must be a non-negative number, got {v}"
            )));
        }
    }
    let svg = product_mix_svg(wood_plastic, raw_material, injection, other);
    rasterise_svg(&svg, PIE_WIDTH, PIE_HEIGHT, out)
}

// ── SVG composition ──────────────────────────────────────────────────────

fn donut_svg(percent: f64) -> String {
    let size = DONUT_SIZE as f64;
    let c = size / 2.0;
    let stroke = 30.0;
    let r = c - stroke / 2.0 - 5.0;
    let circumference = std::f64::consts::TAU * r;
    let filled = circumference * percent / 100.0;

    let mut svg = svg_open(DONUT_SIZE, DONUT_SIZE);
    // Remainder ring underneath, progress arc on top starting at 12 o'clock.
    let _ = write!(
        svg,
        r#"<circle cx="{c}" cy="{c}" r="{r}" fill="none" stroke="{GREEN}" stroke-width="{stroke}"/>"#
    );
    if percent > 0.0 {
        let gap = circumference - filled;
        let _ = write!(
            svg,
            r#"<circle cx="{c}" cy="{c}" r="{r}" fill="none" stroke="{ORANGE}" stroke-width="{stroke}" stroke-dasharray="{filled:.3} {gap:.3}" transform="rotate(-90 {c} {c})"/>"#
        );
    }
    let label = format_pct(percent);
    let _ = write!(
        svg,
        r#"<text x="{c}" y="{c}" text-anchor="middle" dominant-baseline="central" font-family="sans-serif" font-size="40" font-weight="bold">{label}</text>"#
    );
    svg.push_str("</svg>");
    svg
}

fn capital_bar_svg(funded: f64, executed: f64, remaining: f64) -> String {
    let rows = [
        ("Funded value", funded),
        ("Value executed to date", executed),
        ("Remaining value for execution", remaining),
    ];
    let ticks = bar_ticks(funded.max(executed).max(remaining));

    let (w, h) = (BAR_WIDTH as f64, BAR_HEIGHT as f64);
    let (left, right, top, bottom) = (360.0, 40.0, 60.0, 50.0);
    let plot_w = w - left - right;
    let plot_h = h - top - bottom;
    let row_h = plot_h / rows.len() as f64;
    let bar_h = 56.0;
    let max = ticks[ticks.len() - 1].max(1.0);

    let mut svg = svg_open(BAR_WIDTH, BAR_HEIGHT);
    let _ = write!(
        svg,
        r#"<text x="{x}" y="36" text-anchor="middle" font-family="sans-serif" font-size="28">Project capital in execution</text>"#,
        x = left + plot_w / 2.0
    );

    // Dashed x-grid with its tick labels underneath.
    for tick in ticks {
        let x = left + plot_w * tick / max;
        let _ = write!(
            svg,
            r#"<line x1="{x:.1}" y1="{top}" x2="{x:.1}" y2="{y2}" stroke="gray" stroke-width="0.8" stroke-dasharray="6 4" opacity="0.7"/>"#,
            y2 = top + plot_h
        );
        let _ = write!(
            svg,
            r#"<text x="{x:.1}" y="{y}" text-anchor="middle" font-family="sans-serif" font-size="24">{label}</text>"#,
            y = h - 14.0,
            label = format_money_tick(tick)
        );
    }

    for (i, (name, value)) in rows.iter().enumerate() {
        let y_mid = top + row_h * (i as f64 + 0.5);
        let bar_w = plot_w * value / max;
        let _ = write!(
            svg,
            r#"<rect x="{left}" y="{y:.1}" width="{bar_w:.1}" height="{bar_h}" fill="{GREEN}"/>"#,
            y = y_mid - bar_h / 2.0
        );
        let _ = write!(
            svg,
            r#"<text x="{x}" y="{y_mid:.1}" text-anchor="end" dominant-baseline="central" font-family="sans-serif" font-size="24">{name}</text>"#,
            x = left - 16.0
        );
    }
    svg.push_str("</svg>");
    svg
}

fn product_mix_svg(wood_plastic: f64, raw_material: f64, injection: f64, other: f64) -> String {
    let names = [
        "Plastic wood",
        "Raw material",
        "Injection products",
        "Others",
    ];
    let (sizes, labels) = pie_slices(wood_plastic, raw_material, injection, other);
    let total: f64 = sizes.iter().sum();

    let (w, h) = (PIE_WIDTH as f64, PIE_HEIGHT as f64);
    let (cx, cy) = (w / 2.0, h / 2.0);
    let r = (h / 2.0) - 60.0;

    let mut svg = svg_open(PIE_WIDTH, PIE_HEIGHT);
    let mut angle = -90.0; // start at 12 o'clock
    for i in 0..sizes.len() {
        let sweep = 360.0 * sizes[i] / total;
        if sweep <= 0.0 {
            angle += sweep;
            continue;
        }
        let _ = write!(
            svg,
            r#"<path d="{d}" fill="{color}" stroke="white" stroke-width="1"/>"#,
            d = sector_path(cx, cy, r, angle, sweep),
            color = PIE_COLORS[i]
        );
        let mid = (angle + sweep / 2.0).to_radians();
        // Percentage inside the slice, category name just outside it.
        let (px, py) = (cx + 0.6 * r * mid.cos(), cy + 0.6 * r * mid.sin());
        let (nx, ny) = (cx + 1.18 * r * mid.cos(), cy + 1.18 * r * mid.sin());
        let _ = write!(
            svg,
            r#"<text x="{px:.1}" y="{py:.1}" text-anchor="middle" dominant-baseline="central" font-family="sans-serif" font-size="22">{pct}</text>"#,
            pct = labels[i]
        );
        let anchor = if mid.cos() < -0.2 {
            "end"
        } else if mid.cos() > 0.2 {
            "start"
        } else {
            "middle"
        };
        let _ = write!(
            svg,
            r#"<text x="{nx:.1}" y="{ny:.1}" text-anchor="{anchor}" dominant-baseline="central" font-family="sans-serif" font-size="22">{name}</text>"#,
            name = names[i]
        );
        angle += sweep;
    }
    svg.push_str("</svg>");
    svg
}

/// Slice sizes and labels for the product-mix pie.
///
/// The all-zero month renders four equal slices labelled `0%` rather than
/// four `25%` labels.
fn pie_slices(a: f64, b: f64, c: f64, d: f64) -> ([f64; 4], [String; 4]) {
    if a == 0.0 && b == 0.0 && c == 0.0 && d == 0.0 {
        let zero = || "0%".to_string();
        return ([25.0; 4], [zero(), zero(), zero(), zero()]);
    }
    let sizes = [a, b, c, d];
    let total: f64 = sizes.iter().sum();
    let labels = sizes.map(|v| format!("{:.0}%", 100.0 * v / total));
    (sizes, labels)
}

/// `$NM` axis label, value truncated (not rounded) to an integer.
fn format_money_tick(value: f64) -> String {
    format!("${}M", value.trunc() as i64)
}

/// Exactly five evenly spaced ticks from zero to the data maximum.
fn bar_ticks(max: f64) -> [f64; 5] {
    let max = if max > 0.0 { max } else { 1.0 };
    [0.0, max / 4.0, max / 2.0, 3.0 * max / 4.0, max]
}

/// Pie sector path from `start` degrees sweeping `sweep` degrees clockwise.
fn sector_path(cx: f64, cy: f64, r: f64, start: f64, sweep: f64) -> String {
    // A sweep of (nearly) the full circle degenerates as an arc; draw two.
    if sweep >= 359.999 {
        return format!(
            "M {:.2} {:.2} A {r:.2} {r:.2} 0 1 1 {:.2} {:.2} A {r:.2} {r:.2} 0 1 1 {:.2} {:.2} Z",
            cx + r,
            cy,
            cx - r,
            cy,
            cx + r,
            cy
        );
    }
    let (sx, sy) = point_on_circle(cx, cy, r, start);
    let (ex, ey) = point_on_circle(cx, cy, r, start + sweep);
    let large_arc = i32::from(sweep > 180.0);
    format!(
        "M {cx:.2} {cy:.2} L {sx:.2} {sy:.2} A {r:.2} {r:.2} 0 {large_arc} 1 {ex:.2} {ey:.2} Z"
    )
}

fn point_on_circle(cx: f64, cy: f64, r: f64, deg: f64) -> (f64, f64) {
    let rad = deg.to_radians();
    (cx + r * rad.cos(), cy + r * rad.sin())
}

fn format_pct(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{}%", p as i64)
    } else {
        format!("{p}%")
    }
}

fn svg_open(width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    )
}

// ── Rasterisation ────────────────────────────────────────────────────────

fn font_db() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Arc::new(db)
    })
    .clone()
}

/// Rasterise an SVG document to a PNG on a white background, overwriting
/// any existing file at `out`.
fn rasterise_svg(svg: &str, width: u32, height: u32, out: &Path) -> Result<(), ReportError> {
    let options = Options {
        fontdb: font_db(),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|e| ReportError::Internal(format!("chart SVG did not parse: {e}")))?;

    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| ReportError::Internal(format!("zero-sized pixmap {width}x{height}")))?;
    pixmap.fill(Color::WHITE);
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

    pixmap
        .save_png(out)
        .map_err(|e| ReportError::OutputWriteFailed {
            path: out.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
    debug!("Rendered chart → {} ({width}x{height})", out.display());
    Ok(())
}
