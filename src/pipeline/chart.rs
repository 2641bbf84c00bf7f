//! Bar chart: one bar per sheet, height = sum of that sheet's values.
//!
//! Drawn straight onto an RGB raster with `imageproc`; text goes through
//! `ab_glyph` using the bundled DejaVu Sans unless a font file is
//! configured. The canvas is 1000×600 px with a fixed title, axis labels and
//! a grid at every y tick and bar centre.
//!
//! The y axis always includes zero, so negative totals hang below the zero
//! line. Bars keep report order from left to right.

use crate::error::ReportError;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, warn};

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 600;
pub const TITLE: &str = "Sum of Each Sheet";
pub const X_LABEL: &str = "Sheets";
pub const Y_LABEL: &str = "Sum";

const PLOT_LEFT: f32 = 100.0;
const PLOT_RIGHT: f32 = 970.0;
const PLOT_TOP: f32 = 60.0;
const PLOT_BOTTOM: f32 = 520.0;
/// Fraction of a slot the bar covers.
const BAR_FILL: f32 = 0.8;
const TARGET_TICKS: f64 = 5.0;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([176, 176, 176]);
const BAR: Rgb<u8> = Rgb([31, 119, 180]);

/// DejaVu Sans, drawn when no chart font is configured.
static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Upper bound on drawn y ticks.
const MAX_TICKS: usize = 50;

/// The bundled chart font.
pub fn default_font() -> Result<FontVec, ReportError> {
    FontVec::try_from_vec(DEFAULT_FONT.to_vec())
        .map_err(|e| ReportError::ChartRender(format!("bundled font: {e}")))
}

/// Load the chart font: the configured path if it loads, else the bundled one.
pub fn load_font(configured: Option<&Path>) -> Result<FontVec, ReportError> {
    if let Some(path) = configured {
        match std::fs::read(path).map(FontVec::try_from_vec) {
            Ok(Ok(font)) => {
                debug!("Chart font: {}", path.display());
                return Ok(font);
            }
            Ok(Err(e)) => warn!("Ignoring unreadable font {}: {}", path.display(), e),
            Err(e) => warn!("Ignoring chart font {}: {}", path.display(), e),
        }
    }
    debug!("Chart font: bundled DejaVu Sans");
    default_font()
}

/// Value range of the y axis and its tick step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Axis {
    const UNIT: Axis = Axis {
        min: 0.0,
        max: 1.0,
        step: 0.2,
    };

    /// Axis covering zero and every finite value, snapped to tick multiples.
    ///
    /// Spans are computed on halves so totals near `f64::MAX` stay finite; a
    /// snapped bound that would overflow falls back to the raw extreme.
    pub fn fit(values: &[f64]) -> Self {
        let finite = values.iter().copied().filter(|v| v.is_finite());
        let (lo, hi) = finite.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo == hi {
            return Self::UNIT;
        }

        let half_span = hi / 2.0 - lo / 2.0;
        let step = nice_step(half_span / (TARGET_TICKS / 2.0));
        let snap = |v: f64, raw: f64| if v.is_finite() { v } else { raw };
        let axis = Self {
            min: snap((lo / step).floor() * step, lo),
            max: snap((hi / step).ceil() * step, hi),
            step,
        };
        if axis.step.is_finite() && axis.step > 0.0 && axis.max > axis.min {
            axis
        } else {
            Self::UNIT
        }
    }

    pub fn ticks(&self) -> Vec<f64> {
        let n = (self.max / self.step - self.min / self.step).round();
        let n = if n.is_finite() && n >= 0.0 {
            (n as usize).min(MAX_TICKS)
        } else {
            0
        };
        (0..=n)
            .map(|i| self.min + i as f64 * self.step)
            .filter(|v| v.is_finite())
            .collect()
    }

    fn to_y(&self, v: f64) -> f32 {
        let frac = (v / 2.0 - self.min / 2.0) / (self.max / 2.0 - self.min / 2.0);
        PLOT_BOTTOM - (frac as f32) * (PLOT_BOTTOM - PLOT_TOP)
    }
}

/// Round a raw step up to 1, 2, 2.5 or 5 times a power of ten.
pub fn nice_step(raw: f64) -> f64 {
    if !(raw.is_finite() && raw > 0.0) {
        return 1.0;
    }
    let magnitude = 10f64.powi(raw.log10().floor() as i32);
    let fraction = raw / magnitude;
    let nice = if fraction <= 1.0 {
        1.0
    } else if fraction <= 2.0 {
        2.0
    } else if fraction <= 2.5 {
        2.5
    } else if fraction <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

/// Tick label text: integers without a fraction, others trimmed, huge
/// magnitudes in exponent form.
pub fn format_tick(v: f64) -> String {
    if v.abs() >= 1e15 {
        format!("{v:e}")
    } else if v == v.trunc() {
        format!("{}", v as i64)
    } else {
        let s = format!("{v:.3}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Left edge and width of bar `i` of `n`.
fn bar_span(i: usize, n: usize) -> (f32, f32) {
    let slot = (PLOT_RIGHT - PLOT_LEFT) / n as f32;
    let width = slot * BAR_FILL;
    let left = PLOT_LEFT + slot * i as f32 + (slot - width) / 2.0;
    (left, width)
}

/// Draw the bar chart for `(sheet name, total)` pairs.
pub fn draw_bar_chart(bars: &[(String, f64)], font: Option<&FontVec>) -> RgbImage {
    let mut img = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
    let values: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
    let axis = Axis::fit(&values);

    // ── Grid ─────────────────────────────────────────────────────────────
    for tick in axis.ticks() {
        let y = axis.to_y(tick);
        draw_line_segment_mut(&mut img, (PLOT_LEFT, y), (PLOT_RIGHT, y), GRID);
    }
    for i in 0..bars.len() {
        let (left, width) = bar_span(i, bars.len());
        let x = left + width / 2.0;
        draw_line_segment_mut(&mut img, (x, PLOT_TOP), (x, PLOT_BOTTOM), GRID);
    }

    // ── Bars ─────────────────────────────────────────────────────────────
    let zero_y = axis.to_y(0.0);
    for (i, (name, value)) in bars.iter().enumerate() {
        if !value.is_finite() {
            warn!("Skipping bar for sheet '{}': total is {}", name, value);
            continue;
        }
        let (left, width) = bar_span(i, bars.len());
        let top = axis.to_y(*value).min(zero_y);
        let height = (axis.to_y(*value) - zero_y).abs();
        if width >= 1.0 && height >= 1.0 {
            let rect = Rect::at(left.round() as i32, top.round() as i32)
                .of_size(width.round() as u32, height.round() as u32);
            draw_filled_rect_mut(&mut img, rect, BAR);
        }
    }

    // ── Frame ────────────────────────────────────────────────────────────
    let frame = Rect::at(PLOT_LEFT as i32, PLOT_TOP as i32).of_size(
        (PLOT_RIGHT - PLOT_LEFT) as u32 + 1,
        (PLOT_BOTTOM - PLOT_TOP) as u32 + 1,
    );
    draw_hollow_rect_mut(&mut img, frame, BLACK);

    // ── Text ─────────────────────────────────────────────────────────────
    if let Some(font) = font {
        draw_labels(&mut img, font, bars, &axis);
    }

    img
}

fn draw_labels(img: &mut RgbImage, font: &FontVec, bars: &[(String, f64)], axis: &Axis) {
    let title = PxScale::from(24.0);
    let label = PxScale::from(18.0);
    let tick = PxScale::from(14.0);

    let centered = |img: &mut RgbImage, scale: PxScale, cx: f32, y: f32, text: &str| {
        let (w, _) = text_size(scale, font, text);
        draw_text_mut(img, BLACK, (cx - w as f32 / 2.0) as i32, y as i32, scale, font, text);
    };

    let plot_cx = (PLOT_LEFT + PLOT_RIGHT) / 2.0;
    centered(img, title, plot_cx, PLOT_TOP - 40.0, TITLE);
    centered(img, label, plot_cx, PLOT_BOTTOM + 40.0, X_LABEL);
    draw_text_mut(img, BLACK, 10, (PLOT_TOP - 30.0) as i32, label, font, Y_LABEL);

    for value in axis.ticks() {
        let text = format_tick(value);
        let (w, h) = text_size(tick, font, &text);
        let x = PLOT_LEFT - 8.0 - w as f32;
        let y = axis.to_y(value) - h as f32 / 2.0;
        draw_text_mut(img, BLACK, x as i32, y as i32, tick, font, &text);
    }

    for (i, (name, _)) in bars.iter().enumerate() {
        let (left, width) = bar_span(i, bars.len());
        centered(img, tick, left + width / 2.0, PLOT_BOTTOM + 10.0, name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn nice_steps() {
        assert_eq!(nice_step(6.0), 10.0);
        assert_eq!(nice_step(0.2), 0.2);
        assert_eq!(nice_step(2.2), 2.5);
        assert_eq!(nice_step(40.0), 50.0);
        assert_eq!(nice_step(0.0), 1.0);
        assert_eq!(nice_step(f64::NAN), 1.0);
    }

    #[test]
    fn axis_includes_zero() {
        let axis = Axis::fit(&[30.0, 12.0]);
        assert_eq!(axis.min, 0.0);
        assert!(axis.max >= 30.0);
        assert_eq!(axis.ticks().first(), Some(&0.0));

        let axis = Axis::fit(&[-7.0, 3.0]);
        assert!(axis.min <= -7.0);
        assert!(axis.max >= 3.0);
        assert!(axis.ticks().contains(&0.0));
    }

    #[test]
    fn empty_axis_is_unit() {
        let axis = Axis::fit(&[]);
        assert_eq!(axis.min, 0.0);
        assert_eq!(axis.max, 1.0);
    }

    #[test]
    fn tick_labels() {
        assert_eq!(format_tick(30.0), "30");
        assert_eq!(format_tick(2.5), "2.5");
        assert_eq!(format_tick(0.2), "0.2");
        assert_eq!(format_tick(-10.0), "-10");
    }

    #[test]
    fn canvas_size() {
        let img = draw_bar_chart(&[], None);
        assert_eq!(img.dimensions(), (CHART_WIDTH, CHART_HEIGHT));
    }

    #[test]
    fn empty_chart_has_no_bars() {
        let img = draw_bar_chart(&[], None);
        assert!(img.pixels().all(|p| *p != BAR));
    }

    #[test]
    fn bar_is_drawn_in_its_slot() {
        let img = draw_bar_chart(&bars(&[("Sheet1", 30.0), ("Sheet2", 0.0)]), None);
        let (left, width) = bar_span(0, 2);
        // sample just right of the vertical grid line through the centre
        let x = (left + width / 2.0) as u32 + 3;
        let y = ((PLOT_BOTTOM + PLOT_TOP) / 2.0) as u32 + 3;
        assert_eq!(*img.get_pixel(x, y), BAR);

        let (left2, width2) = bar_span(1, 2);
        let x2 = (left2 + width2 / 2.0) as u32 + 3;
        assert_ne!(*img.get_pixel(x2, y), BAR, "zero total draws no bar");
    }

    #[test]
    fn taller_total_draws_taller_bar() {
        let img = draw_bar_chart(&bars(&[("a", 10.0), ("b", 40.0)]), None);
        let column_height = |i: usize| {
            let (left, width) = bar_span(i, 2);
            let x = (left + width / 2.0) as u32 + 3;
            (0..CHART_HEIGHT)
                .filter(|&y| *img.get_pixel(x, y) == BAR)
                .count()
        };
        assert!(column_height(1) > column_height(0) * 3);
    }

    #[test]
    fn negative_bar_hangs_below_zero() {
        let data = bars(&[("loss", -5.0), ("gain", 5.0)]);
        let img = draw_bar_chart(&data, None);
        let axis = Axis::fit(&[-5.0, 5.0]);
        let zero_y = axis.to_y(0.0) as u32;
        let (left, width) = bar_span(0, 2);
        let x = (left + width / 2.0) as u32 + 3;
        assert_eq!(*img.get_pixel(x, zero_y + 5), BAR);
        assert_ne!(*img.get_pixel(x, zero_y - 5), BAR);
    }

    #[test]
    fn drawing_is_deterministic() {
        let data = bars(&[("x", 1.5), ("y", 2.5)]);
        assert_eq!(
            draw_bar_chart(&data, None).into_raw(),
            draw_bar_chart(&data, None).into_raw()
        );
    }

    #[test]
    fn extreme_totals_keep_a_finite_axis() {
        for values in [vec![1.7e308], vec![-1e308, 1e308], vec![f64::MAX, -f64::MAX]] {
            let axis = Axis::fit(&values);
            assert!(axis.min.is_finite() && axis.max.is_finite() && axis.step.is_finite());
            assert!(axis.min <= 0.0 && axis.max > 0.0, "{values:?} -> {axis:?}");

            let ticks = axis.ticks();
            assert!(!ticks.is_empty() && ticks.len() <= MAX_TICKS + 1);
            assert!(ticks.iter().all(|t| t.is_finite()));

            let data: Vec<(String, f64)> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("S{i}"), *v))
                .collect();
            let img = draw_bar_chart(&data, None);
            assert!(img.pixels().any(|p| *p == BAR));
        }
    }

    #[test]
    fn huge_ticks_use_exponent_form() {
        assert_eq!(format_tick(5e307), "5e307");
        assert_eq!(format_tick(-1e20), "-1e20");
    }

    /// Pixels between the canvas top and the plot frame, across the plot width.
    fn title_band(img: &RgbImage) -> impl Iterator<Item = &Rgb<u8>> {
        (0..PLOT_TOP as u32 - 1).flat_map(move |y| {
            (PLOT_LEFT as u32 + 1..PLOT_RIGHT as u32).map(move |x| img.get_pixel(x, y))
        })
    }

    #[test]
    fn title_is_drawn_with_bundled_font() {
        let font = default_font().unwrap();
        let data = bars(&[("Sheet1", 6.0)]);

        let labelled = draw_bar_chart(&data, Some(&font));
        let dark = title_band(&labelled)
            .filter(|p| p.0.iter().all(|&c| c < 128))
            .count();
        assert!(dark > 50, "only {dark} dark pixels in the title band");

        let bare = draw_bar_chart(&data, None);
        assert!(title_band(&bare).all(|p| *p == WHITE));
    }

    #[test]
    fn labels_are_deterministic() {
        let font = default_font().unwrap();
        let data = bars(&[("x", 1.5), ("y", -2.5)]);
        assert_eq!(
            draw_bar_chart(&data, Some(&font)).into_raw(),
            draw_bar_chart(&data, Some(&font)).into_raw()
        );
    }

    #[test]
    fn unusable_font_path_falls_back_to_bundled() {
        assert!(load_font(Some(Path::new("/no/such/font.ttf"))).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.ttf");
        std::fs::write(&junk, b"not a font").unwrap();
        assert!(load_font(Some(&junk)).is_ok());
    }

    #[test]
    fn configured_font_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.ttf");
        std::fs::write(&path, DEFAULT_FONT).unwrap();
        assert!(load_font(Some(&path)).is_ok());
    }
}
