// src/chart.rs
use crate::error::AppError;
use crate::models::ChartPoint;
use plotters::prelude::*;

pub const POSITIVE: RGBColor = RGBColor(0x10, 0xb9, 0x81);
pub const NEGATIVE: RGBColor = RGBColor(0xef, 0x44, 0x44);
const BACKGROUND: RGBColor = RGBColor(0x1e, 0x29, 0x3b);
const GRID: RGBColor = RGBColor(0x33, 0x41, 0x55);
const AXIS: RGBColor = RGBColor(0x94, 0xa3, 0xb8);

pub fn series_color(positive: bool) -> RGBColor {
    if positive {
        POSITIVE
    } else {
        NEGATIVE
    }
}

fn chart_err<E: std::fmt::Display>(e: E) -> AppError {
    AppError::Chart(e.to_string())
}

/// Price range padded so a flat or single-point series still gets a visible band.
fn price_bounds(points: &[ChartPoint]) -> (f64, f64) {
    let min = points.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max);
    let padding = if max > min {
        (max - min) * 0.1
    } else {
        (max.abs() * 0.01).max(1.0)
    };
    (min - padding, max + padding)
}

/// Renders an area chart of `points` as an SVG document.
pub fn render_svg(
    points: &[ChartPoint],
    color: RGBColor,
    width: u32,
    height: u32,
) -> Result<String, AppError> {
    if points.is_empty() {
        return Ok(placeholder_svg(width, height));
    }

    let (low, high) = price_bounds(points);
    let last = points.len().saturating_sub(1).max(1);
    let labels: Vec<&str> = points.iter().map(|p| p.time.as_str()).collect();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&BACKGROUND).map_err(chart_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(12)
            .x_label_area_size(28)
            .y_label_area_size(72)
            .build_cartesian_2d(0usize..last, low..high)
            .map_err(chart_err)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(&GRID)
            .light_line_style(&BACKGROUND)
            .axis_style(&AXIS)
            .label_style(("sans-serif", 12).into_font().color(&AXIS))
            .x_labels(6)
            .y_labels(6)
            .x_label_formatter(&|i| labels.get(*i).map(|s| s.to_string()).unwrap_or_default())
            .y_label_formatter(&|v| format!("${:.2}", v))
            .draw()
            .map_err(chart_err)?;

        chart
            .draw_series(
                AreaSeries::new(
                    points.iter().enumerate().map(|(i, p)| (i, p.price)),
                    low,
                    &color.mix(0.3),
                )
                .border_style(color.stroke_width(2)),
            )
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }

    Ok(svg)
}

fn placeholder_svg(width: u32, height: u32) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><rect width="100%" height="100%" rx="12" fill="#1e293b"/><text x="50%" y="50%" fill="#94a3b8" font-family="sans-serif" font-size="14" text-anchor="middle">No chart data available</text></svg>"##,
        w = width,
        h = height
    )
}
