//! 2D trajectory figure (plotters, SVG output) and its PDF rendering.
//!
//! Uses the SVG backend to avoid system font dependencies. The PDF is
//! converted from that SVG by svg2pdf without loading fonts, so it carries
//! the traces, axes and ticks but not the text.

use std::fs;
use std::path::Path;

use log::info;
use plotters::prelude::*;
use trajgen_core::TimeSeries;

use crate::OutputError;

const FIGURE_SIZE: (u32, u32) = (1000, 1000);

fn plot_err<E: std::fmt::Display>(err: E) -> OutputError {
    OutputError::Plot(err.to_string())
}

/// Draws one x/y line per particle, all in one figure.
pub fn plot_trajectories(path: &Path, title: &str, series: &TimeSeries) -> Result<(), OutputError> {
    let root = SVGBackend::new(path, FIGURE_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let particles = series.particle_count();
    let Some((x_range, y_range)) = xy_bounds(series) else {
        root.draw(&Text::new(
            "No trajectory data",
            (FIGURE_SIZE.0 as i32 / 2 - 80, FIGURE_SIZE.1 as i32 / 2),
            ("sans-serif", 20).into_font().color(&BLACK),
        ))
        .map_err(plot_err)?;
        root.present().map_err(plot_err)?;
        return Ok(());
    };

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 14))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range.0..x_range.1, y_range.0..y_range.1)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("x")
        .y_desc("y")
        .draw()
        .map_err(plot_err)?;

    for index in 0..particles {
        chart
            .draw_series(LineSeries::new(
                series.trace_xy(index),
                Palette99::pick(index).stroke_width(1),
            ))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    info!("Plotted {} trajectories to {}", particles, path.display());
    Ok(())
}

/// Converts an SVG written by [`plot_trajectories`] into a one-page PDF.
pub fn svg_to_pdf(svg: &Path, pdf: &Path) -> Result<(), OutputError> {
    let source = fs::read_to_string(svg)?;
    let bytes = svg2pdf::convert_str(&source, svg2pdf::Options::default()).map_err(plot_err)?;
    fs::write(pdf, bytes)?;
    info!("Rendered {} to {}", svg.display(), pdf.display());
    Ok(())
}

/// Padded data bounds, `None` without any positions.
fn xy_bounds(series: &TimeSeries) -> Option<((f64, f64), (f64, f64))> {
    let mut records = series.frames.iter().flatten().peekable();
    records.peek()?;

    let (min_x, max_x, min_y, max_y) = records.fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(min_x, max_x, min_y, max_y), r| (min_x.min(r.x), max_x.max(r.x), min_y.min(r.y), max_y.max(r.y)),
    );
    Some((pad(min_x, max_x), pad(min_y, max_y)))
}

fn pad(min: f64, max: f64) -> (f64, f64) {
    let margin = ((max - min) * 0.05).max(0.5);
    (min - margin, max + margin)
}
