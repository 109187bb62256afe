//! Static SVG chart export via Plotters.
//!
//! Takes the same series description as the terminal plot: lines become
//! line series, point series become cross markers.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;
use crate::plot::ascii::{Series, Style};

const PALETTE: [RGBColor; 4] = [
    RGBColor(31, 119, 180),  // blue
    RGBColor(0, 0, 0),       // black
    RGBColor(44, 160, 44),   // green
    RGBColor(214, 39, 40),   // red
];

/// Write the chart to `path`. Failures are comparison failures: the run
/// does not depend on the picture.
pub fn write_svg_chart(
    path: &Path,
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[Series<'_>],
) -> Result<(), AppError> {
    draw(path, title, x_label, y_label, series)
        .map_err(|e| AppError::comparison(format!("Failed to write SVG '{}': {e}", path.display())))
}

fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !(min.is_finite() && max.is_finite()) {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1e-9);
    (min - pad, max + pad)
}

fn draw(
    path: &Path,
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[Series<'_>],
) -> Result<(), Box<dyn Error>> {
    let (x0, x1) = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let (y0, y1) = bounds(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));

    let root = SVGBackend::new(path, (960, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()?;

    for (idx, s) in series.iter().enumerate() {
        let color = PALETTE[idx % PALETTE.len()];
        let finite = s.points.iter().copied().filter(|(x, y)| x.is_finite() && y.is_finite());
        match s.style {
            Style::Line => {
                chart
                    .draw_series(LineSeries::new(finite, color.stroke_width(2)))?
                    .label(s.label)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], color));
            }
            Style::Points => {
                chart
                    .draw_series(finite.map(|p| Cross::new(p, 4, color)))?
                    .label(s.label)
                    .legend(move |(x, y)| Cross::new((x + 8, y), 4, color));
            }
        }
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_an_svg_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.svg");
        let truth = [(0.0, 84.0), (1.0, 40.0), (2.0, 20.0)];
        let noisy = [(0.0, 86.0), (1.0, 37.5), (2.0, 22.0)];
        write_svg_chart(
            &path,
            "Example inference of biexponential",
            "t",
            "signal",
            &[
                Series {
                    label: "Ground truth",
                    points: &truth,
                    glyph: '-',
                    style: Style::Line,
                },
                Series {
                    label: "Noisy samples",
                    points: &noisy,
                    glyph: 'x',
                    style: Style::Points,
                },
            ],
        )
        .unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn unwritable_path_is_a_comparison_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("fit.svg");
        let err = write_svg_chart(&path, "t", "x", "y", &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Comparison);
    }
}
