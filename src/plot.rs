//! SVG charts of an analysis [Report] using the `plotters` crate.
//!
//! The left panel shows every dataset over time together with the forecast, the right panel
//! (single predictor only) the response against the predictor with the fitted line.

use std::ops::Range;
use std::path::Path;

use itertools::{Itertools, MinMaxResult};
use plotters::coord::{types::RangedCoordf64, Shift};
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

use crate::analysis::{Model, Report};

/// Size of the rendered chart in pixels
pub const DEFAULT_SIZE: (u32, u32) = (1400, 600);

const ERROR_BAR_WIDTH: u32 = 12;

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("failed to draw chart: {0}")]
    Draw(String),

    #[error("nothing to plot")]
    NoData,
}

impl<E> From<DrawingAreaErrorKind<E>> for PlotError
where
    E: std::error::Error + Send + Sync,
{
    fn from(err: DrawingAreaErrorKind<E>) -> Self {
        PlotError::Draw(err.to_string())
    }
}

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// Extend the range spanned by `values` by 5% on both sides
fn padded_range(values: impl IntoIterator<Item = f64>) -> Result<Range<f64>, PlotError> {
    let (min, max) = match values.into_iter().filter(|v| v.is_finite()).minmax() {
        MinMaxResult::NoElements => return Err(PlotError::NoData),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let pad = if max > min {
        (max - min) * 0.05
    } else {
        max.abs().max(1.) * 0.05
    };
    Ok(min - pad..max + pad)
}

fn legend_line(color: RGBAColor) -> impl Fn((i32, i32)) -> PathElement<(i32, i32)> {
    move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color)
}

/// Render `report` as an SVG file at `path`.
pub fn render_svg(report: &Report, path: impl AsRef<Path>, size: (u32, u32)) -> Result<(), PlotError> {
    let path = path.as_ref();
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let title = match report.r_squared() {
        Some(r2) => format!("Predicting Future Value - R² = {r2:.4}"),
        None => "Predicting Future Value".to_string(),
    };
    let body = root.titled(&title, ("sans-serif", 22).into_font())?;

    match &report.model {
        Model::Simple { .. } => {
            let panels = body.split_evenly((1, 2));
            draw_over_time(&panels[0], report)?;
            draw_against_predictor(&panels[1], report)?;
        }
        Model::Multiple(_) => draw_over_time(&body, report)?,
    }

    root.present()?;
    tracing::info!(path = %path.display(), "rendered chart");
    Ok(())
}

/// Every dataset against the year, plus the predictor assumptions and the forecast
fn draw_over_time(area: &Area<'_>, report: &Report) -> Result<(), PlotError> {
    let forecast_x = f64::from(report.forecast_year);
    let years: Vec<f64> = report.years.iter().copied().map(f64::from).collect();
    let x_range = padded_range(years.iter().copied().chain([forecast_x]))?;
    let y_range = padded_range(
        report
            .response
            .iter()
            .copied()
            .chain(
                report
                    .predictors
                    .iter()
                    .flat_map(|p| p.values.iter().copied().chain([p.future])),
            )
            .chain([report.lower(), report.upper()]),
    )?;

    let caption = match report.predictors.as_slice() {
        [single] => format!("Change in {} and {} Over Time", report.response_name, single.name),
        _ => format!("Change in {} Over Time", report.response_name),
    };
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18).into_font())
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;
    chart
        .configure_mesh()
        .x_desc("Year")
        .y_desc("Data")
        .x_label_formatter(&|x| format!("{x:.0}"))
        .draw()?;

    let datasets = std::iter::once((report.response_name.as_str(), &report.response, None))
        .chain(
            report
                .predictors
                .iter()
                .map(|p| (p.name.as_str(), &p.values, Some(p.future))),
        );
    for (idx, (name, values, future)) in datasets.enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let points: Vec<(f64, f64)> = years.iter().copied().zip(values.iter().copied()).collect();
        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(name)
            .legend(legend_line(color));
        chart.draw_series(points.iter().map(|&p| Circle::new(p, 3, color.filled())))?;
        if let Some(future) = future {
            chart
                .draw_series(std::iter::once(TriangleMarker::new(
                    (forecast_x, future),
                    6,
                    color.filled(),
                )))?
                .label(format!("Future {name}"))
                .legend(move |(x, y)| TriangleMarker::new((x + 10, y), 6, color.filled()));
        }
    }

    draw_forecast(&mut chart, forecast_x, report, "Predicted")?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

/// Scatter of the response against the single predictor with the fitted line and the forecast
fn draw_against_predictor(area: &Area<'_>, report: &Report) -> Result<(), PlotError> {
    let (Model::Simple { line, forecast, .. }, [predictor]) =
        (&report.model, report.predictors.as_slice())
    else {
        return Ok(());
    };

    let x_range = padded_range(predictor.values.iter().copied().chain([forecast.x]))?;
    let (x_min, x_max) = predictor
        .values
        .iter()
        .copied()
        .chain([forecast.x])
        .minmax()
        .into_option()
        .ok_or(PlotError::NoData)?;
    let y_range = padded_range(
        report
            .response
            .iter()
            .copied()
            .chain([line.eval(x_min), line.eval(x_max), forecast.lower(), forecast.upper()]),
    )?;

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("{} vs. {}", predictor.name, report.response_name),
            ("sans-serif", 18).into_font(),
        )
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;
    chart
        .configure_mesh()
        .x_desc(predictor.name.as_str())
        .y_desc(report.response_name.as_str())
        .draw()?;

    let data_color = Palette99::pick(0).to_rgba();
    chart
        .draw_series(
            predictor
                .values
                .iter()
                .copied()
                .zip(report.response.iter().copied())
                .map(|p| Circle::new(p, 3, data_color.filled())),
        )?
        .label("Data")
        .legend(move |(x, y)| Circle::new((x + 10, y), 3, data_color.filled()));

    let line_color = Palette99::pick(1).to_rgba();
    chart
        .draw_series(LineSeries::new(
            [(x_min, line.eval(x_min)), (x_max, line.eval(x_max))],
            line_color.stroke_width(2),
        ))?
        .label("Regression line")
        .legend(legend_line(line_color));

    draw_forecast(&mut chart, forecast.x, report, "Prediction Interval")?;

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(())
}

fn draw_forecast(
    chart: &mut ChartContext<'_, SVGBackend<'_>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    x: f64,
    report: &Report,
    label: &str,
) -> Result<(), PlotError> {
    let color = BLACK.to_rgba();
    chart
        .draw_series(std::iter::once(ErrorBar::new_vertical(
            x,
            report.lower(),
            report.prediction,
            report.upper(),
            color.filled(),
            ERROR_BAR_WIDTH,
        )))?
        .label(label)
        .legend(legend_line(color));
    Ok(())
}
