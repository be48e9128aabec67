//! Static SVG rendering of drill charts.
//!
//! Produces a self-contained SVG document with the plot area, date axis,
//! value or category axis and a legend on the right. The layout mirrors
//! the interactive chart closely enough for report thumbnails.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::chart::{ChartData, ChartKind, ChartSpec, ChartValue, SeriesStyle};
use crate::error::{RenderError, RenderResult};

const MARGIN_LEFT: f64 = 110.0;
const MARGIN_RIGHT: f64 = 170.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 40.0;
const MIN_PLOT: f64 = 10.0;
const DATE_LABELS: usize = 6;
const FONT: &str = "font-family=\"sans-serif\" font-size=\"11\" fill=\"#333\"";

/// Escape text for use in XML content and attribute values.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plot rectangle and the date-to-x mapping.
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    first: NaiveDate,
    span_days: f64,
}

impl Frame {
    fn new(spec: &ChartSpec, times: &[NaiveDate]) -> Self {
        let width = (spec.width as f64 - MARGIN_LEFT - MARGIN_RIGHT).max(MIN_PLOT);
        let height = (spec.height as f64 - MARGIN_TOP - MARGIN_BOTTOM).max(MIN_PLOT);
        let first = times.iter().min().copied().unwrap_or_default();
        let last = times.iter().max().copied().unwrap_or(first);
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width,
            height,
            first,
            span_days: (last - first).num_days() as f64,
        }
    }

    fn x(&self, date: NaiveDate) -> f64 {
        if self.span_days <= 0.0 {
            return self.left + self.width / 2.0;
        }
        let days = (date - self.first).num_days() as f64;
        self.left + days / self.span_days * self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }

    fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Render the chart as an SVG document.
pub fn render_svg(spec: &ChartSpec, data: &ChartData) -> RenderResult<String> {
    data.validate()?;
    let frame = Frame::new(spec, &data.times);

    let mut svg = String::new();
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = spec.width,
        h = spec.height
    );
    let _ = write!(svg, "<rect width=\"100%\" height=\"100%\" fill=\"white\"/>");
    let _ = write!(
        svg,
        "<text x=\"{}\" y=\"22\" font-family=\"sans-serif\" font-size=\"14\" font-weight=\"bold\" fill=\"#000\">{}</text>",
        frame.left,
        escape_text(&spec.title)
    );

    match &spec.kind {
        ChartKind::Tick {
            field,
            domain,
            colors,
        } => {
            let values = data.require_column(field)?;
            draw_ticks(&mut svg, &frame, &data.times, values, domain, colors);
            let entries: Vec<(&str, &str)> = domain
                .iter()
                .zip(colors)
                .map(|(d, c)| (d.as_str(), c.as_str()))
                .collect();
            draw_legend(&mut svg, &frame, field, &entries);
        }
        ChartKind::StackedArea {
            legend_title,
            normalize,
            series,
            ..
        } => {
            let columns = series
                .iter()
                .map(|s| data.require_column(&s.column))
                .collect::<RenderResult<Vec<_>>>()?;
            draw_areas(&mut svg, &frame, &data.times, series, &columns, *normalize)?;
            let entries: Vec<(&str, &str)> = series
                .iter()
                .map(|s| (s.label.as_str(), s.color.as_str()))
                .collect();
            draw_legend(&mut svg, &frame, legend_title, &entries);
        }
    }

    draw_date_axis(&mut svg, &frame, &data.times);
    svg.push_str("</svg>");
    Ok(svg)
}

fn draw_ticks(
    svg: &mut String,
    frame: &Frame,
    times: &[NaiveDate],
    values: &[ChartValue],
    domain: &[String],
    colors: &[String],
) {
    let band = frame.height / domain.len().max(1) as f64;

    for (i, category) in domain.iter().enumerate() {
        let y = frame.top + band * (i as f64 + 0.5);
        let _ = write!(
            svg,
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" dominant-baseline=\"middle\" {}>{}</text>",
            frame.left - 6.0,
            y,
            FONT,
            escape_text(category)
        );
    }
    let _ = write!(
        svg,
        "<line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\" stroke=\"#888\"/>",
        l = frame.left,
        t = frame.top,
        b = frame.bottom()
    );

    for (time, value) in times.iter().zip(values) {
        let Some(category) = value.as_category() else {
            continue;
        };
        let Some(index) = domain.iter().position(|d| d == category) else {
            continue;
        };
        let color = colors.get(index).map(String::as_str).unwrap_or("black");
        let x = frame.x(*time);
        let y = frame.top + band * (index as f64 + 0.5);
        let half = (band * 0.35).max(2.0);
        let _ = write!(
            svg,
            "<line x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"3\"/>",
            y - half,
            y + half,
            escape_text(color),
            x = x
        );
    }
}

fn draw_areas(
    svg: &mut String,
    frame: &Frame,
    times: &[NaiveDate],
    series: &[SeriesStyle],
    columns: &[&[ChartValue]],
    normalize: bool,
) -> RenderResult<()> {
    if times.is_empty() {
        return Ok(());
    }

    // Cumulative stack per date: stacks[t][k] is the top of series k.
    let mut stacks: Vec<Vec<f64>> = Vec::with_capacity(times.len());
    for t in 0..times.len() {
        let values: Vec<f64> = columns
            .iter()
            .map(|c| c[t].as_number().unwrap_or(0.0).max(0.0))
            .collect();
        let total: f64 = values.iter().sum();
        let scale = if normalize {
            if total > 0.0 {
                1.0 / total
            } else {
                0.0
            }
        } else {
            1.0
        };
        let mut acc = 0.0;
        stacks.push(
            values
                .iter()
                .map(|v| {
                    acc += v * scale;
                    acc
                })
                .collect(),
        );
    }

    let max = if normalize {
        1.0
    } else {
        stacks
            .iter()
            .filter_map(|s| s.last().copied())
            .fold(0.0_f64, f64::max)
            .max(f64::MIN_POSITIVE)
    };
    if !max.is_finite() {
        return Err(RenderError::InvalidChart("non-finite stacked total".to_string()));
    }
    let y = |v: f64| frame.bottom() - v / max * frame.height;

    // A single date is drawn as a narrow band so it stays visible.
    let xs: Vec<(f64, usize)> = if times.len() == 1 {
        let x = frame.x(times[0]);
        vec![(x - 4.0, 0), (x + 4.0, 0)]
    } else {
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by_key(|&i| times[i]);
        order.into_iter().map(|i| (frame.x(times[i]), i)).collect()
    };

    for (k, style) in series.iter().enumerate() {
        let mut points = String::new();
        for &(x, t) in &xs {
            let _ = write!(points, "{:.2},{:.2} ", x, y(stacks[t][k]));
        }
        for &(x, t) in xs.iter().rev() {
            let base = if k == 0 { 0.0 } else { stacks[t][k - 1] };
            let _ = write!(points, "{:.2},{:.2} ", x, y(base));
        }
        let _ = write!(
            svg,
            "<polygon points=\"{}\" fill=\"{}\" stroke=\"none\"/>",
            points.trim_end(),
            escape_text(&style.color)
        );
    }

    for i in 0..=4 {
        let fraction = i as f64 / 4.0;
        let value = fraction * max;
        let label = if normalize {
            format!("{:.0}%", fraction * 100.0)
        } else {
            format!("{}", (value * 100.0).round() / 100.0)
        };
        let ty = y(value);
        let _ = write!(
            svg,
            "<line x1=\"{:.1}\" y1=\"{ty:.1}\" x2=\"{:.1}\" y2=\"{ty:.1}\" stroke=\"#888\"/>\
             <text x=\"{:.1}\" y=\"{ty:.1}\" text-anchor=\"end\" dominant-baseline=\"middle\" {}>{}</text>",
            frame.left - 4.0,
            frame.left,
            frame.left - 6.0,
            FONT,
            label,
            ty = ty
        );
    }
    let _ = write!(
        svg,
        "<line x1=\"{l}\" y1=\"{t}\" x2=\"{l}\" y2=\"{b}\" stroke=\"#888\"/>",
        l = frame.left,
        t = frame.top,
        b = frame.bottom()
    );
    Ok(())
}

fn draw_date_axis(svg: &mut String, frame: &Frame, times: &[NaiveDate]) {
    let bottom = frame.bottom();
    let _ = write!(
        svg,
        "<line x1=\"{:.1}\" y1=\"{b:.1}\" x2=\"{:.1}\" y2=\"{b:.1}\" stroke=\"#888\"/>",
        frame.left,
        frame.right(),
        b = bottom
    );

    let mut sorted: Vec<NaiveDate> = times.to_vec();
    sorted.sort();
    sorted.dedup();
    if sorted.is_empty() {
        return;
    }

    let step = ((sorted.len() + DATE_LABELS - 1) / DATE_LABELS).max(1);
    for date in sorted.iter().step_by(step) {
        let x = frame.x(*date);
        let _ = write!(
            svg,
            "<line x1=\"{x:.1}\" y1=\"{b:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"#888\"/>\
             <text x=\"{x:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {}>{}</text>",
            bottom + 4.0,
            bottom + 16.0,
            FONT,
            date.format("%Y-%m-%d"),
            x = x,
            b = bottom
        );
    }
    let _ = write!(
        svg,
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" {}>Date</text>",
        frame.left + frame.width / 2.0,
        bottom + 32.0,
        FONT
    );
}

fn draw_legend(svg: &mut String, frame: &Frame, title: &str, entries: &[(&str, &str)]) {
    let x = frame.right() + 20.0;
    let _ = write!(
        svg,
        "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"sans-serif\" font-size=\"11\" font-weight=\"bold\" fill=\"#000\">{}</text>",
        x,
        frame.top + 8.0,
        escape_text(title)
    );
    for (i, (label, color)) in entries.iter().enumerate() {
        let y = frame.top + 22.0 + i as f64 * 16.0;
        let _ = write!(
            svg,
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"10\" height=\"10\" fill=\"{}\"/>\
             <text x=\"{:.1}\" y=\"{:.1}\" {}>{}</text>",
            x,
            y - 9.0,
            escape_text(color),
            x + 16.0,
            y,
            FONT,
            escape_text(label)
        );
    }
}
