//! Chart definitions and the interactive (Vega-Lite) rendering.
//!
//! A drill describes its chart with a [`ChartSpec`] and hands over the
//! statistics as [`ChartData`]: one date axis plus named value columns. The
//! same pair drives both the HTML page and the static image, so the two
//! always agree.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use crate::error::{RenderError, RenderResult};

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 300;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const TOOLTIP_DATE_FORMAT: &str = "%d %B, %Y";

/// How one table column appears in a stacked chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStyle {
    /// Column in [`ChartData`].
    pub column: String,
    /// Legend label.
    pub label: String,
    /// CSS colour.
    pub color: String,
}

impl SeriesStyle {
    pub fn new(column: impl Into<String>, label: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            label: label.into(),
            color: color.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartKind {
    /// One tick per date, placed on a categorical y axis.
    Tick {
        field: String,
        domain: Vec<String>,
        colors: Vec<String>,
    },
    /// Stacked areas of several numeric columns, optionally normalised to
    /// proportions.
    StackedArea {
        legend_title: String,
        value_title: String,
        normalize: bool,
        series: Vec<SeriesStyle>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub kind: ChartKind,
}

impl ChartSpec {
    pub fn new(title: impl Into<String>, kind: ChartKind) -> Self {
        Self {
            title: title.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            kind,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartValue {
    Number(f64),
    Category(String),
    Missing,
}

impl ChartValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ChartValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            ChartValue::Category(c) => Some(c),
            _ => None,
        }
    }
}

/// Column-oriented chart input sharing one date axis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    pub times: Vec<NaiveDate>,
    pub columns: Vec<(String, Vec<ChartValue>)>,
}

impl ChartData {
    pub fn new(times: Vec<NaiveDate>) -> Self {
        Self {
            times,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<ChartValue>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    pub fn column(&self, name: &str) -> Option<&[ChartValue]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub(crate) fn require_column(&self, name: &str) -> RenderResult<&[ChartValue]> {
        self.column(name)
            .ok_or_else(|| RenderError::InvalidChart(format!("no column named '{}'", name)))
    }

    /// Every column must have one value per date.
    pub fn validate(&self) -> RenderResult<()> {
        for (name, values) in &self.columns {
            if values.len() != self.times.len() {
                return Err(RenderError::InvalidChart(format!(
                    "column '{}' has {} values for {} dates",
                    name,
                    values.len(),
                    self.times.len()
                )));
            }
        }
        Ok(())
    }
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Build the Vega-Lite specification, data inlined in long form.
pub fn vega_lite_spec(spec: &ChartSpec, data: &ChartData) -> RenderResult<Value> {
    data.validate()?;

    let (records, mark, encoding) = match &spec.kind {
        ChartKind::Tick {
            field,
            domain,
            colors,
        } => {
            let values = data.require_column(field)?;
            let records: Vec<Value> = data
                .times
                .iter()
                .zip(values)
                .filter_map(|(t, v)| {
                    let category = v.as_category()?;
                    let mut record = Map::new();
                    record.insert("time".to_string(), Value::String(format_date(t)));
                    record.insert(field.clone(), Value::String(category.to_string()));
                    Some(Value::Object(record))
                })
                .collect();
            let encoding = json!({
                "x": { "field": "time", "type": "temporal", "title": "Date" },
                "y": { "field": field, "type": "nominal", "scale": { "domain": domain } },
                "color": {
                    "field": field,
                    "type": "nominal",
                    "scale": { "domain": domain, "range": colors }
                },
                "tooltip": [
                    { "field": field, "type": "nominal" },
                    { "field": "time", "type": "temporal", "format": TOOLTIP_DATE_FORMAT, "title": "Date" }
                ]
            });
            (records, json!({ "type": "tick", "thickness": 3 }), encoding)
        }
        ChartKind::StackedArea {
            legend_title,
            value_title,
            normalize,
            series,
        } => {
            let mut records = Vec::new();
            for style in series {
                let values = data.require_column(&style.column)?;
                for (t, v) in data.times.iter().zip(values) {
                    if let Some(number) = v.as_number() {
                        let mut record = Map::new();
                        record.insert("time".to_string(), Value::String(format_date(t)));
                        record.insert(legend_title.clone(), Value::String(style.label.clone()));
                        record.insert(value_title.clone(), json!(number));
                        records.push(Value::Object(record));
                    }
                }
            }
            let labels: Vec<&str> = series.iter().map(|s| s.label.as_str()).collect();
            let colors: Vec<&str> = series.iter().map(|s| s.color.as_str()).collect();
            let stack = if *normalize { "normalize" } else { "zero" };
            let encoding = json!({
                "x": { "field": "time", "type": "temporal", "title": "Date" },
                "y": {
                    "field": value_title,
                    "type": "quantitative",
                    "stack": stack
                },
                "color": {
                    "field": legend_title,
                    "type": "nominal",
                    "scale": { "domain": labels, "range": colors }
                },
                "tooltip": [
                    { "field": "time", "type": "temporal", "format": TOOLTIP_DATE_FORMAT, "title": "Date" },
                    { "field": value_title, "type": "quantitative" },
                    { "field": legend_title, "type": "nominal" }
                ]
            });
            (records, json!("area"), encoding)
        }
    };

    Ok(json!({
        "$schema": VEGA_LITE_SCHEMA,
        "title": spec.title,
        "width": spec.width,
        "height": spec.height,
        "autosize": { "type": "fit" },
        "background": "white",
        "data": { "values": records },
        "mark": mark,
        "encoding": encoding
    }))
}

/// Standalone HTML page embedding the chart with vega-embed.
pub fn render_html(spec: &ChartSpec, data: &ChartData) -> RenderResult<String> {
    let vega = vega_lite_spec(spec, data)?;
    // Keep the inline script from being closed by data containing "</".
    let spec_json = serde_json::to_string(&vega)?.replace("</", "<\\/");

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
</head>
<body>
  <div id="vis"></div>
  <script type="text/javascript">
    var spec = {spec_json};
    vegaEmbed('#vis', spec).catch(console.error);
  </script>
</body>
</html>
"#,
        title = crate::svg::escape_text(&spec.title),
        spec_json = spec_json,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, d).unwrap()
    }

    fn tick_spec() -> ChartSpec {
        ChartSpec::new(
            "Water Observations for -35.900000,146.650000",
            ChartKind::Tick {
                field: "Observation".to_string(),
                domain: vec!["wet".into(), "dry".into(), "not observable".into()],
                colors: vec!["blue".into(), "red".into(), "grey".into()],
            },
        )
    }

    #[test]
    fn test_tick_spec() {
        let data = ChartData::new(vec![date(1), date(17)]).with_column(
            "Observation",
            vec![ChartValue::Category("wet".into()), ChartValue::Category("dry".into())],
        );
        let vega = vega_lite_spec(&tick_spec(), &data).unwrap();

        assert_eq!(vega["mark"]["type"], json!("tick"));
        assert_eq!(vega["width"], json!(1000));
        assert_eq!(vega["data"]["values"][1], json!({ "time": "2019-01-17", "Observation": "dry" }));
        assert_eq!(vega["encoding"]["color"]["scale"]["range"], json!(["blue", "red", "grey"]));
    }

    #[test]
    fn test_stacked_area_drops_missing_values() {
        let spec = ChartSpec::new(
            "Percentage of Area - Fractional Cover",
            ChartKind::StackedArea {
                legend_title: "Cover Type".into(),
                value_title: "Area".into(),
                normalize: true,
                series: vec![
                    SeriesStyle::new("Bare Soil", "BS", "#8B0000"),
                    SeriesStyle::new("Photosynthetic Vegetation", "PV", "green"),
                ],
            },
        )
        .with_size(800, 200);
        let data = ChartData::new(vec![date(1), date(2)])
            .with_column("Bare Soil", vec![ChartValue::Number(40.0), ChartValue::Missing])
            .with_column("Photosynthetic Vegetation", vec![ChartValue::Number(60.0), ChartValue::Number(f64::NAN)]);

        let vega = vega_lite_spec(&spec, &data).unwrap();
        let values = vega["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], json!({ "time": "2019-01-01", "Cover Type": "BS", "Area": 40.0 }));
        assert_eq!(vega["encoding"]["y"]["stack"], json!("normalize"));
        assert_eq!(vega["encoding"]["color"]["scale"]["domain"], json!(["BS", "PV"]));
        assert_eq!(vega["height"], json!(200));
    }

    #[test]
    fn test_mismatched_columns_rejected() {
        let data = ChartData::new(vec![date(1)]).with_column("Observation", vec![]);
        assert!(matches!(
            vega_lite_spec(&tick_spec(), &data),
            Err(RenderError::InvalidChart(_))
        ));

        let data = ChartData::new(vec![date(1)]);
        assert!(vega_lite_spec(&tick_spec(), &data).is_err());
    }

    #[test]
    fn test_html_page_escapes_script_close() {
        let data = ChartData::new(vec![date(1)])
            .with_column("Observation", vec![ChartValue::Category("</script>".into())]);
        let html = render_html(&tick_spec(), &data).unwrap();

        assert!(html.contains("vega-embed@6"));
        assert!(html.contains("<title>Water Observations for -35.900000,146.650000</title>"));
        assert_eq!(html.matches("</script>").count(), 4);
        assert!(html.contains("<\\/script>"));
    }
}
