//! Process listings and descriptions.

use serde::{Deserialize, Serialize};

use crate::inputs::GeometryKind;
use crate::media_types;

/// Entry in the process list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub identifier: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessList {
    pub processes: Vec<ProcessSummary>,
}

/// Data type of a literal input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralType {
    Integer,
    Double,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDescription {
    pub identifier: String,
    pub title: String,

    /// Accepted media types for complex inputs.
    #[serde(rename = "mimeTypes", skip_serializing_if = "Vec::is_empty", default)]
    pub mime_types: Vec<String>,

    /// Schema URL for complex inputs.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<String>,

    #[serde(rename = "dataType", skip_serializing_if = "Option::is_none", default)]
    pub data_type: Option<LiteralType>,

    #[serde(rename = "minOccurs")]
    pub min_occurs: u32,

    #[serde(rename = "maxOccurs")]
    pub max_occurs: u32,
}

impl InputDescription {
    pub fn geometry(kind: GeometryKind) -> Self {
        let schema = match kind {
            GeometryKind::Point => "http://geojson.org/geojson-spec.html#point",
            GeometryKind::Polygon => "http://geojson.org/geojson-spec.html#polygon",
        };
        Self {
            identifier: "geometry".to_string(),
            title: "Geometry".to_string(),
            mime_types: vec![media_types::GEO_JSON.to_string()],
            schema: Some(schema.to_string()),
            data_type: None,
            min_occurs: 1,
            max_occurs: 1,
        }
    }

    pub fn datetime(identifier: &str, title: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            mime_types: vec![media_types::GEO_JSON.to_string()],
            schema: Some("http://www.w3.org/TR/xmlschema-2/#dateTime".to_string()),
            data_type: None,
            min_occurs: 0,
            max_occurs: 1,
        }
    }

    /// Optional literal parameter.
    pub fn literal(identifier: &str, title: &str, data_type: LiteralType) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            mime_types: Vec::new(),
            schema: None,
            data_type: Some(data_type),
            min_occurs: 0,
            max_occurs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDescription {
    pub identifier: String,
    pub title: String,
    #[serde(rename = "mimeTypes")]
    pub mime_types: Vec<String>,
}

impl OutputDescription {
    fn new(identifier: &str, title: &str, mime_types: &[&str]) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            mime_types: mime_types.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Full description of one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescription {
    #[serde(flatten)]
    pub summary: ProcessSummary,
    pub inputs: Vec<InputDescription>,
    pub outputs: Vec<OutputDescription>,
}

impl ProcessDescription {
    /// Description with the standard geometry/start/end inputs and the
    /// timeseries, chart page and chart image outputs.
    pub fn drill(summary: ProcessSummary, kind: GeometryKind) -> Self {
        Self {
            summary,
            inputs: vec![
                InputDescription::geometry(kind),
                InputDescription::datetime("start", "Start Date"),
                InputDescription::datetime("end", "End date"),
            ],
            outputs: vec![
                OutputDescription::new(
                    "timeseries",
                    "Timeseries Drill",
                    &[media_types::TERRIA_CATALOG_MEMBER],
                ),
                OutputDescription::new("url", "Chart page", &[media_types::HTML]),
                OutputDescription::new("image", "Chart image", &[media_types::PNG, media_types::SVG]),
            ],
        }
    }

    pub fn with_input(mut self, input: InputDescription) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.summary.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary() -> ProcessSummary {
        ProcessSummary {
            identifier: "WIT".to_string(),
            title: "Wetlands Insight Tool".to_string(),
            abstract_: "Polygon drill".to_string(),
            version: "0.1".to_string(),
        }
    }

    #[test]
    fn test_drill_description() {
        let description = ProcessDescription::drill(summary(), GeometryKind::Polygon)
            .with_input(InputDescription::literal("aggregate", "Aggregation window (days)", LiteralType::Integer));

        assert_eq!(description.identifier(), "WIT");
        let ids: Vec<_> = description.inputs.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["geometry", "start", "end", "aggregate"]);

        let json = serde_json::to_value(&description).unwrap();
        assert_eq!(json["abstract"], json!("Polygon drill"));
        assert_eq!(json["inputs"][0]["minOccurs"], json!(1));
        assert!(json["inputs"][0]["schema"].as_str().unwrap().ends_with("#polygon"));
        assert_eq!(json["inputs"][3]["dataType"], json!("integer"));
        assert!(json["inputs"][3].get("mimeTypes").is_none());
        assert_eq!(json["outputs"][2]["identifier"], json!("image"));
    }
}
