//! Process outputs and the execute response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::media_types;

/// JSON wrapper around a CSV time series, as consumed by TerriaJS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesEnvelope {
    /// CSV text, header row first.
    pub data: String,

    #[serde(rename = "isEnabled")]
    pub is_enabled: bool,

    /// Always `"csv"`.
    #[serde(rename = "type")]
    pub type_: String,

    pub name: String,

    #[serde(rename = "tableStyle", skip_serializing_if = "Option::is_none", default)]
    pub table_style: Option<Value>,
}

impl TimeseriesEnvelope {
    pub fn csv(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            is_enabled: false,
            type_: "csv".to_string(),
            name: name.into(),
            table_style: None,
        }
    }

    pub fn enabled(mut self, is_enabled: bool) -> Self {
        self.is_enabled = is_enabled;
        self
    }

    pub fn with_table_style(mut self, style: Option<Value>) -> Self {
        self.table_style = style;
        self
    }
}

/// One named output of a drill run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", rename_all = "lowercase")]
pub enum ProcessOutput {
    /// Statistics table wrapped in its envelope.
    Timeseries {
        #[serde(rename = "mimeType")]
        mime_type: String,
        value: TimeseriesEnvelope,
    },
    /// Interactive chart page.
    Url {
        #[serde(rename = "mimeType")]
        mime_type: String,
        href: String,
    },
    /// Static chart image.
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
        href: String,
    },
}

impl ProcessOutput {
    pub fn timeseries(value: TimeseriesEnvelope) -> Self {
        ProcessOutput::Timeseries {
            mime_type: media_types::TERRIA_CATALOG_MEMBER.to_string(),
            value,
        }
    }

    pub fn url(href: impl Into<String>) -> Self {
        ProcessOutput::Url {
            mime_type: media_types::HTML.to_string(),
            href: href.into(),
        }
    }

    pub fn image(href: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ProcessOutput::Image {
            mime_type: mime_type.into(),
            href: href.into(),
        }
    }

    /// Output identifier as advertised in the process description.
    pub fn identifier(&self) -> &'static str {
        match self {
            ProcessOutput::Timeseries { .. } => "timeseries",
            ProcessOutput::Url { .. } => "url",
            ProcessOutput::Image { .. } => "image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Succeeded,
    Failed,
}

/// Response to a successful execute request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub process: String,

    #[serde(rename = "jobID")]
    pub job_id: String,

    pub status: ExecutionStatus,

    pub outputs: Vec<ProcessOutput>,
}

impl ExecuteResponse {
    pub fn succeeded(process: impl Into<String>, job_id: impl Into<String>, outputs: Vec<ProcessOutput>) -> Self {
        Self {
            process: process.into(),
            job_id: job_id.into(),
            status: ExecutionStatus::Succeeded,
            outputs,
        }
    }

    pub fn output(&self, identifier: &str) -> Option<&ProcessOutput> {
        self.outputs.iter().find(|o| o.identifier() == identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serialization() {
        let envelope = TimeseriesEnvelope::csv("WOfS", "time,Observation\n2019-01-01,wet\n");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            json!({
                "data": "time,Observation\n2019-01-01,wet\n",
                "isEnabled": false,
                "type": "csv",
                "name": "WOfS"
            })
        );

        let styled = TimeseriesEnvelope::csv("FC", "time\n")
            .enabled(true)
            .with_table_style(Some(json!({ "columns": {} })));
        let json = serde_json::to_value(&styled).unwrap();
        assert_eq!(json["isEnabled"], json!(true));
        assert_eq!(json["tableStyle"], json!({ "columns": {} }));
    }

    #[test]
    fn test_outputs_are_tagged_by_identifier() {
        let outputs = vec![
            ProcessOutput::timeseries(TimeseriesEnvelope::csv("WIT", "time\n")),
            ProcessOutput::url("https://bucket.example/abc/chart.html"),
            ProcessOutput::image("https://bucket.example/abc/chart.png", media_types::PNG),
        ];
        let response = ExecuteResponse::succeeded("WIT", "abc", outputs);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], json!("succeeded"));
        assert_eq!(json["jobID"], json!("abc"));
        assert_eq!(json["outputs"][0]["id"], json!("timeseries"));
        assert_eq!(json["outputs"][1]["href"], json!("https://bucket.example/abc/chart.html"));
        assert_eq!(json["outputs"][2]["mimeType"], json!("image/png"));

        let back: ExecuteResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
        assert!(matches!(back.output("image"), Some(ProcessOutput::Image { .. })));
    }
}
