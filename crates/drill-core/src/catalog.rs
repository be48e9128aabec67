//! Process catalogue.
//!
//! The catalogue is read once at start-up from a YAML document with a
//! `processes:` list and never changes afterwards. Each entry names the
//! products to load, the drill strategy that reduces them and the styling
//! handed back to clients.

use std::collections::BTreeMap;
use std::path::Path;

use datacube::ExtraQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use wps_protocol::{GeometryKind, ProcessDescription, ProcessSummary};

use crate::drills::DrillKind;
use crate::error::{CoreError, CoreResult};

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "0.1".to_string()
}

fn default_chart_width() -> u32 {
    renderer::DEFAULT_WIDTH
}

fn default_chart_height() -> u32 {
    renderer::DEFAULT_HEIGHT
}

/// A product loaded for a drill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    /// Band names or aliases; `None` loads every band.
    #[serde(default)]
    pub measurements: Option<Vec<String>>,
    #[serde(default)]
    pub extra_query: ExtraQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartStyle {
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillStyle {
    /// Passed through verbatim as the envelope's `tableStyle`.
    #[serde(default)]
    pub table: Option<Value>,
    #[serde(default)]
    pub chart: ChartStyle,
}

impl DrillStyle {
    /// `chartLineColor` of a table column, or `default` when unstyled.
    pub fn column_color(&self, column: &str, default: &str) -> String {
        self.table
            .as_ref()
            .and_then(|t| t.get("columns"))
            .and_then(|c| c.get(column))
            .and_then(|c| c.get("chartLineColor"))
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub identifier: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub geometry_type: GeometryKind,
    /// Restrict polygon drills to the pixels inside the polygon.
    #[serde(default = "default_true")]
    pub mask: bool,
    pub drill: DrillKind,
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub style: DrillStyle,
}

impl ProcessDefinition {
    pub fn summary(&self) -> ProcessSummary {
        ProcessSummary {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            abstract_: self.abstract_.clone(),
            version: self.version.clone(),
        }
    }

    pub fn description(&self) -> ProcessDescription {
        self.drill
            .parameters()
            .into_iter()
            .fold(
                ProcessDescription::drill(self.summary(), self.geometry_type),
                ProcessDescription::with_input,
            )
    }

    fn validate(&self) -> CoreResult<()> {
        if self.products.is_empty() {
            return Err(CoreError::Config(format!(
                "process '{}' loads no products",
                self.identifier
            )));
        }
        let expected = self.drill.geometry_kind();
        if self.geometry_type != expected {
            return Err(CoreError::Config(format!(
                "process '{}' is a {} drill but declares geometry_type {}",
                self.identifier,
                expected.as_str(),
                self.geometry_type.as_str()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    processes: Vec<ProcessDefinition>,
}

/// Immutable set of drill processes keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct ProcessCatalog {
    processes: BTreeMap<String, ProcessDefinition>,
    order: Vec<String>,
}

impl ProcessCatalog {
    pub fn from_yaml_str(yaml: &str) -> CoreResult<Self> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        let mut catalog = ProcessCatalog::default();
        for process in file.processes {
            process.validate()?;
            if catalog.processes.contains_key(&process.identifier) {
                return Err(CoreError::Config(format!(
                    "duplicate process identifier '{}'",
                    process.identifier
                )));
            }
            catalog.order.push(process.identifier.clone());
            catalog.processes.insert(process.identifier.clone(), process);
        }
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&contents)?;
        info!(path = %path.display(), processes = catalog.len(), "Loaded process catalogue");
        Ok(catalog)
    }

    pub fn get(&self, identifier: &str) -> Option<&ProcessDefinition> {
        self.processes.get(identifier)
    }

    /// Processes in file order.
    pub fn processes(&self) -> impl Iterator<Item = &ProcessDefinition> {
        self.order.iter().filter_map(|id| self.processes.get(id))
    }

    pub fn summaries(&self) -> Vec<ProcessSummary> {
        self.processes().map(ProcessDefinition::summary).collect()
    }

    pub fn description(&self, identifier: &str) -> Option<ProcessDescription> {
        self.get(identifier).map(ProcessDefinition::description)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datacube::FuseRule;

    const CATALOG: &str = r##"
processes:
  - identifier: WOfSDrill
    title: Water Observations from Space Pixel Drill
    abstract: Pixel drill of water observations
    version: "0.3"
    geometry_type: point
    drill:
      kind: wofs_pixel
    products:
      - name: wofs_albers
        measurements: [water]
        extra_query:
          fuse_func: wofls_fuser
  - identifier: WIT
    title: Wetlands Insight Tool
    geometry_type: polygon
    drill:
      kind: wit
      wet_threshold: -400
    products:
      - name: ls8_fc_albers
        measurements: [bs, pv, npv]
    style:
      table:
        columns:
          Wet:
            chartLineColor: "#123456"
      chart:
        width: 800
"##;

    #[test]
    fn test_parse_catalog() {
        let catalog = ProcessCatalog::from_yaml_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        let ids: Vec<_> = catalog.processes().map(|p| p.identifier.as_str()).collect();
        assert_eq!(ids, vec!["WOfSDrill", "WIT"]);

        let wofs = catalog.get("WOfSDrill").unwrap();
        assert_eq!(wofs.drill, DrillKind::WofsPixel);
        assert!(wofs.mask);
        assert_eq!(wofs.products[0].extra_query.fuse, FuseRule::NodataBit(0));
        assert_eq!(wofs.style.chart, ChartStyle::default());

        let wit = catalog.get("WIT").unwrap();
        assert_eq!(
            wit.drill,
            DrillKind::Wit {
                wet_threshold: -400.0,
                valid_fraction: crate::stats::DEFAULT_VALID_FRACTION,
            }
        );
        assert_eq!(wit.version, "0.1");
        assert_eq!(wit.style.chart.width, 800);
        assert_eq!(wit.style.chart.height, renderer::DEFAULT_HEIGHT);
        assert_eq!(wit.style.column_color("Wet", "#000000"), "#123456");
        assert_eq!(wit.style.column_color("Open Water", "#4f81bd"), "#4f81bd");
    }

    #[test]
    fn test_descriptions() {
        let catalog = ProcessCatalog::from_yaml_str(CATALOG).unwrap();
        let wit = catalog.description("WIT").unwrap();
        let inputs: Vec<_> = wit.inputs.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(inputs, vec!["geometry", "start", "end", "aggregate"]);

        let wofs = catalog.description("WOfSDrill").unwrap();
        assert_eq!(wofs.inputs.len(), 3);
        assert_eq!(catalog.summaries()[0].abstract_, "Pixel drill of water observations");
        assert!(catalog.description("missing").is_none());
    }

    #[test]
    fn test_rejects_bad_entries() {
        let duplicate = format!("{}{}", CATALOG, &CATALOG["\nprocesses:\n".len()..]);
        assert!(matches!(
            ProcessCatalog::from_yaml_str(&duplicate),
            Err(CoreError::Config(_))
        ));

        let wrong_geometry = CATALOG.replace("geometry_type: point", "geometry_type: polygon");
        assert!(matches!(
            ProcessCatalog::from_yaml_str(&wrong_geometry),
            Err(CoreError::Config(_))
        ));

        let unknown_kind = CATALOG.replace("kind: wit", "kind: ndvi");
        assert!(matches!(
            ProcessCatalog::from_yaml_str(&unknown_kind),
            Err(CoreError::Catalog(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ProcessCatalog::from_path("/nonexistent/datacube-wps-config.yaml"),
            Err(CoreError::Io(_))
        ));
    }
}
