//! Per-timestep statistics tables and their CSV form.
//!
//! The CSV is what clients receive in the timeseries envelope: a `time`
//! column formatted `%Y-%m-%d` followed by the drill's declared headers.
//! Numbers are written in Rust's shortest round-trip form so parsing the CSV
//! back gives the same values.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use renderer::{ChartData, ChartValue};

use crate::error::{CoreError, CoreResult};

const TIME_COLUMN: &str = "time";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    fn to_field(&self) -> String {
        match self {
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Missing => String::new(),
        }
    }

    fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Cell::Missing
        } else if let Ok(v) = field.parse::<f64>() {
            Cell::Number(v)
        } else {
            Cell::Text(field.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// One output timestep.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsRow {
    pub time: DateTime<Utc>,
    pub values: Vec<Cell>,
}

/// Rows in time order, one value per declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsTable {
    columns: Vec<String>,
    rows: Vec<StatisticsRow>,
}

impl StatisticsTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, time: DateTime<Utc>, values: Vec<Cell>) -> CoreResult<()> {
        if values.len() != self.columns.len() {
            return Err(CoreError::Table(format!(
                "row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(StatisticsRow { time, values });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[StatisticsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| &r.values[index]).collect())
    }

    pub fn to_csv(&self) -> CoreResult<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(std::iter::once(TIME_COLUMN).chain(self.columns.iter().map(String::as_str)))?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(row.time.format(DATE_FORMAT).to_string());
            record.extend(row.values.iter().map(Cell::to_field));
            writer.write_record(&record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CoreError::Table(format!("failed to flush CSV: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| CoreError::Table(e.to_string()))
    }

    /// Parse a table written by [`StatisticsTable::to_csv`].
    pub fn from_csv(text: &str) -> CoreResult<Self> {
        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let headers = reader.headers()?.clone();
        if headers.get(0) != Some(TIME_COLUMN) {
            return Err(CoreError::Table("first column must be 'time'".to_string()));
        }
        let mut table = StatisticsTable::new(headers.iter().skip(1));

        for record in reader.records() {
            let record = record?;
            let date_text = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_text, DATE_FORMAT)
                .map_err(|e| CoreError::Table(format!("bad date '{}': {}", date_text, e)))?;
            let time = date.and_time(NaiveTime::MIN).and_utc();
            table.push_row(time, record.iter().skip(1).map(Cell::from_field).collect())?;
        }
        Ok(table)
    }

    /// Chart input sharing this table's dates and columns.
    pub fn to_chart_data(&self) -> ChartData {
        let times = self.rows.iter().map(|r| r.time.date_naive()).collect();
        self.columns
            .iter()
            .enumerate()
            .fold(ChartData::new(times), |data, (i, name)| {
                let values = self
                    .rows
                    .iter()
                    .map(|r| match &r.values[i] {
                        Cell::Number(v) => ChartValue::Number(*v),
                        Cell::Text(s) => ChartValue::Category(s.clone()),
                        Cell::Missing => ChartValue::Missing,
                    })
                    .collect();
                data.with_column(name.clone(), values)
            })
    }
}
