use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// An artifact produced by one operator output.
///
/// The engine only routes these by name; interpretation is left to the
/// operators that consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DetectionResult {
    Table(DataTable),
    Anomalies(Vec<Anomaly>),
    Value(Value),
}

impl DetectionResult {
    pub fn as_table(&self) -> Option<&DataTable> {
        match self {
            DetectionResult::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_anomalies(&self) -> Option<&[Anomaly]> {
        match self {
            DetectionResult::Anomalies(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            DetectionResult::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DetectionResult::Table(_) => "table",
            DetectionResult::Anomalies(_) => "anomalies",
            DetectionResult::Value(_) => "value",
        }
    }
}

/// Row-oriented table of JSON cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Numeric view of a column. Null cells read as NaN.
    pub fn doubles(&self, column: &str) -> Result<Vec<f64>> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| anyhow!("column '{}' not found", column))?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row.get(idx) {
                Some(Value::Number(n)) => n
                    .as_f64()
                    .ok_or_else(|| anyhow!("row {} column '{}' is not a double", i, column)),
                Some(Value::Null) | None => Ok(f64::NAN),
                Some(other) => Err(anyhow!(
                    "row {} column '{}' is not numeric: {}",
                    i,
                    column,
                    other
                )),
            })
            .collect()
    }

    pub fn longs(&self, column: &str) -> Result<Vec<i64>> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| anyhow!("column '{}' not found", column))?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.get(idx)
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| anyhow!("row {} column '{}' is not an integer", i, column))
            })
            .collect()
    }

    /// Keeps the rows for which `keep` returns true, preserving order.
    pub fn retain_rows(&self, mut keep: impl FnMut(&[Value]) -> bool) -> DataTable {
        DataTable {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub start_time: i64,
    pub end_time: i64,
    pub avg_current_val: f64,
    pub avg_baseline_val: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<AnomalySeverity>,
}

impl Anomaly {
    pub fn duration_millis(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Relative deviation of the current value from the baseline.
    pub fn deviation(&self) -> f64 {
        (self.avg_current_val - self.avg_baseline_val).abs() / self.avg_baseline_val
    }
}

/// Severities in priority order: `Critical` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalySeverity {
    Critical,
    High,
    Medium,
    Low,
    Default,
}

impl FromStr for AnomalySeverity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(AnomalySeverity::Critical),
            "HIGH" => Ok(AnomalySeverity::High),
            "MEDIUM" => Ok(AnomalySeverity::Medium),
            "LOW" => Ok(AnomalySeverity::Low),
            "DEFAULT" => Ok(AnomalySeverity::Default),
            _ => Err(anyhow!("unknown anomaly severity '{}'", s)),
        }
    }
}

impl fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalySeverity::Critical => "CRITICAL",
            AnomalySeverity::High => "HIGH",
            AnomalySeverity::Medium => "MEDIUM",
            AnomalySeverity::Low => "LOW",
            AnomalySeverity::Default => "DEFAULT",
        };
        f.write_str(s)
    }
}
