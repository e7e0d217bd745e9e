// ============================================================
// Layer 3 — Metric Record
// ============================================================
// A single scalar observation produced during training:
//
//   ("batch.loss", 5.29, 0)
//   ("batch.accuracy", 0.01, 0)
//   ("test.accuracy", 0.12, 1000)
//
// `step` is the global optimiser step at which the value was
// observed, so per-batch and per-epoch curves line up when
// plotted against the same axis.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name:  String,
    pub value: f64,
    pub step:  usize,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, value: f64, step: usize) -> Self {
        Self { name: name.into(), value, step }
    }

    /// One CSV row in the `step,name,value` layout of `metrics.csv`.
    /// The value is written in shortest round-trip form, so tiny
    /// norms survive a write/read cycle exactly.
    pub fn to_csv_row(&self) -> String {
        format!("{},{},{}", self.step, self.name, self.value)
    }

    /// Parse a row written by [`MetricRecord::to_csv_row`].
    pub fn from_csv_row(row: &str) -> Option<Self> {
        let mut parts = row.splitn(3, ',');
        let step  = parts.next()?.trim().parse().ok()?;
        let name  = parts.next()?.trim().to_string();
        let value = parts.next()?.trim().parse().ok()?;
        Some(Self { name, value, step })
    }
}
