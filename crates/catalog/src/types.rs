use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Event family, used by the engine to pick hard result ceilings and
/// significance columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventFamily {
    Earthquake,
    Storm,
    Fire,
    #[default]
    Generic,
}

/// One named event file a source exposes ("events", "positions", "fires").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFileDef {
    pub description: String,
    #[serde(default)]
    pub family: EventFamily,
}

/// A data source and the metrics it publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDef {
    pub name: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    /// Named event files, keyed by file key.
    #[serde(default)]
    pub events: BTreeMap<String, EventFileDef>,
}

impl SourceDef {
    pub fn has_metric(&self, metric: &str) -> bool {
        self.metrics.iter().any(|m| m == metric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationLevel {
    Country,
    Capital,
    Admin1,
    Admin2,
}

/// One gazetteer entry. Admin-2 entries carry a representative coordinate
/// so they can be matched against the current viewport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub name: String,
    pub code: String,
    pub level: LocationLevel,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Authoritative table for a commonly needed denominator (population, area).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenominatorDef {
    pub source_id: String,
    pub metric: String,
}

/// An indexed reference document the context builder can quote from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceDoc {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub text: String,
}
