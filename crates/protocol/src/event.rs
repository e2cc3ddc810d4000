use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Standardized event shape. Source-specific column names never cross the
/// converter boundary; severity fields arrive in `properties`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EventRecord {
    pub id: String,
    pub location_code: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, f64>,
    /// Polygon perimeter for geometry-bearing event types (fire perimeters).
    /// Point/track types carry only the coordinate pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perimeter: Option<Vec<Vec<[f64; 2]>>>,
}

impl EventRecord {
    pub fn new(
        id: impl Into<String>,
        location_code: impl Into<String>,
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            location_code: location_code.into(),
            timestamp,
            latitude,
            longitude,
            properties: BTreeMap::new(),
            perimeter: None,
        }
    }

    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.timestamp.year()
    }
}

/// One row of an aggregate source table as returned by the storage
/// collaborator. The engine never parses files itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TableRow {
    pub location_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl TableRow {
    pub fn new(location_code: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            location_code: location_code.into(),
            year,
            values: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn value(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.values.insert(metric.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    SixHourly,
    Daily,
    Weekly,
}

impl Granularity {
    /// Next coarser step, if any. Weekly is the widest supported bucket.
    pub fn widen(self) -> Option<Self> {
        match self {
            Self::SixHourly => Some(Self::Daily),
            Self::Daily => Some(Self::Weekly),
            Self::Weekly => None,
        }
    }
}
