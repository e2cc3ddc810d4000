use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Time selection for an order item. `Latest` means "most recent available",
/// resolved per location at fill time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeSpec {
    Latest,
    Year { year: i32 },
    Range { start: i32, end: i32 },
    /// Open-ended series ("trend", "historical").
    Series,
}

impl Default for TimeSpec {
    fn default() -> Self {
        Self::Latest
    }
}

impl TimeSpec {
    pub fn contains_year(&self, year: i32) -> bool {
        match self {
            Self::Latest | Self::Series => true,
            Self::Year { year: y } => *y == year,
            Self::Range { start, end } => (*start..=*end).contains(&year),
        }
    }

    /// Stable key used to deduplicate table reads.
    pub fn key(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Year { year } => format!("y{year}"),
            Self::Range { start, end } => format!("r{start}-{end}"),
            Self::Series => "series".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Aggregate,
    Events,
}

/// Reference to a metric: bare (resolved against the sibling item's source)
/// or qualified for cross-source ratios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum MetricRef {
    Qualified { source_id: String, metric: String },
    Metric(String),
}

impl MetricRef {
    pub fn bare(metric: impl Into<String>) -> Self {
        Self::Metric(metric.into())
    }

    pub fn qualified(source_id: impl Into<String>, metric: impl Into<String>) -> Self {
        Self::Qualified {
            source_id: source_id.into(),
            metric: metric.into(),
        }
    }

    pub fn metric(&self) -> &str {
        match self {
            Self::Metric(m) => m,
            Self::Qualified { metric, .. } => metric,
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Metric(_) => None,
            Self::Qualified { source_id, .. } => Some(source_id),
        }
    }

    pub fn canonical(&self) -> String {
        match self {
            Self::Metric(m) => m.clone(),
            Self::Qualified { source_id, metric } => format!("{source_id}:{metric}"),
        }
    }
}

/// A derived field computed at execution time from two other metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DerivedSpec {
    pub numerator: MetricRef,
    pub denominator: MetricRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    pub label: String,
}

impl DerivedSpec {
    /// Dedupe key: two specs with the same numerator, denominator and label
    /// are the same spec.
    pub fn canonical_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.numerator.canonical(),
            self.denominator.canonical(),
            self.label
        )
    }
}

/// Shorthand flags the model may put on an item instead of an explicit spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DerivedShorthand {
    PerCapita,
    PerArea,
}

/// One item as produced by the model, before validation. Loosely typed on
/// purpose; the validator is the enforcement boundary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawOrderItem {
    pub source_id: String,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_file: Option<String>,
    /// Filter keys follow the `_min`/`_max` suffix convention.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedShorthand>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub for_derivation: bool,
}

impl RawOrderItem {
    pub fn new(source_id: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            metric: metric.into(),
            region: None,
            location_codes: Vec::new(),
            time: None,
            mode: None,
            event_file: None,
            filters: BTreeMap::new(),
            limit: None,
            derived: None,
            for_derivation: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RawOrder {
    #[serde(default)]
    pub items: Vec<RawOrderItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedSpec>,
}

/// Inclusive numeric bounds on an event column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A validated order item. `valid`/`error` are set only by the validator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrderItem {
    pub source_id: String,
    pub metric: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub location_codes: Vec<String>,
    #[serde(default)]
    pub time: TimeSpec,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_file: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, FilterRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub for_derivation: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrderItem {
    /// Identity for duplicate collapse: same source, metric, target and time.
    pub fn identity_key(&self) -> String {
        let target = match &self.region {
            Some(region) => region.to_lowercase(),
            None => self.location_codes.join(","),
        };
        format!(
            "{}|{}|{}|{}",
            self.source_id,
            self.metric,
            target,
            self.time.key()
        )
    }
}

/// The validated order as shipped to the frontend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OrderPayload {
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedSpec>,
}

impl OrderPayload {
    /// Items shown to the user: valid and not derivation-only.
    pub fn display_items(&self) -> Vec<&OrderItem> {
        self.items
            .iter()
            .filter(|i| i.valid && !i.for_derivation)
            .collect()
    }

    pub fn valid_items(&self) -> Vec<&OrderItem> {
        self.items.iter().filter(|i| i.valid).collect()
    }
}
