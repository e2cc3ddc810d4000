use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::event::Granularity;
use crate::geo::FeatureCollection;
use crate::order::{OrderPayload, RawOrder};

/// A resolved location the frontend can act on. Also the shape of the
/// caller-held disambiguation options passed back on follow-up queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocationRef {
    pub location_code: String,
    pub label: String,
}

impl LocationRef {
    pub fn new(location_code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            location_code: location_code.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `time_data[bucket_timestamp][record_id] = {changed fields}`.
pub type TimeData = BTreeMap<String, BTreeMap<String, serde_json::Map<String, serde_json::Value>>>;

/// The one final response shape per query. Field names are a stable
/// contract with the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Order {
        order: OrderPayload,
        #[serde(skip_serializing_if = "Option::is_none")]
        geojson: Option<FeatureCollection>,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Navigate {
        locations: Vec<LocationRef>,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    Disambiguate {
        options: Vec<LocationRef>,
        /// Original query, echoed so the caller can retry with a choice.
        query: String,
    },
    Events {
        geojson: FeatureCollection,
        time_data: TimeData,
        #[serde(skip_serializing_if = "Option::is_none")]
        time_range: Option<TimeRange>,
        granularity: Granularity,
        summary: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Chat {
        summary: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
}

impl Response {
    pub fn chat(summary: impl Into<String>) -> Self {
        Self::Chat {
            summary: summary.into(),
            warnings: Vec::new(),
        }
    }
}

/// What the model returns after consuming the built context. Loosely typed
/// on the order side; the validator is the enforcement boundary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelDecision {
    Order {
        order: RawOrder,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    Navigate {
        locations: Vec<LocationRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
    Disambiguate {
        options: Vec<LocationRef>,
        query: String,
    },
    Chat {
        message: String,
    },
}

/// One turn of caller-held conversation history, passed through to the model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}
