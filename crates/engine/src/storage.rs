use std::collections::HashMap;

use async_trait::async_trait;
use geolens_protocol::{EventRecord, Feature, Geometry, TableRow};

use crate::error::StorageError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// File key under which every source's aggregate table is read. Event
/// files use their catalog-declared keys.
pub const AGGREGATE_FILE_KEY: &str = "aggregate";

/// The storage collaborator. The engine never parses files itself; rows
/// and events arrive already standardized.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read_table(&self, source_id: &str, file_key: &str) -> StorageResult<Vec<TableRow>>;

    async fn read_events(&self, source_id: &str, file_key: &str)
        -> StorageResult<Vec<EventRecord>>;

    async fn resolve_geometry(&self, location_codes: &[String]) -> StorageResult<Vec<Feature>>;
}

/// In-memory storage over hand-authored tables. Used by tests and the CLI
/// demo mode.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: HashMap<(String, String), Vec<TableRow>>,
    events: HashMap<(String, String), Vec<EventRecord>>,
    geometry: HashMap<String, Geometry>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn table(mut self, source_id: &str, rows: Vec<TableRow>) -> Self {
        self.tables
            .insert((source_id.to_string(), AGGREGATE_FILE_KEY.to_string()), rows);
        self
    }

    #[must_use]
    pub fn event_file(mut self, source_id: &str, file_key: &str, records: Vec<EventRecord>) -> Self {
        self.events
            .insert((source_id.to_string(), file_key.to_string()), records);
        self
    }

    #[must_use]
    pub fn shape(mut self, location_code: &str, geometry: Geometry) -> Self {
        self.geometry.insert(location_code.to_string(), geometry);
        self
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read_table(&self, source_id: &str, file_key: &str) -> StorageResult<Vec<TableRow>> {
        self.tables
            .get(&(source_id.to_string(), file_key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::TableNotFound {
                source_id: source_id.to_string(),
                file_key: file_key.to_string(),
            })
    }

    async fn read_events(
        &self,
        source_id: &str,
        file_key: &str,
    ) -> StorageResult<Vec<EventRecord>> {
        self.events
            .get(&(source_id.to_string(), file_key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::EventsNotFound {
                source_id: source_id.to_string(),
                file_key: file_key.to_string(),
            })
    }

    async fn resolve_geometry(&self, location_codes: &[String]) -> StorageResult<Vec<Feature>> {
        Ok(location_codes
            .iter()
            .map(|code| {
                let geometry = self
                    .geometry
                    .get(code)
                    .cloned()
                    .unwrap_or_else(|| Geometry::point(0.0, 0.0));
                Feature::new(code.clone(), geometry)
            })
            .collect())
    }
}
