use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("order contains no valid items")]
    EmptyOrder,

    #[error("source '{source_id}' declares no event file '{file_key}'")]
    UnknownEventFile { source_id: String, file_key: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("table not found: {source_id}/{file_key}")]
    TableNotFound {
        source_id: String,
        file_key: String,
    },

    #[error("event file not found: {source_id}/{file_key}")]
    EventsNotFound {
        source_id: String,
        file_key: String,
    },

    #[error("{0}")]
    Backend(String),
}
