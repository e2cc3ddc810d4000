//! Order validation and execution: the validator/expander, the aggregate
//! box-fill engine, and the event-mode filter/limit/bucket pipeline.

mod aggregate;
mod boxes;
mod error;
mod events;
mod storage;
mod validate;

pub use aggregate::{AggregateExecutor, AggregateOutcome};
pub use boxes::BoxSet;
pub use error::{EngineError, Result, StorageError};
pub use events::{family_max_limit, EventExecutor, EventOutcome, DEFAULT_EVENT_LIMIT};
pub use storage::{MemoryStorage, Storage, StorageResult, AGGREGATE_FILE_KEY};
pub use validate::{validate_and_expand, ValidatedOrder, DEFAULT_EVENT_FILE};
