mod candidate;
mod event;
mod geo;
mod order;
mod response;

pub use candidate::{Candidate, CandidateKind, CandidateSet, RegionExpansion, SuffixType};
pub use event::{EventRecord, Granularity, TableRow};
pub use geo::{Feature, FeatureCollection, Geometry, Viewport};
pub use order::{
    DerivedShorthand, DerivedSpec, ExecutionMode, FilterRange, MetricRef, OrderItem, OrderPayload,
    RawOrder, RawOrderItem, TimeSpec,
};
pub use response::{ChatTurn, LocationRef, ModelDecision, Response, TimeData, TimeRange};

pub const PROTOCOL_SCHEMA_VERSION: u32 = 1;
