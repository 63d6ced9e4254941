//! View-model layer for GLAThread request threads.
//!
//! Converts raw backend snapshots into a deduplicated user directory, a
//! chronologically ordered synthetic timeline (chat messages plus derived
//! system events) and a normalized request aggregate. All of it is pure:
//! no I/O, no clocks except where a caller passes one in.

pub mod builder;
pub mod model;
pub mod policy;
pub mod timeline;

pub use builder::ThreadViewModelBuilder;
pub use model::{
    Document, EventId, EventKind, GatePass, ProgressUpdate, RequestAggregate, TimelineEvent, User,
};
pub use policy::ApproverPolicy;
pub use timeline::merge_timeline;
