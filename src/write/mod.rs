//! Write pipeline
//!
//! Bounded-concurrency asynchronous write-and-check tasks, one per
//! submitted chronology, plus a drainer that surfaces failures nobody
//! awaited.

mod drain;
mod errors;
mod handle;
mod pipeline;
mod tracker;

pub use errors::{WriteError, WriteResult};
pub use handle::{WriteHandle, WriteStage, WriteSummary};
pub use pipeline::{WritePipeline, DEFAULT_WRITE_PERMITS};
pub use tracker::{InFlight, InFlightGuard};

pub(crate) use pipeline::{WriteContext, WriteTarget};
