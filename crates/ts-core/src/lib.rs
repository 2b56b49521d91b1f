//! Sequential/random-access reading over a live, rotating window of segment
//! files (a timeshift buffer) and over plain recorded files, behind one
//! stream contract.

pub mod accessor;
pub mod error;
pub mod live;
pub mod plain;
pub mod rotating;
pub mod segment;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use accessor::SegmentFileAccessor;
pub use error::{CoreError, CoreReason, CoreResult};
pub use live::{LiveReadLoop, LoopState, RetryPolicy, Sleeper, ThreadSleeper};
pub use plain::PlainFileReader;
pub use rotating::RotatingBufferReader;
pub use segment::{CatalogEntry, Location, Segment, SegmentCatalog, SegmentSet};
pub use source::{StreamSource, Target, TargetKind};
