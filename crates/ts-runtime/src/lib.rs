//! Thread-safe integration surface over the `ts-core` readers: an owned
//! stream handle, tune orchestration, and logging setup.

#[macro_use]
mod log_macros;

pub mod error;
pub mod handle;
pub mod session;
pub mod tracing_init;

pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use handle::StreamHandle;
pub use session::{LiveSession, TuneBackend, TuneError};
