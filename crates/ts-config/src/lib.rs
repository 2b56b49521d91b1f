pub mod live;
pub mod logging;
pub mod reader;
pub mod timeshift;
pub mod types;
mod validate;

pub use live::LiveConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use reader::ReaderConfig;
pub use timeshift::TimeshiftConfig;
pub use types::{ByteSize, HumanDuration};
