//! Sink implementations
//!
//! Contains LogSink and FileSink.

mod file;
mod log;

pub use self::file::{read_event_file, FileSink, FileSinkConfig};
pub use self::log::LogSink;
