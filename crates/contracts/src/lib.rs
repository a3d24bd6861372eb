//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the event builder:
//! fragments, assembled events, node descriptors, sink/source traits and errors.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Fragment timestamps are a free-running 32-bit counter that wraps; all
//!   arithmetic on them is wrapping `u32` arithmetic
//! - Wall-clock ages (pruning) use `std::time::Instant`, supplied by the caller

mod blueprint;
mod correlator_config;
mod error;
mod event;
mod fragment;
mod fragment_source;
mod node_id;
mod node_source;
mod sink;
mod stats;

pub use blueprint::*;
pub use correlator_config::*;
pub use error::*;
pub use event::*;
pub use fragment::*;
pub use fragment_source::{FragmentSource, SourceNotice};
pub use node_id::NodeId;
pub use node_source::{NodeSource, RawBufferCallback};
pub use sink::*;
pub use stats::CorrelatorStats;
