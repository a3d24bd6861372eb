//! # Event Builder
//!
//! Fragment correlation core of the DAQ front end.
//!
//! Responsibilities:
//! - Node scoreboard per assembly (at most 32 member nodes)
//! - Wraparound-aware timestamp window matching
//! - State-transition barriers (End / Pause flush older partial events)
//! - Age-based pruning of stale fragments and assemblies
//!
//! ## Usage
//!
//! ```ignore
//! use event_builder::Correlator;
//!
//! let mut correlator = Correlator::new(blueprint.to_correlator_config())?;
//!
//! // One call per notice from the fragment source
//! correlator.handle_notice(
//!     SourceNotice::NewFragments(node),
//!     &mut queues,
//!     &mut forwarder,
//!     Instant::now(),
//! );
//! ```

mod assembly;
mod correlator;
mod ledger;
mod scoreboard;
mod window;

pub use assembly::{Assembly, AssemblyKind};
pub use correlator::Correlator;
pub use ledger::{AssemblyLedger, PendingFragment};
pub use scoreboard::{NodeScoreboard, ScoreboardLayout, MAX_MEMBER_NODES};
pub use window::MatchWindow;

// Re-export contracts types
pub use contracts::{CorrelatorConfig, CorrelatorStats, NodeDescriptor, SourceNotice};
