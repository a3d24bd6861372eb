//! Layered error definitions
//!
//! Categorized by source: config / assembly / sink

use thiserror::Error;

use crate::{FragmentKind, NodeId, SinkError};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// More member nodes than the scoreboard has bits
    #[error("too many nodes: {count} configured, scoreboard holds at most {max}")]
    TooManyNodes { count: usize, max: usize },

    // ===== Assembly Errors =====
    /// Fragment or scoreboard update names a node outside the active configuration
    #[error("unknown node {node}")]
    UnknownNode { node: NodeId },

    /// Assembly received a fragment it cannot fold in
    #[error("wrong fragment kind: expected {expected}, got {actual}")]
    WrongFragmentKind {
        expected: FragmentKind,
        actual: FragmentKind,
    },

    /// Physics event too small to hold its timestamp
    #[error("event from node {node} too small: {size} bytes, need at least {min}")]
    EventTooSmall { node: NodeId, size: usize, min: usize },

    // ===== Sink Errors =====
    /// Output sink refused a materialized event
    #[error("sink rejected event {event_id} (type {type_code}): {source}")]
    SinkRejected {
        event_id: u64,
        type_code: u16,
        #[source]
        source: SinkError,
    },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create unknown node error
    pub fn unknown_node(node: impl Into<NodeId>) -> Self {
        Self::UnknownNode { node: node.into() }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Short label for metrics
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "config_parse",
            Self::ConfigValidation { .. } => "config_validation",
            Self::TooManyNodes { .. } => "too_many_nodes",
            Self::UnknownNode { .. } => "unknown_node",
            Self::WrongFragmentKind { .. } => "wrong_fragment_kind",
            Self::EventTooSmall { .. } => "event_too_small",
            Self::SinkRejected { .. } => "sink_rejected",
            Self::SinkWrite { .. } => "sink_write",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}
