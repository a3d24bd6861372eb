//! AssembledEvent - Correlator output
//!
//! A completed event, ready to be handed to the output sink.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::{NodeId, ScalerFragment, StringListFragment, TransitionKind};

/// Size of the `(size, node, timestamp)` prefix of each physics sub-record.
pub const SUB_RECORD_HEADER_BYTES: usize = 10;

/// Completed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledEvent {
    /// Event sequence number (monotonically increasing per correlator)
    pub event_id: u64,

    /// Buffer type code of the event
    pub type_code: u16,

    /// Nodes that contributed, in contribution order
    pub contributors: Vec<NodeId>,

    /// Event contents
    pub body: EventBody,
}

/// Event contents by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventBody {
    /// Physics event: packed sub-records, trigger fragment first
    Physics {
        reference_timestamp: u32,
        records: Bytes,
    },

    /// Run state transition
    StateTransition {
        transition: TransitionKind,
        run_number: u32,
        title: String,
        elapsed_time: u32,
        absolute_time: u32,
    },

    /// Passthrough scaler readout
    Scaler(ScalerFragment),

    /// Passthrough documentation strings
    StringList(StringListFragment),
}

/// One node's sub-record inside a packed physics event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRecord {
    pub node: NodeId,
    pub timestamp: u32,
    pub payload: Bytes,
}

impl SubRecord {
    /// Append `size | node | timestamp | payload` (little-endian) to `out`.
    pub fn pack_into(node: NodeId, timestamp: u32, payload: &[u8], out: &mut BytesMut) {
        let size = (SUB_RECORD_HEADER_BYTES + payload.len()) as u32;
        out.reserve(size as usize);
        out.put_u32_le(size);
        out.put_u16_le(node.get());
        out.put_u32_le(timestamp);
        out.put_slice(payload);
    }
}

impl AssembledEvent {
    /// Approximate encoded size in bytes, used against sink size limits.
    pub fn encoded_len(&self) -> usize {
        match &self.body {
            EventBody::Physics { records, .. } => records.len(),
            EventBody::StateTransition { title, .. } => title.len() + 16,
            EventBody::Scaler(s) => 8 + s.values.len() * 4,
            EventBody::StringList(s) => s.strings.iter().map(|s| s.len() + 1).sum(),
        }
    }

    pub fn is_physics(&self) -> bool {
        matches!(self.body, EventBody::Physics { .. })
    }

    /// Unpack the physics sub-records, in the order they were added.
    ///
    /// Returns an empty list for non-physics events; stops at the first
    /// truncated record.
    pub fn sub_records(&self) -> Vec<SubRecord> {
        let EventBody::Physics { records, .. } = &self.body else {
            return Vec::new();
        };

        let mut cursor = records.clone();
        let mut out = Vec::new();
        while cursor.remaining() >= SUB_RECORD_HEADER_BYTES {
            let size = cursor.get_u32_le() as usize;
            let node = NodeId::new(cursor.get_u16_le());
            let timestamp = cursor.get_u32_le();
            let payload_len = size.saturating_sub(SUB_RECORD_HEADER_BYTES);
            if cursor.remaining() < payload_len {
                break;
            }
            let payload = cursor.split_to(payload_len);
            out.push(SubRecord {
                node,
                timestamp,
                payload,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TYPE_PHYSICS;

    #[test]
    fn test_sub_records_preserve_order() {
        let mut packed = BytesMut::new();
        SubRecord::pack_into(NodeId::new(1), 10, &[0xaa, 0xbb], &mut packed);
        SubRecord::pack_into(NodeId::new(2), 11, &[], &mut packed);

        let event = AssembledEvent {
            event_id: 1,
            type_code: TYPE_PHYSICS,
            contributors: vec![NodeId::new(1), NodeId::new(2)],
            body: EventBody::Physics {
                reference_timestamp: 10,
                records: packed.freeze(),
            },
        };

        let records = event.sub_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].node, NodeId::new(1));
        assert_eq!(records[0].payload.as_ref(), &[0xaa, 0xbb]);
        assert_eq!(records[1].timestamp, 11);
        assert_eq!(event.encoded_len(), 2 * SUB_RECORD_HEADER_BYTES + 2);
    }

    #[test]
    fn test_truncated_record_is_skipped() {
        let mut packed = BytesMut::new();
        SubRecord::pack_into(NodeId::new(1), 10, &[1, 2, 3, 4], &mut packed);
        packed.truncate(packed.len() - 2);

        let event = AssembledEvent {
            event_id: 1,
            type_code: TYPE_PHYSICS,
            contributors: vec![NodeId::new(1)],
            body: EventBody::Physics {
                reference_timestamp: 10,
                records: packed.freeze(),
            },
        };
        assert!(event.sub_records().is_empty());
    }
}
