//! Wire codec for node buffers
//!
//! A buffer is one record: a 32-byte header followed by a type-specific
//! body. The header's short signature tells the record's byte order.

mod decode;
mod encode;
mod header;

pub use decode::{decode_buffer, DecodedBuffer, MIN_EVENT_WORDS, TITLE_BYTES};
pub use encode::BufferEncoder;
pub use header::{
    RecordHeader, HEADER_BYTES, HEADER_WORDS, JUMBO_REVISION, LONG_SIGNATURE, SHORT_SIGNATURE,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestionError;
    use bytes::Bytes;
    use contracts::{
        ByteOrder, ContractError, Fragment, FragmentBody, NodeId, PhysicsFragment, ScalerFragment,
        ScalerKind, StringListFragment, StringListKind, TransitionKind,
    };

    fn physics(ts: u32, payload: &[u8]) -> PhysicsFragment {
        PhysicsFragment {
            timestamp: ts,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn test_physics_buffer_both_orders() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let mut encoder = BufferEncoder::new(NodeId::new(0xaaaa), order);
            let raw = encoder.physics(&[physics(0xdead_beef, &[1, 2, 3, 4]), physics(7, &[])]);

            let decoded = decode_buffer(&raw).unwrap();
            assert_eq!(decoded.header.byte_order, order);
            assert_eq!(decoded.header.entity_count, 2);
            assert!(decoded.rejected.is_empty());
            assert_eq!(decoded.fragments.len(), 2);

            let first = &decoded.fragments[0];
            assert_eq!(first.node, NodeId::new(0xaaaa));
            assert_eq!(first.timestamp(), Some(0xdead_beef));
            assert_eq!(first.payload_len(), 4);
            match &first.body {
                FragmentBody::Physics(p) => assert_eq!(&p.payload[..], &[1, 2, 3, 4]),
                other => panic!("unexpected body {other:?}"),
            }
            assert_eq!(decoded.fragments[1].timestamp(), Some(7));
        }
    }

    #[test]
    fn test_odd_payload_is_padded() {
        let mut encoder = BufferEncoder::new(NodeId::new(1), ByteOrder::Big);
        let raw = encoder.physics(&[physics(5, &[9, 8, 7])]);
        let decoded = decode_buffer(&raw).unwrap();
        assert_eq!(decoded.fragments[0].payload_len(), 4);
    }

    #[test]
    fn test_sequence_increments() {
        let mut encoder = BufferEncoder::new(NodeId::new(1), ByteOrder::Little);
        let first = decode_buffer(&encoder.physics(&[physics(1, &[])])).unwrap();
        let second = decode_buffer(&encoder.physics(&[physics(2, &[])])).unwrap();
        assert_eq!(first.header.sequence + 1, second.header.sequence);
    }

    #[test]
    fn test_undersized_event_is_skipped() {
        let mut encoder = BufferEncoder::new(NodeId::new(0x10), ByteOrder::Little);
        let raw = encoder.physics(&[physics(100, &[0xaa, 0xbb])]);

        // Append a 2-word event (too small) followed by a valid one, and
        // patch header word count and entity count to cover them.
        let mut bytes = raw.to_vec();
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.extend_from_slice(&200u32.to_le_bytes());
        let words = (bytes.len() / 2) as u16;
        bytes[0..2].copy_from_slice(&words.to_le_bytes());
        bytes[12..14].copy_from_slice(&3u16.to_le_bytes());

        let decoded = decode_buffer(&bytes).unwrap();
        let stamps: Vec<_> = decoded.fragments.iter().filter_map(|f| f.timestamp()).collect();
        assert_eq!(stamps, vec![100, 200]);
        assert_eq!(decoded.rejected.len(), 1);
        assert!(matches!(
            decoded.rejected[0],
            IngestionError::Contract(ContractError::EventTooSmall { size: 4, min: 6, .. })
        ));
    }

    #[test]
    fn test_transition_title_and_run() {
        let mut encoder = BufferEncoder::new(NodeId::new(0x5555), ByteOrder::Big);
        let fragment = Fragment::transition(NodeId::new(0x5555), TransitionKind::End, 17, "calib");
        let decoded = decode_buffer(&encoder.encode(&fragment)).unwrap();

        assert_eq!(decoded.header.run_number, 17);
        assert_eq!(decoded.fragments, vec![fragment]);
    }

    #[test]
    fn test_scaler_interval_order() {
        let mut encoder = BufferEncoder::new(NodeId::new(2), ByteOrder::Little);
        let scaler = ScalerFragment {
            kind: ScalerKind::Snapshot,
            interval_start: 10,
            interval_end: 20,
            values: vec![1, 2, 3],
        };
        let raw = encoder.scaler(&scaler);
        // End time comes first on the wire.
        assert_eq!(&raw[HEADER_BYTES..HEADER_BYTES + 4], &20u32.to_le_bytes());

        let decoded = decode_buffer(&raw).unwrap();
        assert_eq!(decoded.fragments[0].body, FragmentBody::Scaler(scaler));
    }

    #[test]
    fn test_string_list() {
        let mut encoder = BufferEncoder::new(NodeId::new(2), ByteOrder::Big);
        let list = StringListFragment {
            kind: StringListKind::RunVariables,
            strings: vec!["a".into(), "bc".into(), String::new()],
        };
        let decoded = decode_buffer(&encoder.string_list(&list)).unwrap();
        assert_eq!(decoded.fragments[0].body, FragmentBody::StringList(list));
    }

    #[test]
    fn test_string_list_missing_entries_is_truncated() {
        let mut encoder = BufferEncoder::new(NodeId::new(2), ByteOrder::Little);
        let list = StringListFragment {
            kind: StringListKind::RunVariables,
            strings: vec!["ab".into()],
        };
        let raw = encoder.string_list(&list);

        // Header claims a second string the body does not carry.
        let mut header = RecordHeader::parse(&raw).unwrap();
        header.entity_count = 2;
        let mut patched = header.to_bytes().to_vec();
        patched.extend_from_slice(&raw[HEADER_BYTES..]);

        assert!(matches!(
            decode_buffer(&patched),
            Err(IngestionError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unsupported_type() {
        let header = RecordHeader {
            word_count: HEADER_WORDS as u32,
            type_code: 0x7777,
            checksum: 0,
            run_number: 0,
            sequence: 1,
            entity_count: 0,
            node: NodeId::new(1),
            revision: JUMBO_REVISION,
            byte_order: ByteOrder::Little,
        };
        assert!(matches!(
            decode_buffer(&header.to_bytes()),
            Err(IngestionError::UnsupportedType { type_code: 0x7777 })
        ));
    }

    #[test]
    fn test_declared_length_past_buffer() {
        let mut encoder = BufferEncoder::new(NodeId::new(1), ByteOrder::Little);
        let raw = encoder.physics(&[physics(1, &[1, 2, 3, 4])]);
        assert!(matches!(
            decode_buffer(&raw[..raw.len() - 2]),
            Err(IngestionError::Truncated { .. })
        ));
    }
}
