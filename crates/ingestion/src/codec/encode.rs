//! Typed fragments -> raw buffers, used by mock sources and tests.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{
    ByteOrder, Fragment, FragmentBody, NodeId, PhysicsFragment, ScalerFragment,
    StringListFragment, TransitionFragment, TYPE_PHYSICS,
};

use super::decode::{MIN_EVENT_WORDS, TITLE_BYTES};
use super::header::{RecordHeader, HEADER_BYTES, JUMBO_REVISION};

/// Builds records for one node, numbering them sequentially.
#[derive(Debug, Clone)]
pub struct BufferEncoder {
    node: NodeId,
    byte_order: ByteOrder,
    revision: u16,
    run_number: u16,
    sequence: u32,
}

impl BufferEncoder {
    pub fn new(node: NodeId, byte_order: ByteOrder) -> Self {
        Self {
            node,
            byte_order,
            revision: JUMBO_REVISION,
            run_number: 0,
            sequence: 0,
        }
    }

    pub fn with_revision(mut self, revision: u16) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_run_number(mut self, run_number: u16) -> Self {
        self.run_number = run_number;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// One physics buffer holding `events`.
    ///
    /// Payloads are little-endian words; an odd trailing byte is zero-padded.
    pub fn physics(&mut self, events: &[PhysicsFragment]) -> Bytes {
        let mut body = BytesMut::new();
        for event in events {
            let payload_words = event.payload.len().div_ceil(2);
            let event_words = (MIN_EVENT_WORDS + payload_words) as u16;
            self.put_word(&mut body, event_words);
            self.put_long(&mut body, event.timestamp);
            for chunk in event.payload.chunks(2) {
                let low = chunk[0];
                let high = chunk.get(1).copied().unwrap_or(0);
                self.put_word(&mut body, u16::from_le_bytes([low, high]));
            }
        }
        self.finish(TYPE_PHYSICS, events.len() as u16, body)
    }

    pub fn transition(&mut self, transition: &TransitionFragment) -> Bytes {
        let mut body = BytesMut::with_capacity(TITLE_BYTES + 8);
        let mut title = [0u8; TITLE_BYTES];
        let text = transition.title.as_bytes();
        let len = text.len().min(TITLE_BYTES - 1);
        title[..len].copy_from_slice(&text[..len]);
        body.put_slice(&title);
        self.put_long(&mut body, transition.elapsed_time);
        self.put_long(&mut body, transition.absolute_time);

        // The header field is 16 bits wide; later records carry the new run.
        self.run_number = transition.run_number as u16;
        self.finish(transition.transition.type_code(), 0, body)
    }

    pub fn scaler(&mut self, scaler: &ScalerFragment) -> Bytes {
        let mut body = BytesMut::with_capacity(8 + scaler.values.len() * 4);
        self.put_long(&mut body, scaler.interval_end);
        self.put_long(&mut body, scaler.interval_start);
        for &value in &scaler.values {
            self.put_long(&mut body, value);
        }
        self.finish(scaler.kind.type_code(), scaler.values.len() as u16, body)
    }

    pub fn string_list(&mut self, list: &StringListFragment) -> Bytes {
        let mut body = BytesMut::new();
        for text in &list.strings {
            body.put_slice(text.as_bytes());
            body.put_u8(0);
            if (text.len() + 1) % 2 != 0 {
                body.put_u8(0);
            }
        }
        self.finish(list.kind.type_code(), list.strings.len() as u16, body)
    }

    /// Single-fragment buffer of whatever kind `fragment` is.
    pub fn encode(&mut self, fragment: &Fragment) -> Bytes {
        match &fragment.body {
            FragmentBody::Physics(physics) => self.physics(std::slice::from_ref(physics)),
            FragmentBody::StateTransition(transition) => self.transition(transition),
            FragmentBody::Scaler(scaler) => self.scaler(scaler),
            FragmentBody::StringList(list) => self.string_list(list),
        }
    }

    fn finish(&mut self, type_code: u16, entity_count: u16, body: BytesMut) -> Bytes {
        self.sequence = self.sequence.wrapping_add(1);
        let word_count = ((HEADER_BYTES + body.len()) / 2) as u32;
        let header = RecordHeader {
            word_count,
            type_code,
            checksum: 0,
            run_number: self.run_number,
            sequence: self.sequence,
            entity_count,
            node: self.node,
            revision: self.revision,
            byte_order: self.byte_order,
        };

        let mut out = BytesMut::with_capacity(HEADER_BYTES + body.len());
        out.put_slice(&header.to_bytes());
        out.put_slice(&body);
        out.freeze()
    }

    fn put_word(&self, buf: &mut BytesMut, value: u16) {
        match self.byte_order {
            ByteOrder::Little => buf.put_u16_le(value),
            ByteOrder::Big => buf.put_u16(value),
        }
    }

    fn put_long(&self, buf: &mut BytesMut, value: u32) {
        match self.byte_order {
            ByteOrder::Little => buf.put_u32_le(value),
            ByteOrder::Big => buf.put_u32(value),
        }
    }
}
