//! Wire record header: 16 sixteen-bit words, byte order chosen per record.

use bytemuck::{Pod, Zeroable};
use contracts::{ByteOrder, NodeId};

use crate::error::{IngestionError, Result};

/// Header size in bytes
pub const HEADER_BYTES: usize = 32;
/// Header size in 16-bit words
pub const HEADER_WORDS: usize = HEADER_BYTES / 2;

pub const SHORT_SIGNATURE: u16 = 0x0102;
pub const LONG_SIGNATURE: u32 = 0x0102_0304;

/// First revision carrying the high half of the word count.
pub const JUMBO_REVISION: u16 = 6;

const W_WORD_COUNT: usize = 0;
const W_TYPE: usize = 1;
const W_CHECKSUM: usize = 2;
const W_RUN: usize = 3;
const W_SEQUENCE: usize = 4;
const W_ENTITIES: usize = 6;
const W_NODE: usize = 8;
const W_REVISION: usize = 10;
const W_SHORT_SIG: usize = 11;
const W_LONG_SIG: usize = 12;
const W_WORD_COUNT_HIGH: usize = 14;

/// Header words exactly as they sit in the buffer.
#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct RawHeader([u16; HEADER_WORDS]);

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Whole record length in 16-bit words, header included
    pub word_count: u32,
    pub type_code: u16,
    pub checksum: u16,
    pub run_number: u16,
    pub sequence: u32,
    pub entity_count: u16,
    pub node: NodeId,
    pub revision: u16,
    pub byte_order: ByteOrder,
}

impl RecordHeader {
    /// Record length in bytes
    pub fn byte_len(&self) -> usize {
        self.word_count as usize * 2
    }

    pub fn is_jumbo(&self) -> bool {
        self.revision >= JUMBO_REVISION
    }

    /// Parse the header at the start of `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_BYTES {
            return Err(IngestionError::BufferTooShort {
                len: buf.len(),
                min: HEADER_BYTES,
            });
        }

        let raw: RawHeader = bytemuck::pod_read_unaligned(&buf[..HEADER_BYTES]);
        let words = &raw.0;

        let byte_order = match u16::from_le(words[W_SHORT_SIG]) {
            SHORT_SIGNATURE => ByteOrder::Little,
            sig if sig == SHORT_SIGNATURE.swap_bytes() => ByteOrder::Big,
            sig => {
                return Err(IngestionError::BadSignature {
                    found: u32::from(sig),
                })
            }
        };

        let word = |index: usize| fix_word(words[index], byte_order);
        let long = |index: usize| join_words(words[index], words[index + 1], byte_order);

        let long_signature = long(W_LONG_SIG);
        if long_signature != LONG_SIGNATURE {
            return Err(IngestionError::BadSignature {
                found: long_signature,
            });
        }

        let revision = word(W_REVISION);
        let mut word_count = u32::from(word(W_WORD_COUNT));
        if revision >= JUMBO_REVISION {
            word_count |= u32::from(word(W_WORD_COUNT_HIGH)) << 16;
        }

        Ok(Self {
            word_count,
            type_code: word(W_TYPE),
            checksum: word(W_CHECKSUM),
            run_number: word(W_RUN),
            sequence: long(W_SEQUENCE),
            entity_count: word(W_ENTITIES),
            node: NodeId::new(word(W_NODE)),
            revision,
            byte_order,
        })
    }

    /// Header bytes in this header's byte order.
    ///
    /// The high word-count half is only written for jumbo revisions.
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let order = self.byte_order;
        let mut words = [0u16; HEADER_WORDS];
        let mut set = |index: usize, value: u16| words[index] = store_word(value, order);

        set(W_WORD_COUNT, (self.word_count & 0xffff) as u16);
        set(W_TYPE, self.type_code);
        set(W_CHECKSUM, self.checksum);
        set(W_RUN, self.run_number);
        set(W_ENTITIES, self.entity_count);
        set(W_NODE, self.node.get());
        set(W_REVISION, self.revision);
        set(W_SHORT_SIG, SHORT_SIGNATURE);
        if self.is_jumbo() {
            set(W_WORD_COUNT_HIGH, (self.word_count >> 16) as u16);
        }

        let (first, second) = split_long(self.sequence, order);
        words[W_SEQUENCE] = first;
        words[W_SEQUENCE + 1] = second;
        let (first, second) = split_long(LONG_SIGNATURE, order);
        words[W_LONG_SIG] = first;
        words[W_LONG_SIG + 1] = second;

        let mut out = [0u8; HEADER_BYTES];
        out.copy_from_slice(bytemuck::bytes_of(&RawHeader(words)));
        out
    }
}

/// Host value of a word read raw from the buffer.
#[inline]
fn fix_word(raw: u16, order: ByteOrder) -> u16 {
    match order {
        ByteOrder::Little => u16::from_le(raw),
        ByteOrder::Big => u16::from_be(raw),
    }
}

/// Raw in-buffer representation of a host word.
#[inline]
fn store_word(value: u16, order: ByteOrder) -> u16 {
    match order {
        ByteOrder::Little => value.to_le(),
        ByteOrder::Big => value.to_be(),
    }
}

/// 32-bit value spread over two consecutive raw words.
#[inline]
fn join_words(first: u16, second: u16, order: ByteOrder) -> u32 {
    let (first, second) = (fix_word(first, order), fix_word(second, order));
    match order {
        ByteOrder::Little => u32::from(first) | (u32::from(second) << 16),
        ByteOrder::Big => (u32::from(first) << 16) | u32::from(second),
    }
}

#[inline]
fn split_long(value: u32, order: ByteOrder) -> (u16, u16) {
    let (low, high) = ((value & 0xffff) as u16, (value >> 16) as u16);
    match order {
        ByteOrder::Little => (store_word(low, order), store_word(high, order)),
        ByteOrder::Big => (store_word(high, order), store_word(low, order)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(order: ByteOrder, revision: u16, word_count: u32) -> RecordHeader {
        RecordHeader {
            word_count,
            type_code: 1,
            checksum: 0,
            run_number: 42,
            sequence: 0x0001_0002,
            entity_count: 3,
            node: NodeId::new(0x5555),
            revision,
            byte_order: order,
        }
    }

    #[test]
    fn test_signature_bytes_on_the_wire() {
        let le = sample(ByteOrder::Little, 5, 16).to_bytes();
        assert_eq!(&le[22..24], &[0x02, 0x01]);
        assert_eq!(&le[24..28], &[0x04, 0x03, 0x02, 0x01]);

        let be = sample(ByteOrder::Big, 5, 16).to_bytes();
        assert_eq!(&be[22..24], &[0x01, 0x02]);
        assert_eq!(&be[24..28], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&be[16..18], &[0x55, 0x55]);
        assert_eq!(&be[8..12], &[0x00, 0x01, 0x00, 0x02]);
    }

    #[test]
    fn test_parse_both_byte_orders() {
        for order in [ByteOrder::Little, ByteOrder::Big] {
            let header = sample(order, 5, 16);
            let parsed = RecordHeader::parse(&header.to_bytes()).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn test_jumbo_word_count() {
        let header = sample(ByteOrder::Big, JUMBO_REVISION, 0x0002_0010);
        let parsed = RecordHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed.word_count, 0x0002_0010);
        assert!(parsed.is_jumbo());
    }

    #[test]
    fn test_pre_jumbo_ignores_high_word() {
        let mut bytes = sample(ByteOrder::Little, 5, 16).to_bytes();
        bytes[28] = 0xff;
        let parsed = RecordHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.word_count, 16);
    }

    #[test]
    fn test_bad_short_signature() {
        let mut bytes = sample(ByteOrder::Little, 5, 16).to_bytes();
        bytes[22] = 0x07;
        assert!(matches!(
            RecordHeader::parse(&bytes),
            Err(IngestionError::BadSignature { .. })
        ));
    }

    #[test]
    fn test_long_signature_must_agree() {
        let mut bytes = sample(ByteOrder::Little, 5, 16).to_bytes();
        bytes.swap(24, 27);
        assert!(matches!(
            RecordHeader::parse(&bytes),
            Err(IngestionError::BadSignature { .. })
        ));
    }

    #[test]
    fn test_short_buffer() {
        assert!(matches!(
            RecordHeader::parse(&[0u8; 10]),
            Err(IngestionError::BufferTooShort { len: 10, min: 32 })
        ));
    }
}
