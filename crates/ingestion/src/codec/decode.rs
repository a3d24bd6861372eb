//! Raw buffer -> typed fragments.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{
    ByteOrder, ContractError, Fragment, FragmentBody, NodeId, PhysicsFragment, ScalerFragment,
    ScalerKind, StringListFragment, StringListKind, TransitionFragment, TransitionKind,
    TYPE_PHYSICS,
};

use super::header::{RecordHeader, HEADER_BYTES};
use crate::error::{IngestionError, Result};

/// Title field width of a state-transition body
pub const TITLE_BYTES: usize = 80;

/// Smallest physics event: its own word count plus a 32-bit timestamp.
pub const MIN_EVENT_WORDS: usize = 3;

/// Outcome of decoding one buffer.
///
/// Per-event problems land in `rejected`; decoding carries on past them.
#[derive(Debug)]
pub struct DecodedBuffer {
    pub header: RecordHeader,
    pub fragments: Vec<Fragment>,
    pub rejected: Vec<IngestionError>,
}

/// Decode one raw record.
///
/// # Errors
/// Header problems (`BufferTooShort`, `BadSignature`, `Truncated`) and
/// unknown type codes fail the whole buffer.
pub fn decode_buffer(buf: &[u8]) -> Result<DecodedBuffer> {
    let header = RecordHeader::parse(buf)?;

    let declared = header.byte_len();
    if declared < HEADER_BYTES || declared > buf.len() {
        return Err(IngestionError::Truncated {
            declared,
            available: buf.len(),
        });
    }

    let body = WordReader::new(&buf[HEADER_BYTES..declared], header.byte_order);
    let mut decoded = DecodedBuffer {
        header,
        fragments: Vec::new(),
        rejected: Vec::new(),
    };

    let type_code = header.type_code;
    if type_code == TYPE_PHYSICS {
        decode_physics(&header, body, &mut decoded);
    } else if let Some(transition) = TransitionKind::from_type_code(type_code) {
        let fragment = decode_transition(&header, transition, body)?;
        decoded.fragments.push(fragment);
    } else if let Some(kind) = ScalerKind::from_type_code(type_code) {
        let fragment = decode_scaler(&header, kind, body)?;
        decoded.fragments.push(fragment);
    } else if let Some(kind) = StringListKind::from_type_code(type_code) {
        let fragment = decode_string_list(&header, kind, body)?;
        decoded.fragments.push(fragment);
    } else {
        return Err(IngestionError::UnsupportedType { type_code });
    }

    Ok(decoded)
}

fn decode_physics(header: &RecordHeader, mut body: WordReader<'_>, out: &mut DecodedBuffer) {
    for _ in 0..header.entity_count {
        if body.is_empty() {
            out.rejected.push(IngestionError::Truncated {
                declared: header.byte_len(),
                available: HEADER_BYTES + body.consumed_bytes(),
            });
            return;
        }

        let start = body.clone();
        let event_words = usize::from(body.word().unwrap_or(0));

        if event_words < MIN_EVENT_WORDS {
            out.rejected.push(
                ContractError::EventTooSmall {
                    node: header.node,
                    size: event_words * 2,
                    min: MIN_EVENT_WORDS * 2,
                }
                .into(),
            );
            // A zero count still occupies its own word.
            body = start;
            if !body.skip_words(event_words.max(1)) {
                return;
            }
            continue;
        }

        if start.remaining_words() < event_words {
            out.rejected.push(IngestionError::Truncated {
                declared: event_words * 2,
                available: start.remaining_words() * 2,
            });
            return;
        }

        let Some(timestamp) = body.long() else {
            return;
        };
        let payload = body.take_words_le(event_words - MIN_EVENT_WORDS);

        out.fragments.push(Fragment {
            node: header.node,
            body: FragmentBody::Physics(PhysicsFragment { timestamp, payload }),
        });
    }
}

fn decode_transition(
    header: &RecordHeader,
    transition: TransitionKind,
    mut body: WordReader<'_>,
) -> Result<Fragment> {
    let needed = TITLE_BYTES + 8;
    let title_bytes = body.bytes(TITLE_BYTES).ok_or_else(|| truncated(header, needed))?;
    let title = c_string(title_bytes);
    let elapsed_time = body.long().ok_or_else(|| truncated(header, needed))?;
    let absolute_time = body.long().ok_or_else(|| truncated(header, needed))?;

    Ok(Fragment {
        node: header.node,
        body: FragmentBody::StateTransition(TransitionFragment {
            transition,
            run_number: u32::from(header.run_number),
            title,
            elapsed_time,
            absolute_time,
        }),
    })
}

fn decode_scaler(
    header: &RecordHeader,
    kind: ScalerKind,
    mut body: WordReader<'_>,
) -> Result<Fragment> {
    let needed = 8 + usize::from(header.entity_count) * 4;
    let interval_end = body.long().ok_or_else(|| truncated(header, needed))?;
    let interval_start = body.long().ok_or_else(|| truncated(header, needed))?;
    let values = (0..header.entity_count)
        .map(|_| body.long().ok_or_else(|| truncated(header, needed)))
        .collect::<Result<Vec<u32>>>()?;

    Ok(Fragment {
        node: header.node,
        body: FragmentBody::Scaler(ScalerFragment {
            kind,
            interval_start,
            interval_end,
            values,
        }),
    })
}

fn decode_string_list(
    header: &RecordHeader,
    kind: StringListKind,
    mut body: WordReader<'_>,
) -> Result<Fragment> {
    let mut strings = Vec::with_capacity(usize::from(header.entity_count));
    for _ in 0..header.entity_count {
        let rest = body.rest();
        let Some(nul) = rest.iter().position(|&b| b == 0) else {
            return Err(truncated(header, body.consumed_bytes() + rest.len() + 1));
        };
        strings.push(String::from_utf8_lossy(&rest[..nul]).into_owned());

        // Terminator included, padded to an even length.
        let used = (nul + 2) & !1;
        if body.bytes(used).is_none() {
            return Err(truncated(header, body.consumed_bytes() + used));
        }
    }

    Ok(Fragment {
        node: header.node,
        body: FragmentBody::StringList(StringListFragment { kind, strings }),
    })
}

fn truncated(header: &RecordHeader, body_bytes: usize) -> IngestionError {
    IngestionError::Truncated {
        declared: HEADER_BYTES + body_bytes,
        available: header.byte_len(),
    }
}

/// Text up to the first NUL.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Cursor over a record body in its wire byte order.
#[derive(Clone)]
struct WordReader<'a> {
    buf: &'a [u8],
    pos: usize,
    order: ByteOrder,
}

impl<'a> WordReader<'a> {
    fn new(buf: &'a [u8], order: ByteOrder) -> Self {
        Self { buf, pos: 0, order }
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.remaining_words() == 0
    }

    fn remaining_words(&self) -> usize {
        (self.buf.len() - self.pos) / 2
    }

    fn consumed_bytes(&self) -> usize {
        self.pos
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.buf.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(slice)
    }

    fn skip_words(&mut self, n: usize) -> bool {
        self.bytes(n * 2).is_some()
    }

    fn word(&mut self) -> Option<u16> {
        let raw: [u8; 2] = self.bytes(2)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        })
    }

    fn long(&mut self) -> Option<u32> {
        let raw: [u8; 4] = self.bytes(4)?.try_into().ok()?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }

    /// Up to `n` words, re-encoded little-endian.
    fn take_words_le(&mut self, n: usize) -> Bytes {
        let n = n.min(self.remaining_words());
        let mut out = BytesMut::with_capacity(n * 2);
        for _ in 0..n {
            if let Some(word) = self.word() {
                out.put_u16_le(word);
            }
        }
        out.freeze()
    }
}
