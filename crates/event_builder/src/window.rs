//! Wraparound-aware timestamp matching window.

/// Inclusive `[start, end]` range on the 32-bit timestamp ring.
///
/// When `start > end` the window straddles the wrap point and covers
/// `[start, u32::MAX] ∪ [0, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    pub start: u32,
    pub end: u32,
}

impl MatchWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Window of half-width `width` centred on `timestamp`.
    #[inline]
    pub fn around(timestamp: u32, width: u32) -> Self {
        Self {
            start: timestamp.wrapping_sub(width),
            end: timestamp.wrapping_add(width),
        }
    }

    #[inline]
    pub fn wraps(&self) -> bool {
        self.start > self.end
    }

    #[inline]
    pub fn contains(&self, reference: u32) -> bool {
        if self.wraps() {
            reference >= self.start || reference <= self.end
        } else {
            self.start <= reference && reference <= self.end
        }
    }
}
