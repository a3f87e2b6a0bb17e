//! Source location spans.

use std::fmt;

/// Error when creating a span from a range that exceeds `u32::MAX`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpanError {
    #[error("span start {0} exceeds u32::MAX")]
    StartTooLarge(u64),
    #[error("span end {0} exceeds u32::MAX")]
    EndTooLarge(u64),
}

/// Byte range of a node in its source file.
///
/// Layout: 8 bytes (`start` inclusive, `end` exclusive). On the wire each
/// endpoint is a 64-bit integer, so decoding goes through [`Span::try_from_wire`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Span for nodes synthesized by passes rather than parsed.
    pub const DUMMY: Span = Span { start: 0, end: 0 };

    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }

    /// Try to create a span from a byte range.
    pub fn try_from_range(range: std::ops::Range<usize>) -> Result<Self, SpanError> {
        let start = u32::try_from(range.start).map_err(|_| SpanError::StartTooLarge(range.start as u64))?;
        let end = u32::try_from(range.end).map_err(|_| SpanError::EndTooLarge(range.end as u64))?;
        Ok(Span { start, end })
    }

    /// Rebuild a span from the two signed endpoints stored in binary form.
    pub fn try_from_wire(first: i64, last: i64) -> Result<Self, SpanError> {
        let start = u32::try_from(first).map_err(|_| SpanError::StartTooLarge(first as u64))?;
        let end = u32::try_from(last).map_err(|_| SpanError::EndTooLarge(last as u64))?;
        Ok(Span { start, end })
    }

    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans to create one covering both.
    #[inline]
    #[must_use]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
