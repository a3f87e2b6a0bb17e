//! Error types surfaced by generated libraries.

use crate::span::SpanError;

/// Failure reading a serialized tree.
///
/// Most variants describe malformed input. The internal-fault class
/// (see [`DecodeError::is_internal_fault`]) means the payload broke the
/// writer's ordering contract, which only a writer bug can cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {offset}")]
    Truncated { offset: usize },
    #[error("{count} trailing bytes after the root node")]
    TrailingBytes { count: usize },
    #[error("missing `ASDL` magic")]
    BadMagic,
    #[error("format version {found} is not supported (expected {expected})")]
    VersionMismatch { expected: u8, found: u8 },
    #[error("unknown `{union}` tag {tag}")]
    UnknownTag { union: &'static str, tag: u8 },
    #[error("invalid bool byte {byte}")]
    InvalidBool { byte: u8 },
    #[error("length {len} does not fit in memory")]
    LengthOverflow { len: u64 },
    #[error("invalid UTF-8 in string at byte {offset}")]
    InvalidUtf8 { offset: usize },
    #[error(transparent)]
    Span(#[from] SpanError),

    #[error("internal fault: symbol table {counter} referenced before it was read")]
    UnresolvedScope { counter: u64 },
    #[error("internal fault: symbol `{name}` referenced but never defined")]
    UnresolvedSymbol { name: String },
    #[error("internal fault: symbol table {counter} appears twice")]
    DuplicateScope { counter: u64 },
    #[error("internal fault: symbol `{name}` defined twice in one table")]
    DuplicateSymbol { name: String },
    #[error("internal fault: symbol `{name}` referenced as `{expected}` but defined as `{found}`")]
    SymbolTagMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl DecodeError {
    /// Whether this error reflects a violated write-order invariant rather
    /// than corrupt or foreign input.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            DecodeError::UnresolvedScope { .. }
                | DecodeError::UnresolvedSymbol { .. }
                | DecodeError::DuplicateScope { .. }
                | DecodeError::DuplicateSymbol { .. }
                | DecodeError::SymbolTagMismatch { .. }
        )
    }
}

/// The duplicator met a gated variant whose flag is off.
///
/// This is the one recoverable failure in a generated library: callers
/// decide whether to fall back to sharing the original subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("refusing to duplicate `{variant}` (enable `{flag}`)")]
pub struct DuplicationRefused {
    pub variant: &'static str,
    pub flag: &'static str,
}
