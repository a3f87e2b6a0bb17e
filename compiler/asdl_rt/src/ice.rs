//! Internal compiler errors.
//!
//! Generated code calls these when a structural invariant is broken: a tag
//! that does not match its payload, a visitor default that was never meant to
//! be reached, a node kind the duplicator cannot copy. None of these are
//! user diagnostics. They abort with a message naming the broken invariant.

/// Prefix of every panic message raised here.
pub const ICE_PREFIX: &str = "internal compiler error";

#[cold]
#[track_caller]
fn ice(message: std::fmt::Arguments<'_>) -> ! {
    panic!("{ICE_PREFIX}: {message}")
}

/// A dispatch visitor reached a variant it has no handler for.
#[cold]
#[track_caller]
pub fn unimplemented_visitor(variant: &str) -> ! {
    ice(format_args!("visitor for `{variant}` is not implemented"))
}

/// The duplicator was asked to copy a node kind it does not support.
#[cold]
#[track_caller]
pub fn unsupported_duplication(kind: &str) -> ! {
    ice(format_args!("duplication of `{kind}` is not supported"))
}

/// A node was downcast to a variant its tag does not name.
#[cold]
#[track_caller]
pub fn downcast_mismatch(union: &str, expected: &str, found: &str) -> ! {
    ice(format_args!(
        "`{union}` node downcast to `{expected}` but its tag is `{found}`"
    ))
}

#[cold]
#[track_caller]
pub fn unfilled_slot(ty: &str, raw: u32) -> ! {
    ice(format_args!("arena slot #{raw} of `{ty}` is reserved or missing"))
}

#[cold]
#[track_caller]
pub fn arena_overflow(ty: &str) -> ! {
    ice(format_args!("arena of `{ty}` exceeds u32::MAX nodes"))
}

/// A fresh table counter was requested after `u64::MAX` was taken.
#[cold]
#[track_caller]
pub fn counters_exhausted() -> ! {
    ice(format_args!("no symbol table counter is left above u64::MAX"))
}

#[cold]
#[track_caller]
pub fn unknown_scope(raw: u32) -> ! {
    ice(format_args!("scope #{raw} does not exist"))
}

/// A symbol reference points at a symbol that no scope contains.
#[cold]
#[track_caller]
pub fn homeless_symbol(raw: u32) -> ! {
    ice(format_args!("symbol #{raw} is referenced but belongs to no scope"))
}
