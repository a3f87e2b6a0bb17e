//! Stack growth for the recursive algorithms of generated libraries.
//!
//! Every generated traversal (serialize, deserialize, duplicate, visit,
//! replace, render) recurses once per tree level. Trees built by a parser
//! or decoded from untrusted bytes can be arbitrarily deep, so each
//! per-union entry point runs inside [`ensure_sufficient_stack`], which grows
//! the stack on demand instead of overflowing it.
//!
//! - **Red zone**: 100KB. If less than this remains, the stack grows.
//! - **Growth size**: 1MB per new segment.
//!
//! On `wasm32` the helper is a plain call.

/// Minimum stack space to keep available.
const RED_ZONE: usize = 100 * 1024;

/// Stack space allocated each time the red zone is hit.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first growing the stack if less than the red zone is left.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
