//! ASDL Runtime
//!
//! Support code every generated tree library links against:
//! - [`Span`] source ranges
//! - [`Arena`] / [`Idx`] node storage, one arena per union
//! - [`Scopes`] / [`SymbolTable`] insertion-ordered scopes with weak parents
//! - [`BinaryWriter`] / [`BinaryReader`] wire primitives
//! - [`PickleWriter`] / [`TreeWriter`] and [`json`] text renderings
//! - [`DecodeError`], [`DuplicationRefused`] and the [`ice`] helpers
//! - [`ensure_sufficient_stack`] for the recursive generated traversals
//!
//! Generated code refers to everything through `::asdl_rt`, so a library
//! only needs this crate as a dependency.

mod arena;
mod binary;
mod error;
pub mod ice;
pub mod json;
mod location;
mod scope;
mod span;
mod stack;
mod text;

pub use arena::{Arena, Idx};
pub use binary::{BinaryReader, BinaryWriter, FORMAT_VERSION, MAGIC};
pub use error::{DecodeError, DuplicationRefused};
pub use location::{LineIndex, Location, LocationResolver};
pub use scope::{ScopeId, Scopes, SymbolTable};
pub use span::{Span, SpanError};
pub use stack::ensure_sufficient_stack;
pub use text::{strip_colors, PickleOptions, PickleWriter, TreeWriter};

pub use rustc_hash::FxHashMap;
