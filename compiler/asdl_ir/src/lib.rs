//! Tree libraries generated from ASDL schemas.
//!
//! - [`ast`]: the raw syntax tree, straight from the parser.
//! - [`asr`]: the semantic IR, with symbol tables and resolved symbols.
//! - [`calc`]: a small expression language, the smallest complete
//!   instantiation of the generator.
//!
//! Everything in these modules except the helpers in [`asr`] is generated
//! by `build.rs`; to change a node, change its schema.

pub mod asr;
pub mod ast;
pub mod calc;
