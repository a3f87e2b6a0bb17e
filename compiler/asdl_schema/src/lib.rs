//! ASDL Schema
//!
//! The declarative description a tree library is generated from:
//! - [`Schema`]: ordered type definitions under a module name
//! - [`TypeDef`]: either a tagged [`Union`] or a plain [`Record`]
//! - [`Field`]: a typed, named slot with a [`Cardinality`]
//!
//! [`parse_schema`] reads the textual ASDL form:
//!
//! ```text
//! module Calc {
//!     expr = IntConst(int n)
//!          | Add(expr left, expr right)
//!     binop = Plus | Minus        -- simple enumeration
//!     arg = (expr value, identifier? label)
//! }
//! ```

mod model;
mod parse;

pub use model::{Builtin, Cardinality, Field, Record, Schema, TypeBody, TypeDef, Union, Variant};
pub use parse::{parse_schema, SchemaError};
