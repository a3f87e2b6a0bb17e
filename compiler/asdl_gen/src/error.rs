//! Generation-time faults.
//!
//! Everything here aborts generation. These are developer-facing: a schema
//! the emitters cannot render, or an inconsistency the classifier caught.

use std::path::PathBuf;

use asdl_schema::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("`{name}` is not a valid identifier")]
    InvalidName { name: String },
    #[error("`{owner}.{field}` has unknown type `{ty}`")]
    UnknownType {
        owner: String,
        field: String,
        ty: String,
    },
    #[error("field `{field}` of union `{union}` is declared as both `{first}` and `{second}`")]
    FieldBitConflict {
        union: String,
        field: String,
        first: String,
        second: String,
    },
    #[error("`{owner}` has more than 128 distinct fields")]
    MaskOverflow { owner: String },
    #[error("union `{union}` has more than 256 variants")]
    TooManyVariants { union: String },
    #[error("variant `{name}` is defined in both `{first}` and `{second}`")]
    DuplicateVariant {
        name: String,
        first: String,
        second: String,
    },
    #[error("generated name `{name}` is claimed by both {first} and {second}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
    #[error("`{owner}.{field}`: {reason}")]
    UnsupportedField {
        owner: String,
        field: String,
        reason: &'static str,
    },
    #[error("`{owner}.{field}` uses `symbol_table` but the schema has no `{symbol_union}` union")]
    MissingSymbolUnion {
        owner: String,
        field: String,
        symbol_union: String,
    },
    #[error("skipped field `{variant}.{field}` must be optional")]
    SkippedFieldNotOptional { variant: String, field: String },
    #[error("duplicator flag `{flag}` is not a valid identifier")]
    InvalidFlag { flag: String },
    #[error("emitted code for pass `{pass}` does not parse: {message}")]
    Malformed { pass: &'static str, message: String },

    #[error("{}: {source}", path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
    #[error("invalid conventions file: {0}")]
    Conventions(#[from] toml::de::Error),
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
