//! Generation driver: classify, run every pass, pretty-print, write.

use std::fs;
use std::path::Path;

use asdl_schema::{parse_schema, Schema};
use proc_macro2::TokenStream;
use tracing::{debug, instrument};

use crate::classify::classify;
use crate::emit::PASSES;
use crate::{Conventions, GenError};

/// The schemas shipped with the compiler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KnownSchema {
    /// Raw syntax tree.
    Ast,
    /// Semantic IR.
    Asr,
}

impl KnownSchema {
    pub const ALL: [KnownSchema; 2] = [KnownSchema::Ast, KnownSchema::Asr];

    pub fn name(self) -> &'static str {
        match self {
            KnownSchema::Ast => "ast",
            KnownSchema::Asr => "asr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// ASDL text of the schema.
    pub fn source(self) -> &'static str {
        match self {
            KnownSchema::Ast => include_str!("../grammar/ast.asdl"),
            KnownSchema::Asr => include_str!("../grammar/asr.asdl"),
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            KnownSchema::Ast => "grammar/ast.asdl",
            KnownSchema::Asr => "grammar/asr.asdl",
        }
    }
}

/// Generate the library source for `schema`.
///
/// Each pass's output is parsed on its own first, so a malformed emission is
/// reported against the pass that produced it.
#[instrument(skip_all, fields(schema = %schema.name))]
pub fn generate(schema: &Schema, conventions: &Conventions) -> Result<String, GenError> {
    let classified = classify(schema, conventions)?;
    let mut out = TokenStream::new();
    for pass in PASSES {
        let tokens = (pass.emit)(&classified);
        let file = syn::parse2::<syn::File>(tokens.clone()).map_err(|e| GenError::Malformed {
            pass: pass.name,
            message: e.to_string(),
        })?;
        debug!(pass = pass.name, items = file.items.len(), "emitted pass");
        out.extend(tokens);
    }
    let file = syn::parse2::<syn::File>(out).map_err(|e| GenError::Malformed {
        pass: "output",
        message: e.to_string(),
    })?;
    Ok(format!(
        "// @generated by asdlc from schema `{}`. Do not edit.\n\n{}",
        schema.name,
        prettyplease::unparse(&file)
    ))
}

/// Generate one of the shipped schemas under the default conventions.
pub fn generate_known(schema: KnownSchema) -> Result<String, GenError> {
    let parsed = parse_schema(schema.source()).map_err(|source| GenError::Schema {
        path: schema.file_name().into(),
        source,
    })?;
    generate(&parsed, &Conventions::default())
}

/// Read the schema at `schema_path` and write the library to `out_path`.
pub fn generate_file(
    schema_path: &Path,
    out_path: &Path,
    conventions: &Conventions,
) -> Result<(), GenError> {
    let text = fs::read_to_string(schema_path).map_err(|source| GenError::Io {
        path: schema_path.to_path_buf(),
        source,
    })?;
    let schema = parse_schema(&text).map_err(|source| GenError::Schema {
        path: schema_path.to_path_buf(),
        source,
    })?;
    let source = generate(&schema, conventions)?;
    write_if_changed(out_path, &source)
}

/// Write `contents` unless the file already holds exactly that, so build
/// scripts do not trigger needless recompilation.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<(), GenError> {
    if fs::read_to_string(path).is_ok_and(|old| old == contents) {
        debug!(path = %path.display(), "output unchanged");
        return Ok(());
    }
    fs::write(path, contents).map_err(|source| GenError::Io {
        path: path.to_path_buf(),
        source,
    })
}
