//! Schema-specific roles the emitters need to know about.
//!
//! ASDL itself cannot say which union holds expressions, which variant is a
//! function, or which `symbol_table` field is a back-reference. These names
//! come from a [`Conventions`] value, loaded from TOML or defaulted to the
//! conventions of the `AST`/`ASR` schemas shipped with the compiler.
//!
//! ```toml
//! expr_union = "expr"
//! scope_ref_fields = ["parent_symtab"]
//!
//! [[gates]]
//! variant = "FunctionCall"
//! flag = "allow_procedure_calls"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::GenError;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Conventions {
    /// Union rewritten by the expression replacer and the call-replacer walk.
    pub expr_union: String,
    /// Union rewritten by the statement replacer.
    pub stmt_union: String,
    /// Union whose nodes live in symbol tables and are referenced, never owned.
    pub symbol_union: String,
    /// Symbol variant serialized after all other entries of its table.
    pub function_variant: String,
    /// `symbol_table` fields that point at an enclosing table instead of owning one.
    pub scope_ref_fields: Vec<String>,
    /// Variants the duplicator refuses to copy unless a flag allows it.
    pub gates: Vec<Gate>,
    /// Fields left out of the binary format and read back as absent.
    pub skip_fields: Vec<SkipField>,
    /// Variants pickled on one line even in indented mode.
    pub pickle_inline: Vec<String>,
    /// Expression field holding the static type.
    pub type_field: String,
    /// Expression field holding the compile-time value.
    pub value_field: String,
    /// Expression variants ending with this suffix are their own value.
    pub constant_suffix: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Gate {
    pub variant: String,
    pub flag: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkipField {
    pub variant: String,
    pub field: String,
}

impl Default for Conventions {
    fn default() -> Self {
        let gate = |variant: &str, flag: &str| Gate {
            variant: variant.to_string(),
            flag: flag.to_string(),
        };
        Conventions {
            expr_union: "expr".to_string(),
            stmt_union: "stmt".to_string(),
            symbol_union: "symbol".to_string(),
            function_variant: "Function".to_string(),
            scope_ref_fields: vec!["parent_symtab".to_string()],
            gates: vec![
                gate("FunctionCall", "allow_procedure_calls"),
                gate("SubroutineCall", "allow_procedure_calls"),
                gate("ArrayReshape", "allow_reshape"),
            ],
            skip_fields: vec![SkipField {
                variant: "ExternalSymbol".to_string(),
                field: "external".to_string(),
            }],
            pickle_inline: ["Integer", "Real", "Complex", "Character", "Logical", "Var"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            type_field: "type".to_string(),
            value_field: "value".to_string(),
            constant_suffix: "Constant".to_string(),
        }
    }
}

impl Conventions {
    /// Parse a conventions file. Keys left out keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, GenError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, GenError> {
        let text = std::fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn gate_for(&self, variant: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.variant == variant)
    }

    pub fn is_skipped(&self, variant: &str, field: &str) -> bool {
        self.skip_fields
            .iter()
            .any(|s| s.variant == variant && s.field == field)
    }

    pub fn is_scope_ref(&self, field: &str) -> bool {
        self.scope_ref_fields.iter().any(|f| f == field)
    }

    pub fn is_pickle_inline(&self, variant: &str) -> bool {
        self.pickle_inline.iter().any(|v| v == variant)
    }
}
