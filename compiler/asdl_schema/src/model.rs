//! Schema model types.
//!
//! These mirror the ASDL grammar one-to-one. No validation happens here:
//! classification and consistency checks belong to the generator.

use std::fmt;

/// A complete schema: a module name plus ordered type definitions.
///
/// The name becomes the namespace of everything generated from it
/// (`module ASR` produces a container type named `Asr`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub definitions: Vec<TypeDef>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Schema {
            name: name.into(),
            definitions: Vec::new(),
        }
    }

    /// Append a definition, builder style.
    #[must_use]
    pub fn with(mut self, def: TypeDef) -> Self {
        self.definitions.push(def);
        self
    }

    /// Look up a definition by type name.
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.definitions.iter().find(|def| def.name == name)
    }

    /// Iterate over every variant of every union, paired with its union name.
    pub fn variants(&self) -> impl Iterator<Item = (&str, &Variant)> {
        self.definitions.iter().flat_map(|def| {
            let variants: &[Variant] = match &def.body {
                TypeBody::Union(union) => &union.variants,
                TypeBody::Record(_) => &[],
            };
            variants.iter().map(move |v| (def.name.as_str(), v))
        })
    }
}

/// A named type definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub body: TypeBody,
}

impl TypeDef {
    pub fn union(name: impl Into<String>, variants: Vec<Variant>, attributes: Vec<Field>) -> Self {
        TypeDef {
            name: name.into(),
            body: TypeBody::Union(Union {
                variants,
                attributes,
            }),
        }
    }

    pub fn record(name: impl Into<String>, fields: Vec<Field>) -> Self {
        TypeDef {
            name: name.into(),
            body: TypeBody::Record(Record { fields }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeBody {
    Union(Union),
    Record(Record),
}

/// Tagged union: mutually exclusive variants plus attributes every variant carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Union {
    pub variants: Vec<Variant>,
    pub attributes: Vec<Field>,
}

impl Union {
    /// A union whose variants carry no fields behaves as a plain enumeration.
    pub fn is_simple(&self) -> bool {
        self.variants.iter().all(|v| v.fields.is_empty())
    }
}

/// Plain record (ASDL product type).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub fields: Vec<Field>,
}

/// One alternative of a union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Variant {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Variant {
            name: name.into(),
            fields,
        }
    }
}

/// A field declaration: `ty name`, `ty? name` or `ty* name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: String,
    pub cardinality: Cardinality,
}

impl Field {
    pub fn new(ty: impl Into<String>, name: impl Into<String>, cardinality: Cardinality) -> Self {
        Field {
            name: name.into(),
            ty: ty.into(),
            cardinality,
        }
    }

    pub fn scalar(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ty, name, Cardinality::Scalar)
    }

    pub fn optional(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ty, name, Cardinality::Optional)
    }

    pub fn sequence(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ty, name, Cardinality::Sequence)
    }

    /// The builtin this field's type names, if any.
    pub fn builtin(&self) -> Option<Builtin> {
        Builtin::from_name(&self.ty)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.cardinality {
            Cardinality::Scalar => "",
            Cardinality::Optional => "?",
            Cardinality::Sequence => "*",
        };
        write!(f, "{}{} {}", self.ty, suffix, self.name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Scalar,
    Optional,
    Sequence,
}

/// Types every schema can reference without declaring them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Int,
    Float,
    Bool,
    String,
    Identifier,
    /// Any node of any union in the schema.
    Node,
    /// A scope: owned, or referenced by id (see the generator conventions).
    SymbolTable,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Int,
        Builtin::Float,
        Builtin::Bool,
        Builtin::String,
        Builtin::Identifier,
        Builtin::Node,
        Builtin::SymbolTable,
    ];

    pub fn from_name(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::String => "string",
            Builtin::Identifier => "identifier",
            Builtin::Node => "node",
            Builtin::SymbolTable => "symbol_table",
        }
    }
}
