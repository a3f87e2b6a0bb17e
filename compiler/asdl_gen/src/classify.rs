//! Schema classification.
//!
//! One walk over the schema produces the [`Classified`] context every
//! emission pass reads: types partitioned into simple enumerations, tagged
//! unions and plain records; each field resolved to a [`FieldKind`]; a bit
//! per distinct field of every union; and collision-free Rust names.
//!
//! All checks happen here so the emitters can assume a consistent schema.

use std::collections::HashMap;

use asdl_schema::{Builtin, Cardinality, Field, Schema, TypeBody};
use proc_macro2::Ident;
use tracing::{trace, warn};

use crate::conventions::Conventions;
use crate::names::{camel_case, ident, joined, snake_case};
use crate::GenError;

/// Field masks are `u128`: at most this many distinct fields per union.
pub const MAX_FIELD_BITS: u32 = 128;

/// What a field holds, as far as the emitters care.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Bool,
    Str,
    Ident,
    /// A simple enumeration (index into [`Classified::enums`]).
    Enum(usize),
    /// An owned node of a non-symbol union (index into [`Classified::unions`]).
    Union(usize),
    /// A non-owning reference to a node of the symbol union.
    SymbolRef,
    /// An inline record value (index into [`Classified::records`]).
    Record(usize),
    /// An owned node of any union.
    Node,
    /// A symbol table owned by this node.
    ScopeOwned,
    /// A back-reference to an enclosing symbol table.
    ScopeRef,
}

impl FieldKind {
    /// Kinds that are plain data: no children, no references.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            FieldKind::Int
                | FieldKind::Float
                | FieldKind::Bool
                | FieldKind::Str
                | FieldKind::Ident
                | FieldKind::Enum(_)
        )
    }

    /// Kinds stored as `Copy` values.
    pub fn is_copy(self) -> bool {
        !matches!(self, FieldKind::Str | FieldKind::Ident | FieldKind::Record(_))
    }
}

#[derive(Clone, Debug)]
pub struct FieldInfo {
    /// Schema spelling, used in every textual rendering.
    pub name: String,
    pub ident: Ident,
    pub kind: FieldKind,
    pub card: Cardinality,
    /// Bit in the owning union's (or record's) field mask.
    pub bit: u32,
    /// Left out of the binary format.
    pub skipped: bool,
}

#[derive(Clone, Debug)]
pub struct GateInfo {
    pub flag: Ident,
    pub flag_name: String,
}

#[derive(Clone, Debug)]
pub struct VariantInfo {
    pub name: String,
    pub ident: Ident,
    /// Method-name stem (`visit_<stem>`, `make_<stem>`, ...).
    pub stem: String,
    pub tag: u8,
    pub fields: Vec<FieldInfo>,
    /// Bits of attributes and fields that are always present.
    pub required_mask: u128,
    pub gate: Option<GateInfo>,
    pub pickle_inline: bool,
    pub is_function: bool,
}

impl VariantInfo {
    pub fn owns_scope(&self) -> bool {
        self.fields.iter().any(|f| f.kind == FieldKind::ScopeOwned)
    }
}

#[derive(Clone, Debug)]
pub struct UnionInfo {
    pub name: String,
    pub stem: String,
    /// `Expr`
    pub ty: Ident,
    /// `ExprId`
    pub id: Ident,
    /// `ExprKind`
    pub kind: Ident,
    /// `ExprTag`
    pub tag: Ident,
    /// `ExprVariant`
    pub variant_trait: Ident,
    /// `expr`: module holding the variant structs.
    pub module: Ident,
    /// `expr_nodes`: arena field of the container.
    pub arena: Ident,
    /// `expr` / `expr_mut`: container accessors.
    pub accessor: Ident,
    pub accessor_mut: Ident,
    pub attributes: Vec<FieldInfo>,
    pub variants: Vec<VariantInfo>,
    /// Field name of every bit, in bit order.
    pub bit_names: Vec<String>,
}

impl UnionInfo {
    pub fn owns_scopes(&self) -> bool {
        self.variants.iter().any(VariantInfo::owns_scope)
    }
}

#[derive(Clone, Debug)]
pub struct EnumInfo {
    pub name: String,
    pub stem: String,
    pub ty: Ident,
    /// Schema spelling and identifier of each value.
    pub values: Vec<(String, Ident)>,
}

#[derive(Clone, Debug)]
pub struct RecordInfo {
    pub name: String,
    pub stem: String,
    pub ty: Ident,
    pub fields: Vec<FieldInfo>,
}

/// Classification context threaded through every emission pass.
#[derive(Clone, Debug)]
pub struct Classified {
    pub schema_name: String,
    /// Container type owning every arena (`module ASR` -> `Asr`).
    pub container: Ident,
    pub unions: Vec<UnionInfo>,
    pub enums: Vec<EnumInfo>,
    pub records: Vec<RecordInfo>,
    pub conventions: Conventions,
    pub symbol: Option<usize>,
    pub expr: Option<usize>,
    pub stmt: Option<usize>,
    /// Distinct duplicator flags, in first-use order.
    pub flags: Vec<Ident>,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
enum TypeNode {
    Union(usize),
    Record(usize),
}

impl Classified {
    pub fn has_scopes(&self) -> bool {
        self.symbol.is_some()
    }

    pub fn is_symbol(&self, union: usize) -> bool {
        self.symbol == Some(union)
    }

    fn children(&self, node: TypeNode) -> Vec<TypeNode> {
        let fields: Vec<&FieldInfo> = match node {
            TypeNode::Union(u) => self.unions[u]
                .variants
                .iter()
                .flat_map(|v| &v.fields)
                .collect(),
            TypeNode::Record(r) => self.records[r].fields.iter().collect(),
        };
        fields
            .into_iter()
            .filter_map(|f| match f.kind {
                FieldKind::Union(u) => Some(TypeNode::Union(u)),
                FieldKind::Record(r) => Some(TypeNode::Record(r)),
                _ => None,
            })
            .collect()
    }

    /// Whether an owned path leads from `from` to a node of union `target`.
    /// A union trivially reaches itself.
    fn reaches(&self, from: TypeNode, target: usize) -> bool {
        let mut seen = vec![from];
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == TypeNode::Union(target) {
                return true;
            }
            for child in self.children(node) {
                if !seen.contains(&child) {
                    seen.push(child);
                    stack.push(child);
                }
            }
        }
        false
    }

    pub fn union_reaches(&self, from: usize, target: usize) -> bool {
        self.reaches(TypeNode::Union(from), target)
    }

    pub fn record_reaches(&self, record: usize, target: usize) -> bool {
        self.reaches(TypeNode::Record(record), target)
    }

    /// Unions a replacer for `target` has to pass through: reachable from
    /// `target` and leading back to it. Symbol nodes are never on the path.
    pub fn rewrite_set(&self, target: usize) -> Vec<usize> {
        (0..self.unions.len())
            .filter(|&u| !self.is_symbol(u))
            .filter(|&u| self.union_reaches(target, u) && self.union_reaches(u, target))
            .collect()
    }
}

fn valid_name(name: &str) -> Result<(), GenError> {
    let mut chars = name.chars();
    let ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name != "_";
    if ok {
        Ok(())
    } else {
        Err(GenError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Registry of generated names; a second claim of a name is a collision.
#[derive(Default)]
struct Claims {
    owners: HashMap<String, String>,
}

impl Claims {
    fn try_claim(&mut self, name: &str, owner: &str) -> Result<(), String> {
        match self.owners.get(name) {
            Some(first) => Err(first.clone()),
            None => {
                self.owners.insert(name.to_string(), owner.to_string());
                Ok(())
            }
        }
    }

    fn claim(&mut self, name: &str, owner: &str) -> Result<(), GenError> {
        self.try_claim(name, owner)
            .map_err(|first| GenError::NameCollision {
                name: name.to_string(),
                first,
                second: owner.to_string(),
            })
    }
}

/// Type names every generated library defines besides per-type ones.
const RESERVED_TYPES: &[&str] = &[
    "NodeRef",
    "NodeTag",
    "Visitor",
    "WalkVisitor",
    "CallReplacerOnExpressions",
    "Duplicator",
    "Pickler",
    "TreePrinter",
    "JsonDumper",
    "Serializer",
    "Deserializer",
];

/// Stems taken by generated helpers (`visit_node`, `visit_scope`, `mod walk`, ...).
const RESERVED_STEMS: &[&str] = &[
    "node",
    "scope",
    "symbol_ref",
    "scope_ref",
    "scope_entry",
    "new",
    "span",
    "finish",
    "walk",
    "dispatch",
    "call_replace",
    "stamp_scope_owners",
    "expr_type",
    "expr_value",
];

/// Field names the generated node structs use themselves. `kind` only
/// clashes with attributes, which sit next to it.
fn is_reserved_field(name: &str, site: FieldSite) -> bool {
    name == "span" || (site == FieldSite::Attribute && name == "kind")
}

#[derive(Copy, Clone)]
enum Target {
    Enum(usize),
    Union(usize),
    Record(usize),
}

struct Classifier<'s> {
    schema: &'s Schema,
    conventions: &'s Conventions,
    targets: HashMap<&'s str, Target>,
    symbol: Option<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FieldSite {
    Variant,
    Attribute,
    Record,
}

impl Classifier<'_> {
    fn resolve(&self, owner: &str, field: &Field, site: FieldSite) -> Result<FieldKind, GenError> {
        let unsupported = |reason| GenError::UnsupportedField {
            owner: owner.to_string(),
            field: field.name.clone(),
            reason,
        };
        let kind = match field.builtin() {
            Some(Builtin::Int) => FieldKind::Int,
            Some(Builtin::Float) => FieldKind::Float,
            Some(Builtin::Bool) => FieldKind::Bool,
            Some(Builtin::String) => FieldKind::Str,
            Some(Builtin::Identifier) => FieldKind::Ident,
            Some(Builtin::Node) => FieldKind::Node,
            Some(Builtin::SymbolTable) => {
                if self.symbol.is_none() {
                    return Err(GenError::MissingSymbolUnion {
                        owner: owner.to_string(),
                        field: field.name.clone(),
                        symbol_union: self.conventions.symbol_union.clone(),
                    });
                }
                if field.cardinality == Cardinality::Sequence {
                    return Err(unsupported("symbol table fields cannot be sequences"));
                }
                if self.conventions.is_scope_ref(&field.name) {
                    FieldKind::ScopeRef
                } else {
                    FieldKind::ScopeOwned
                }
            }
            None => match self.targets.get(field.ty.as_str()) {
                Some(Target::Enum(e)) => FieldKind::Enum(*e),
                Some(Target::Union(u)) if Some(*u) == self.symbol => FieldKind::SymbolRef,
                Some(Target::Union(u)) => FieldKind::Union(*u),
                Some(Target::Record(r)) => FieldKind::Record(*r),
                None => {
                    return Err(GenError::UnknownType {
                        owner: owner.to_string(),
                        field: field.name.clone(),
                        ty: field.ty.clone(),
                    })
                }
            },
        };
        match site {
            FieldSite::Attribute if !kind.is_leaf() => Err(unsupported(
                "attributes must be primitives or simple enumerations",
            )),
            FieldSite::Record if kind == FieldKind::ScopeOwned => {
                Err(unsupported("records cannot own symbol tables"))
            }
            _ => Ok(kind),
        }
    }

    fn field_info(&self, owner: &str, field: &Field, site: FieldSite, bit: u32) -> Result<FieldInfo, GenError> {
        valid_name(&field.name)?;
        if is_reserved_field(&field.name, site) {
            return Err(GenError::NameCollision {
                name: field.name.clone(),
                first: "the generated node layout".to_string(),
                second: format!("field of `{owner}`"),
            });
        }
        let kind = self.resolve(owner, field, site)?;
        let skipped = site == FieldSite::Variant && self.conventions.is_skipped(owner, &field.name);
        if skipped && field.cardinality != Cardinality::Optional {
            return Err(GenError::SkippedFieldNotOptional {
                variant: owner.to_string(),
                field: field.name.clone(),
            });
        }
        Ok(FieldInfo {
            name: field.name.clone(),
            ident: ident(&field.name),
            kind,
            card: field.cardinality,
            bit,
            skipped,
        })
    }
}

/// Per-union bit assignment: the same field name gets the same bit in every
/// variant, and must keep the same type and cardinality.
struct BitTable<'a> {
    union: &'a str,
    bits: Vec<&'a Field>,
}

impl<'a> BitTable<'a> {
    fn bit_of(&mut self, field: &'a Field) -> Result<u32, GenError> {
        if let Some(pos) = self.bits.iter().position(|f| f.name == field.name) {
            let first = self.bits[pos];
            if first.ty != field.ty || first.cardinality != field.cardinality {
                return Err(GenError::FieldBitConflict {
                    union: self.union.to_string(),
                    field: field.name.clone(),
                    first: first.to_string(),
                    second: field.to_string(),
                });
            }
            return u32::try_from(pos).map_err(|_| self.overflow());
        }
        let bit = u32::try_from(self.bits.len()).map_err(|_| self.overflow())?;
        if bit >= MAX_FIELD_BITS {
            return Err(self.overflow());
        }
        self.bits.push(field);
        Ok(bit)
    }

    fn overflow(&self) -> GenError {
        GenError::MaskOverflow {
            owner: self.union.to_string(),
        }
    }
}

fn bit_mask(bit: u32) -> u128 {
    1u128 << bit
}

/// Classify `schema` under `conventions`.
pub fn classify(schema: &Schema, conventions: &Conventions) -> Result<Classified, GenError> {
    valid_name(&schema.name)?;

    let mut targets = HashMap::new();
    let (mut enum_count, mut union_count, mut record_count) = (0, 0, 0);
    for def in &schema.definitions {
        valid_name(&def.name)?;
        let target = match &def.body {
            TypeBody::Union(u) if u.is_simple() => {
                enum_count += 1;
                Target::Enum(enum_count - 1)
            }
            TypeBody::Union(_) => {
                union_count += 1;
                Target::Union(union_count - 1)
            }
            TypeBody::Record(_) => {
                record_count += 1;
                Target::Record(record_count - 1)
            }
        };
        if targets.insert(def.name.as_str(), target).is_some() {
            return Err(GenError::NameCollision {
                name: def.name.clone(),
                first: "a type definition".to_string(),
                second: "another type definition".to_string(),
            });
        }
    }

    let symbol = match targets.get(conventions.symbol_union.as_str()) {
        Some(Target::Union(u)) => Some(*u),
        _ => None,
    };
    let classifier = Classifier {
        schema,
        conventions,
        targets,
        symbol,
    };

    let container = ident(&camel_case(&schema.name));
    let mut types = Claims::default();
    types.claim(&container.to_string(), "the container")?;
    for reserved in RESERVED_TYPES {
        types.claim(reserved, "the generated API")?;
    }
    let mut stems = Claims::default();
    for reserved in RESERVED_STEMS {
        stems.claim(reserved, "the generated API")?;
    }

    let mut unions = Vec::new();
    let mut enums = Vec::new();
    let mut records = Vec::new();
    let mut flags: Vec<Ident> = Vec::new();
    let mut variant_owner: HashMap<&str, &str> = HashMap::new();

    // Type-level names and union/record stems first, so variant stems can
    // be checked against all of them.
    for def in &classifier.schema.definitions {
        let camel = camel_case(&def.name);
        let stem = snake_case(&def.name);
        let owner = format!("type `{}`", def.name);
        match &def.body {
            TypeBody::Union(u) if u.is_simple() => {
                types.claim(&camel, &owner)?;
                stems.claim(&stem, &owner)?;
                let values = u
                    .variants
                    .iter()
                    .map(|v| valid_name(&v.name).map(|()| (v.name.clone(), ident(&v.name))))
                    .collect::<Result<Vec<_>, _>>()?;
                if values.len() > 256 {
                    return Err(GenError::TooManyVariants {
                        union: def.name.clone(),
                    });
                }
                enums.push(EnumInfo {
                    name: def.name.clone(),
                    stem,
                    ty: ident(&camel),
                    values,
                });
            }
            TypeBody::Union(_) => {
                for suffix in ["", "Id", "Kind", "Tag", "Variant", "Replacer"] {
                    types.claim(&format!("{camel}{suffix}"), &owner)?;
                }
                stems.claim(&stem, &owner)?;
                stems.claim(&format!("{stem}_mut"), &owner)?;
                stems.claim(&format!("{stem}_replace"), &owner)?;
            }
            TypeBody::Record(_) => {
                types.claim(&camel, &owner)?;
                stems.claim(&stem, &owner)?;
            }
        }
    }

    for def in &classifier.schema.definitions {
        let camel = camel_case(&def.name);
        let stem = snake_case(&def.name);
        match &def.body {
            TypeBody::Union(u) if u.is_simple() => {}
            TypeBody::Union(u) => {
                trace!(union = %def.name, variants = u.variants.len(), "classifying union");
                if u.variants.len() > 256 {
                    return Err(GenError::TooManyVariants {
                        union: def.name.clone(),
                    });
                }
                let mut table = BitTable {
                    union: &def.name,
                    bits: Vec::new(),
                };
                let mut attributes = Vec::new();
                let mut attr_required = 0u128;
                for attr in &u.attributes {
                    let bit = table.bit_of(attr)?;
                    let info = classifier.field_info(&def.name, attr, FieldSite::Attribute, bit)?;
                    if info.card != Cardinality::Optional {
                        attr_required |= bit_mask(bit);
                    }
                    attributes.push(info);
                }

                let mut variants = Vec::new();
                for (index, v) in u.variants.iter().enumerate() {
                    valid_name(&v.name)?;
                    if let Some(first) = variant_owner.insert(&v.name, &def.name) {
                        return Err(GenError::DuplicateVariant {
                            name: v.name.clone(),
                            first: first.to_string(),
                            second: def.name.clone(),
                        });
                    }
                    let mut fields = Vec::new();
                    let mut required = attr_required;
                    for field in &v.fields {
                        if u.attributes.iter().any(|a| a.name == field.name) {
                            return Err(GenError::NameCollision {
                                name: field.name.clone(),
                                first: format!("an attribute of `{}`", def.name),
                                second: format!("a field of `{}`", v.name),
                            });
                        }
                        let bit = table.bit_of(field)?;
                        let info = classifier.field_info(&v.name, field, FieldSite::Variant, bit)?;
                        if info.card != Cardinality::Optional {
                            required |= bit_mask(bit);
                        }
                        fields.push(info);
                    }

                    let owner = format!("variant `{}`", v.name);
                    let mut variant_stem = snake_case(&v.name);
                    if stems.try_claim(&variant_stem, &owner).is_err() {
                        variant_stem = format!("{variant_stem}_{stem}");
                        stems.claim(&variant_stem, &owner)?;
                    }

                    let is_symbol = symbol == Some(unions.len());
                    let gate = match conventions.gate_for(&v.name) {
                        Some(gate) if !is_symbol => {
                            let invalid = || GenError::InvalidFlag {
                                flag: gate.flag.clone(),
                            };
                            // `ir` is the duplicator's own field
                            if gate.flag == "ir" {
                                return Err(invalid());
                            }
                            let flag: Ident = syn::parse_str(&gate.flag).map_err(|_| invalid())?;
                            if !flags.iter().any(|f| *f == flag) {
                                flags.push(flag.clone());
                            }
                            Some(GateInfo {
                                flag,
                                flag_name: gate.flag.clone(),
                            })
                        }
                        _ => None,
                    };

                    variants.push(VariantInfo {
                        name: v.name.clone(),
                        ident: ident(&v.name),
                        stem: variant_stem,
                        tag: u8::try_from(index).map_err(|_| GenError::TooManyVariants {
                            union: def.name.clone(),
                        })?,
                        fields,
                        required_mask: required,
                        gate,
                        pickle_inline: conventions.is_pickle_inline(&v.name),
                        is_function: is_symbol && v.name == conventions.function_variant,
                    });
                }

                unions.push(UnionInfo {
                    name: def.name.clone(),
                    ty: ident(&camel),
                    id: joined(&[&camel, "Id"]),
                    kind: joined(&[&camel, "Kind"]),
                    tag: joined(&[&camel, "Tag"]),
                    variant_trait: joined(&[&camel, "Variant"]),
                    module: ident(&stem),
                    arena: joined(&[&stem, "_nodes"]),
                    accessor: ident(&stem),
                    accessor_mut: joined(&[&stem, "_mut"]),
                    stem,
                    attributes,
                    variants,
                    bit_names: table.bits.iter().map(|f| f.name.clone()).collect(),
                });
            }
            TypeBody::Record(r) => {
                trace!(record = %def.name, fields = r.fields.len(), "classifying record");
                let mut fields = Vec::new();
                for (index, field) in r.fields.iter().enumerate() {
                    let bit = u32::try_from(index)
                        .ok()
                        .filter(|&bit| bit < MAX_FIELD_BITS)
                        .ok_or_else(|| GenError::MaskOverflow {
                            owner: def.name.clone(),
                        })?;
                    if r.fields[..index].iter().any(|f| f.name == field.name) {
                        return Err(GenError::NameCollision {
                            name: field.name.clone(),
                            first: format!("a field of `{}`", def.name),
                            second: format!("another field of `{}`", def.name),
                        });
                    }
                    fields.push(classifier.field_info(&def.name, field, FieldSite::Record, bit)?);
                }
                records.push(RecordInfo {
                    name: def.name.clone(),
                    stem,
                    ty: ident(&camel),
                    fields,
                });
            }
        }
    }

    let union_index = |name: &str| unions.iter().position(|u| u.name == name);
    let expr = union_index(&conventions.expr_union);
    let stmt = union_index(&conventions.stmt_union);

    for gate in &conventions.gates {
        if !variant_owner.contains_key(gate.variant.as_str()) {
            warn!(variant = %gate.variant, "gated variant is not defined by the schema");
        }
    }
    for skip in &conventions.skip_fields {
        if !variant_owner.contains_key(skip.variant.as_str()) {
            warn!(variant = %skip.variant, "skipped-field variant is not defined by the schema");
        }
    }
    if let Some(s) = symbol {
        if !unions[s].variants.iter().any(|v| v.is_function) {
            warn!(variant = %conventions.function_variant, "function variant is not defined by the symbol union");
        }
    }

    Ok(Classified {
        schema_name: schema.name.clone(),
        container,
        unions,
        enums,
        records,
        conventions: conventions.clone(),
        symbol,
        expr,
        stmt,
        flags,
    })
}
