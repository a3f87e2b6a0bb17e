//! Emission passes.
//!
//! Each pass reads the [`Classified`] schema and returns the items of one
//! concern of the generated library. Passes never see each other's output;
//! they agree on names through the classification context alone.
//!
//! Generated code names runtime items by absolute `::asdl_rt` paths and
//! carries no `use` lines at the top level, so the output can be
//! `include!`d into any module.

mod binary;
mod construct;
mod duplicate;
mod layout;
mod lookup;
mod replace;
mod text;
mod visitor;

use asdl_schema::Cardinality;
use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use crate::classify::{Classified, FieldInfo, FieldKind, UnionInfo, VariantInfo};
use crate::names::joined;

/// One emission pass.
pub struct Pass {
    pub name: &'static str,
    pub emit: fn(&Classified) -> TokenStream,
}

/// Every pass, in output order.
pub const PASSES: &[Pass] = &[
    Pass { name: "layout", emit: layout::emit },
    Pass { name: "construct", emit: construct::emit },
    Pass { name: "visitor", emit: visitor::emit_visitor },
    Pass { name: "walk", emit: visitor::emit_walk },
    Pass { name: "replace", emit: replace::emit_replacers },
    Pass { name: "call_replace", emit: replace::emit_call_replacer },
    Pass { name: "duplicate", emit: duplicate::emit },
    Pass { name: "pickle", emit: text::emit_pickle },
    Pass { name: "tree", emit: text::emit_tree },
    Pass { name: "json", emit: text::emit_json },
    Pass { name: "binary", emit: binary::emit },
    Pass { name: "lookup", emit: lookup::emit },
];

/// Where an element value lives while a field is being rendered.
#[derive(Clone)]
enum Place {
    /// A field place expression such as `x.left`.
    Field(TokenStream),
    /// A binding holding a reference, such as `item` in `for item in &x.args`.
    Ref(Ident),
}

impl Place {
    fn field(base: &TokenStream, field: &FieldInfo) -> Place {
        let ident = &field.ident;
        Place::Field(quote!(#base.#ident))
    }

    /// The element as a value; only for `Copy` kinds.
    fn value(&self) -> TokenStream {
        match self {
            Place::Field(place) => quote!(#place),
            Place::Ref(binding) => quote!(*#binding),
        }
    }

    /// The element as a reference.
    fn reference(&self) -> TokenStream {
        match self {
            Place::Field(place) => quote!(&#place),
            Place::Ref(binding) => quote!(#binding),
        }
    }

    /// The element as a method-call receiver; auto-ref covers both forms.
    fn receiver(&self) -> TokenStream {
        match self {
            Place::Field(place) => quote!(#place),
            Place::Ref(binding) => quote!(#binding),
        }
    }
}

fn item() -> Ident {
    format_ident!("item")
}

/// Rust type of one element of `kind`. `prefix` is `super::` inside
/// variant modules and empty at the top level.
fn element_ty(c: &Classified, kind: FieldKind, prefix: &TokenStream) -> TokenStream {
    match kind {
        FieldKind::Int => quote!(i64),
        FieldKind::Float => quote!(f64),
        FieldKind::Bool => quote!(bool),
        FieldKind::Str | FieldKind::Ident => quote!(::std::string::String),
        FieldKind::Enum(e) => {
            let ty = &c.enums[e].ty;
            quote!(#prefix #ty)
        }
        FieldKind::Union(u) => {
            let id = &c.unions[u].id;
            quote!(#prefix #id)
        }
        FieldKind::SymbolRef => match c.symbol {
            Some(s) => {
                let id = &c.unions[s].id;
                quote!(#prefix #id)
            }
            None => quote!(()),
        },
        FieldKind::Record(r) => {
            let ty = &c.records[r].ty;
            quote!(#prefix #ty)
        }
        FieldKind::Node => quote!(#prefix NodeRef),
        FieldKind::ScopeOwned | FieldKind::ScopeRef => quote!(::asdl_rt::ScopeId),
    }
}

/// Rust type of a field, cardinality included.
fn field_ty(c: &Classified, field: &FieldInfo, prefix: &TokenStream) -> TokenStream {
    let elem = element_ty(c, field.kind, prefix);
    match field.card {
        Cardinality::Scalar => elem,
        Cardinality::Optional => quote!(::std::option::Option<#elem>),
        Cardinality::Sequence => quote!(::std::vec::Vec<#elem>),
    }
}

/// Render a field: `elem` renders one element at a [`Place`]; optional
/// fields get `absent` for `None`, sequences get `seq` wrapped around the
/// per-element loop.
fn per_card(
    field: &FieldInfo,
    base: &TokenStream,
    elem: impl Fn(&Place) -> TokenStream,
    absent: TokenStream,
    seq: impl Fn(TokenStream) -> TokenStream,
) -> TokenStream {
    let place = Place::field(base, field);
    let item = item();
    match field.card {
        Cardinality::Scalar => elem(&place),
        Cardinality::Optional => {
            let reference = place.reference();
            let some = elem(&Place::Ref(item.clone()));
            quote! {
                match #reference {
                    ::std::option::Option::Some(#item) => { #some }
                    ::std::option::Option::None => { #absent }
                }
            }
        }
        Cardinality::Sequence => {
            let reference = place.reference();
            let each = elem(&Place::Ref(item.clone()));
            seq(quote! {
                for #item in #reference {
                    #each
                }
            })
        }
    }
}

/// `name` as a string literal.
fn lit(name: &str) -> Literal {
    Literal::string(name)
}

/// `ExprKind::Add`
fn kind_path(u: &UnionInfo, v: &VariantInfo) -> TokenStream {
    let kind = &u.kind;
    let variant = &v.ident;
    quote!(#kind::#variant)
}

/// `expr::Add`, relative to the top level.
fn variant_path(u: &UnionInfo, v: &VariantInfo) -> TokenStream {
    let module = &u.module;
    let variant = &v.ident;
    quote!(#module::#variant)
}

/// `visit_add`-style method name.
fn method(prefix: &str, stem: &str) -> Ident {
    joined(&[prefix, stem])
}

/// Whether every variant of `u` is listed, so a catch-all arm would be
/// unreachable.
fn covers_all(u: &UnionInfo, listed: usize) -> bool {
    listed == u.variants.len()
}
