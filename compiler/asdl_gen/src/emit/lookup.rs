//! Auxiliary lookup tables over the expression union: the static type of an
//! expression and its compile-time value.

use asdl_schema::Cardinality;
use proc_macro2::TokenStream;
use quote::quote;

use super::{covers_all, kind_path};
use crate::classify::{Classified, FieldInfo, FieldKind, UnionInfo, VariantInfo};

/// The field named `name` in `v` if it holds a node of some union, and
/// that union.
fn union_field<'v>(v: &'v VariantInfo, name: &str) -> Option<(&'v FieldInfo, usize)> {
    let field = v.fields.iter().find(|f| f.name == name)?;
    match (field.kind, field.card) {
        (FieldKind::Union(u), Cardinality::Scalar | Cardinality::Optional) => Some((field, u)),
        _ => None,
    }
}

/// `Some(x.field)` or `x.field` depending on cardinality.
fn optional_read(field: &FieldInfo) -> TokenStream {
    let ident = &field.ident;
    match field.card {
        Cardinality::Optional => quote!(x.#ident),
        _ => quote!(::std::option::Option::Some(x.#ident)),
    }
}

fn match_arms(u: &UnionInfo, arms: Vec<TokenStream>) -> TokenStream {
    let rest = (!covers_all(u, arms.len())).then(|| quote!(_ => ::std::option::Option::None,));
    quote! {
        #(#arms,)*
        #rest
    }
}

fn expr_type(c: &Classified, u: &UnionInfo) -> Option<TokenStream> {
    let name = &c.conventions.type_field;
    let ty_union = u.variants.iter().find_map(|v| union_field(v, name))?.1;
    let ty_id = &c.unions[ty_union].id;
    let (id, accessor) = (&u.id, &u.accessor);
    let arms: Vec<_> = u
        .variants
        .iter()
        .filter_map(|v| {
            let (field, _) = union_field(v, name)?;
            let kind_path = kind_path(u, v);
            let read = optional_read(field);
            Some(quote!(#kind_path(x) => #read))
        })
        .collect();
    let arms = match_arms(u, arms);
    let doc = format!("The `{name}` of an expression, for variants that carry one.");
    Some(quote! {
        #[doc = #doc]
        pub fn expr_type(&self, id: #id) -> ::std::option::Option<#ty_id> {
            match &self.#accessor(id).kind {
                #arms
            }
        }
    })
}

fn expr_value(c: &Classified, ui: usize, u: &UnionInfo) -> TokenStream {
    let conventions = &c.conventions;
    let (id, accessor) = (&u.id, &u.accessor);
    let arms: Vec<_> = u
        .variants
        .iter()
        .filter_map(|v| {
            let kind_path = kind_path(u, v);
            if v.name.ends_with(&conventions.constant_suffix) {
                return Some(quote!(#kind_path(_) => ::std::option::Option::Some(id)));
            }
            let (field, target) = union_field(v, &conventions.value_field)?;
            if target != ui {
                return None;
            }
            let read = optional_read(field);
            Some(quote!(#kind_path(x) => #read))
        })
        .collect();
    let arms = match_arms(u, arms);
    let doc = format!(
        "The compile-time value of an expression: `*{}` variants are their own \
         value, others report their `{}` field.",
        conventions.constant_suffix, conventions.value_field
    );
    quote! {
        #[doc = #doc]
        pub fn expr_value(&self, id: #id) -> ::std::option::Option<#id> {
            match &self.#accessor(id).kind {
                #arms
            }
        }
    }
}

pub fn emit(c: &Classified) -> TokenStream {
    let Some(ui) = c.expr else {
        return TokenStream::new();
    };
    let u = &c.unions[ui];
    let container = &c.container;
    let expr_type = expr_type(c, u);
    let expr_value = expr_value(c, ui, u);
    quote! {
        impl #container {
            #expr_type
            #expr_value
        }
    }
}
