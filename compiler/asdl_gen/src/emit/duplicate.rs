//! Deep copy.
//!
//! `Duplicator` copies a subtree within one container. Owned children are
//! copied recursively; symbol references are shared with the original.
//! Gated variants refuse to be copied while their flag is off, and the
//! refusal propagates out of the whole copy.
//!
//! Symbols and variants that own a symbol table are never copied: a copy
//! would either share the table with the original or need every reference
//! into it remapped. Reaching one is an internal error.

use asdl_schema::Cardinality;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::{kind_path, lit, method, variant_path, Place};
use crate::classify::{Classified, FieldInfo, FieldKind, UnionInfo, VariantInfo};

/// Copy of one owned element at `place`, or `None` for kinds the copy
/// shares with the original.
fn copy_element(c: &Classified, kind: FieldKind, place: &Place) -> Option<TokenStream> {
    match kind {
        FieldKind::Union(u) => {
            let duplicate = method("duplicate_", &c.unions[u].stem);
            let value = place.value();
            Some(quote!(self.#duplicate(#value)))
        }
        FieldKind::Record(r) => {
            let duplicate = method("duplicate_", &c.records[r].stem);
            let reference = place.reference();
            Some(quote!(self.#duplicate(#reference)))
        }
        FieldKind::Node => {
            let value = place.value();
            Some(quote!(self.duplicate(#value)))
        }
        _ => None,
    }
}

/// Initializer of one field of the copy, reading the original from `x`.
fn copy_field(c: &Classified, field: &FieldInfo) -> TokenStream {
    let ident = &field.ident;
    let place = Place::field(&quote!(x), field);
    let item = format_ident!("item");
    let Some(each) = copy_element(c, field.kind, &Place::Ref(item.clone())) else {
        return if field.card != Cardinality::Sequence && field.kind.is_copy() {
            quote!(#ident: x.#ident)
        } else {
            quote!(#ident: x.#ident.clone())
        };
    };
    match field.card {
        Cardinality::Scalar => {
            let copy = copy_element(c, field.kind, &place);
            quote!(#ident: #copy?)
        }
        Cardinality::Optional => quote! {
            #ident: x.#ident.as_ref().map(|#item| #each).transpose()?
        },
        Cardinality::Sequence => quote! {
            #ident: x.#ident.iter().map(|#item| #each).collect::<::std::result::Result<_, _>>()?
        },
    }
}

fn duplicate_variant(c: &Classified, u: &UnionInfo, v: &VariantInfo) -> TokenStream {
    let duplicate = method("duplicate_", &v.stem);
    let path = variant_path(u, v);
    let gate = v.gate.as_ref().map(|gate| {
        let flag = &gate.flag;
        let (variant, flag_name) = (lit(&v.name), lit(&gate.flag_name));
        quote! {
            if !self.#flag {
                return ::std::result::Result::Err(::asdl_rt::DuplicationRefused {
                    variant: #variant,
                    flag: #flag_name,
                });
            }
        }
    });
    let fields: Vec<_> = v.fields.iter().map(|f| copy_field(c, f)).collect();
    let x = if fields.is_empty() { quote!(_x) } else { quote!(x) };
    quote! {
        pub fn #duplicate(&mut self, #x: &#path) -> ::std::result::Result<#path, ::asdl_rt::DuplicationRefused> {
            #gate
            ::std::result::Result::Ok(#path {
                #(#fields,)*
            })
        }
    }
}

pub fn emit(c: &Classified) -> TokenStream {
    let container = &c.container;
    let flags = &c.flags;
    let mut methods = Vec::new();

    let node_arms = c.unions.iter().enumerate().map(|(ui, u)| {
        let ty = &u.ty;
        if c.is_symbol(ui) {
            let name = lit(&u.name);
            return quote!(NodeRef::#ty(_) => ::asdl_rt::ice::unsupported_duplication(#name));
        }
        let duplicate = method("duplicate_", &u.stem);
        quote!(NodeRef::#ty(id) => self.#duplicate(id).map(NodeRef::#ty))
    });

    for (ui, u) in c.unions.iter().enumerate() {
        if c.is_symbol(ui) {
            continue;
        }
        let duplicate = method("duplicate_", &u.stem);
        let (ty, id, arena, accessor) = (&u.ty, &u.id, &u.arena, &u.accessor);
        let doc = format!("Copy the `{}` subtree rooted at `id`.", u.name);
        if u.variants.iter().all(VariantInfo::owns_scope) {
            let name = lit(&u.name);
            methods.push(quote! {
                #[doc = #doc]
                pub fn #duplicate(&mut self, _id: #id) -> ::std::result::Result<#id, ::asdl_rt::DuplicationRefused> {
                    ::asdl_rt::ice::unsupported_duplication(#name)
                }
            });
            continue;
        }
        let arms = u.variants.iter().map(|v| {
            let kind_path = kind_path(u, v);
            if v.owns_scope() {
                let name = lit(&v.name);
                return quote!(#kind_path(_) => ::asdl_rt::ice::unsupported_duplication(#name));
            }
            let variant = method("duplicate_", &v.stem);
            quote!(#kind_path(x) => #kind_path(self.#variant(x)?))
        });
        methods.push(quote! {
            #[doc = #doc]
            pub fn #duplicate(&mut self, id: #id) -> ::std::result::Result<#id, ::asdl_rt::DuplicationRefused> {
                ::asdl_rt::ensure_sufficient_stack(|| -> ::std::result::Result<#id, ::asdl_rt::DuplicationRefused> {
                    let node = self.ir.#accessor(id).clone();
                    let kind = match &node.kind {
                        #(#arms,)*
                    };
                    ::std::result::Result::Ok(self.ir.#arena.alloc(#ty { kind, ..node }))
                })
            }
        });
        methods.extend(
            u.variants
                .iter()
                .filter(|v| !v.owns_scope())
                .map(|v| duplicate_variant(c, u, v)),
        );
    }

    for r in &c.records {
        let duplicate = method("duplicate_", &r.stem);
        let ty = &r.ty;
        let fields = r.fields.iter().map(|f| copy_field(c, f));
        methods.push(quote! {
            pub fn #duplicate(&mut self, x: &#ty) -> ::std::result::Result<#ty, ::asdl_rt::DuplicationRefused> {
                ::std::result::Result::Ok(#ty {
                    span: x.span,
                    #(#fields,)*
                })
            }
        });
    }

    let flag_docs = flags.iter().map(|f| format!("Allow copying variants gated by `{f}`."));
    quote! {
        /// Deep copy of subtrees within one container.
        ///
        /// Every flag starts enabled; a pass that must not copy side effects
        /// switches the relevant flag off and handles the refusal.
        pub struct Duplicator<'a> {
            pub ir: &'a mut #container,
            #(
                #[doc = #flag_docs]
                pub #flags: bool,
            )*
        }

        impl<'a> Duplicator<'a> {
            pub fn new(ir: &'a mut #container) -> Self {
                Duplicator {
                    ir,
                    #(#flags: true,)*
                }
            }

            /// Copy any node. Symbols are owned by their tables and nodes
            /// that own a table are never copied; asking for either is an
            /// internal error.
            pub fn duplicate(&mut self, node: NodeRef) -> ::std::result::Result<NodeRef, ::asdl_rt::DuplicationRefused> {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#methods)*
        }
    }
}
