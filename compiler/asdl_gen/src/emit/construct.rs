//! Factories: one `make_<variant>` per variant, plus owner stamping for
//! nodes that own symbol tables.

use asdl_schema::Cardinality;
use proc_macro2::TokenStream;
use quote::quote;

use super::{field_ty, kind_path, method, variant_path};
use crate::classify::{Classified, FieldKind, UnionInfo, VariantInfo};

pub fn emit(c: &Classified) -> TokenStream {
    let container = &c.container;
    let factories = c
        .unions
        .iter()
        .flat_map(|u| u.variants.iter().map(move |v| factory(c, u, v)));
    let stamp = c.has_scopes().then(|| stamp_scope_owners(c));
    quote! {
        impl #container {
            #(#factories)*
            #stamp
        }
    }
}

fn factory(c: &Classified, u: &UnionInfo, v: &VariantInfo) -> TokenStream {
    let top = TokenStream::new();
    let (ty, id, arena) = (&u.ty, &u.id, &u.arena);
    let name = method("make_", &v.stem);
    let attr_params = u.attributes.iter().map(|f| {
        let ident = &f.ident;
        let ty = field_ty(c, f, &top);
        quote!(#ident: #ty)
    });
    let params = v.fields.iter().map(|f| {
        let ident = &f.ident;
        let ty = field_ty(c, f, &top);
        quote!(#ident: #ty)
    });
    let attrs: Vec<_> = u.attributes.iter().map(|f| &f.ident).collect();
    let fields: Vec<_> = v.fields.iter().map(|f| &f.ident).collect();
    let kind_path = kind_path(u, v);
    let path = variant_path(u, v);
    let alloc = quote! {
        self.#arena.alloc(#ty {
            span,
            #(#attrs,)*
            kind: #kind_path(#path { #(#fields),* }),
        })
    };
    let body = if v.owns_scope() {
        quote! {
            let id = #alloc;
            self.stamp_scope_owners(NodeRef::#ty(id));
            id
        }
    } else {
        alloc
    };
    let doc = format!("Allocate a `{}` node.", v.name);
    quote! {
        #[doc = #doc]
        pub fn #name(&mut self, span: ::asdl_rt::Span, #(#attr_params,)* #(#params),*) -> #id {
            #body
        }
    }
}

/// Record `node` as the owner of every table its owning `symbol_table`
/// fields hold.
fn stamp_scope_owners(c: &Classified) -> TokenStream {
    let arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let accessor = &u.accessor;
        let owning: Vec<_> = u.variants.iter().filter(|v| v.owns_scope()).collect();
        if owning.is_empty() {
            return quote!(NodeRef::#ty(_) => ::std::vec::Vec::new());
        }
        let variant_arms = owning.iter().map(|v| {
            let kind_path = kind_path(u, v);
            let scopes = v
                .fields
                .iter()
                .filter(|f| f.kind == FieldKind::ScopeOwned)
                .map(|f| {
                    let ident = &f.ident;
                    match f.card {
                        Cardinality::Optional => quote!(scopes.extend(x.#ident);),
                        _ => quote!(scopes.push(x.#ident);),
                    }
                });
            quote! {
                #kind_path(x) => {
                    let mut scopes = ::std::vec::Vec::new();
                    #(#scopes)*
                    scopes
                }
            }
        });
        let rest = (owning.len() < u.variants.len()).then(|| quote!(_ => ::std::vec::Vec::new(),));
        quote! {
            NodeRef::#ty(id) => match &self.#accessor(id).kind {
                #(#variant_arms)*
                #rest
            }
        }
    });
    quote! {
        /// Point every symbol table owned by `node` back at it.
        pub fn stamp_scope_owners(&mut self, node: NodeRef) {
            let owned: ::std::vec::Vec<::asdl_rt::ScopeId> = match node {
                #(#arms,)*
            };
            for scope in owned {
                self.scopes.set_owner(scope, node);
            }
        }
    }
}
