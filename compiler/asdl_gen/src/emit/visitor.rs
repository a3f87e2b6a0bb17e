//! Read-only traversals: the dispatch `Visitor` whose per-variant defaults
//! fail loudly, and the `WalkVisitor` whose defaults recurse into every
//! owned child.
//!
//! Both follow the same shape: trait methods with default bodies that call
//! free functions in a module (`dispatch`, `walk`), so an override can still
//! reach the default behavior.

use asdl_schema::Cardinality;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::{kind_path, lit, method, variant_path, Place};
use crate::classify::{Classified, FieldInfo, FieldKind};
use crate::names::ident;

pub fn emit_visitor(c: &Classified) -> TokenStream {
    let container = &c.container;
    let union_methods = c.unions.iter().map(|u| {
        let visit = method("visit_", &u.stem);
        let dispatch = ident(&u.stem);
        let id = &u.id;
        quote! {
            fn #visit(&mut self, ir: &#container, id: #id) {
                dispatch::#dispatch(self, ir, id);
            }
        }
    });
    let variant_methods = c.unions.iter().flat_map(|u| {
        u.variants.iter().map(move |v| {
            let visit = method("visit_", &v.stem);
            let id = &u.id;
            let path = variant_path(u, v);
            let name = lit(&v.name);
            quote! {
                fn #visit(&mut self, _ir: &#container, _id: #id, _x: &#path) {
                    ::asdl_rt::ice::unimplemented_visitor(#name);
                }
            }
        })
    });
    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let visit = method("visit_", &u.stem);
        quote!(NodeRef::#ty(id) => v.#visit(ir, id))
    });
    let dispatch_fns = c.unions.iter().map(|u| {
        let name = ident(&u.stem);
        let (id, accessor) = (&u.id, &u.accessor);
        let arms = u.variants.iter().map(|var| {
            let kind_path = kind_path(u, var);
            let visit = method("visit_", &var.stem);
            quote!(#kind_path(x) => v.#visit(ir, id, x))
        });
        quote! {
            pub fn #name<V: Visitor + ?Sized>(v: &mut V, ir: &#container, id: #id) {
                ::asdl_rt::ensure_sufficient_stack(|| match &ir.#accessor(id).kind {
                    #(#arms,)*
                });
            }
        }
    });
    quote! {
        /// Single dispatch over every union. Each variant handler must be
        /// overridden before it is reached; the defaults are internal errors.
        pub trait Visitor {
            fn visit_node(&mut self, ir: &#container, node: NodeRef) {
                dispatch::node(self, ir, node);
            }

            #(#union_methods)*
            #(#variant_methods)*
        }

        /// Tag dispatch behind [`Visitor`].
        pub mod dispatch {
            use super::*;

            pub fn node<V: Visitor + ?Sized>(v: &mut V, ir: &#container, node: NodeRef) {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#dispatch_fns)*
        }
    }
}

/// One owned child, visited through the [`WalkVisitor`] trait. `None` for
/// kinds a walk skips (leaves and references).
fn walk_element(c: &Classified, kind: FieldKind, place: &Place) -> Option<TokenStream> {
    match kind {
        FieldKind::Union(u) => {
            let visit = method("visit_", &c.unions[u].stem);
            let value = place.value();
            Some(quote!(v.#visit(ir, #value);))
        }
        FieldKind::Record(r) => {
            let visit = method("visit_", &c.records[r].stem);
            let reference = place.reference();
            Some(quote!(v.#visit(ir, #reference);))
        }
        FieldKind::Node => {
            let value = place.value();
            Some(quote!(v.visit_node(ir, #value);))
        }
        FieldKind::ScopeOwned => {
            let value = place.value();
            Some(quote!(v.visit_scope(ir, #value);))
        }
        _ => None,
    }
}

fn walk_field(c: &Classified, field: &FieldInfo) -> Option<TokenStream> {
    let base = quote!(x);
    let place = Place::field(&base, field);
    let item = format_ident!("item");
    let each = walk_element(c, field.kind, &Place::Ref(item.clone()))?;
    Some(match field.card {
        Cardinality::Scalar => walk_element(c, field.kind, &place)?,
        Cardinality::Optional => {
            let reference = place.reference();
            quote! {
                if let ::std::option::Option::Some(#item) = #reference {
                    #each
                }
            }
        }
        Cardinality::Sequence => {
            let reference = place.reference();
            quote! {
                for #item in #reference {
                    #each
                }
            }
        }
    })
}

fn walk_body(c: &Classified, fields: &[FieldInfo]) -> Vec<TokenStream> {
    fields.iter().filter_map(|f| walk_field(c, f)).collect()
}

pub fn emit_walk(c: &Classified) -> TokenStream {
    let container = &c.container;
    let mut methods = Vec::new();
    let mut fns = Vec::new();

    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let visit = method("visit_", &u.stem);
        quote!(NodeRef::#ty(id) => v.#visit(ir, id))
    });

    for u in &c.unions {
        let visit = method("visit_", &u.stem);
        let name = ident(&u.stem);
        let (id, accessor) = (&u.id, &u.accessor);
        methods.push(quote! {
            fn #visit(&mut self, ir: &#container, id: #id) {
                walk::#name(self, ir, id);
            }
        });
        let arms = u.variants.iter().map(|var| {
            let kind_path = kind_path(u, var);
            let visit = method("visit_", &var.stem);
            quote!(#kind_path(x) => v.#visit(ir, id, x))
        });
        fns.push(quote! {
            pub fn #name<V: WalkVisitor + ?Sized>(v: &mut V, ir: &#container, id: #id) {
                ::asdl_rt::ensure_sufficient_stack(|| match &ir.#accessor(id).kind {
                    #(#arms,)*
                });
            }
        });

        for var in &u.variants {
            let visit = method("visit_", &var.stem);
            let name = ident(&var.stem);
            let path = variant_path(u, var);
            methods.push(quote! {
                fn #visit(&mut self, ir: &#container, _id: #id, x: &#path) {
                    walk::#name(self, ir, x);
                }
            });
            let body = walk_body(c, &var.fields);
            fns.push(if body.is_empty() {
                quote! {
                    pub fn #name<V: WalkVisitor + ?Sized>(_v: &mut V, _ir: &#container, _x: &#path) {}
                }
            } else {
                quote! {
                    pub fn #name<V: WalkVisitor + ?Sized>(v: &mut V, ir: &#container, x: &#path) {
                        #(#body)*
                    }
                }
            });
        }
    }

    for r in &c.records {
        let visit = method("visit_", &r.stem);
        let name = ident(&r.stem);
        let ty = &r.ty;
        methods.push(quote! {
            fn #visit(&mut self, ir: &#container, x: &#ty) {
                walk::#name(self, ir, x);
            }
        });
        let body = walk_body(c, &r.fields);
        fns.push(if body.is_empty() {
            quote! {
                pub fn #name<V: WalkVisitor + ?Sized>(_v: &mut V, _ir: &#container, _x: &#ty) {}
            }
        } else {
            quote! {
                pub fn #name<V: WalkVisitor + ?Sized>(v: &mut V, ir: &#container, x: &#ty) {
                    #(#body)*
                }
            }
        });
    }

    if let Some(s) = c.symbol {
        let visit_symbol = method("visit_", &c.unions[s].stem);
        methods.push(quote! {
            fn visit_scope(&mut self, ir: &#container, scope: ::asdl_rt::ScopeId) {
                walk::scope(self, ir, scope);
            }
        });
        fns.push(quote! {
            /// Visit every entry of `scope`, in table order.
            pub fn scope<V: WalkVisitor + ?Sized>(v: &mut V, ir: &#container, scope: ::asdl_rt::ScopeId) {
                for (_, sym) in ir.scopes[scope].iter() {
                    v.#visit_symbol(ir, sym);
                }
            }
        });
    }

    quote! {
        /// Structural walk. Every default recurses into the owned children of
        /// a node; symbol references and `parent_symtab`-style table references
        /// are not children and are skipped. Owned symbol tables are expanded
        /// entry by entry.
        pub trait WalkVisitor {
            fn visit_node(&mut self, ir: &#container, node: NodeRef) {
                walk::node(self, ir, node);
            }

            #(#methods)*
        }

        /// Default bodies of [`WalkVisitor`].
        pub mod walk {
            use super::*;

            pub fn node<V: WalkVisitor + ?Sized>(v: &mut V, ir: &#container, node: NodeRef) {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#fns)*
        }
    }
}
