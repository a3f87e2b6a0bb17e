//! In-place rewriting.
//!
//! A replacer for union `T` is handed the owning slot of every `T` node it
//! meets (`&mut TId`). Installing a new subtree is `*slot = new_id`; the old
//! node stays in its arena untouched. Each per-variant default clones the
//! variant payload, lets the replacer rewrite the slots inside the clone,
//! and writes the clone back over the parent's payload.
//!
//! A replacer only passes through the unions that can lead back to `T`, so
//! unrelated parts of the schema (types, symbols) get no methods at all.

use asdl_schema::Cardinality;
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

use super::{method, variant_path, Place};
use crate::classify::{Classified, FieldInfo, FieldKind, UnionInfo, VariantInfo};
use crate::names::{camel_case, ident, joined};

/// Names shared by one replacer: `ExprReplacer`, `expr_replace`, `transform_exprs`.
struct Replacer<'c> {
    c: &'c Classified,
    target: usize,
    unions: Vec<usize>,
    trait_name: Ident,
    module: Ident,
    transform: Ident,
}

impl Replacer<'_> {
    fn new(c: &Classified, target: usize) -> Replacer<'_> {
        let u = &c.unions[target];
        Replacer {
            c,
            target,
            unions: c.rewrite_set(target),
            trait_name: joined(&[&camel_case(&u.name), "Replacer"]),
            module: joined(&[&u.stem, "_replace"]),
            transform: joined(&["transform_", &u.stem, "s"]),
        }
    }

    fn rewrites_union(&self, u: usize) -> bool {
        self.unions.contains(&u)
    }

    fn rewrites_record(&self, r: usize) -> bool {
        self.c.record_reaches(r, self.target)
    }

    /// Rewrite of one element at `place`, or `None` if nothing below it can
    /// hold a `T`.
    fn element(&self, kind: FieldKind, place: &Place) -> Option<TokenStream> {
        let module = &self.module;
        match kind {
            FieldKind::Union(u) if self.rewrites_union(u) => {
                let replace = method("replace_", &self.c.unions[u].stem);
                let slot = place_mut(place);
                Some(quote!(r.#replace(ir, #slot);))
            }
            FieldKind::Record(rec) if self.rewrites_record(rec) => {
                let name = ident(&self.c.records[rec].stem);
                let slot = place_mut(place);
                Some(quote!(#module::#name(r, ir, #slot);))
            }
            _ => None,
        }
    }

    fn field(&self, field: &FieldInfo, base: &TokenStream) -> Option<TokenStream> {
        let place = Place::field(base, field);
        let slot = format_ident!("slot");
        let each = self.element(field.kind, &Place::Ref(slot.clone()))?;
        let reference = place_mut(&place);
        Some(match field.card {
            Cardinality::Scalar => self.element(field.kind, &place)?,
            Cardinality::Optional => quote! {
                if let ::std::option::Option::Some(#slot) = #reference {
                    #each
                }
            },
            Cardinality::Sequence if field.kind == FieldKind::Union(self.target) => {
                let transform = &self.transform;
                quote!(r.#transform(ir, #reference);)
            }
            Cardinality::Sequence => quote! {
                for #slot in #reference {
                    #each
                }
            },
        })
    }

    fn body(&self, fields: &[FieldInfo], base: &TokenStream) -> Vec<TokenStream> {
        fields.iter().filter_map(|f| self.field(f, base)).collect()
    }

    fn emit(&self) -> TokenStream {
        let c = self.c;
        let container = &c.container;
        let (trait_name, module, transform) = (&self.trait_name, &self.module, &self.transform);
        let target = &c.unions[self.target];
        let target_id = &target.id;
        let target_replace = method("replace_", &target.stem);
        let mut methods = Vec::new();
        let mut fns = Vec::new();

        for &ui in &self.unions {
            let u = &c.unions[ui];
            let replace = method("replace_", &u.stem);
            let name = ident(&u.stem);
            let id = &u.id;
            let tag = &u.tag;
            let accessor = &u.accessor;
            let doc = format!("Rewrite the `{}` node in `slot`, dispatching on its variant.", u.name);
            methods.push(quote! {
                #[doc = #doc]
                fn #replace(&mut self, ir: &mut #container, slot: &mut #id) {
                    #module::#name(self, ir, slot);
                }
            });
            let arms = u.variants.iter().map(|v| {
                let ident = &v.ident;
                let replace = method("replace_", &v.stem);
                quote!(#tag::#ident => r.#replace(ir, slot))
            });
            fns.push(quote! {
                pub fn #name<R: #trait_name + ?Sized>(r: &mut R, ir: &mut #container, slot: &mut #id) {
                    ::asdl_rt::ensure_sufficient_stack(|| match ir.#accessor(*slot).tag() {
                        #(#arms,)*
                    });
                }
            });
            for v in &u.variants {
                let (method, func) = self.variant(u, v);
                methods.push(method);
                fns.push(func);
            }
        }

        for (ri, r) in c.records.iter().enumerate() {
            if !self.rewrites_record(ri) {
                continue;
            }
            let name = ident(&r.stem);
            let ty = &r.ty;
            let body = self.body(&r.fields, &quote!(x));
            fns.push(quote! {
                pub fn #name<R: #trait_name + ?Sized>(r: &mut R, ir: &mut #container, x: &mut #ty) {
                    #(#body)*
                }
            });
        }

        let trait_doc = format!(
            "In-place rewriting of `{}` nodes through their owning slots.",
            target.name
        );
        let module_doc = format!("Default bodies of [`{trait_name}`].");
        quote! {
            #[doc = #trait_doc]
            pub trait #trait_name {
                /// Hand a whole sequence of slots to the replacer. The
                /// default rewrites each slot in order; an override may also
                /// insert or drop elements.
                fn #transform(&mut self, ir: &mut #container, slots: &mut ::std::vec::Vec<#target_id>) {
                    #module::#transform(self, ir, slots);
                }

                #(#methods)*
            }

            #[doc = #module_doc]
            pub mod #module {
                use super::*;

                pub fn #transform<R: #trait_name + ?Sized>(
                    r: &mut R,
                    ir: &mut #container,
                    slots: &mut ::std::vec::Vec<#target_id>,
                ) {
                    for slot in slots.iter_mut() {
                        r.#target_replace(ir, slot);
                    }
                }

                #(#fns)*
            }
        }
    }

    fn variant(&self, u: &UnionInfo, v: &VariantInfo) -> (TokenStream, TokenStream) {
        let c = self.c;
        let container = &c.container;
        let (trait_name, module) = (&self.trait_name, &self.module);
        let replace = method("replace_", &v.stem);
        let name = ident(&v.stem);
        let id = &u.id;
        let (accessor, accessor_mut) = (&u.accessor, &u.accessor_mut);
        let path = variant_path(u, v);
        let method = quote! {
            fn #replace(&mut self, ir: &mut #container, slot: &mut #id) {
                #module::#name(self, ir, slot);
            }
        };
        let body = self.body(&v.fields, &quote!(x));
        let func = if body.is_empty() {
            quote! {
                pub fn #name<R: #trait_name + ?Sized>(_r: &mut R, _ir: &mut #container, _slot: &mut #id) {}
            }
        } else {
            quote! {
                pub fn #name<R: #trait_name + ?Sized>(r: &mut R, ir: &mut #container, slot: &mut #id) {
                    let mut x = ir.#accessor(*slot).downcast::<#path>().clone();
                    #(#body)*
                    *ir.#accessor_mut(*slot).downcast_mut::<#path>() = x;
                }
            }
        };
        (method, func)
    }
}

/// The element as a mutable reference, for rewriting in place.
fn place_mut(place: &Place) -> TokenStream {
    match place {
        Place::Field(place) => quote!(&mut #place),
        Place::Ref(binding) => quote!(#binding),
    }
}

pub fn emit_replacers(c: &Classified) -> TokenStream {
    let targets = [c.expr, c.stmt]
        .into_iter()
        .flatten()
        .filter(|&t| !c.is_symbol(t))
        .map(|t| Replacer::new(c, t).emit());
    quote!(#(#targets)*)
}

/// What the call-replacer walk does with one element.
fn call_element(c: &Classified, kind: FieldKind, place: &Place) -> Option<TokenStream> {
    match kind {
        FieldKind::Union(u) if Some(u) == c.expr => {
            let slot = place_mut(place);
            let visit = method("visit_", &c.unions[u].stem);
            let current = match place {
                Place::Field(place) => quote!(#place),
                Place::Ref(binding) => quote!(*#binding),
            };
            Some(quote! {
                c.call_replacer(ir, #slot);
                c.#visit(ir, #current);
            })
        }
        FieldKind::Union(u) => {
            let visit = method("visit_", &c.unions[u].stem);
            let value = place.value();
            Some(quote!(c.#visit(ir, #value);))
        }
        FieldKind::Record(r) => {
            let visit = method("visit_", &c.records[r].stem);
            let slot = place_mut(place);
            Some(quote!(c.#visit(ir, #slot);))
        }
        FieldKind::Node => {
            let value = place.value();
            Some(quote!(c.visit_node(ir, #value);))
        }
        FieldKind::ScopeOwned => {
            let value = place.value();
            Some(quote!(c.visit_scope(ir, #value);))
        }
        _ => None,
    }
}

/// `mutable` is false when the payload is only read, so optional and
/// sequence fields are borrowed shared.
fn call_field(c: &Classified, field: &FieldInfo, base: &TokenStream, mutable: bool) -> Option<TokenStream> {
    let place = Place::field(base, field);
    let slot = format_ident!("slot");
    let each = call_element(c, field.kind, &Place::Ref(slot.clone()))?;
    let reference = if mutable { place_mut(&place) } else { place.reference() };
    Some(match field.card {
        Cardinality::Scalar => call_element(c, field.kind, &place)?,
        Cardinality::Optional => quote! {
            if let ::std::option::Option::Some(#slot) = #reference {
                #each
            }
        },
        Cardinality::Sequence if is_stmt(c, field.kind) => quote!(c.transform_stmts(ir, #reference);),
        Cardinality::Sequence => quote! {
            for #slot in #reference {
                #each
            }
        },
    })
}

fn is_stmt(c: &Classified, kind: FieldKind) -> bool {
    matches!(kind, FieldKind::Union(u) if Some(u) == c.stmt)
}

/// Whether the walk may change a field of the payload: an expression slot,
/// a statement sequence, or a record holding either.
fn rewrites_payload(c: &Classified, fields: &[FieldInfo]) -> bool {
    fields.iter().any(|f| match f.kind {
        FieldKind::Union(u) => Some(u) == c.expr || (f.card == Cardinality::Sequence && is_stmt(c, f.kind)),
        FieldKind::Record(_) => true,
        _ => false,
    })
}

/// The `CallReplacerOnExpressions` walk: every expression slot is offered to
/// `call_replacer` before the walk descends into it, and the current scope
/// follows the nodes that own symbol tables.
pub fn emit_call_replacer(c: &Classified) -> TokenStream {
    let Some(expr) = c.expr else {
        return TokenStream::new();
    };
    let container = &c.container;
    let expr_id = &c.unions[expr].id;
    let mut methods = Vec::new();
    let mut fns = Vec::new();

    if c.has_scopes() {
        methods.push(quote! {
            /// Called with the table a node owns on entry (and the saved
            /// value on exit). Returns the previous current scope.
            ///
            /// The walk keeps no scope of its own: the default stores nothing
            /// and returns `None`. Override it to follow the current scope.
            fn set_current_scope(
                &mut self,
                _scope: ::std::option::Option<::asdl_rt::ScopeId>,
            ) -> ::std::option::Option<::asdl_rt::ScopeId> {
                ::std::option::Option::None
            }
        });
    }
    if let Some(stmt) = c.stmt {
        let stmt_id = &c.unions[stmt].id;
        let visit_stmt = method("visit_", &c.unions[stmt].stem);
        methods.push(quote! {
            /// Every statement sequence passes through here.
            fn transform_stmts(&mut self, ir: &mut #container, stmts: &mut ::std::vec::Vec<#stmt_id>) {
                call_replace::transform_stmts(self, ir, stmts);
            }
        });
        fns.push(quote! {
            pub fn transform_stmts<C: CallReplacerOnExpressions + ?Sized>(
                c: &mut C,
                ir: &mut #container,
                stmts: &mut ::std::vec::Vec<#stmt_id>,
            ) {
                for &id in stmts.iter() {
                    c.#visit_stmt(ir, id);
                }
            }
        });
    }

    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let visit = method("visit_", &u.stem);
        quote!(NodeRef::#ty(id) => c.#visit(ir, id))
    });

    for u in &c.unions {
        let visit = method("visit_", &u.stem);
        let name = ident(&u.stem);
        let (id, tag, accessor) = (&u.id, &u.tag, &u.accessor);
        methods.push(quote! {
            fn #visit(&mut self, ir: &mut #container, id: #id) {
                call_replace::#name(self, ir, id);
            }
        });
        let arms = u.variants.iter().map(|v| {
            let ident = &v.ident;
            let visit = method("visit_", &v.stem);
            quote!(#tag::#ident => c.#visit(ir, id))
        });
        fns.push(quote! {
            pub fn #name<C: CallReplacerOnExpressions + ?Sized>(c: &mut C, ir: &mut #container, id: #id) {
                ::asdl_rt::ensure_sufficient_stack(|| match ir.#accessor(id).tag() {
                    #(#arms,)*
                });
            }
        });
        for v in &u.variants {
            let (method, func) = call_variant(c, u, v);
            methods.push(method);
            fns.push(func);
        }
    }

    for r in &c.records {
        let visit = method("visit_", &r.stem);
        let name = ident(&r.stem);
        let ty = &r.ty;
        methods.push(quote! {
            fn #visit(&mut self, ir: &mut #container, x: &mut #ty) {
                call_replace::#name(self, ir, x);
            }
        });
        let body: Vec<_> = r
            .fields
            .iter()
            .filter_map(|f| call_field(c, f, &quote!(x), true))
            .collect();
        fns.push(if body.is_empty() {
            quote! {
                pub fn #name<C: CallReplacerOnExpressions + ?Sized>(_c: &mut C, _ir: &mut #container, _x: &mut #ty) {}
            }
        } else {
            quote! {
                pub fn #name<C: CallReplacerOnExpressions + ?Sized>(c: &mut C, ir: &mut #container, x: &mut #ty) {
                    #(#body)*
                }
            }
        });
    }

    if let Some(s) = c.symbol {
        let symbol_id = &c.unions[s].id;
        let visit_symbol = method("visit_", &c.unions[s].stem);
        methods.push(quote! {
            fn visit_scope(&mut self, ir: &mut #container, scope: ::asdl_rt::ScopeId) {
                call_replace::scope(self, ir, scope);
            }
        });
        fns.push(quote! {
            pub fn scope<C: CallReplacerOnExpressions + ?Sized>(c: &mut C, ir: &mut #container, scope: ::asdl_rt::ScopeId) {
                let symbols: ::std::vec::Vec<#symbol_id> = ir.scopes[scope].iter().map(|(_, sym)| sym).collect();
                for sym in symbols {
                    c.#visit_symbol(ir, sym);
                }
            }
        });
    }

    let scope_doc = if c.has_scopes() {
        quote! {
            ///
            /// Scope tracking is up to the implementor: the walk reports each
            /// owned table through `set_current_scope`, whose default ignores
            /// it.
        }
    } else {
        TokenStream::new()
    };
    quote! {
        /// Whole-tree walk offering every expression slot to
        /// [`CallReplacerOnExpressions::call_replacer`].
        #scope_doc
        pub trait CallReplacerOnExpressions {
            /// Rewrite hook, called with each expression slot before the
            /// walk descends into it. The default leaves the slot alone.
            fn call_replacer(&mut self, _ir: &mut #container, _slot: &mut #expr_id) {}

            fn visit_node(&mut self, ir: &mut #container, node: NodeRef) {
                call_replace::node(self, ir, node);
            }

            #(#methods)*
        }

        /// Default bodies of [`CallReplacerOnExpressions`].
        pub mod call_replace {
            use super::*;

            pub fn node<C: CallReplacerOnExpressions + ?Sized>(c: &mut C, ir: &mut #container, node: NodeRef) {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#fns)*
        }
    }
}

fn call_variant(c: &Classified, u: &UnionInfo, v: &VariantInfo) -> (TokenStream, TokenStream) {
    let container = &c.container;
    let visit = method("visit_", &v.stem);
    let name = ident(&v.stem);
    let id = &u.id;
    let (accessor, accessor_mut) = (&u.accessor, &u.accessor_mut);
    let path = variant_path(u, v);
    let method = quote! {
        fn #visit(&mut self, ir: &mut #container, id: #id) {
            call_replace::#name(self, ir, id);
        }
    };
    let mutable = rewrites_payload(c, &v.fields);
    let body: Vec<_> = v
        .fields
        .iter()
        .filter_map(|f| call_field(c, f, &quote!(x), mutable))
        .collect();
    if body.is_empty() {
        let func = quote! {
            pub fn #name<C: CallReplacerOnExpressions + ?Sized>(_c: &mut C, _ir: &mut #container, _id: #id) {}
        };
        return (method, func);
    }
    let owned_scope = v
        .fields
        .iter()
        .find(|f| f.kind == FieldKind::ScopeOwned)
        .map(|f| {
            let ident = &f.ident;
            match f.card {
                Cardinality::Optional => quote!(x.#ident),
                _ => quote!(::std::option::Option::Some(x.#ident)),
            }
        });
    let (enter, leave) = match owned_scope {
        Some(scope) => (
            quote!(let saved = c.set_current_scope(#scope);),
            quote!(c.set_current_scope(saved);),
        ),
        None => (TokenStream::new(), TokenStream::new()),
    };
    let func = if mutable {
        quote! {
            pub fn #name<C: CallReplacerOnExpressions + ?Sized>(c: &mut C, ir: &mut #container, id: #id) {
                let mut x = ir.#accessor(id).downcast::<#path>().clone();
                #enter
                #(#body)*
                #leave
                *ir.#accessor_mut(id).downcast_mut::<#path>() = x;
            }
        }
    } else {
        quote! {
            pub fn #name<C: CallReplacerOnExpressions + ?Sized>(c: &mut C, ir: &mut #container, id: #id) {
                let x = ir.#accessor(id).downcast::<#path>().clone();
                #enter
                #(#body)*
                #leave
            }
        }
    };
    (method, func)
}
