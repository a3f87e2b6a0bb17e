//! Text renderings: the parenthesized pickle, the tree dump and JSON.
//!
//! All three print the fields of a node in schema order, then its
//! attributes. Owning symbol tables are expanded entry by entry; symbol
//! references and `parent_symtab`-style table references print as ids.

use asdl_schema::Cardinality;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

use super::{kind_path, lit, method, per_card, Place};
use crate::classify::{Classified, FieldInfo, FieldKind, UnionInfo};

/// Fields then attributes, each with the expression owning it.
fn rendered_fields<'a>(
    u: &'a UnionInfo,
    fields: &'a [FieldInfo],
) -> Vec<(&'a FieldInfo, TokenStream)> {
    fields
        .iter()
        .map(|f| (f, quote!(x)))
        .chain(u.attributes.iter().map(|f| (f, quote!(node))))
        .collect()
}

/// Per-union dispatch arms: `Kind::V(x) => { body }` where `body` is built
/// from `(variant name, inline, fields)`.
fn variant_arms(
    u: &UnionInfo,
    mut body: impl FnMut(&str, bool, Vec<(&FieldInfo, TokenStream)>) -> TokenStream,
) -> Vec<TokenStream> {
    u.variants
        .iter()
        .map(|v| {
            let kind_path = kind_path(u, v);
            let fields = rendered_fields(u, &v.fields);
            let binding = if v.fields.is_empty() { quote!(_) } else { quote!(x) };
            let body = body(&v.name, v.pickle_inline, fields);
            quote!(#kind_path(#binding) => { #body })
        })
        .collect()
}

// Pickle

fn pickle_element(c: &Classified, kind: FieldKind, place: &Place) -> TokenStream {
    match kind {
        FieldKind::Int => {
            let value = place.value();
            quote!(self.w.int(#value);)
        }
        FieldKind::Float => {
            let value = place.value();
            quote!(self.w.float(#value);)
        }
        FieldKind::Bool => {
            let value = place.value();
            quote!(self.w.bool(#value);)
        }
        FieldKind::Str => {
            let reference = place.reference();
            quote!(self.w.string(#reference);)
        }
        FieldKind::Ident => {
            let reference = place.reference();
            quote!(self.w.ident(#reference);)
        }
        FieldKind::Enum(_) => {
            let receiver = place.receiver();
            quote!(self.w.enum_value(#receiver.name());)
        }
        FieldKind::Union(u) => {
            let pickle = method("pickle_", &c.unions[u].stem);
            let value = place.value();
            quote!(self.#pickle(#value);)
        }
        FieldKind::SymbolRef => {
            let value = place.value();
            quote!(self.pickle_symbol_ref(#value);)
        }
        FieldKind::Record(r) => {
            let pickle = method("pickle_", &c.records[r].stem);
            let reference = place.reference();
            quote!(self.#pickle(#reference);)
        }
        FieldKind::Node => {
            let value = place.value();
            quote!(self.pickle_node(#value);)
        }
        FieldKind::ScopeOwned => {
            let value = place.value();
            quote!(self.pickle_scope(#value);)
        }
        FieldKind::ScopeRef => {
            let value = place.value();
            quote!(self.pickle_scope_ref(#value);)
        }
    }
}

fn pickle_field(c: &Classified, field: &FieldInfo, base: &TokenStream) -> TokenStream {
    per_card(
        field,
        base,
        |place| pickle_element(c, field.kind, place),
        quote!(self.w.absent();),
        |each| {
            quote! {
                self.w.open_seq();
                #each
                self.w.close_seq();
            }
        },
    )
}

pub fn emit_pickle(c: &Classified) -> TokenStream {
    let container = &c.container;
    let mut methods = Vec::new();

    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let pickle = method("pickle_", &u.stem);
        quote!(NodeRef::#ty(id) => self.#pickle(id))
    });

    for u in &c.unions {
        let pickle = method("pickle_", &u.stem);
        let (id, accessor) = (&u.id, &u.accessor);
        let arms = variant_arms(u, |name, inline, fields| {
            let name = lit(name);
            let fields = fields.iter().map(|(f, base)| pickle_field(c, f, base));
            let (begin, end) = if inline {
                (quote!(self.w.begin_inline();), quote!(self.w.end_inline();))
            } else {
                (TokenStream::new(), TokenStream::new())
            };
            quote! {
                #begin
                self.w.open_variant(#name);
                #(#fields)*
                self.w.close();
                #end
            }
        });
        methods.push(quote! {
            pub fn #pickle(&mut self, id: #id) {
                ::asdl_rt::ensure_sufficient_stack(|| {
                    let ir = self.ir;
                    let node = ir.#accessor(id);
                    match &node.kind {
                        #(#arms)*
                    }
                });
            }
        });
    }

    for r in &c.records {
        let pickle = method("pickle_", &r.stem);
        let ty = &r.ty;
        let fields = r.fields.iter().map(|f| pickle_field(c, f, &quote!(x)));
        methods.push(quote! {
            pub fn #pickle(&mut self, x: &#ty) {
                self.w.open_record();
                #(#fields)*
                self.w.close();
            }
        });
    }

    if let Some(s) = c.symbol {
        let symbol_id = &c.unions[s].id;
        let pickle_symbol = method("pickle_", &c.unions[s].stem);
        methods.push(quote! {
            /// An owned table: every entry, rendered in full.
            pub fn pickle_scope(&mut self, scope: ::asdl_rt::ScopeId) {
                let ir = self.ir;
                let table = &ir.scopes[scope];
                self.w.open_scope(table.counter());
                for (name, sym) in table.iter() {
                    self.w.scope_entry(name);
                    self.#pickle_symbol(sym);
                }
                self.w.close_scope();
            }

            pub fn pickle_scope_ref(&mut self, scope: ::asdl_rt::ScopeId) {
                self.w.scope_ref(self.ir.scopes[scope].counter());
            }

            pub fn pickle_symbol_ref(&mut self, id: #symbol_id) {
                let ir = self.ir;
                match ir.scopes.home(id) {
                    ::std::option::Option::Some((scope, name)) => {
                        self.w.symbol_ref(ir.scopes[scope].counter(), name);
                    }
                    ::std::option::Option::None => ::asdl_rt::ice::homeless_symbol(id.raw()),
                }
            }
        });
    }

    quote! {
        /// Render `node` in the parenthesized form, e.g.
        /// `(Add (IntConst 3) (IntConst 4))`.
        pub fn pickle(ir: &#container, node: impl ::std::convert::Into<NodeRef>, options: ::asdl_rt::PickleOptions) -> ::std::string::String {
            let mut pickler = Pickler::new(ir, options);
            pickler.pickle_node(node.into());
            pickler.finish()
        }

        /// Writer state of [`pickle`].
        pub struct Pickler<'a> {
            ir: &'a #container,
            w: ::asdl_rt::PickleWriter,
        }

        impl<'a> Pickler<'a> {
            pub fn new(ir: &'a #container, options: ::asdl_rt::PickleOptions) -> Self {
                Pickler {
                    ir,
                    w: ::asdl_rt::PickleWriter::new(options),
                }
            }

            pub fn finish(self) -> ::std::string::String {
                self.w.finish()
            }

            pub fn pickle_node(&mut self, node: NodeRef) {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#methods)*
        }
    }
}

// Tree

/// Writes the value of one element; the label has already been written.
fn tree_element(c: &Classified, kind: FieldKind, place: &Place) -> TokenStream {
    match kind {
        FieldKind::Int => {
            let receiver = place.receiver();
            quote!(self.w.value(&#receiver.to_string());)
        }
        FieldKind::Float => {
            let value = place.value();
            quote!(self.w.value(&::std::format!("{:?}", #value));)
        }
        FieldKind::Bool => {
            let value = place.value();
            quote!(self.w.value(if #value { ".true." } else { ".false." });)
        }
        FieldKind::Str => {
            let reference = place.reference();
            quote!(self.w.value(&::std::format!("{:?}", #reference));)
        }
        FieldKind::Ident => {
            let reference = place.reference();
            quote!(self.w.value(#reference);)
        }
        FieldKind::Enum(_) => {
            let receiver = place.receiver();
            quote!(self.w.enum_value(#receiver.name());)
        }
        FieldKind::Union(u) => {
            let tree = method("tree_", &c.unions[u].stem);
            let value = place.value();
            quote!(self.#tree(#value);)
        }
        FieldKind::SymbolRef => {
            let value = place.value();
            quote!(self.tree_symbol_ref(#value);)
        }
        FieldKind::Record(r) => {
            let tree = method("tree_", &c.records[r].stem);
            let reference = place.reference();
            quote!(self.#tree(#reference);)
        }
        FieldKind::Node => {
            let value = place.value();
            quote!(self.tree_node(#value);)
        }
        FieldKind::ScopeOwned => {
            let value = place.value();
            quote!(self.tree_scope(#value);)
        }
        FieldKind::ScopeRef => {
            let value = place.value();
            quote!(self.w.value(&self.ir.scopes[#value].counter().to_string());)
        }
    }
}

/// One labelled child line (and its subtree).
fn tree_field(c: &Classified, field: &FieldInfo, base: &TokenStream, last: bool) -> TokenStream {
    let label = lit(&format!("{}=", field.name));
    let place = Place::field(base, field);
    let item = format_ident!("item");
    let body = match field.card {
        Cardinality::Scalar => tree_element(c, field.kind, &place),
        Cardinality::Optional => {
            let reference = place.reference();
            let some = tree_element(c, field.kind, &Place::Ref(item.clone()));
            quote! {
                match #reference {
                    ::std::option::Option::Some(#item) => { #some }
                    ::std::option::Option::None => self.w.value("()"),
                }
            }
        }
        Cardinality::Sequence => {
            let reference = place.reference();
            let each = tree_element(c, field.kind, &Place::Ref(item.clone()));
            quote! {
                let items = #reference;
                if items.is_empty() {
                    self.w.value("[]");
                } else {
                    self.w.value("\u{21a7}");
                    for (i, #item) in items.iter().enumerate() {
                        let last = i + 1 == items.len();
                        self.w.label(last, "");
                        self.w.push(last);
                        #each
                        self.w.pop();
                    }
                }
            }
        }
    };
    quote! {
        self.w.label(#last, #label);
        self.w.push(#last);
        #body
        self.w.pop();
    }
}

fn tree_fields(c: &Classified, fields: &[(&FieldInfo, TokenStream)]) -> Vec<TokenStream> {
    let count = fields.len();
    fields
        .iter()
        .enumerate()
        .map(|(i, (f, base))| tree_field(c, f, base, i + 1 == count))
        .collect()
}

pub fn emit_tree(c: &Classified) -> TokenStream {
    let container = &c.container;
    let mut methods = Vec::new();

    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let tree = method("tree_", &u.stem);
        quote!(NodeRef::#ty(id) => self.#tree(id))
    });

    for u in &c.unions {
        let tree = method("tree_", &u.stem);
        let (id, accessor) = (&u.id, &u.accessor);
        let arms = variant_arms(u, |name, _, fields| {
            let name = lit(name);
            let fields = tree_fields(c, &fields);
            quote! {
                self.w.head(#name);
                #(#fields)*
            }
        });
        methods.push(quote! {
            pub fn #tree(&mut self, id: #id) {
                ::asdl_rt::ensure_sufficient_stack(|| {
                    let ir = self.ir;
                    let node = ir.#accessor(id);
                    match &node.kind {
                        #(#arms)*
                    }
                });
            }
        });
    }

    for r in &c.records {
        let tree = method("tree_", &r.stem);
        let ty = &r.ty;
        let name = lit(&r.name);
        let fields: Vec<_> = r.fields.iter().map(|f| (f, quote!(x))).collect();
        let fields = tree_fields(c, &fields);
        let x = if fields.is_empty() { quote!(_x) } else { quote!(x) };
        methods.push(quote! {
            pub fn #tree(&mut self, #x: &#ty) {
                self.w.head(#name);
                #(#fields)*
            }
        });
    }

    if let Some(s) = c.symbol {
        let symbol_id = &c.unions[s].id;
        let tree_symbol = method("tree_", &c.unions[s].stem);
        methods.push(quote! {
            pub fn tree_scope(&mut self, scope: ::asdl_rt::ScopeId) {
                let ir = self.ir;
                let table = &ir.scopes[scope];
                self.w.head(&::std::format!("SymbolTable {}", table.counter()));
                let count = table.len();
                for (i, (name, sym)) in table.iter().enumerate() {
                    let last = i + 1 == count;
                    self.w.label(last, &::std::format!("{name}: "));
                    self.w.push(last);
                    self.#tree_symbol(sym);
                    self.w.pop();
                }
            }

            pub fn tree_symbol_ref(&mut self, id: #symbol_id) {
                let ir = self.ir;
                match ir.scopes.home(id) {
                    ::std::option::Option::Some((scope, name)) => {
                        self.w.value(&::std::format!("{} {}", ir.scopes[scope].counter(), name));
                    }
                    ::std::option::Option::None => ::asdl_rt::ice::homeless_symbol(id.raw()),
                }
            }
        });
    }

    quote! {
        /// Render `node` as an indented tree with branch connectors.
        pub fn print_tree(ir: &#container, node: impl ::std::convert::Into<NodeRef>, use_colors: bool) -> ::std::string::String {
            let mut printer = TreePrinter {
                ir,
                w: ::asdl_rt::TreeWriter::new(use_colors),
            };
            printer.tree_node(node.into());
            printer.w.finish()
        }

        /// Writer state of [`print_tree`].
        pub struct TreePrinter<'a> {
            ir: &'a #container,
            w: ::asdl_rt::TreeWriter,
        }

        impl TreePrinter<'_> {
            pub fn tree_node(&mut self, node: NodeRef) {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#methods)*
        }
    }
}

// JSON

fn json_element(c: &Classified, kind: FieldKind, place: &Place) -> TokenStream {
    let value = place.value();
    let reference = place.reference();
    match kind {
        FieldKind::Int | FieldKind::Bool => quote!(::asdl_rt::json::Value::from(#value)),
        FieldKind::Float => quote!(::asdl_rt::json::float(#value)),
        FieldKind::Str | FieldKind::Ident => {
            quote!(::asdl_rt::json::Value::from(::std::string::String::as_str(#reference)))
        }
        FieldKind::Enum(_) => {
            let receiver = place.receiver();
            quote!(::asdl_rt::json::Value::from(#receiver.name()))
        }
        FieldKind::Union(u) => {
            let json = method("json_", &c.unions[u].stem);
            quote!(self.#json(#value))
        }
        FieldKind::SymbolRef => quote!(self.json_symbol_ref(#value)),
        FieldKind::Record(r) => {
            let json = method("json_", &c.records[r].stem);
            quote!(self.#json(#reference))
        }
        FieldKind::Node => quote!(self.json_node(#value)),
        FieldKind::ScopeOwned => quote!(self.json_scope(#value)),
        FieldKind::ScopeRef => {
            quote!(::asdl_rt::json::scope_ref(self.ir.scopes[#value].counter()))
        }
    }
}

fn json_field(c: &Classified, field: &FieldInfo, base: &TokenStream) -> TokenStream {
    let name = lit(&field.name);
    let place = Place::field(base, field);
    let item = format_ident!("item");
    let value = match field.card {
        Cardinality::Scalar => json_element(c, field.kind, &place),
        Cardinality::Optional => {
            let reference = place.reference();
            let some = json_element(c, field.kind, &Place::Ref(item.clone()));
            quote! {
                match #reference {
                    ::std::option::Option::Some(#item) => #some,
                    ::std::option::Option::None => ::asdl_rt::json::Value::Null,
                }
            }
        }
        Cardinality::Sequence => {
            let receiver = place.receiver();
            let each = json_element(c, field.kind, &Place::Ref(item.clone()));
            quote! {
                ::asdl_rt::json::Value::Array(#receiver.iter().map(|#item| #each).collect())
            }
        }
    };
    quote!(fields.insert(::std::string::String::from(#name), #value);)
}

fn json_object(c: &Classified, fields: &[(&FieldInfo, TokenStream)]) -> TokenStream {
    if fields.is_empty() {
        return quote!(let fields = ::asdl_rt::json::Map::new(););
    }
    let inserts = fields.iter().map(|(f, base)| json_field(c, f, base));
    quote! {
        let mut fields = ::asdl_rt::json::Map::new();
        #(#inserts)*
    }
}

pub fn emit_json(c: &Classified) -> TokenStream {
    let container = &c.container;
    let mut methods = Vec::new();

    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let json = method("json_", &u.stem);
        quote!(NodeRef::#ty(id) => self.#json(id))
    });

    for u in &c.unions {
        let json = method("json_", &u.stem);
        let (id, accessor) = (&u.id, &u.accessor);
        let arms = variant_arms(u, |name, _, fields| {
            let name = lit(name);
            let object = json_object(c, &fields);
            quote! {
                #object
                ::asdl_rt::json::node(#name, fields, ::asdl_rt::json::loc(node.span, self.resolver))
            }
        });
        methods.push(quote! {
            pub fn #json(&self, id: #id) -> ::asdl_rt::json::Value {
                ::asdl_rt::ensure_sufficient_stack(|| {
                    let node = self.ir.#accessor(id);
                    match &node.kind {
                        #(#arms)*
                    }
                })
            }
        });
    }

    for r in &c.records {
        let json = method("json_", &r.stem);
        let ty = &r.ty;
        let name = lit(&r.name);
        let fields: Vec<_> = r.fields.iter().map(|f| (f, quote!(x))).collect();
        let object = json_object(c, &fields);
        methods.push(quote! {
            pub fn #json(&self, x: &#ty) -> ::asdl_rt::json::Value {
                #object
                ::asdl_rt::json::node(#name, fields, ::asdl_rt::json::loc(x.span, self.resolver))
            }
        });
    }

    if let Some(s) = c.symbol {
        let symbol_id = &c.unions[s].id;
        let json_symbol = method("json_", &c.unions[s].stem);
        methods.push(quote! {
            pub fn json_scope(&self, scope: ::asdl_rt::ScopeId) -> ::asdl_rt::json::Value {
                let table = &self.ir.scopes[scope];
                let mut symbols = ::asdl_rt::json::Map::new();
                for (name, sym) in table.iter() {
                    symbols.insert(::std::string::String::from(name), self.#json_symbol(sym));
                }
                ::asdl_rt::json::scope(table.counter(), symbols)
            }

            pub fn json_symbol_ref(&self, id: #symbol_id) -> ::asdl_rt::json::Value {
                match self.ir.scopes.home(id) {
                    ::std::option::Option::Some((scope, name)) => {
                        ::asdl_rt::json::symbol_ref(self.ir.scopes[scope].counter(), name)
                    }
                    ::std::option::Option::None => ::asdl_rt::ice::homeless_symbol(id.raw()),
                }
            }
        });
    }

    quote! {
        /// Render `node` as JSON. With a resolver, every `loc` also carries
        /// file, line and column of both span ends.
        pub fn dump_json(
            ir: &#container,
            node: impl ::std::convert::Into<NodeRef>,
            resolver: ::std::option::Option<&dyn ::asdl_rt::LocationResolver>,
            pretty: bool,
        ) -> ::std::string::String {
            let dumper = JsonDumper { ir, resolver };
            ::asdl_rt::json::render(&dumper.json_node(node.into()), pretty)
        }

        /// Builder behind [`dump_json`].
        pub struct JsonDumper<'a> {
            ir: &'a #container,
            resolver: ::std::option::Option<&'a dyn ::asdl_rt::LocationResolver>,
        }

        impl<'a> JsonDumper<'a> {
            pub fn new(ir: &'a #container, resolver: ::std::option::Option<&'a dyn ::asdl_rt::LocationResolver>) -> Self {
                JsonDumper { ir, resolver }
            }

            pub fn json_node(&self, node: NodeRef) -> ::asdl_rt::json::Value {
                match node {
                    #(#node_arms,)*
                }
            }

            #(#methods)*
        }
    }
}
