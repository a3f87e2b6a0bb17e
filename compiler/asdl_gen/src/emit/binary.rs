//! Binary serializer and deserializer.
//!
//! Wire layout, after the `ASDL` magic and version byte: the root's
//! `NodeTag`, then per node `[tag:u8][span][attributes][fields]`.
//! Optionals carry a presence byte, sequences a `u64` count. Owned symbol
//! tables are `[counter][count]{(name, symbol)}*` with function symbols
//! last; symbol references are `[home counter][symbol tag][name]`; table
//! back-references are a counter. Skipped fields are not written and read
//! back as absent.
//!
//! The reader keeps a counter-to-table map. A table reference must name a
//! table that was already read; a symbol may be referenced before its entry
//! arrives, in which case a reserved slot stands in for it until then.

use asdl_schema::Cardinality;
use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use super::{kind_path, lit, method, variant_path, Place};
use crate::classify::{Classified, FieldInfo, FieldKind, UnionInfo};

/// `read_<stem>_value`: decodes a node without allocating it.
fn read_value(stem: &str) -> Ident {
    method("read_", &format!("{stem}_value"))
}

fn write_element(c: &Classified, kind: FieldKind, place: &Place) -> TokenStream {
    let value = place.value();
    let reference = place.reference();
    match kind {
        FieldKind::Int => quote!(self.w.write_i64(#value);),
        FieldKind::Float => quote!(self.w.write_f64(#value);),
        FieldKind::Bool => quote!(self.w.write_bool(#value);),
        FieldKind::Str | FieldKind::Ident => quote!(self.w.write_str(#reference);),
        FieldKind::Enum(_) => quote!(self.w.write_u8(#value as u8);),
        FieldKind::Union(u) => {
            let write = method("write_", &c.unions[u].stem);
            quote!(self.#write(#value);)
        }
        FieldKind::SymbolRef => quote!(self.write_symbol_ref(#value);),
        FieldKind::Record(r) => {
            let write = method("write_", &c.records[r].stem);
            quote!(self.#write(#reference);)
        }
        FieldKind::Node => quote!(self.write_node_field(#value);),
        FieldKind::ScopeOwned => quote!(self.write_scope(#value);),
        FieldKind::ScopeRef => quote!(self.write_scope_ref(#value);),
    }
}

fn write_field(c: &Classified, field: &FieldInfo, base: &TokenStream) -> TokenStream {
    let place = Place::field(base, field);
    let item = format_ident!("item");
    match field.card {
        Cardinality::Scalar => write_element(c, field.kind, &place),
        Cardinality::Optional => {
            let reference = place.reference();
            let each = write_element(c, field.kind, &Place::Ref(item.clone()));
            quote! {
                match #reference {
                    ::std::option::Option::Some(#item) => {
                        self.w.write_bool(true);
                        #each
                    }
                    ::std::option::Option::None => self.w.write_bool(false),
                }
            }
        }
        Cardinality::Sequence => {
            let receiver = place.receiver();
            let reference = place.reference();
            let each = write_element(c, field.kind, &Place::Ref(item.clone()));
            quote! {
                self.w.write_len(#receiver.len());
                for #item in #reference {
                    #each
                }
            }
        }
    }
}

fn read_element(c: &Classified, kind: FieldKind) -> TokenStream {
    match kind {
        FieldKind::Int => quote!(self.r.read_i64()?),
        FieldKind::Float => quote!(self.r.read_f64()?),
        FieldKind::Bool => quote!(self.r.read_bool()?),
        FieldKind::Str | FieldKind::Ident => quote!(self.r.read_str()?),
        FieldKind::Enum(e) => {
            let read = method("read_", &c.enums[e].stem);
            quote!(self.#read()?)
        }
        FieldKind::Union(u) => {
            let read = method("read_", &c.unions[u].stem);
            quote!(self.#read()?)
        }
        FieldKind::SymbolRef => quote!(self.read_symbol_ref()?),
        FieldKind::Record(r) => {
            let read = method("read_", &c.records[r].stem);
            quote!(self.#read()?)
        }
        FieldKind::Node => quote!(self.read_node_field()?),
        FieldKind::ScopeOwned => quote!(self.read_scope()?),
        FieldKind::ScopeRef => quote!(self.read_scope_ref()?),
    }
}

/// Initializer of one field, read from the wire.
fn read_field(c: &Classified, field: &FieldInfo) -> TokenStream {
    let ident = &field.ident;
    if field.skipped {
        return quote!(#ident: ::std::option::Option::None);
    }
    let elem = read_element(c, field.kind);
    let value = match field.card {
        Cardinality::Scalar => elem,
        Cardinality::Optional => quote! {
            if self.r.read_bool()? {
                ::std::option::Option::Some(#elem)
            } else {
                ::std::option::Option::None
            }
        },
        Cardinality::Sequence => quote! {{
            let len = self.r.read_len()?;
            let mut items = ::std::vec::Vec::with_capacity(len);
            for _ in 0..len {
                items.push(#elem);
            }
            items
        }},
    };
    quote!(#ident: #value)
}

fn written(fields: &[FieldInfo]) -> impl Iterator<Item = &FieldInfo> {
    fields.iter().filter(|f| !f.skipped)
}

fn emit_serializer(c: &Classified) -> TokenStream {
    let container = &c.container;
    let mut methods = Vec::new();

    let node_arms = c.unions.iter().map(|u| {
        let ty = &u.ty;
        let write = method("write_", &u.stem);
        quote!(NodeRef::#ty(id) => self.#write(id))
    });

    for u in &c.unions {
        let write = method("write_", &u.stem);
        let (id, accessor) = (&u.id, &u.accessor);
        let attrs = u.attributes.iter().map(|f| write_field(c, f, &quote!(node)));
        let arms = u.variants.iter().map(|v| {
            let kind_path = kind_path(u, v);
            let fields: Vec<_> = written(&v.fields).map(|f| write_field(c, f, &quote!(x))).collect();
            let binding = if fields.is_empty() { quote!(_) } else { quote!(x) };
            quote!(#kind_path(#binding) => { #(#fields)* })
        });
        methods.push(quote! {
            pub fn #write(&mut self, id: #id) {
                ::asdl_rt::ensure_sufficient_stack(|| {
                    let ir = self.ir;
                    let node = ir.#accessor(id);
                    self.w.write_u8(node.tag() as u8);
                    self.w.write_span(node.span);
                    #(#attrs)*
                    match &node.kind {
                        #(#arms)*
                    }
                })
            }
        });
    }

    for r in &c.records {
        let write = method("write_", &r.stem);
        let ty = &r.ty;
        let fields = r.fields.iter().map(|f| write_field(c, f, &quote!(x)));
        methods.push(quote! {
            pub fn #write(&mut self, x: &#ty) {
                self.w.write_span(x.span);
                #(#fields)*
            }
        });
    }

    let node_field = match c.symbol {
        Some(s) => {
            let symbol = &c.unions[s];
            let (sym_ty, sym_id, sym_tag, sym_accessor) =
                (&symbol.ty, &symbol.id, &symbol.tag, &symbol.accessor);
            let write_symbol = method("write_", &symbol.stem);
            let entries = match symbol.variants.iter().find(|v| v.is_function) {
                Some(function) => {
                    let function = &function.ident;
                    quote! {
                        // Functions last: their bodies refer to sibling symbols.
                        let (functions, others): (::std::vec::Vec<_>, ::std::vec::Vec<_>) = table
                            .iter()
                            .partition(|&(_, sym)| ir.#sym_accessor(sym).tag() == #sym_tag::#function);
                        for (name, sym) in others.into_iter().chain(functions) {
                            self.w.write_str(name);
                            self.#write_symbol(sym);
                        }
                    }
                }
                None => quote! {
                    for (name, sym) in table.iter() {
                        self.w.write_str(name);
                        self.#write_symbol(sym);
                    }
                },
            };
            methods.push(quote! {
                pub fn write_scope(&mut self, scope: ::asdl_rt::ScopeId) {
                    let ir = self.ir;
                    let table = &ir.scopes[scope];
                    self.w.write_u64(table.counter());
                    self.w.write_len(table.len());
                    #entries
                }

                pub fn write_scope_ref(&mut self, scope: ::asdl_rt::ScopeId) {
                    self.w.write_u64(self.ir.scopes[scope].counter());
                }

                pub fn write_symbol_ref(&mut self, id: #sym_id) {
                    let ir = self.ir;
                    match ir.scopes.home(id) {
                        ::std::option::Option::Some((scope, name)) => {
                            self.w.write_u64(ir.scopes[scope].counter());
                            self.w.write_u8(ir.#sym_accessor(id).tag() as u8);
                            self.w.write_str(name);
                        }
                        ::std::option::Option::None => ::asdl_rt::ice::homeless_symbol(id.raw()),
                    }
                }
            });
            quote! {
                /// A `node`-typed field: the base tag, then the node. Symbols
                /// there are references, not copies.
                pub fn write_node_field(&mut self, node: NodeRef) {
                    self.w.write_u8(node.tag() as u8);
                    match node {
                        NodeRef::#sym_ty(id) => self.write_symbol_ref(id),
                        other => self.write_node(other),
                    }
                }
            }
        }
        None => quote! {
            /// A `node`-typed field: the base tag, then the node.
            pub fn write_node_field(&mut self, node: NodeRef) {
                self.w.write_u8(node.tag() as u8);
                self.write_node(node);
            }
        },
    };

    quote! {
        /// Encode the subtree rooted at `root`.
        pub fn serialize(ir: &#container, root: impl ::std::convert::Into<NodeRef>) -> ::std::vec::Vec<u8> {
            let mut serializer = Serializer::new(ir);
            serializer.write_root(root.into());
            serializer.finish()
        }

        /// Writer state of [`serialize`].
        pub struct Serializer<'a> {
            ir: &'a #container,
            w: ::asdl_rt::BinaryWriter,
        }

        impl<'a> Serializer<'a> {
            pub fn new(ir: &'a #container) -> Self {
                let mut w = ::asdl_rt::BinaryWriter::new();
                w.write_header();
                Serializer { ir, w }
            }

            pub fn finish(self) -> ::std::vec::Vec<u8> {
                self.w.finish()
            }

            /// The root is always written in full, symbols included.
            pub fn write_root(&mut self, root: NodeRef) {
                self.w.write_u8(root.tag() as u8);
                self.write_node(root);
            }

            pub fn write_node(&mut self, node: NodeRef) {
                match node {
                    #(#node_arms,)*
                }
            }

            #node_field

            #(#methods)*
        }
    }
}

fn emit_deserializer(c: &Classified) -> TokenStream {
    let container = &c.container;
    let mut methods = Vec::new();

    let node_arm = |u: &UnionInfo, read: &Ident| {
        let ty = &u.ty;
        quote! {
            ::std::option::Option::Some(NodeTag::#ty) => ::std::result::Result::Ok(NodeRef::#ty(self.#read()?))
        }
    };
    let root_arms: Vec<_> = c
        .unions
        .iter()
        .map(|u| node_arm(u, &method("read_", &u.stem)))
        .collect();
    let field_arms: Vec<_> = c
        .unions
        .iter()
        .enumerate()
        .map(|(ui, u)| {
            if c.is_symbol(ui) {
                node_arm(u, &format_ident!("read_symbol_ref"))
            } else {
                node_arm(u, &method("read_", &u.stem))
            }
        })
        .collect();

    for e in &c.enums {
        let read = method("read_", &e.stem);
        let (ty, name) = (&e.ty, lit(&e.name));
        methods.push(quote! {
            pub fn #read(&mut self) -> ::std::result::Result<#ty, ::asdl_rt::DecodeError> {
                let tag = self.r.read_u8()?;
                #ty::from_u8(tag).ok_or(::asdl_rt::DecodeError::UnknownTag { union: #name, tag })
            }
        });
    }

    for (ui, u) in c.unions.iter().enumerate() {
        let read = method("read_", &u.stem);
        let read_value = read_value(&u.stem);
        let (ty, id, tag_ty, arena) = (&u.ty, &u.id, &u.tag, &u.arena);
        let name = lit(&u.name);
        let attrs = u.attributes.iter().map(|f| read_field(c, f));
        let arms = u.variants.iter().map(|v| {
            let variant = &v.ident;
            let kind_path = kind_path(u, v);
            let path = variant_path(u, v);
            let fields = v.fields.iter().map(|f| read_field(c, f));
            quote! {
                #tag_ty::#variant => #kind_path(#path {
                    #(#fields,)*
                })
            }
        });
        // Struct literal fields evaluate in source order, which is wire order.
        methods.push(quote! {
            pub fn #read_value(&mut self) -> ::std::result::Result<#ty, ::asdl_rt::DecodeError> {
                ::asdl_rt::ensure_sufficient_stack(|| -> ::std::result::Result<#ty, ::asdl_rt::DecodeError> {
                    let tag = self.r.read_u8()?;
                    let tag = #tag_ty::from_u8(tag).ok_or(::asdl_rt::DecodeError::UnknownTag { union: #name, tag })?;
                    ::std::result::Result::Ok(#ty {
                        span: self.r.read_span()?,
                        #(#attrs,)*
                        kind: match tag {
                            #(#arms,)*
                        },
                    })
                })
            }
        });
        let stamp = u
            .owns_scopes()
            .then(|| quote!(self.ir.stamp_scope_owners(NodeRef::#ty(id));));
        let doc = if c.is_symbol(ui) {
            "A symbol outside any table (a serialized root)."
        } else {
            "A full node, allocated in the destination container."
        };
        methods.push(quote! {
            #[doc = #doc]
            pub fn #read(&mut self) -> ::std::result::Result<#id, ::asdl_rt::DecodeError> {
                let node = self.#read_value()?;
                let id = self.ir.#arena.alloc(node);
                #stamp
                ::std::result::Result::Ok(id)
            }
        });
    }

    for r in &c.records {
        let read = method("read_", &r.stem);
        let ty = &r.ty;
        let fields = r.fields.iter().map(|f| read_field(c, f));
        methods.push(quote! {
            pub fn #read(&mut self) -> ::std::result::Result<#ty, ::asdl_rt::DecodeError> {
                ::std::result::Result::Ok(#ty {
                    span: self.r.read_span()?,
                    #(#fields,)*
                })
            }
        });
    }

    let (scope_fields, scope_init, scope_check, ignore_flag) = match c.symbol {
        Some(s) => {
            let symbol = &c.unions[s];
            let (sym_ty, sym_id, sym_tag, sym_arena) =
                (&symbol.ty, &symbol.id, &symbol.tag, &symbol.arena);
            let read_symbol_value = read_value(&symbol.stem);
            let symbol_name = lit(&symbol.name);
            let stamp = symbol
                .owns_scopes()
                .then(|| quote!(self.ir.stamp_scope_owners(NodeRef::#sym_ty(id));));
            methods.push(quote! {
                /// An owned table: its counter, then every entry. The new
                /// table's parent is the table being read around it.
                pub fn read_scope(&mut self) -> ::std::result::Result<::asdl_rt::ScopeId, ::asdl_rt::DecodeError> {
                    let counter = self.r.read_u64()?;
                    let parent = self.scope_stack.last().copied();
                    let scope = if self.load_symtab_id {
                        self.ir
                            .scopes
                            .new_scope_with_counter(parent, counter)
                            .ok_or(::asdl_rt::DecodeError::DuplicateScope { counter })?
                    } else {
                        self.ir.scopes.new_scope(parent)
                    };
                    if self.id_symtab_map.insert(counter, scope).is_some() {
                        return ::std::result::Result::Err(::asdl_rt::DecodeError::DuplicateScope { counter });
                    }
                    self.scope_stack.push(scope);
                    let len = self.r.read_len()?;
                    for _ in 0..len {
                        self.read_scope_entry(scope)?;
                    }
                    self.scope_stack.pop();
                    ::std::result::Result::Ok(scope)
                }

                fn read_scope_entry(&mut self, scope: ::asdl_rt::ScopeId) -> ::std::result::Result<(), ::asdl_rt::DecodeError> {
                    let name = self.r.read_str()?;
                    let node = self.#read_symbol_value()?;
                    // Looked up only now: the body may have referenced this very name.
                    let id = match self.ir.scopes.lookup(scope, &name) {
                        ::std::option::Option::None => {
                            let id = self.ir.#sym_arena.alloc(node);
                            self.ir.scopes.add_symbol(scope, name, id);
                            id
                        }
                        ::std::option::Option::Some(id) => {
                            let ::std::option::Option::Some((expected, _)) = self.pending.remove(&id) else {
                                return ::std::result::Result::Err(::asdl_rt::DecodeError::DuplicateSymbol { name });
                            };
                            let found = node.tag();
                            if expected != found {
                                return ::std::result::Result::Err(::asdl_rt::DecodeError::SymbolTagMismatch {
                                    name,
                                    expected: expected.name(),
                                    found: found.name(),
                                });
                            }
                            if self.ir.#sym_arena.fill(id, node).is_err() {
                                return ::std::result::Result::Err(::asdl_rt::DecodeError::DuplicateSymbol { name });
                            }
                            self.ir.scopes.move_to_end(scope, &name);
                            id
                        }
                    };
                    #stamp
                    ::std::result::Result::Ok(())
                }

                pub fn read_scope_ref(&mut self) -> ::std::result::Result<::asdl_rt::ScopeId, ::asdl_rt::DecodeError> {
                    let counter = self.r.read_u64()?;
                    self.id_symtab_map
                        .get(&counter)
                        .copied()
                        .ok_or(::asdl_rt::DecodeError::UnresolvedScope { counter })
                }

                /// A reference to a symbol of an already-open table. An entry
                /// not read yet gets a reserved slot, filled when it arrives.
                pub fn read_symbol_ref(&mut self) -> ::std::result::Result<#sym_id, ::asdl_rt::DecodeError> {
                    let counter = self.r.read_u64()?;
                    let raw = self.r.read_u8()?;
                    let tag = #sym_tag::from_u8(raw)
                        .ok_or(::asdl_rt::DecodeError::UnknownTag { union: #symbol_name, tag: raw })?;
                    let name = self.r.read_str()?;
                    let scope = self
                        .id_symtab_map
                        .get(&counter)
                        .copied()
                        .ok_or(::asdl_rt::DecodeError::UnresolvedScope { counter })?;
                    match self.ir.scopes.lookup(scope, &name) {
                        ::std::option::Option::Some(id) => {
                            let found = match self.ir.#sym_arena.get(id) {
                                ::std::option::Option::Some(sym) => sym.tag(),
                                ::std::option::Option::None => self.pending.get(&id).map_or(tag, |(pending, _)| *pending),
                            };
                            if found != tag {
                                return ::std::result::Result::Err(::asdl_rt::DecodeError::SymbolTagMismatch {
                                    name,
                                    expected: tag.name(),
                                    found: found.name(),
                                });
                            }
                            ::std::result::Result::Ok(id)
                        }
                        ::std::option::Option::None => {
                            let id = self.ir.#sym_arena.reserve();
                            self.ir.scopes.add_symbol(scope, name.clone(), id);
                            self.pending.insert(id, (tag, name));
                            ::std::result::Result::Ok(id)
                        }
                    }
                }
            });
            (
                quote! {
                    load_symtab_id: bool,
                    /// Serialized counter to the table it was read into.
                    id_symtab_map: ::asdl_rt::FxHashMap<u64, ::asdl_rt::ScopeId>,
                    scope_stack: ::std::vec::Vec<::asdl_rt::ScopeId>,
                    /// Reserved symbol slots still waiting for their entry.
                    pending: ::asdl_rt::FxHashMap<#sym_id, (#sym_tag, ::std::string::String)>,
                },
                quote! {
                    load_symtab_id,
                    id_symtab_map: ::asdl_rt::FxHashMap::default(),
                    scope_stack: ::std::vec::Vec::new(),
                    pending: ::asdl_rt::FxHashMap::default(),
                },
                quote! {
                    if let ::std::option::Option::Some((_, (_, name))) =
                        self.pending.iter().min_by_key(|(id, _)| id.raw())
                    {
                        return ::std::result::Result::Err(::asdl_rt::DecodeError::UnresolvedSymbol { name: name.clone() });
                    }
                },
                TokenStream::new(),
            )
        }
        // Without symbol tables there are no counters to keep.
        None => (
            TokenStream::new(),
            TokenStream::new(),
            TokenStream::new(),
            quote!(let _ = load_symtab_id;),
        ),
    };

    let arenas: Vec<_> = c.unions.iter().map(|u| &u.arena).collect();
    let marks: Vec<_> = (0..arenas.len()).map(Literal::usize_unsuffixed).collect();
    let (scope_mark, scope_rollback) = if c.has_scopes() {
        (
            quote!(let scopes = ir.scopes.len();),
            quote!(ir.scopes.truncate(scopes);),
        )
    } else {
        (TokenStream::new(), TokenStream::new())
    };

    quote! {
        /// Decode a tree written by [`serialize`] into `ir`, returning its root.
        ///
        /// With `load_symtab_id`, tables keep their serialized counters (a
        /// counter already taken in `ir` is an error); otherwise they get
        /// fresh ones.
        ///
        /// On error, every node and table the failed read added is dropped
        /// again, leaving `ir` as it was.
        pub fn deserialize(
            ir: &mut #container,
            bytes: &[u8],
            load_symtab_id: bool,
        ) -> ::std::result::Result<NodeRef, ::asdl_rt::DecodeError> {
            let lens = [#(ir.#arenas.len()),*];
            #scope_mark
            let result = Deserializer::new(ir, bytes, load_symtab_id).and_then(|mut deserializer| {
                let root = deserializer.read_node()?;
                deserializer.finish()?;
                ::std::result::Result::Ok(root)
            });
            if result.is_err() {
                #(ir.#arenas.truncate(lens[#marks]);)*
                #scope_rollback
            }
            result
        }

        /// Reader state of [`deserialize`].
        ///
        /// Used directly, a failed read leaves the nodes and tables it added
        /// in the container, some of them reserved symbol slots that were
        /// never filled. [`deserialize`] rolls those back.
        pub struct Deserializer<'a, 'b> {
            ir: &'a mut #container,
            r: ::asdl_rt::BinaryReader<'b>,
            #scope_fields
        }

        impl<'a, 'b> Deserializer<'a, 'b> {
            /// Check the header and get ready to read the root.
            pub fn new(
                ir: &'a mut #container,
                bytes: &'b [u8],
                load_symtab_id: bool,
            ) -> ::std::result::Result<Self, ::asdl_rt::DecodeError> {
                #ignore_flag
                let mut r = ::asdl_rt::BinaryReader::new(bytes);
                r.read_header()?;
                ::std::result::Result::Ok(Deserializer {
                    ir,
                    r,
                    #scope_init
                })
            }

            /// Fail on trailing bytes or on symbols referenced but never defined.
            pub fn finish(self) -> ::std::result::Result<(), ::asdl_rt::DecodeError> {
                self.r.finish()?;
                #scope_check
                ::std::result::Result::Ok(())
            }

            pub fn read_node(&mut self) -> ::std::result::Result<NodeRef, ::asdl_rt::DecodeError> {
                let raw = self.r.read_u8()?;
                match NodeTag::from_u8(raw) {
                    #(#root_arms,)*
                    ::std::option::Option::None => ::std::result::Result::Err(::asdl_rt::DecodeError::UnknownTag { union: "node", tag: raw }),
                }
            }

            pub fn read_node_field(&mut self) -> ::std::result::Result<NodeRef, ::asdl_rt::DecodeError> {
                let raw = self.r.read_u8()?;
                match NodeTag::from_u8(raw) {
                    #(#field_arms,)*
                    ::std::option::Option::None => ::std::result::Result::Err(::asdl_rt::DecodeError::UnknownTag { union: "node", tag: raw }),
                }
            }

            #(#methods)*
        }
    }
}

pub fn emit(c: &Classified) -> TokenStream {
    let serializer = emit_serializer(c);
    let deserializer = emit_deserializer(c);
    quote! {
        #serializer
        #deserializer
    }
}
