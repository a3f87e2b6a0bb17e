//! Node layout: enumerations, union nodes and their variants, records, the
//! cross-union handle, and the container holding every arena.

use asdl_schema::Cardinality;
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};

use super::{field_ty, kind_path, lit, variant_path};
use crate::classify::{Classified, EnumInfo, FieldInfo, RecordInfo, UnionInfo};

pub fn emit(c: &Classified) -> TokenStream {
    let enums = c.enums.iter().map(emit_enum);
    let unions = c.unions.iter().map(|u| emit_union(c, u));
    let records = c.records.iter().map(|r| emit_record(c, r));
    let node_ref = emit_node_ref(c);
    let container = emit_container(c);
    quote! {
        #(#enums)*
        #(#unions)*
        #(#records)*
        #node_ref
        #container
    }
}

/// `ALL`, `name` and `from_u8` for a fieldless `#[repr(u8)]` enum.
fn tag_enum(
    ty: &proc_macro2::Ident,
    doc: &str,
    values: &[(&str, &proc_macro2::Ident)],
) -> TokenStream {
    let count = values.len();
    let idents: Vec<_> = values.iter().map(|(_, ident)| *ident).collect();
    let names = values.iter().map(|(name, _)| lit(name));
    let discriminants = (0..count).map(Literal::usize_unsuffixed);
    let doc = lit(doc);
    quote! {
        #[doc = #doc]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum #ty {
            #(#idents = #discriminants,)*
        }

        impl #ty {
            pub const ALL: [#ty; #count] = [#(#ty::#idents),*];

            pub fn name(self) -> &'static str {
                match self {
                    #(#ty::#idents => #names,)*
                }
            }

            pub fn from_u8(raw: u8) -> ::std::option::Option<Self> {
                Self::ALL.get(usize::from(raw)).copied()
            }
        }
    }
}

fn emit_enum(e: &EnumInfo) -> TokenStream {
    let values: Vec<_> = e.values.iter().map(|(name, ident)| (name.as_str(), ident)).collect();
    tag_enum(&e.ty, &format!("Simple enumeration `{}`.", e.name), &values)
}

fn struct_fields(c: &Classified, fields: &[FieldInfo], prefix: &TokenStream) -> Vec<TokenStream> {
    fields
        .iter()
        .map(|f| {
            let ident = &f.ident;
            let ty = field_ty(c, f, prefix);
            quote!(pub #ident: #ty)
        })
        .collect()
}

/// `field_mask` body: required bits plus one test per optional field.
/// `base` is the expression owning the fields.
fn mask_expr(required: u128, optional: &[&FieldInfo], base: &TokenStream) -> TokenStream {
    let required = Literal::u128_suffixed(required);
    if optional.is_empty() {
        return quote!(#required);
    }
    let tests = optional.iter().map(|f| {
        let ident = &f.ident;
        let bit = Literal::u32_unsuffixed(f.bit);
        quote! {
            if #base.#ident.is_some() {
                mask |= 1u128 << #bit;
            }
        }
    });
    quote! {{
        let mut mask = #required;
        #(#tests)*
        mask
    }}
}

fn optional_fields(fields: &[FieldInfo]) -> Vec<&FieldInfo> {
    fields
        .iter()
        .filter(|f| f.card == Cardinality::Optional)
        .collect()
}

fn field_name_fn(names: &[String]) -> TokenStream {
    let bits = (0..names.len()).map(Literal::usize_unsuffixed);
    let names = names.iter().map(|n| lit(n));
    quote! {
        /// Schema name of the field at `bit` in [`Self::field_mask`].
        pub fn field_name(bit: u32) -> ::std::option::Option<&'static str> {
            match bit {
                #(#bits => ::std::option::Option::Some(#names),)*
                _ => ::std::option::Option::None,
            }
        }
    }
}

fn emit_union(c: &Classified, u: &UnionInfo) -> TokenStream {
    let (ty, id, kind, tag, variant_trait, module) =
        (&u.ty, &u.id, &u.kind, &u.tag, &u.variant_trait, &u.module);
    let top = TokenStream::new();
    let sup = quote!(super::);
    let name = lit(&u.name);

    let attrs = struct_fields(c, &u.attributes, &top);
    let variant_idents: Vec<_> = u.variants.iter().map(|v| &v.ident).collect();
    let variant_structs = u.variants.iter().map(|v| {
        let ident = &v.ident;
        let fields = struct_fields(c, &v.fields, &sup);
        let doc = lit(&format!("`{}` variant of `{}`.", v.name, u.name));
        quote! {
            #[doc = #doc]
            #[derive(Clone, Debug, PartialEq)]
            pub struct #ident {
                #(#fields,)*
            }
        }
    });

    let tag_values: Vec<_> = u.variants.iter().map(|v| (v.name.as_str(), &v.ident)).collect();
    let tags = tag_enum(tag, &format!("Variant tag of `{}`.", u.name), &tag_values);

    let variant_impls = u.variants.iter().map(|v| {
        let path = variant_path(u, v);
        let kind_path = kind_path(u, v);
        let ident = &v.ident;
        let (from_kind, from_kind_mut) = if u.variants.len() == 1 {
            (
                quote! {
                    let #kind_path(x) = kind;
                    ::std::option::Option::Some(x)
                },
                quote! {
                    let #kind_path(x) = kind;
                    ::std::option::Option::Some(x)
                },
            )
        } else {
            let body = quote! {
                match kind {
                    #kind_path(x) => ::std::option::Option::Some(x),
                    _ => ::std::option::Option::None,
                }
            };
            (body.clone(), body)
        };
        quote! {
            impl #variant_trait for #path {
                const TAG: #tag = #tag::#ident;

                fn from_kind(kind: &#kind) -> ::std::option::Option<&Self> {
                    #from_kind
                }

                fn from_kind_mut(kind: &mut #kind) -> ::std::option::Option<&mut Self> {
                    #from_kind_mut
                }
            }

            impl ::std::convert::From<#path> for #kind {
                fn from(x: #path) -> Self {
                    #kind_path(x)
                }
            }
        }
    });

    let tag_arms = u.variants.iter().map(|v| {
        let kind_path = kind_path(u, v);
        let ident = &v.ident;
        quote!(#kind_path(_) => #tag::#ident)
    });

    let node_base = quote!(self);
    let variant_base = quote!(x);
    let mask_arms = u.variants.iter().map(|v| {
        let kind_path = kind_path(u, v);
        let optional = optional_fields(&v.fields);
        let mask = mask_expr(v.required_mask, &optional, &variant_base);
        if optional.is_empty() {
            quote!(#kind_path(_) => #mask)
        } else {
            quote!(#kind_path(x) => #mask)
        }
    });
    let attr_optional = optional_fields(&u.attributes);
    let mask_body = if attr_optional.is_empty() {
        quote! {
            match &self.kind {
                #(#mask_arms,)*
            }
        }
    } else {
        let tests = attr_optional.iter().map(|f| {
            let ident = &f.ident;
            let bit = Literal::u32_unsuffixed(f.bit);
            quote! {
                if #node_base.#ident.is_some() {
                    mask |= 1u128 << #bit;
                }
            }
        });
        quote! {
            let mut mask: u128 = match &self.kind {
                #(#mask_arms,)*
            };
            #(#tests)*
            mask
        }
    };
    let field_name = field_name_fn(&u.bit_names);

    let ty_doc = lit(&format!(
        "A `{}` node: span, shared attributes and the variant payload.",
        u.name
    ));
    let module_doc = lit(&format!("Variant payloads of `{}`.", u.name));
    let trait_doc = lit(&format!("Implemented by every variant payload of `{}`.", u.name));

    quote! {
        pub type #id = ::asdl_rt::Idx<#ty>;

        #[doc = #ty_doc]
        #[derive(Clone, Debug, PartialEq)]
        pub struct #ty {
            pub span: ::asdl_rt::Span,
            #(#attrs,)*
            pub kind: #kind,
        }

        #[derive(Clone, Debug, PartialEq)]
        pub enum #kind {
            #(#variant_idents(#module::#variant_idents),)*
        }

        #[doc = #module_doc]
        pub mod #module {
            #(#variant_structs)*
        }

        #tags

        impl #kind {
            pub fn tag(&self) -> #tag {
                match self {
                    #(#tag_arms,)*
                }
            }
        }

        #[doc = #trait_doc]
        pub trait #variant_trait: Sized + ::std::convert::Into<#kind> {
            const TAG: #tag;

            fn from_kind(kind: &#kind) -> ::std::option::Option<&Self>;

            fn from_kind_mut(kind: &mut #kind) -> ::std::option::Option<&mut Self>;
        }

        #(#variant_impls)*

        impl #ty {
            pub fn tag(&self) -> #tag {
                self.kind.tag()
            }

            pub fn is_a<V: #variant_trait>(&self) -> bool {
                self.tag() == V::TAG
            }

            pub fn try_downcast<V: #variant_trait>(&self) -> ::std::option::Option<&V> {
                V::from_kind(&self.kind)
            }

            /// The payload as variant `V`. A tag mismatch is an internal error.
            pub fn downcast<V: #variant_trait>(&self) -> &V {
                match V::from_kind(&self.kind) {
                    ::std::option::Option::Some(x) => x,
                    ::std::option::Option::None => {
                        ::asdl_rt::ice::downcast_mismatch(#name, V::TAG.name(), self.tag().name())
                    }
                }
            }

            pub fn downcast_mut<V: #variant_trait>(&mut self) -> &mut V {
                let found = self.tag();
                match V::from_kind_mut(&mut self.kind) {
                    ::std::option::Option::Some(x) => x,
                    ::std::option::Option::None => {
                        ::asdl_rt::ice::downcast_mismatch(#name, V::TAG.name(), found.name())
                    }
                }
            }

            /// Bits of the fields this node carries: every required field,
            /// plus each optional field that is present.
            pub fn field_mask(&self) -> u128 {
                #mask_body
            }

            #field_name
        }
    }
}

fn emit_record(c: &Classified, r: &RecordInfo) -> TokenStream {
    let ty = &r.ty;
    let top = TokenStream::new();
    let fields = struct_fields(c, &r.fields, &top);
    let required = r
        .fields
        .iter()
        .filter(|f| f.card != Cardinality::Optional)
        .fold(0u128, |mask, f| mask | (1u128 << f.bit));
    let optional = optional_fields(&r.fields);
    let mask = mask_expr(required, &optional, &quote!(self));
    let names: Vec<String> = r.fields.iter().map(|f| f.name.clone()).collect();
    let field_name = field_name_fn(&names);
    let doc = lit(&format!("Record `{}`.", r.name));
    quote! {
        #[doc = #doc]
        #[derive(Clone, Debug, PartialEq)]
        pub struct #ty {
            pub span: ::asdl_rt::Span,
            #(#fields,)*
        }

        impl #ty {
            pub fn field_mask(&self) -> u128 {
                #mask
            }

            #field_name
        }
    }
}

fn emit_node_ref(c: &Classified) -> TokenStream {
    let tys: Vec<_> = c.unions.iter().map(|u| &u.ty).collect();
    let ids: Vec<_> = c.unions.iter().map(|u| &u.id).collect();
    let values: Vec<_> = c.unions.iter().map(|u| (u.name.as_str(), &u.ty)).collect();
    let tags = tag_enum(
        &format_ident!("NodeTag"),
        "Which union a [`NodeRef`] points into.",
        &values,
    );
    quote! {
        /// Handle to a node of any union.
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum NodeRef {
            #(#tys(#ids),)*
        }

        #tags

        impl NodeRef {
            pub fn tag(self) -> NodeTag {
                match self {
                    #(NodeRef::#tys(_) => NodeTag::#tys,)*
                }
            }
        }

        #(
            impl ::std::convert::From<#ids> for NodeRef {
                fn from(id: #ids) -> Self {
                    NodeRef::#tys(id)
                }
            }
        )*
    }
}

fn emit_container(c: &Classified) -> TokenStream {
    let container = &c.container;
    let arenas: Vec<_> = c.unions.iter().map(|u| &u.arena).collect();
    let tys: Vec<_> = c.unions.iter().map(|u| &u.ty).collect();
    let ids: Vec<_> = c.unions.iter().map(|u| &u.id).collect();
    let accessors: Vec<_> = c.unions.iter().map(|u| &u.accessor).collect();
    let accessors_mut: Vec<_> = c.unions.iter().map(|u| &u.accessor_mut).collect();
    let scopes = c.symbol.map(|s| {
        let symbol = &c.unions[s].ty;
        quote!(pub scopes: ::asdl_rt::Scopes<#symbol, NodeRef>,)
    });
    let doc = lit(&format!(
        "Every node of one `{}` compilation unit, one arena per union.",
        c.schema_name
    ));
    quote! {
        #[doc = #doc]
        #[derive(Clone, Debug, Default)]
        pub struct #container {
            #(pub #arenas: ::asdl_rt::Arena<#tys>,)*
            #scopes
        }

        impl #container {
            pub fn new() -> Self {
                Self::default()
            }

            #(
                pub fn #accessors(&self, id: #ids) -> &#tys {
                    &self.#arenas[id]
                }

                pub fn #accessors_mut(&mut self, id: #ids) -> &mut #tys {
                    &mut self.#arenas[id]
                }
            )*

            pub fn span(&self, node: NodeRef) -> ::asdl_rt::Span {
                match node {
                    #(NodeRef::#tys(id) => self.#accessors(id).span,)*
                }
            }
        }
    }
}
