// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! This crate provides procedural macros for the Kestrel serialization crates.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Attribute, Data, DataEnum, DataStruct, DeriveInput, Fields, LitStr};

/// A derive macro that implements `kestrel_core::reflect::Reflect` for a struct, or
/// `kestrel_core::reflect::ReflectEnum` for a field-less enum, together with
/// `kestrel_core::reflect::Reflected`.
///
/// Struct members are reflected in declaration order. Every reflected field type must
/// implement `Reflected`. Two field attributes are understood:
///
/// - `#[reflect(skip)]` leaves the field out of the reflected members.
/// - `#[reflect(rename = "id")]` serializes the field under another id.
///
/// `#[reflect(rename = "...")]` is also accepted on enum variants.
///
/// A struct can be stored as something other than an object with a container attribute:
///
/// - `#[reflect(transparent)]` stores the struct as its single reflected field, so a
///   handle wrapping a `u32` is written as a plain `u32`.
/// - `#[reflect(array)]` stores the reflected fields, which must all share one type,
///   as a fixed-size array in declaration order, so a vector is written as `[x, y, z]`.
#[proc_macro_derive(Reflect, attributes(reflect))]
pub fn derive_reflect(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree.
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = if !input.generics.params.is_empty() {
        Err(syn::Error::new_spanned(
            &input.generics,
            "Reflect cannot be derived for generic types",
        ))
    } else {
        match (&input.data, StoredAs::from_attrs(&input.attrs)) {
            (_, Err(err)) => Err(err),
            (Data::Struct(data), Ok(stored_as)) => expand_struct(&input, data, stored_as),
            (Data::Enum(data), Ok(StoredAs::Object)) => expand_enum(&input, data),
            (Data::Enum(_), Ok(_)) => Err(syn::Error::new_spanned(
                &input.ident,
                "`transparent` and `array` only apply to structs",
            )),
            (Data::Union(_), Ok(_)) => Err(syn::Error::new_spanned(
                &input.ident,
                "Reflect cannot be derived for unions",
            )),
        }
    };

    // Hand the output tokens back to the compiler.
    TokenStream::from(expanded.unwrap_or_else(syn::Error::into_compile_error))
}

#[derive(Default)]
struct ReflectOptions {
    skip: bool,
    rename: Option<String>,
}

impl ReflectOptions {
    fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("reflect")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    let name: LitStr = meta.value()?.parse()?;
                    options.rename = Some(name.value());
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `rename = \"...\"`"))
                }
            })?;
        }
        Ok(options)
    }
}

/// How a derived struct is laid out in the serialized data.
#[derive(Clone, Copy, PartialEq, Eq)]
enum StoredAs {
    Object,
    Transparent,
    Array,
}

impl StoredAs {
    fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut stored_as = Self::Object;
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("reflect")) {
            attr.parse_nested_meta(|meta| {
                let requested = if meta.path.is_ident("transparent") {
                    Self::Transparent
                } else if meta.path.is_ident("array") {
                    Self::Array
                } else {
                    return Err(meta.error("expected `transparent` or `array`"));
                };
                if stored_as != Self::Object && stored_as != requested {
                    return Err(meta.error("`transparent` and `array` cannot be combined"));
                }
                stored_as = requested;
                Ok(())
            })?;
        }
        Ok(stored_as)
    }
}

fn expand_struct(
    input: &DeriveInput,
    data: &DataStruct,
    stored_as: StoredAs,
) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = name.unraw().to_string();

    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            name,
            "Reflect can only be derived for structs with named fields",
        ));
    };

    let mut member_names = Vec::new();
    let mut member_idents = Vec::new();
    let mut member_types = Vec::new();
    for field in &fields.named {
        let options = ReflectOptions::from_attrs(&field.attrs)?;
        if options.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        member_names.push(options.rename.unwrap_or_else(|| ident.unraw().to_string()));
        member_idents.push(ident);
        member_types.push(&field.ty);
    }
    let indices: Vec<usize> = (0..member_idents.len()).collect();

    match stored_as {
        StoredAs::Object => {}
        StoredAs::Transparent => {
            let ([ident], [ty]) = (member_idents.as_slice(), member_types.as_slice()) else {
                return Err(syn::Error::new_spanned(
                    name,
                    "a transparent struct needs exactly one reflected field",
                ));
            };
            return Ok(quote! {
                impl ::kestrel_core::reflect::Reflected for #name {
                    const KIND: ::kestrel_core::reflect::TypeKind =
                        <#ty as ::kestrel_core::reflect::Reflected>::KIND;

                    fn as_value_mut(&mut self) -> ::kestrel_core::reflect::ValueMut<'_> {
                        ::kestrel_core::reflect::Reflected::as_value_mut(&mut self.#ident)
                    }
                }
            });
        }
        StoredAs::Array => {
            if let Some(first) = member_types.first() {
                let first = quote!(#first).to_string();
                if let Some(other) = member_types.iter().find(|ty| quote!(#ty).to_string() != first) {
                    return Err(syn::Error::new_spanned(
                        other,
                        "every reflected field of an array struct must have the same type",
                    ));
                }
            }
            let len = member_idents.len();
            return Ok(quote! {
                impl ::kestrel_core::reflect::ReflectArray for #name {
                    fn len(&self) -> usize {
                        #len
                    }

                    fn is_fixed_size(&self) -> bool {
                        true
                    }

                    fn resize(&mut self, len: usize) -> bool {
                        len == #len
                    }

                    fn element_mut(
                        &mut self,
                        index: usize,
                    ) -> ::core::option::Option<::kestrel_core::reflect::ValueMut<'_>> {
                        match index {
                            #(
                                #indices => ::core::option::Option::Some(
                                    ::kestrel_core::reflect::Reflected::as_value_mut(&mut self.#member_idents),
                                ),
                            )*
                            _ => ::core::option::Option::None,
                        }
                    }
                }

                impl ::kestrel_core::reflect::Reflected for #name {
                    const KIND: ::kestrel_core::reflect::TypeKind =
                        ::kestrel_core::reflect::TypeKind::Array;

                    fn as_value_mut(&mut self) -> ::kestrel_core::reflect::ValueMut<'_> {
                        ::kestrel_core::reflect::ValueMut::Array(self)
                    }
                }
            });
        }
    }

    Ok(quote! {
        impl ::kestrel_core::reflect::Reflect for #name {
            fn type_name(&self) -> &'static str {
                #type_name
            }

            fn members(&self) -> &'static [::kestrel_core::reflect::MemberDesc] {
                const MEMBERS: &[::kestrel_core::reflect::MemberDesc] = &[
                    #(
                        ::kestrel_core::reflect::MemberDesc {
                            name: #member_names,
                            kind: <#member_types as ::kestrel_core::reflect::Reflected>::KIND,
                        },
                    )*
                ];
                MEMBERS
            }

            fn member_mut(
                &mut self,
                index: usize,
            ) -> ::core::option::Option<::kestrel_core::reflect::ValueMut<'_>> {
                match index {
                    #(
                        #indices => ::core::option::Option::Some(
                            ::kestrel_core::reflect::Reflected::as_value_mut(&mut self.#member_idents),
                        ),
                    )*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::kestrel_core::reflect::Reflected for #name {
            const KIND: ::kestrel_core::reflect::TypeKind = ::kestrel_core::reflect::TypeKind::Class;

            fn as_value_mut(&mut self) -> ::kestrel_core::reflect::ValueMut<'_> {
                ::kestrel_core::reflect::ValueMut::Class(self)
            }
        }
    })
}

fn expand_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let enum_name = name.unraw().to_string();

    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            name,
            "Reflect cannot be derived for enums without variants",
        ));
    }

    let mut variant_idents = Vec::new();
    let mut variant_names = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Reflect can only be derived for enums whose variants have no fields",
            ));
        }
        let options = ReflectOptions::from_attrs(&variant.attrs)?;
        if options.skip {
            return Err(syn::Error::new_spanned(
                variant,
                "enum variants cannot be skipped",
            ));
        }
        variant_names.push(
            options
                .rename
                .unwrap_or_else(|| variant.ident.unraw().to_string()),
        );
        variant_idents.push(&variant.ident);
    }

    Ok(quote! {
        impl ::kestrel_core::reflect::ReflectEnum for #name {
            fn enum_name(&self) -> &'static str {
                #enum_name
            }

            fn variant_names(&self) -> &'static [&'static str] {
                &[#(#variant_names),*]
            }

            fn variant_name(&self) -> &'static str {
                match self {
                    #(Self::#variant_idents => #variant_names,)*
                }
            }

            fn discriminant(&self) -> i64 {
                match self {
                    #(Self::#variant_idents => Self::#variant_idents as i64,)*
                }
            }

            fn set_variant_by_name(&mut self, name: &str) -> bool {
                match name {
                    #(
                        #variant_names => {
                            *self = Self::#variant_idents;
                            true
                        }
                    )*
                    _ => false,
                }
            }

            fn set_discriminant(&mut self, value: i64) -> bool {
                #(
                    if value == Self::#variant_idents as i64 {
                        *self = Self::#variant_idents;
                        return true;
                    }
                )*
                false
            }
        }

        impl ::kestrel_core::reflect::Reflected for #name {
            const KIND: ::kestrel_core::reflect::TypeKind = ::kestrel_core::reflect::TypeKind::Enum;

            fn as_value_mut(&mut self) -> ::kestrel_core::reflect::ValueMut<'_> {
                ::kestrel_core::reflect::ValueMut::Enum(self)
            }
        }
    })
}
