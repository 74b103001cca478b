use proc_macro2::TokenStream;
use quote::quote;
use syn::{Fields, Ident, ItemEnum};

/// Type token of the `#[repr]` the discriminants are stored as.
fn repr_value(item: &ItemEnum) -> TokenStream {
    let repr = item
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("repr"))
        .find_map(|attr| attr.parse_args::<Ident>().ok())
        .map(|v| v.to_string());
    match repr.as_deref() {
        Some("i8") => quote!(::rivet::Value::Int8(::std::option::Option::None)),
        Some("i16") => quote!(::rivet::Value::Int16(::std::option::Option::None)),
        Some("i32") | None => quote!(::rivet::Value::Int32(::std::option::Option::None)),
        Some("i64") | Some("isize") => quote!(::rivet::Value::Int64(::std::option::Option::None)),
        Some("u8") => quote!(::rivet::Value::UInt8(::std::option::Option::None)),
        Some("u16") => quote!(::rivet::Value::UInt16(::std::option::Option::None)),
        Some("u32") => quote!(::rivet::Value::UInt32(::std::option::Option::None)),
        Some("u64") | Some("usize") => quote!(::rivet::Value::UInt64(::std::option::Option::None)),
        Some(other) => panic!(
            "Enum `{}` has representation `{other}`, only integer representations can be stored",
            item.ident
        ),
    }
}

pub(crate) fn encode_enum(item: &ItemEnum) -> TokenStream {
    let name = &item.ident;
    let enum_name = name.to_string();
    if !item.generics.params.is_empty() {
        panic!("Enum `{name}` cannot be generic");
    }
    if item.variants.is_empty() {
        panic!("Enum `{name}` has no variants");
    }
    let variants = item
        .variants
        .iter()
        .map(|v| {
            let Fields::Unit = v.fields else {
                panic!(
                    "Variant `{name}::{}` has fields, only fieldless enums can be stored",
                    v.ident
                );
            };
            &v.ident
        })
        .collect::<Vec<_>>();
    let labels = variants.iter().map(|v| v.to_string());
    let repr = repr_value(item);
    quote! {
        impl ::rivet::DbEnum for #name {
            fn enum_def() -> &'static ::rivet::EnumDef {
                static DEF: ::rivet::EnumDef = ::rivet::EnumDef {
                    name: #enum_name,
                    repr: #repr,
                    variants: &[#((#labels, #name::#variants as i64)),*],
                };
                &DEF
            }

            fn from_discriminant(discriminant: i64) -> ::std::option::Option<Self> {
                #(
                    if discriminant == #name::#variants as i64 {
                        return ::std::option::Option::Some(#name::#variants);
                    }
                )*
                ::std::option::Option::None
            }

            fn discriminant(self) -> i64 {
                self as i64
            }
        }

        impl ::rivet::FieldValue for #name {
            fn field_type() -> ::rivet::FieldType {
                ::rivet::FieldType::Enum(<Self as ::rivet::DbEnum>::enum_def())
            }

            fn from_value(value: ::rivet::Value) -> ::rivet::Result<Self> {
                ::rivet::enum_from_value(value)
            }

            fn to_value(&self) -> ::rivet::Value {
                ::rivet::enum_to_value(*self)
            }
        }

        impl ::rivet::FromRow for #name {
            fn kind() -> ::rivet::TargetKind<Self> {
                ::rivet::TargetKind::Scalar(::rivet::ScalarTarget::of())
            }
        }
    }
}
