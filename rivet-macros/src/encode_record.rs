use crate::decode_table::TableMetadata;
use proc_macro2::TokenStream;
use quote::quote;

fn optional_str(value: &Option<String>) -> TokenStream {
    match value {
        Some(v) => quote!(::std::option::Option::Some(#v)),
        None => quote!(::std::option::Option::None),
    }
}

pub(crate) fn encode_record(table: &TableMetadata) -> TokenStream {
    let name = &table.item.ident;
    let record_name = name.to_string();
    let fields = table.columns.iter().filter(|c| !c.ignore).map(|c| {
        let ident = &c.ident;
        let ty = &c.ty;
        let field_name = &c.name;
        let mut def = quote! {
            ::rivet::FieldDef::<#name>::new::<#ty>(
                #field_name,
                |r, v| {
                    r.#ident = ::rivet::FieldValue::from_value(v)?;
                    ::std::result::Result::Ok(())
                },
                |r, l| {
                    r.#ident = ::rivet::FieldValue::from_linked(l)?;
                    ::std::result::Result::Ok(())
                },
                |r| ::rivet::FieldValue::to_value(&r.#ident),
            )
        };
        if let Some(column) = &c.column {
            def = quote!(#def.column(#column));
        }
        let (primary_key, result_only, auto_select, force_utc, ansi, wide_datetime) = (
            c.primary_key,
            c.result_only,
            c.auto_select,
            c.force_utc,
            c.ansi,
            c.wide_datetime,
        );
        def = quote! {
            #def.flags(::rivet::FieldFlags {
                primary_key: #primary_key,
                result_only: #result_only,
                auto_select: #auto_select,
                force_utc: #force_utc,
                ansi: #ansi,
                wide_datetime: #wide_datetime,
                ignore: false,
            })
        };
        if c.read_only {
            def = quote!(#def.read_only());
        }
        if let Some(template) = &c.insert_template {
            def = quote!(#def.insert_template(#template));
        }
        if let Some(template) = &c.update_template {
            def = quote!(#def.update_template(#template));
        }
        def
    });
    let table_name = optional_str(&table.name);
    let primary_key = optional_str(&table.primary_key);
    let sequence = optional_str(&table.sequence);
    let auto_increment = match table.auto_increment {
        Some(v) => quote!(::std::option::Option::Some(#v)),
        None => quote!(::std::option::Option::None),
    };
    let after_load = match &table.after_load {
        Some(path) => quote!(::std::option::Option::Some(#path as fn(&mut #name))),
        None => quote!(::std::option::Option::None),
    };
    quote! {
        impl ::rivet::Record for #name {
            fn record_def() -> &'static ::rivet::RecordDef<Self> {
                static DEF: ::std::sync::LazyLock<::rivet::RecordDef<#name>> =
                    ::std::sync::LazyLock::new(|| ::rivet::RecordDef {
                        name: #record_name,
                        table: ::rivet::TableDecl {
                            name: #table_name,
                            primary_key: #primary_key,
                            auto_increment: #auto_increment,
                            sequence: #sequence,
                        },
                        new: <#name as ::std::default::Default>::default,
                        fields: vec![#(#fields),*].into_boxed_slice(),
                        after_load: #after_load,
                    });
                &DEF
            }
        }

        impl ::rivet::FromRow for #name {
            fn kind() -> ::rivet::TargetKind<Self> {
                ::rivet::TargetKind::Record(<Self as ::rivet::Record>::record_def())
            }
        }

        impl ::rivet::FieldValue for #name {
            fn field_type() -> ::rivet::FieldType {
                ::rivet::FieldType::Record(::rivet::RecordRef::of::<Self>())
            }

            fn from_value(value: ::rivet::Value) -> ::rivet::Result<Self> {
                ::std::result::Result::Err(::rivet::Error::msg(format!(
                    "Record `{}` cannot be read from the single value {}",
                    #record_name,
                    value,
                )))
            }

            fn to_value(&self) -> ::rivet::Value {
                ::rivet::Value::Null
            }

            fn from_linked(
                linked: ::std::boxed::Box<dyn ::std::any::Any + ::std::marker::Send>,
            ) -> ::rivet::Result<Self> {
                ::rivet::downcast_linked(linked)
            }
        }
    }
}
