use crate::decode_column::{ColumnMetadata, decode_column};
use quote::ToTokens;
use syn::{Fields, ItemStruct, LitBool, LitStr, Path, PathSegment, parse::ParseBuffer};

pub(crate) struct TableMetadata {
    pub(crate) item: ItemStruct,
    pub(crate) columns: Vec<ColumnMetadata>,
    pub(crate) name: Option<String>,
    pub(crate) primary_key: Option<String>,
    pub(crate) auto_increment: Option<bool>,
    pub(crate) sequence: Option<String>,
    pub(crate) after_load: Option<Path>,
}

pub(crate) fn decode_table(item: ItemStruct) -> TableMetadata {
    if !item.generics.params.is_empty() {
        panic!("Records cannot be generic, `{}` is", item.ident);
    }
    let Fields::Named(..) = item.fields else {
        panic!("Records must have named fields, `{}` does not", item.ident);
    };
    let columns: Vec<_> = item.fields.iter().map(decode_column).collect();
    let mut name = None;
    let mut primary_key = None;
    let mut auto_increment = None;
    let mut sequence = None;
    let mut after_load: Option<Path> = None;
    for attr in &item.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("rivet") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `rivet`, use it like: `#[rivet(attribute = value, ..)]`");
        };
        let _ = list.parse_nested_meta(|arg| {
            let string = |attribute: &str| {
                let Ok(v) = arg.value().and_then(ParseBuffer::parse::<LitStr>) else {
                    panic!(
                        "Error while parsing `{attribute}`, use it like: `#[rivet({attribute} = \"...\")]`"
                    );
                };
                v.value()
            };
            if arg.path.is_ident("table") {
                name = Some(string("table"));
            } else if arg.path.is_ident("primary_key") {
                primary_key = Some(string("primary_key"));
            } else if arg.path.is_ident("sequence") {
                sequence = Some(string("sequence"));
            } else if arg.path.is_ident("auto_increment") {
                auto_increment = Some(match arg.value() {
                    Err(..) => true,
                    Ok(v) => {
                        let Ok(v) = v.parse::<LitBool>() else {
                            panic!(
                                "Error while parsing `auto_increment`, use it like: `#[rivet(auto_increment = false)]`"
                            );
                        };
                        v.value
                    }
                });
            } else if arg.path.is_ident("after_load") {
                let Ok(path) = arg.value().and_then(ParseBuffer::parse::<Path>) else {
                    panic!(
                        "Error while parsing `after_load`, use it like: `#[rivet(after_load = Self::loaded)]`"
                    );
                };
                after_load = Some(path);
            } else {
                panic!(
                    "Unknown attribute `{}` inside rivet macro",
                    arg.path.to_token_stream()
                );
            }
            Ok(())
        });
    }
    if let Some(path) = &mut after_load {
        // Referenced from a static, where `Self` is not in scope
        if path.segments.first().is_some_and(|v| v.ident == "Self") {
            path.segments[0] = PathSegment::from(item.ident.clone());
        }
    }
    let declared = columns.iter().filter(|c| c.primary_key).count();
    if declared > 1 || (declared == 1 && primary_key.is_some()) {
        panic!("Record `{}` declares more than one primary key", item.ident);
    }
    TableMetadata {
        item,
        columns,
        name,
        primary_key,
        auto_increment,
        sequence,
        after_load,
    }
}
