use quote::ToTokens;
use syn::{Field, Ident, LitStr, Type, parse::ParseBuffer};

pub(crate) struct ColumnMetadata {
    pub(crate) ident: Ident,
    pub(crate) ty: Type,
    pub(crate) name: String,
    pub(crate) column: Option<String>,
    pub(crate) primary_key: bool,
    pub(crate) result_only: bool,
    pub(crate) auto_select: bool,
    pub(crate) force_utc: bool,
    pub(crate) ansi: bool,
    pub(crate) wide_datetime: bool,
    pub(crate) ignore: bool,
    pub(crate) read_only: bool,
    pub(crate) insert_template: Option<String>,
    pub(crate) update_template: Option<String>,
}

pub(crate) fn decode_column(field: &Field) -> ColumnMetadata {
    let ident = field
        .ident
        .clone()
        .expect("Record fields are expected to have a name");
    let mut name = ident.to_string();
    if let Some(raw) = name.strip_prefix("r#") {
        name = raw.to_string();
    }
    let mut metadata = ColumnMetadata {
        ident,
        ty: field.ty.clone(),
        name,
        column: None,
        primary_key: false,
        result_only: false,
        auto_select: false,
        force_utc: false,
        ansi: false,
        wide_datetime: false,
        ignore: false,
        read_only: false,
        insert_template: None,
        update_template: None,
    };
    for attr in &field.attrs {
        let meta = &attr.meta;
        if !meta.path().is_ident("rivet") {
            continue;
        }
        let Ok(list) = meta.require_list() else {
            panic!("Error while parsing `rivet`, use it like: `#[rivet(attribute = value, ...)]`");
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
            let flag = |attribute: &str| {
                // value() is Err for a bare path
                let Err(..) = arg.value() else {
                    panic!("Error while parsing `{attribute}`, use it like: `#[rivet({attribute})]`");
                };
                true
            };
            if arg.path.is_ident("column") {
                metadata.column = Some(string("column"));
            } else if arg.path.is_ident("insert_template") {
                metadata.insert_template = Some(string("insert_template"));
            } else if arg.path.is_ident("update_template") {
                metadata.update_template = Some(string("update_template"));
            } else if arg.path.is_ident("primary_key") {
                metadata.primary_key = flag("primary_key");
            } else if arg.path.is_ident("result_only") {
                metadata.result_only = flag("result_only");
            } else if arg.path.is_ident("auto_select") {
                metadata.result_only = flag("auto_select");
                metadata.auto_select = true;
            } else if arg.path.is_ident("force_utc") {
                metadata.force_utc = flag("force_utc");
            } else if arg.path.is_ident("ansi") {
                metadata.ansi = flag("ansi");
            } else if arg.path.is_ident("wide_datetime") {
                metadata.wide_datetime = flag("wide_datetime");
            } else if arg.path.is_ident("ignore") {
                metadata.ignore = flag("ignore");
            } else if arg.path.is_ident("read_only") {
                metadata.read_only = flag("read_only");
            } else {
                panic!(
                    "Unknown attribute `{}` inside rivet macro",
                    arg.path.to_token_stream()
                );
            }
            Ok(())
        });
    }
    metadata
}
