mod decode_column;
mod decode_table;
mod encode_enum;
mod encode_record;

use decode_table::decode_table;
use encode_enum::encode_enum;
use encode_record::encode_record;
use proc_macro::TokenStream;
use syn::{ItemEnum, ItemStruct, parse_macro_input};

/// Implements `Record`, `FromRow` and `FieldValue` for a struct with named fields.
///
/// The struct must implement `Default`. Table attributes: `table`, `primary_key`,
/// `auto_increment`, `sequence`, `after_load`. Field attributes: `column`, `primary_key`,
/// `result_only`, `auto_select`, `force_utc`, `ansi`, `wide_datetime`, `ignore`, `read_only`,
/// `insert_template`, `update_template`.
#[proc_macro_derive(Record, attributes(rivet))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as ItemStruct);
    let table = decode_table(item);
    encode_record(&table).into()
}

/// Implements `DbEnum`, `FieldValue` and `FromRow` for a fieldless `Copy` enum.
///
/// The stored type follows `#[repr]`, `i32` when absent.
#[proc_macro_derive(DbEnum)]
pub fn derive_db_enum(input: TokenStream) -> TokenStream {
    let item = parse_macro_input!(input as ItemEnum);
    encode_enum(&item).into()
}
