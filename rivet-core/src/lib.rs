mod as_value;
mod cache;
mod converter;
mod cursor;
mod dialect;
mod error;
mod mapper;
mod mapping;
mod materializer;
mod memory;
mod metadata;
mod multi;
mod parse;
mod provider;
mod record;
mod row;
#[cfg(test)]
mod testing;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use cache::*;
pub use converter::*;
pub use cursor::*;
pub use dialect::*;
pub use error::*;
pub use mapper::*;
pub use mapping::*;
pub use materializer::*;
pub use memory::*;
pub use metadata::*;
pub use multi::*;
pub use parse::*;
pub use provider::*;
pub use record::*;
pub use row::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
