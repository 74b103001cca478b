use crate::{FieldFlags, FieldType, Record, RecordDef, Result, TableDecl, Value};
use convert_case::{Case, Casing};
use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt::{self, Debug},
    sync::Arc,
};

/// Custom conversion applied to a single column, on read (`from_db`) or on write (`to_db`).
pub type Converter = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Type independent view of a [`RecordDef`] handed to the mapping configuration.
#[derive(Debug, Clone)]
pub struct RecordInfo {
    pub type_id: TypeId,
    pub name: &'static str,
    pub table: TableDecl,
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: &'static str,
    pub column: Option<&'static str>,
    pub field_type: FieldType,
    pub flags: FieldFlags,
}

impl RecordInfo {
    pub fn of<T: 'static>(def: &RecordDef<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: def.name,
            table: def.table,
            fields: def
                .fields
                .iter()
                .map(|f| FieldInfo {
                    name: f.name,
                    column: f.column,
                    field_type: f.field_type.clone(),
                    flags: f.flags,
                })
                .collect(),
        }
    }
}

/// Resolved table identity of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub table_name: String,
    pub primary_key: Option<String>,
    pub auto_increment: bool,
    pub sequence: Option<String>,
}

/// Resolved mapping of one field, see [`MappingConfig::column_rule`].
#[derive(Clone, Default)]
pub struct ColumnRule {
    pub column: String,
    pub flags: FieldFlags,
    pub from_db: Option<Converter>,
    pub to_db: Option<Converter>,
}

impl Debug for ColumnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnRule")
            .field("column", &self.column)
            .field("flags", &self.flags)
            .field("from_db", &self.from_db.is_some())
            .field("to_db", &self.to_db.is_some())
            .finish()
    }
}

/// Rules turning record declarations into column mappings.
///
/// Install a different configuration with [`crate::Mapper::reconfigure`], every cache derived
/// from the previous one is dropped.
pub trait MappingConfig: Send + Sync {
    fn table_info(&self, record: &RecordInfo) -> TableInfo;
    /// `None` leaves the field unmapped.
    fn column_rule(&self, record: &RecordInfo, field: &FieldInfo) -> Option<ColumnRule>;
}

/// Case convention applied to undeclared names.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    /// Names are used as written.
    #[default]
    Declared,
    Snake,
    UpperSnake,
    Camel,
    Pascal,
}

impl Naming {
    pub fn apply(&self, name: &str) -> String {
        match self {
            Naming::Declared => name.to_string(),
            Naming::Snake => name.to_case(Case::Snake),
            Naming::UpperSnake => name.to_case(Case::UpperSnake),
            Naming::Camel => name.to_case(Case::Camel),
            Naming::Pascal => name.to_case(Case::Pascal),
        }
    }
}

#[derive(Default, Debug, Clone)]
pub struct TableOverride {
    pub name: Option<String>,
    pub primary_key: Option<String>,
    pub auto_increment: Option<bool>,
    pub sequence: Option<String>,
}

impl TableOverride {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }
    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = Some(auto_increment);
        self
    }
    pub fn sequence(mut self, sequence: impl Into<String>) -> Self {
        self.sequence = Some(sequence.into());
        self
    }
}

#[derive(Default, Clone)]
pub struct FieldOverride {
    pub column: Option<String>,
    pub ignore: bool,
    pub result_only: bool,
    pub force_utc: bool,
    pub from_db: Option<Converter>,
    pub to_db: Option<Converter>,
}

impl FieldOverride {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }
    pub fn result_only(mut self) -> Self {
        self.result_only = true;
        self
    }
    pub fn force_utc(mut self) -> Self {
        self.force_utc = true;
        self
    }
    pub fn from_db(mut self, f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.from_db = Some(Arc::new(f));
        self
    }
    pub fn to_db(mut self, f: impl Fn(Value) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.to_db = Some(Arc::new(f));
        self
    }
}

/// Default configuration: declarations first, then naming conventions.
///
/// The primary key is the declared one, else the field flagged as such, else a column named `id`.
/// Auto increment defaults to having a primary key.
#[derive(Default, Clone)]
pub struct ConventionMapper {
    pub table_naming: Naming,
    pub column_naming: Naming,
    tables: HashMap<TypeId, TableOverride>,
    fields: HashMap<(TypeId, &'static str), FieldOverride>,
}

impl ConventionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table_naming(mut self, naming: Naming) -> Self {
        self.table_naming = naming;
        self
    }

    pub fn column_naming(mut self, naming: Naming) -> Self {
        self.column_naming = naming;
        self
    }

    pub fn table<T: Record>(mut self, table: TableOverride) -> Self {
        self.tables.insert(TypeId::of::<T>(), table);
        self
    }

    pub fn field<T: Record>(mut self, field: &'static str, rule: FieldOverride) -> Self {
        self.fields.insert((TypeId::of::<T>(), field), rule);
        self
    }

    fn column_name(&self, record: &RecordInfo, field: &FieldInfo) -> String {
        self.fields
            .get(&(record.type_id, field.name))
            .and_then(|v| v.column.clone())
            .or_else(|| field.column.map(String::from))
            .unwrap_or_else(|| self.column_naming.apply(field.name))
    }
}

impl MappingConfig for ConventionMapper {
    fn table_info(&self, record: &RecordInfo) -> TableInfo {
        let table = self.tables.get(&record.type_id);
        let table_name = table
            .and_then(|v| v.name.clone())
            .or_else(|| record.table.name.map(String::from))
            .unwrap_or_else(|| {
                let name = record.name.rsplit("::").next().unwrap_or(record.name);
                self.table_naming.apply(name)
            });
        let columns = || {
            record
                .fields
                .iter()
                .filter(|f| !f.flags.ignore && f.field_type.record().is_none())
        };
        let primary_key = table
            .and_then(|v| v.primary_key.clone())
            .or_else(|| record.table.primary_key.map(String::from))
            .or_else(|| {
                columns()
                    .find(|f| f.flags.primary_key)
                    .map(|f| self.column_name(record, f))
            })
            .or_else(|| {
                columns()
                    .map(|f| self.column_name(record, f))
                    .find(|c| c.eq_ignore_ascii_case("id"))
            });
        let auto_increment = table
            .and_then(|v| v.auto_increment)
            .or(record.table.auto_increment)
            .unwrap_or(primary_key.is_some());
        let sequence = table
            .and_then(|v| v.sequence.clone())
            .or_else(|| record.table.sequence.map(String::from));
        TableInfo {
            table_name,
            primary_key,
            auto_increment,
            sequence,
        }
    }

    fn column_rule(&self, record: &RecordInfo, field: &FieldInfo) -> Option<ColumnRule> {
        let custom = self.fields.get(&(record.type_id, field.name));
        if field.flags.ignore || custom.is_some_and(|v| v.ignore) {
            return None;
        }
        let mut flags = field.flags;
        if let Some(custom) = custom {
            flags.result_only |= custom.result_only;
            flags.force_utc |= custom.force_utc;
        }
        Some(ColumnRule {
            column: self.column_name(record, field),
            flags,
            from_db: custom.and_then(|v| v.from_db.clone()),
            to_db: custom.and_then(|v| v.to_db.clone()),
        })
    }
}

impl Debug for ConventionMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("table_naming", &self.table_naming)
            .field("column_naming", &self.column_naming)
            .field("tables", &self.tables.len())
            .field("fields", &self.fields.len())
            .finish()
    }
}
