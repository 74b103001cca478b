use crate::{
    Converter, FieldAccess, FieldFlags, FieldType, Linker, MappingConfig, MappingError,
    RecordDef, RecordInfo, RecordRef, Result, TableInfo, Value, resolve_converter,
};
use indexmap::IndexMap;
use std::fmt::{self, Debug};

/// Column to field binding of one record type.
pub struct FieldBinding<T> {
    pub column: String,
    pub field: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub flags: FieldFlags,
    pub access: FieldAccess<T>,
    pub get: fn(&T) -> Value,
    pub insert_template: Option<&'static str>,
    pub update_template: Option<&'static str>,
    pub from_db: Option<Converter>,
    pub to_db: Option<Converter>,
}

impl<T> FieldBinding<T> {
    /// Written by insert and update statements.
    pub fn is_writable(&self) -> bool {
        !self.flags.result_only
    }

    /// Part of a generated select list.
    pub fn is_selected(&self) -> bool {
        !self.flags.result_only || self.flags.auto_select
    }
}

/// Field holding another record, wired by the multi record engine.
pub struct LinkBinding<T> {
    pub field: &'static str,
    pub target: RecordRef,
    /// `None` when the field is read only.
    pub link: Option<Linker<T>>,
}

/// Anything that can tell whether a column belongs to it.
pub trait ColumnSet: Send + Sync {
    fn owns(&self, column: &str) -> bool;
}

/// Resolved mapping of one record type under one configuration, immutable once built.
pub struct TypeMetadata<T> {
    pub record: &'static str,
    pub table: TableInfo,
    columns: IndexMap<String, FieldBinding<T>>,
    links: Vec<LinkBinding<T>>,
    pub after_load: Option<fn(&mut T)>,
}

impl<T: Send + 'static> TypeMetadata<T> {
    pub fn build(def: &'static RecordDef<T>, config: &dyn MappingConfig) -> Result<Self> {
        let info = RecordInfo::of(def);
        let table = config.table_info(&info);
        let mut columns = IndexMap::with_capacity(def.fields.len());
        let mut links = Vec::new();
        for (field, field_info) in def.fields.iter().zip(&info.fields) {
            let Some(rule) = config.column_rule(&info, field_info) else {
                continue;
            };
            if let FieldType::Record(target) = field.field_type {
                links.push(LinkBinding {
                    field: field.name,
                    target,
                    link: match field.access {
                        FieldAccess::Link(f) => Some(f),
                        _ => None,
                    },
                });
                continue;
            }
            let key = rule.column.to_lowercase();
            if columns.contains_key(&key) {
                return Err(MappingError::DuplicateColumn {
                    record: def.name,
                    column: rule.column,
                }
                .into());
            }
            let mut flags = rule.flags;
            flags.primary_key = table
                .primary_key
                .as_deref()
                .is_some_and(|pk| pk.eq_ignore_ascii_case(&rule.column));
            columns.insert(
                key,
                FieldBinding {
                    column: rule.column,
                    field: field.name,
                    field_type: field.field_type.clone(),
                    nullable: field.nullable,
                    flags,
                    access: field.access,
                    get: field.get,
                    insert_template: field.insert_template,
                    update_template: field.update_template,
                    from_db: rule.from_db,
                    to_db: rule.to_db,
                },
            );
        }
        log::debug!(
            "Built metadata for {} (table {}, {} columns, {} links)",
            def.name,
            table.table_name,
            columns.len(),
            links.len()
        );
        Ok(Self {
            record: def.name,
            table,
            columns,
            links,
            after_load: def.after_load,
        })
    }

    /// Case insensitive.
    pub fn column(&self, name: &str) -> Option<&FieldBinding<T>> {
        self.columns
            .get(name)
            .or_else(|| self.columns.get(&name.to_lowercase()))
    }

    pub fn columns(&self) -> impl Iterator<Item = &FieldBinding<T>> {
        self.columns.values()
    }

    pub fn links(&self) -> &[LinkBinding<T>] {
        &self.links
    }

    pub fn primary_key(&self) -> Result<&FieldBinding<T>> {
        self.table
            .primary_key
            .as_deref()
            .and_then(|pk| self.column(pk))
            .ok_or_else(|| MappingError::MissingPrimaryKey { record: self.record }.into())
    }

    /// Value to bind for `binding`, after the custom `to_db` converter.
    pub fn value_of(&self, record: &T, binding: &FieldBinding<T>) -> Result<Value> {
        let value = (binding.get)(record);
        match &binding.to_db {
            Some(f) => f(value),
            None => Ok(value),
        }
    }

    /// Stores a generated key into the primary key field.
    pub fn set_primary_key(&self, record: &mut T, value: Value) -> Result<()> {
        let binding = self.primary_key()?;
        let FieldAccess::Set(set) = binding.access else {
            return Err(MappingError::NoSetter {
                record: self.record,
                field: binding.field,
                column: binding.column.clone(),
            }
            .into());
        };
        if value.is_null() {
            return if binding.nullable { set(record, value) } else { Ok(()) };
        }
        let value = match resolve_converter(
            binding.from_db.as_ref(),
            &value,
            &binding.field_type,
            binding.flags.force_utc,
        ) {
            Some(f) => f(value)?,
            None => value,
        };
        set(record, value)
    }
}

impl<T: Send + 'static> ColumnSet for TypeMetadata<T> {
    fn owns(&self, column: &str) -> bool {
        self.column(column).is_some()
    }
}

impl<T> Debug for TypeMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("record", &self.record)
            .field("table", &self.table)
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .field(
                "links",
                &self.links.iter().map(|v| v.field).collect::<Vec<_>>(),
            )
            .finish()
    }
}
