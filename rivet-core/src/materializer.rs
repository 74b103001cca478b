use crate::{
    ColumnDesc, Converter, DynamicRow, Error, FieldAccess, FieldType, FromRow, MapperState,
    MappingError, Result, ScalarTarget, Setter, TargetKind, TypeMetadata, Value,
    resolve_converter,
};
use anyhow::Context;
use std::{
    any::{Any, type_name},
    fmt::{self, Debug},
    mem,
    sync::Arc,
};

/// Output of a [`Materializer`]: a typed instance or an open key value record.
pub enum Materialized {
    Fixed(Box<dyn Any + Send>),
    Open(DynamicRow),
}

impl Materialized {
    pub fn downcast<T: FromRow>(self) -> Result<T> {
        match self {
            Materialized::Fixed(v) => v
                .downcast::<T>()
                .map(|v| *v)
                .map_err(|_| {
                    Error::msg(format!(
                        "Materialized value is not a {}",
                        type_name::<T>()
                    ))
                }),
            Materialized::Open(row) => match T::kind() {
                TargetKind::Open(f) => Ok(f(row)),
                _ => Err(Error::msg(format!(
                    "An open record cannot be read as {}",
                    type_name::<T>()
                ))),
            },
        }
    }

    /// Type erased instance, the form the multi record engine links.
    pub fn into_any(self) -> Box<dyn Any + Send> {
        match self {
            Materialized::Fixed(v) => v,
            Materialized::Open(row) => Box::new(row),
        }
    }
}

impl Debug for Materialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Materialized::Fixed(..) => f.write_str("Fixed(..)"),
            Materialized::Open(row) => f.debug_tuple("Open").field(row).finish(),
        }
    }
}

/// Builds one instance out of a contiguous range of columns.
///
/// Column lookups and conversion decisions are made once, when the materializer is built.
pub trait Materializer: Send + Sync {
    /// The range of the result shape this materializer was built for.
    fn columns(&self) -> &[ColumnDesc];
    /// `row` is the range of the current row, values are taken out of it.
    fn materialize(&self, row: &mut [Value]) -> Result<Materialized>;
}

impl Debug for dyn Materializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.columns().iter().map(|c| &c.name))
            .finish()
    }
}

struct Slot<T> {
    index: usize,
    set: Setter<T>,
    nullable: bool,
    converter: Option<Converter>,
}

struct RecordMaterializer<T> {
    record: &'static str,
    columns: Box<[ColumnDesc]>,
    new: fn() -> T,
    slots: Box<[Slot<T>]>,
    after_load: Option<fn(&mut T)>,
}

impl<T: Send + 'static> RecordMaterializer<T> {
    fn build(metadata: &TypeMetadata<T>, new: fn() -> T, columns: &[ColumnDesc]) -> Result<Self> {
        let mut slots = Vec::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            let Some(binding) = metadata.column(&column.name) else {
                continue;
            };
            let set = match binding.access {
                FieldAccess::Set(set) => set,
                _ => {
                    return Err(MappingError::NoSetter {
                        record: metadata.record,
                        field: binding.field,
                        column: column.name.clone(),
                    }
                    .into());
                }
            };
            slots.push(Slot {
                index,
                set,
                nullable: binding.nullable,
                converter: resolve_converter(
                    binding.from_db.as_ref(),
                    &column.kind,
                    &binding.field_type,
                    binding.flags.force_utc,
                ),
            });
        }
        Ok(Self {
            record: metadata.record,
            columns: columns.into(),
            new,
            slots: slots.into(),
            after_load: metadata.after_load,
        })
    }
}

impl<T: Send + 'static> Materializer for RecordMaterializer<T> {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn materialize(&self, row: &mut [Value]) -> Result<Materialized> {
        let mut record = (self.new)();
        for slot in &self.slots {
            let column = &self.columns[slot.index].name;
            let value = row.get_mut(slot.index).map(mem::take).ok_or_else(|| {
                Error::msg(format!(
                    "Row has no value for column `{column}` of {}",
                    self.record
                ))
            })?;
            if value.is_null() {
                if slot.nullable {
                    (slot.set)(&mut record, value)?;
                }
                continue;
            }
            let value = match &slot.converter {
                Some(f) => f(value),
                None => Ok(value),
            };
            value
                .and_then(|v| (slot.set)(&mut record, v))
                .with_context(|| format!("Cannot read column `{column}` into {}", self.record))?;
        }
        if let Some(after_load) = self.after_load {
            after_load(&mut record);
        }
        Ok(Materialized::Fixed(Box::new(record)))
    }
}

struct ScalarMaterializer<T> {
    columns: Box<[ColumnDesc]>,
    target: ScalarTarget<T>,
    converter: Option<Converter>,
}

impl<T: Send + 'static> Materializer for ScalarMaterializer<T> {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn materialize(&self, row: &mut [Value]) -> Result<Materialized> {
        let value = row.first_mut().map(mem::take).unwrap_or_default();
        if value.is_null() && !self.target.nullable {
            return Err(MappingError::NullIntoNonNullable {
                column: self
                    .columns
                    .first()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                target: type_name::<T>(),
            }
            .into());
        }
        let value = match &self.converter {
            Some(f) if !value.is_null() => f(value)?,
            _ => value,
        };
        Ok(Materialized::Fixed(Box::new((self.target.from_value)(value)?)))
    }
}

struct OpenMaterializer {
    columns: Box<[ColumnDesc]>,
}

impl Materializer for OpenMaterializer {
    fn columns(&self) -> &[ColumnDesc] {
        &self.columns
    }

    fn materialize(&self, row: &mut [Value]) -> Result<Materialized> {
        let mut result = DynamicRow::new();
        for (column, value) in self.columns.iter().zip(row.iter_mut()) {
            result.insert(column.name.clone(), mem::take(value));
        }
        Ok(Materialized::Open(result))
    }
}

/// Builds the materializer of `T` for `columns`, a range of the result shape.
pub fn build_materializer<T: FromRow>(
    state: &MapperState,
    columns: &[ColumnDesc],
) -> Result<Arc<dyn Materializer>> {
    Ok(match T::kind() {
        TargetKind::Record(def) => {
            let metadata = state.metadata_for(def)?;
            Arc::new(RecordMaterializer::build(&metadata, def.new, columns)?)
        }
        TargetKind::Scalar(target) => {
            let column = columns.first().ok_or_else(|| {
                Error::msg(format!("No column left to read {}", type_name::<T>()))
            })?;
            if let FieldType::Record(r) = target.field_type {
                return Err(Error::msg(format!(
                    "{} is a record and cannot be read from the single column `{}`",
                    r.name, column.name
                )));
            }
            let converter = resolve_converter(None, &column.kind, &target.field_type, false);
            Arc::new(ScalarMaterializer {
                columns: columns.into(),
                target,
                converter,
            })
        }
        TargetKind::Open(..) => Arc::new(OpenMaterializer {
            columns: columns.into(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        ColumnDesc, ErrorKind, Mapper, MappingError, Value, error_kind,
        testing::{Item, ReadOnlyItem, shape},
    };

    #[test]
    fn record_from_row() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[
            ("ID", Value::Int64(None)),
            ("name", Value::Varchar(None)),
            ("extra", Value::Int32(None)),
            ("hits", Value::Int64(None)),
        ]);
        let m = super::build_materializer::<Item>(&state, &columns).unwrap();
        let mut row = vec![
            Value::Int64(Some(7)),
            Value::Varchar(Some("seven".into())),
            Value::Int32(Some(0)),
            Value::Int64(Some(3)),
        ];
        let item: Item = m.materialize(&mut row).unwrap().downcast().unwrap();
        assert_eq!(item.id, 7);
        assert_eq!(item.name.as_deref(), Some("seven"));
        assert_eq!(item.hits, 3);
        assert_eq!(item.loads, 1);
    }

    #[test]
    fn nulls_bypass_conversion() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[
            ("id", Value::Varchar(None)),
            ("name", Value::Varchar(None)),
            ("hits", Value::Varchar(None)),
        ]);
        let m = super::build_materializer::<Item>(&state, &columns).unwrap();
        let mut row = vec![
            Value::Varchar(Some("12".into())),
            Value::Varchar(None),
            Value::Null,
        ];
        let item: Item = m.materialize(&mut row).unwrap().downcast().unwrap();
        assert_eq!(item.id, 12);
        assert_eq!(item.name, None);
        assert_eq!(item.hits, 0);
    }

    #[test]
    fn short_row_is_an_error() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[("id", Value::Int64(None)), ("name", Value::Varchar(None))]);
        let m = super::build_materializer::<Item>(&state, &columns).unwrap();
        let error = m.materialize(&mut [Value::Int64(Some(1))]).unwrap_err();
        assert!(error.to_string().contains("`name`"), "{error}");
    }

    #[test]
    fn read_only_field_fails_at_build() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[("id", Value::Int64(None)), ("code", Value::Varchar(None))]);
        let error = super::build_materializer::<ReadOnlyItem>(&state, &columns).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::NoSetter { field: "code", .. })
        ));
        assert_eq!(error_kind(&error), ErrorKind::Configuration);
        // Not selecting the column is fine
        assert!(super::build_materializer::<ReadOnlyItem>(&state, &columns[..1]).is_ok());
    }

    #[test]
    fn scalars() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = [ColumnDesc::new("n", Value::Int32(None))];
        let m = super::build_materializer::<i64>(&state, &columns).unwrap();
        let v: i64 = m
            .materialize(&mut [Value::Int32(Some(5))])
            .unwrap()
            .downcast()
            .unwrap();
        assert_eq!(v, 5);
        let error = m.materialize(&mut [Value::Int32(None)]).unwrap_err();
        assert_eq!(error_kind(&error), ErrorKind::Conversion);
        let m = super::build_materializer::<Option<i64>>(&state, &columns).unwrap();
        let v: Option<i64> = m
            .materialize(&mut [Value::Int32(None)])
            .unwrap()
            .downcast()
            .unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn open_records() {
        let mapper = Mapper::default();
        let state = mapper.snapshot();
        let columns = shape(&[("a", Value::Null), ("B", Value::Null)]);
        let m = super::build_materializer::<crate::DynamicRow>(&state, &columns).unwrap();
        let row: crate::DynamicRow = m
            .materialize(&mut [Value::Int8(Some(1)), Value::Boolean(Some(true))])
            .unwrap()
            .downcast()
            .unwrap();
        assert_eq!(row.get("b"), Some(&Value::Boolean(Some(true))));
        assert_eq!(row.len(), 2);
    }
}
