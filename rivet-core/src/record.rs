use crate::{AsValue, Error, Result, Value, coerce};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::any::{Any, TypeId, type_name};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Identity of a record type used as field, the target of an automatic join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordRef {
    pub type_id: TypeId,
    pub name: &'static str,
}

impl RecordRef {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// What a field stores.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A column value, the payload is the type token.
    Value(Value),
    Enum(&'static EnumDef),
    /// Another record, filled by the multi record engine rather than from a column.
    Record(RecordRef),
}

impl FieldType {
    pub fn record(&self) -> Option<&RecordRef> {
        match self {
            FieldType::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// A type that can be stored in a record field.
pub trait FieldValue: Sized + Send + 'static {
    fn field_type() -> FieldType;
    /// Whether a database null has a representation in this type.
    fn nullable() -> bool {
        false
    }
    fn from_value(value: Value) -> Result<Self>;
    fn to_value(&self) -> Value;
    /// Builds the field from a record materialized for another part of the row.
    fn from_linked(linked: Box<dyn Any + Send>) -> Result<Self> {
        drop(linked);
        Err(Error::msg(format!(
            "{} cannot be assigned from a linked record",
            type_name::<Self>()
        )))
    }
}

macro_rules! impl_field_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn field_type() -> FieldType {
                    FieldType::Value(<$ty as AsValue>::as_empty_value())
                }
                fn from_value(value: Value) -> Result<Self> {
                    <$ty as AsValue>::try_from_value(value)
                }
                fn to_value(&self) -> Value {
                    self.clone().as_value()
                }
            }
            impl FromRow for $ty {
                fn kind() -> TargetKind<Self> {
                    TargetKind::Scalar(ScalarTarget::<Self>::of())
                }
            }
        )+
    };
}

impl_field_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    char,
    String,
    Decimal,
    Box<[u8]>,
    Vec<u8>,
    Date,
    Time,
    PrimitiveDateTime,
    OffsetDateTime,
    Uuid,
);

impl FieldValue for Value {
    fn field_type() -> FieldType {
        FieldType::Value(Value::Null)
    }
    fn nullable() -> bool {
        true
    }
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromRow for Value {
    fn kind() -> TargetKind<Self> {
        TargetKind::Scalar(ScalarTarget::<Self>::of())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }
    fn nullable() -> bool {
        true
    }
    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => match T::field_type() {
                FieldType::Value(v) => v.as_null(),
                FieldType::Enum(def) => def.repr.as_null(),
                FieldType::Record(..) => Value::Null,
            },
        }
    }
    fn from_linked(linked: Box<dyn Any + Send>) -> Result<Self> {
        T::from_linked(linked).map(Some)
    }
}

impl<T: FieldValue> FromRow for Option<T> {
    fn kind() -> TargetKind<Self> {
        TargetKind::Scalar(ScalarTarget::<Self>::of())
    }
}

impl<T: FieldValue> FieldValue for Box<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }
    fn nullable() -> bool {
        T::nullable()
    }
    fn from_value(value: Value) -> Result<Self> {
        T::from_value(value).map(Box::new)
    }
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
    fn from_linked(linked: Box<dyn Any + Send>) -> Result<Self> {
        T::from_linked(linked).map(Box::new)
    }
}

/// Recovers a record handed over by the multi record engine.
pub fn downcast_linked<T: 'static>(linked: Box<dyn Any + Send>) -> Result<T> {
    linked.downcast::<T>().map(|v| *v).map_err(|_| {
        Error::msg(format!(
            "Linked record is not a {}",
            type_name::<T>()
        ))
    })
}

pub type Setter<T> = fn(&mut T, Value) -> Result<()>;
pub type Linker<T> = fn(&mut T, Box<dyn Any + Send>) -> Result<()>;

/// How a field is written.
pub enum FieldAccess<T> {
    Set(Setter<T>),
    Link(Linker<T>),
    ReadOnly,
}

impl<T> Clone for FieldAccess<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for FieldAccess<T> {}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFlags {
    pub primary_key: bool,
    /// Read from queries, never written by insert or update.
    pub result_only: bool,
    /// Result only column that is still part of generated select lists.
    pub auto_select: bool,
    /// Timestamps read from this column are UTC.
    pub force_utc: bool,
    /// Bind strings as non unicode.
    pub ansi: bool,
    /// Bind timestamps with the wide date time type.
    pub wide_datetime: bool,
    pub ignore: bool,
}

/// Declaration of one field, produced by `#[derive(Record)]`.
pub struct FieldDef<T> {
    pub name: &'static str,
    pub column: Option<&'static str>,
    pub field_type: FieldType,
    pub nullable: bool,
    pub flags: FieldFlags,
    pub access: FieldAccess<T>,
    pub get: fn(&T) -> Value,
    pub insert_template: Option<&'static str>,
    pub update_template: Option<&'static str>,
}

impl<T> FieldDef<T> {
    pub fn new<F: FieldValue>(
        name: &'static str,
        set: Setter<T>,
        link: Linker<T>,
        get: fn(&T) -> Value,
    ) -> Self {
        let field_type = F::field_type();
        let access = match field_type {
            FieldType::Record(..) => FieldAccess::Link(link),
            _ => FieldAccess::Set(set),
        };
        Self {
            name,
            column: None,
            field_type,
            nullable: F::nullable(),
            flags: FieldFlags::default(),
            access,
            get,
            insert_template: None,
            update_template: None,
        }
    }

    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    pub fn flags(mut self, flags: FieldFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.access = FieldAccess::ReadOnly;
        self
    }

    pub fn insert_template(mut self, template: &'static str) -> Self {
        self.insert_template = Some(template);
        self
    }

    pub fn update_template(mut self, template: &'static str) -> Self {
        self.update_template = Some(template);
        self
    }

    /// Declared column name, the field name when absent.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }
}

/// Table level declarations, everything left `None` is decided by the mapping configuration.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDecl {
    pub name: Option<&'static str>,
    pub primary_key: Option<&'static str>,
    pub auto_increment: Option<bool>,
    pub sequence: Option<&'static str>,
}

pub struct RecordDef<T> {
    pub name: &'static str,
    pub table: TableDecl,
    /// Fresh instance the columns are written into.
    pub new: fn() -> T,
    pub fields: Box<[FieldDef<T>]>,
    /// Runs once after every field of a freshly materialized instance is set.
    pub after_load: Option<fn(&mut T)>,
}

/// A type materialized from a set of columns.
pub trait Record: Default + Send + 'static {
    fn record_def() -> &'static RecordDef<Self>;
}

/// How a target type is built from its columns.
pub enum TargetKind<T: 'static> {
    Record(&'static RecordDef<T>),
    /// Built from exactly one column.
    Scalar(ScalarTarget<T>),
    /// Takes every column it is given.
    Open(fn(DynamicRow) -> T),
}

pub struct ScalarTarget<T> {
    pub field_type: FieldType,
    pub nullable: bool,
    pub from_value: fn(Value) -> Result<T>,
}

impl<T: FieldValue> ScalarTarget<T> {
    pub fn of() -> Self {
        Self {
            field_type: T::field_type(),
            nullable: T::nullable(),
            from_value: T::from_value,
        }
    }
}

/// A type a row (or a range of it) can be read into.
pub trait FromRow: Sized + Send + 'static {
    fn kind() -> TargetKind<Self>;
}

/// Declaration of a fieldless enumeration stored as integer.
#[derive(Debug, PartialEq)]
pub struct EnumDef {
    pub name: &'static str,
    /// Type token of the stored representation.
    pub repr: Value,
    pub variants: &'static [(&'static str, i64)],
}

impl EnumDef {
    pub fn by_name(&self, name: &str) -> Option<i64> {
        let name = name.trim();
        self.variants
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, discriminant: i64) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == discriminant)
            .map(|(n, _)| *n)
    }
}

/// Implemented by `#[derive(DbEnum)]`.
pub trait DbEnum: Sized + Copy + Send + 'static {
    fn enum_def() -> &'static EnumDef;
    fn from_discriminant(discriminant: i64) -> Option<Self>;
    fn discriminant(self) -> i64;
}

pub fn enum_from_value<E: DbEnum>(value: Value) -> Result<E> {
    let def = E::enum_def();
    let discriminant = match value {
        Value::Varchar(Some(ref v)) => def.by_name(v).or_else(|| v.trim().parse().ok()),
        Value::Char(Some(v)) => def.by_name(v.encode_utf8(&mut [0; 4])),
        ref v => v.as_i128().and_then(|v| i64::try_from(v).ok()),
    };
    discriminant
        .and_then(E::from_discriminant)
        .ok_or_else(|| Error::msg(format!("`{value}` is not a valid {}", def.name)))
}

pub fn enum_to_value<E: DbEnum>(value: E) -> Value {
    let discriminant = Value::Int64(Some(value.discriminant()));
    coerce(discriminant.clone(), &E::enum_def().repr).unwrap_or(discriminant)
}

/// Record with a column set only known at run time.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct DynamicRow(IndexMap<String, Value>);

impl DynamicRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the position of an existing column.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(column.into(), value)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }
}

impl FromRow for DynamicRow {
    fn kind() -> TargetKind<Self> {
        TargetKind::Open(|row| row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Color {
        Red = 1,
        Blue = 4,
    }

    static COLOR: EnumDef = EnumDef {
        name: "Color",
        repr: Value::Int16(None),
        variants: &[("Red", Color::Red as i64), ("Blue", Color::Blue as i64)],
    };

    impl DbEnum for Color {
        fn enum_def() -> &'static EnumDef {
            &COLOR
        }
        fn from_discriminant(discriminant: i64) -> Option<Self> {
            match discriminant {
                1 => Some(Color::Red),
                4 => Some(Color::Blue),
                _ => None,
            }
        }
        fn discriminant(self) -> i64 {
            self as i64
        }
    }

    #[test]
    fn enum_conversion() {
        assert_eq!(
            enum_from_value::<Color>(Value::Int32(Some(4))).unwrap(),
            Color::Blue
        );
        assert_eq!(
            enum_from_value::<Color>(Value::Varchar(Some("red".into()))).unwrap(),
            Color::Red
        );
        assert!(enum_from_value::<Color>(Value::Int32(Some(2))).is_err());
        assert_eq!(enum_to_value(Color::Blue), Value::Int16(Some(4)));
    }

    #[test]
    fn optional_fields() {
        assert_eq!(<Option<i32>>::from_value(Value::Int64(None)).unwrap(), None);
        assert_eq!(
            <Option<i32>>::from_value(Value::Int64(Some(7))).unwrap(),
            Some(7)
        );
        assert_eq!(None::<String>.to_value(), Value::Varchar(None));
        assert!(<Option<u8>>::nullable());
        assert!(!u8::nullable());
    }

    #[test]
    fn dynamic_row_lookup() {
        let mut row = DynamicRow::new();
        row.insert("Id", Value::Int32(Some(1)));
        row.insert("name", Value::Varchar(Some("A".into())));
        assert_eq!(row.get("ID"), Some(&Value::Int32(Some(1))));
        assert_eq!(row.columns().collect::<Vec<_>>(), ["Id", "name"]);
    }
}
