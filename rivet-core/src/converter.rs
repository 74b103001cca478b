use crate::{Converter, EnumDef, Error, FieldType, Result, Value, coerce};
use std::sync::Arc;
use time::{PrimitiveDateTime, UtcOffset};

/// Decides how a column value of type `source` reaches a field of type `destination`.
///
/// Returns `None` when the value can be stored as read. Nulls never reach the returned function,
/// the caller stores the field's null representation instead.
///
/// The first matching rule wins:
/// 1. the custom converter of the field
/// 2. forced UTC for timestamp fields
/// 3. enumerations from integers, then from names
/// 4. no conversion when the types already agree
/// 5. text to and from uuid
/// 6. generic coercion to the field type
pub fn resolve_converter(
    custom: Option<&Converter>,
    source: &Value,
    destination: &FieldType,
    force_utc: bool,
) -> Option<Converter> {
    if let Some(custom) = custom {
        return Some(custom.clone());
    }
    let target = match destination {
        FieldType::Record(..) => return None,
        FieldType::Enum(def) => return Some(enum_converter(def, source)),
        FieldType::Value(target) => target,
    };
    if force_utc && matches!(target, Value::Timestamp(..) | Value::TimestampWithTimezone(..)) {
        let target = target.as_null();
        return Some(Arc::new(move |v: Value| to_utc(v, &target)));
    }
    if matches!(target, Value::Null) || source.same_type(target) {
        return None;
    }
    match (source, target) {
        (Value::Varchar(..), Value::Uuid(..)) => Some(Arc::new(|v: Value| match v {
            Value::Varchar(Some(ref s)) => uuid::Uuid::parse_str(s.trim())
                .map(|u| Value::Uuid(Some(u)))
                .map_err(|e| Error::msg(format!("Cannot read `{s}` as uuid: {e}"))),
            v => coerce(v, &Value::Uuid(None)),
        })),
        (Value::Uuid(..), Value::Varchar(..)) => Some(Arc::new(|v: Value| match v {
            Value::Uuid(Some(u)) => Ok(Value::Varchar(Some(u.hyphenated().to_string()))),
            v => coerce(v, &Value::Varchar(None)),
        })),
        _ => {
            let target = target.as_null();
            Some(Arc::new(move |v: Value| coerce(v, &target)))
        }
    }
}

fn enum_converter(def: &'static EnumDef, source: &Value) -> Converter {
    let from_integer = move |v: Value| coerce(v, &def.repr);
    let from_name = move |v: Value| {
        let Value::Varchar(Some(ref name)) = v else {
            return coerce(v, &def.repr);
        };
        match def.by_name(name) {
            Some(discriminant) => coerce(Value::Int64(Some(discriminant)), &def.repr),
            None => Err(Error::msg(format!("`{name}` is not a variant of {}", def.name))),
        }
    };
    if source.is_integral() {
        Arc::new(from_integer)
    } else if source.is_textual() {
        Arc::new(move |v: Value| from_name(coerce(v, &Value::Varchar(None))?))
    } else {
        // Undeclared source type, decided per value
        Arc::new(move |v: Value| {
            if v.is_textual() {
                from_name(coerce(v, &Value::Varchar(None))?)
            } else {
                from_integer(v)
            }
        })
    }
}

fn to_utc(value: Value, target: &Value) -> Result<Value> {
    let value = match value {
        Value::Varchar(..) | Value::Date(..) => coerce(value, target)?,
        v => v,
    };
    Ok(match (value, target) {
        (Value::Timestamp(v), Value::Timestamp(..)) => Value::Timestamp(v),
        (Value::Timestamp(v), _) => Value::TimestampWithTimezone(v.map(|v| v.assume_utc())),
        (Value::TimestampWithTimezone(v), Value::Timestamp(..)) => Value::Timestamp(v.map(|v| {
            let v = v.to_offset(UtcOffset::UTC);
            PrimitiveDateTime::new(v.date(), v.time())
        })),
        (Value::TimestampWithTimezone(v), _) => {
            Value::TimestampWithTimezone(v.map(|v| v.to_offset(UtcOffset::UTC)))
        }
        (v, target) => coerce(v, target)?,
    })
}
