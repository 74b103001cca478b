use crate::{Error, Parse, Result, Value, truncate_long};
use anyhow::Context;
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::any;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use uuid::Uuid;

/// Conversion between a Rust type and its [`Value`] representation.
///
/// `try_from_value` accepts the canonical variant and, where it cannot lose information,
/// the other variants a driver may report for the same column (wider or narrower integers,
/// decimals without fraction, text).
pub trait AsValue {
    /// The typed null, used as type token.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} value `{}` to {}",
        value.type_name(),
        truncate_long!(value.to_string()),
        any::type_name::<T>(),
    ))
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                let wide = match value {
                    $destination(Some(v)) => return Ok(v),
                    Value::Boolean(Some(v)) => v as i128,
                    Value::Decimal(Some(v)) if v.fract().is_zero() => {
                        v.to_i128().ok_or_else(|| mismatch::<Self>(&value))?
                    }
                    Value::Float64(Some(v)) if v.fract() == 0.0 && v.is_finite() => v as i128,
                    Value::Float32(Some(v)) if v.fract() == 0.0 && v.is_finite() => v as i128,
                    Value::Varchar(Some(ref v)) => {
                        return v.trim().parse::<$source>().with_context(|| {
                            format!(
                                "Cannot parse `{}` as {}",
                                truncate_long!(v),
                                any::type_name::<Self>()
                            )
                        });
                    }
                    ref v if v.is_integral() => v.as_i128().ok_or_else(|| mismatch::<Self>(v))?,
                    _ => return Err(mismatch::<Self>(&value)),
                };
                <$source>::try_from(wide).map_err(|_| {
                    Error::msg(format!(
                        "Value {wide} is out of range for {}",
                        any::type_name::<Self>(),
                    ))
                })
            }
        }
    };
}

impl_as_value_integer!(i8, Value::Int8);
impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);
impl_as_value_integer!(u8, Value::UInt8);
impl_as_value_integer!(u16, Value::UInt16);
impl_as_value_integer!(u32, Value::UInt32);
impl_as_value_integer!(u64, Value::UInt64);

macro_rules! impl_as_value_float {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    #[allow(unreachable_patterns)]
                    Value::Float32(Some(v)) => Ok(v as _),
                    #[allow(unreachable_patterns)]
                    Value::Float64(Some(v)) => Ok(v as _),
                    Value::Decimal(Some(v)) => v
                        .to_f64()
                        .map(|v| v as _)
                        .ok_or_else(|| mismatch::<Self>(&value)),
                    Value::Varchar(Some(ref v)) => v.trim().parse::<$source>().with_context(|| {
                        format!(
                            "Cannot parse `{}` as {}",
                            truncate_long!(v),
                            any::type_name::<Self>()
                        )
                    }),
                    ref v if v.is_integral() => v
                        .as_i128()
                        .map(|v| v as _)
                        .ok_or_else(|| mismatch::<Self>(v)),
                    _ => Err(mismatch::<Self>(&value)),
                }
            }
        }
    };
}

impl_as_value_float!(f32, Value::Float32);
impl_as_value_float!(f64, Value::Float64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => match v.trim() {
                s if s.eq_ignore_ascii_case("true") || s == "1" => Ok(true),
                s if s.eq_ignore_ascii_case("false") || s == "0" => Ok(false),
                _ => Err(mismatch::<Self>(&value)),
            },
            ref v if v.is_integral() => Ok(v.as_i128() != Some(0)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for char {
    fn as_empty_value() -> Value {
        Value::Char(None)
    }
    fn as_value(self) -> Value {
        Value::Char(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Char(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) if v.chars().count() == 1 => {
                v.chars().next().ok_or_else(|| mismatch::<Self>(&value))
            }
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Blob(Some(v)) => {
                String::from_utf8(v.into_vec()).context("Blob is not valid UTF-8")
            }
            Value::Uuid(Some(v)) => Ok(v.hyphenated().to_string()),
            v if !v.is_null() => Ok(v.to_string()),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Float32(Some(v)) => Decimal::from_f32(v).ok_or_else(|| mismatch::<Self>(&value)),
            Value::Float64(Some(v)) => Decimal::from_f64(v).ok_or_else(|| mismatch::<Self>(&value)),
            Value::Varchar(Some(ref v)) => v
                .trim()
                .parse::<Decimal>()
                .with_context(|| format!("Cannot parse `{}` as Decimal", truncate_long!(v))),
            ref v if v.is_integral() => v
                .as_i128()
                .and_then(Decimal::from_i128)
                .ok_or_else(|| mismatch::<Self>(v)),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
            Value::Uuid(Some(v)) => Ok(v.into_bytes().to_vec().into_boxed_slice()),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        <Box<[u8]>>::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.date()),
            Value::TimestampWithTimezone(Some(v)) => Ok(v.date()),
            Value::Varchar(Some(v)) => <Self as Parse>::parse(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Time {
    fn as_empty_value() -> Value {
        Value::Time(None)
    }
    fn as_value(self) -> Value {
        Value::Time(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.time()),
            Value::Varchar(Some(v)) => <Self as Parse>::parse(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v)) => Ok(v),
            Value::TimestampWithTimezone(Some(v)) => {
                let v = v.to_offset(UtcOffset::UTC);
                Ok(PrimitiveDateTime::new(v.date(), v.time()))
            }
            Value::Date(Some(v)) => Ok(v.midnight()),
            Value::Varchar(Some(v)) => <Self as Parse>::parse(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for OffsetDateTime {
    fn as_empty_value() -> Value {
        Value::TimestampWithTimezone(None)
    }
    fn as_value(self) -> Value {
        Value::TimestampWithTimezone(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::TimestampWithTimezone(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.assume_utc()),
            Value::Varchar(Some(v)) => <Self as Parse>::parse(v),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Uuid::parse_str(v.trim())
                .with_context(|| format!("Cannot parse `{}` as Uuid", truncate_long!(v))),
            Value::Blob(Some(ref v)) => Uuid::from_slice(v).context("A Uuid blob must be 16 bytes"),
            _ => Err(mismatch::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        T::try_from_value(value).map(Box::new)
    }
}

/// Converts `value` to the type of `target`, keeping nulls typed.
///
/// A `Value::Null` target accepts anything.
pub fn coerce(value: Value, target: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(target.as_null());
    }
    if value.same_type(target) {
        return Ok(value);
    }
    Ok(match target {
        Value::Null => value,
        Value::Boolean(..) => bool::try_from_value(value)?.as_value(),
        Value::Int8(..) => i8::try_from_value(value)?.as_value(),
        Value::Int16(..) => i16::try_from_value(value)?.as_value(),
        Value::Int32(..) => i32::try_from_value(value)?.as_value(),
        Value::Int64(..) => i64::try_from_value(value)?.as_value(),
        Value::UInt8(..) => u8::try_from_value(value)?.as_value(),
        Value::UInt16(..) => u16::try_from_value(value)?.as_value(),
        Value::UInt32(..) => u32::try_from_value(value)?.as_value(),
        Value::UInt64(..) => u64::try_from_value(value)?.as_value(),
        Value::Float32(..) => f32::try_from_value(value)?.as_value(),
        Value::Float64(..) => f64::try_from_value(value)?.as_value(),
        Value::Decimal(..) => Decimal::try_from_value(value)?.as_value(),
        Value::Char(..) => char::try_from_value(value)?.as_value(),
        Value::Varchar(..) => String::try_from_value(value)?.as_value(),
        Value::Blob(..) => <Box<[u8]>>::try_from_value(value)?.as_value(),
        Value::Date(..) => Date::try_from_value(value)?.as_value(),
        Value::Time(..) => Time::try_from_value(value)?.as_value(),
        Value::Timestamp(..) => PrimitiveDateTime::try_from_value(value)?.as_value(),
        Value::TimestampWithTimezone(..) => OffsetDateTime::try_from_value(value)?.as_value(),
        Value::Uuid(..) => Uuid::try_from_value(value)?.as_value(),
    })
}
