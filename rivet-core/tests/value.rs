#[cfg(test)]
mod tests {
    use rivet_core::{AsValue, Value, coerce};
    use rust_decimal::Decimal;
    use time::{
        Date, OffsetDateTime, PrimitiveDateTime,
        macros::{date, datetime},
    };
    use uuid::Uuid;

    const TOKEN: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    #[test]
    fn value_none() {
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Int32(None), Value::Int32(None));
        assert_ne!(Value::Int32(None), Value::Int64(None));
        assert_ne!(Value::Null, Value::Int32(None));
        assert_ne!(Value::Float32(Some(1.0)), Value::Null);
        assert!(Value::Varchar(None).is_null());
        assert_eq!(Value::Uuid(None).to_string(), "NULL");
        assert_eq!(Value::Int64(Some(3)).type_name(), "BIGINT");
        assert_eq!(Value::from("abc"), Value::Varchar(Some("abc".into())));
    }

    #[test]
    fn value_bool() {
        let val: Value = true.into();
        assert_eq!(val, Value::Boolean(Some(true)));
        assert_ne!(val, Value::Varchar(Some("true".into())));
        assert!(bool::try_from_value(val).unwrap());
        assert!(bool::try_from_value(Value::Varchar(Some(" TRUE ".into()))).unwrap());
        assert!(!bool::try_from_value(Value::Varchar(Some("0".into()))).unwrap());
        assert!(!bool::try_from_value(Value::Int16(Some(0))).unwrap());
        assert!(bool::try_from_value(Value::UInt64(Some(7))).unwrap());
        assert!(bool::try_from_value(Value::Varchar(Some("yes".into()))).is_err());
        assert!(bool::try_from_value(Value::Float32(Some(0.5))).is_err());
    }

    #[test]
    fn value_integers() {
        assert_eq!(i8::try_from_value(Value::UInt8(Some(99))).unwrap(), 99);
        assert_eq!(i64::try_from_value(Value::Int32(Some(-5))).unwrap(), -5);
        assert_eq!(i32::try_from_value(Value::Boolean(Some(true))).unwrap(), 1);
        assert_eq!(u16::try_from_value(Value::Varchar(Some(" 42 ".into()))).unwrap(), 42);
        assert_eq!(i32::try_from_value(Value::Decimal(Some(Decimal::new(200, 2)))).unwrap(), 2);
        assert_eq!(i64::try_from_value(Value::Float64(Some(3.0))).unwrap(), 3);
        assert!(i32::try_from_value(Value::Decimal(Some(Decimal::new(25, 1)))).is_err());
        assert!(i64::try_from_value(Value::Float64(Some(3.5))).is_err());
        assert!(u32::try_from_value(Value::Varchar(Some("many".into()))).is_err());
        assert!(i32::try_from_value(Value::Date(Some(date!(2025 - 01 - 01)))).is_err());

        let error = i8::try_from_value(Value::Int64(Some(300))).unwrap_err();
        assert!(error.to_string().contains("out of range"), "{error}");
        assert!(u8::try_from_value(Value::Int32(Some(-1))).is_err());
    }

    #[test]
    fn value_floats() {
        assert_eq!(f64::try_from_value(Value::Int32(Some(2))).unwrap(), 2.0);
        assert_eq!(f64::try_from_value(Value::Float32(Some(0.5))).unwrap(), 0.5);
        assert_eq!(
            f32::try_from_value(Value::Decimal(Some(Decimal::new(125, 2)))).unwrap(),
            1.25
        );
        assert_eq!(f32::try_from_value(Value::Varchar(Some("1.5".into()))).unwrap(), 1.5);
        assert!(f64::try_from_value(Value::Boolean(Some(true))).is_err());
    }

    #[test]
    fn value_text() {
        assert_eq!(char::try_from_value(Value::Varchar(Some("x".into()))).unwrap(), 'x');
        assert!(char::try_from_value(Value::Varchar(Some("xy".into()))).is_err());
        assert_eq!(String::try_from_value(Value::Int32(Some(5))).unwrap(), "5");
        assert_eq!(
            String::try_from_value(Value::Uuid(Some(Uuid::parse_str(TOKEN).unwrap()))).unwrap(),
            TOKEN
        );
        assert_eq!(
            String::try_from_value(Value::Blob(Some(b"bytes".to_vec().into()))).unwrap(),
            "bytes"
        );
        assert!(String::try_from_value(Value::Blob(Some(vec![0xff, 0xfe].into()))).is_err());
        assert!(String::try_from_value(Value::Varchar(None)).is_err());
        assert_eq!(
            Vec::<u8>::try_from_value(Value::Varchar(Some("ab".into()))).unwrap(),
            b"ab"
        );
    }

    #[test]
    fn value_decimal() {
        assert_eq!(
            Decimal::try_from_value(Value::Varchar(Some("1.50".into()))).unwrap(),
            Decimal::new(150, 2)
        );
        assert_eq!(
            Decimal::try_from_value(Value::UInt64(Some(u64::MAX))).unwrap(),
            Decimal::from(u64::MAX)
        );
        assert_eq!(
            Decimal::try_from_value(Value::Float64(Some(0.25))).unwrap(),
            Decimal::new(25, 2)
        );
        assert!(Decimal::try_from_value(Value::Date(Some(date!(2025 - 01 - 01)))).is_err());
    }

    #[test]
    fn value_temporal() {
        assert_eq!(
            Date::try_from_value(Value::Timestamp(Some(datetime!(2025-03-01 10:00)))).unwrap(),
            date!(2025 - 03 - 01)
        );
        assert_eq!(
            PrimitiveDateTime::try_from_value(Value::TimestampWithTimezone(Some(
                datetime!(2025-03-01 10:00 +02:00)
            )))
            .unwrap(),
            datetime!(2025-03-01 08:00)
        );
        assert_eq!(
            PrimitiveDateTime::try_from_value(Value::Date(Some(date!(2025 - 03 - 01)))).unwrap(),
            datetime!(2025-03-01 00:00)
        );
        assert_eq!(
            OffsetDateTime::try_from_value(Value::Varchar(Some("2025-03-01T10:11:12Z".into())))
                .unwrap(),
            datetime!(2025-03-01 10:11:12 UTC)
        );
        assert_eq!(
            OffsetDateTime::try_from_value(Value::Timestamp(Some(datetime!(2025-03-01 10:00))))
                .unwrap(),
            datetime!(2025-03-01 10:00 UTC)
        );
        assert!(Date::try_from_value(Value::Varchar(Some("yesterday".into()))).is_err());
    }

    #[test]
    fn value_uuid() {
        let token = Uuid::parse_str(TOKEN).unwrap();
        assert_eq!(
            Uuid::try_from_value(Value::Varchar(Some(format!(" {TOKEN} ")))).unwrap(),
            token
        );
        assert_eq!(
            Uuid::try_from_value(Value::Blob(Some(token.as_bytes().to_vec().into()))).unwrap(),
            token
        );
        assert!(Uuid::try_from_value(Value::Blob(Some(vec![1, 2, 3].into()))).is_err());
    }

    #[test]
    fn value_option() {
        assert_eq!(Option::<i32>::try_from_value(Value::Int32(None)).unwrap(), None);
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i32>::try_from_value(Value::Int64(Some(4))).unwrap(),
            Some(4)
        );
        assert_eq!(None::<String>.as_value(), Value::Varchar(None));
        assert_eq!(Some(2u8).as_value(), Value::UInt8(Some(2)));
        assert_eq!(Option::<Uuid>::as_empty_value(), Value::Uuid(None));
    }

    #[test]
    fn value_coerce() {
        assert_eq!(
            coerce(Value::Int32(Some(1)), &Value::Int64(None)).unwrap(),
            Value::Int64(Some(1))
        );
        assert_eq!(
            coerce(Value::Varchar(None), &Value::Int64(None)).unwrap(),
            Value::Int64(None)
        );
        assert_eq!(
            coerce(Value::Varchar(Some("x".into())), &Value::Null).unwrap(),
            Value::Varchar(Some("x".into()))
        );
        assert_eq!(
            coerce(Value::Varchar(Some(TOKEN.into())), &Value::Uuid(None)).unwrap(),
            Value::Uuid(Some(Uuid::parse_str(TOKEN).unwrap()))
        );
        assert!(coerce(Value::Varchar(Some("x".into())), &Value::Int32(None)).is_err());
    }
}
