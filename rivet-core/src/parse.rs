use crate::{Error, Result, truncate_long};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

/// Text representation of temporal values, as returned by drivers that report dates as strings.
pub trait Parse {
    fn parse(value: impl AsRef<str>) -> Result<Self>
    where
        Self: Sized;
}

type Format = &'static [BorrowedFormatItem<'static>];

const DATE_FORMATS: &[Format] = &[format_description!("[year]-[month]-[day]")];

const TIME_FORMATS: &[Format] = &[
    format_description!("[hour]:[minute]:[second].[subsecond]"),
    format_description!("[hour]:[minute]:[second]"),
    format_description!("[hour]:[minute]"),
];

const DATETIME_FORMATS: &[Format] = &[
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
];

const OFFSET_FORMATS: &[Format] = &[
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]"
    ),
    format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
    ),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]"),
];

/// Both `2024-01-31T10:00` and `2024-01-31 10:00` are accepted.
fn normalize(value: &str) -> String {
    let mut value = value.trim().to_string();
    if value.len() > 10 && value.as_bytes()[10] == b'T' {
        value.replace_range(10..11, " ");
    }
    value
}

fn first_match<T, E>(
    value: &str,
    formats: &[Format],
    parse: impl Fn(&str, Format) -> std::result::Result<T, E>,
    target: &str,
) -> Result<T> {
    formats
        .iter()
        .find_map(|f| parse(value, *f).ok())
        .ok_or_else(|| Error::msg(format!("Cannot parse `{}` as {target}", truncate_long!(value))))
}

impl Parse for Date {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        first_match(
            value.get(..10).unwrap_or(value),
            DATE_FORMATS,
            |v, f| Date::parse(v, f),
            "time::Date",
        )
    }
}

impl Parse for Time {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        first_match(
            value.as_ref().trim(),
            TIME_FORMATS,
            |v, f| Time::parse(v, f),
            "time::Time",
        )
    }
}

impl Parse for PrimitiveDateTime {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        first_match(
            &normalize(value.as_ref()),
            DATETIME_FORMATS,
            |v, f| PrimitiveDateTime::parse(v, f),
            "time::PrimitiveDateTime",
        )
    }
}

impl Parse for OffsetDateTime {
    fn parse(value: impl AsRef<str>) -> Result<Self> {
        let value = value.as_ref().trim();
        if let Ok(v) = OffsetDateTime::parse(value, &Rfc3339) {
            return Ok(v);
        }
        let normalized = normalize(value);
        first_match(
            &normalized,
            OFFSET_FORMATS,
            |v, f| OffsetDateTime::parse(v, f),
            "time::OffsetDateTime",
        )
        .or_else(|e| {
            // No offset at all is read as UTC
            <PrimitiveDateTime as Parse>::parse(&normalized)
                .map(|v| v.assume_offset(UtcOffset::UTC))
                .map_err(|_| e)
        })
    }
}
