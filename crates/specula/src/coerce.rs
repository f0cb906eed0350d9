//! Conversion of raw operands into values of a field's declared type.
//!
//! Coercion is always driven by the declared [`FieldType`] of the target
//! field, never by the runtime kind of the input. `Option<_>` fields coerce
//! to their inner kind and additionally accept `Null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::config::EngineConfig;
use crate::error::{Result, SpecError};
use crate::schema::{FieldDescriptor, FieldType};
use crate::value::{Number, Value};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Converts a DSL operand string to the declared type of `field`.
pub fn coerce_str(raw: &str, field: &FieldDescriptor, config: &EngineConfig) -> Result<Value> {
    let fail = || SpecError::Coercion {
        value: raw.to_string(),
        target: field.ty.name(),
    };

    match field.ty {
        FieldType::String => Ok(Value::String(raw.to_string())),
        FieldType::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Char(c)),
                _ => Err(fail()),
            }
        }
        FieldType::Bool => {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case("true") {
                Ok(Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(Value::Bool(false))
            } else {
                Err(fail())
            }
        }
        FieldType::Int => raw
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(Number::I64(n)))
            .map_err(|_| fail()),
        FieldType::UInt => raw
            .trim()
            .parse::<u64>()
            .map(|n| Value::Number(Number::U64(n)))
            .map_err(|_| fail()),
        FieldType::Float => raw
            .trim()
            .parse::<f64>()
            .map(|n| Value::Number(Number::F64(n)))
            .map_err(|_| fail()),
        FieldType::Date => parse_date(raw.trim(), config).map(Value::Date),
        FieldType::DateTime => parse_datetime(raw.trim(), config).map(Value::DateTime),
        FieldType::One(_) | FieldType::Many(_) => Err(fail()),
    }
}

/// Converts an already-typed value to the declared type of `field`.
///
/// Strings are parsed as by [`coerce_str`], so `"true"` becomes a boolean and
/// a one-character string becomes a char. Numbers are narrowed or widened
/// when they fit.
pub fn coerce_value(value: Value, field: &FieldDescriptor, config: &EngineConfig) -> Result<Value> {
    let fail = |value: &Value| SpecError::Coercion {
        value: value.to_string(),
        target: field.ty.name(),
    };

    match (field.ty, value) {
        (_, Value::Null) if field.nullable => Ok(Value::Null),
        (FieldType::String, Value::String(s)) => Ok(Value::String(s)),
        (_, Value::String(s)) => coerce_str(&s, field, config),

        (FieldType::String, Value::Char(c)) => Ok(Value::String(c.to_string())),
        (FieldType::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),
        (FieldType::String, Value::Number(n)) => Ok(Value::String(n.to_string())),

        (FieldType::Char, Value::Char(c)) => Ok(Value::Char(c)),
        (FieldType::Bool, Value::Bool(b)) => Ok(Value::Bool(b)),

        (FieldType::Int, Value::Number(n)) => n
            .to_i64()
            .map(|n| Value::Number(Number::I64(n)))
            .ok_or_else(|| fail(&Value::Number(n))),
        (FieldType::UInt, Value::Number(n)) => n
            .to_u64()
            .map(|n| Value::Number(Number::U64(n)))
            .ok_or_else(|| fail(&Value::Number(n))),
        (FieldType::Float, Value::Number(n)) => Ok(Value::Number(Number::F64(n.to_f64()))),

        (FieldType::Date, Value::Date(d)) => Ok(Value::Date(d)),
        (FieldType::Date, Value::DateTime(dt)) => Ok(Value::Date(dt.date())),
        (FieldType::DateTime, Value::DateTime(dt)) => Ok(Value::DateTime(dt)),
        (FieldType::DateTime, Value::Date(d)) => d
            .and_hms_opt(0, 0, 0)
            .map(Value::DateTime)
            .ok_or_else(|| fail(&Value::Date(d))),

        (_, other) => Err(fail(&other)),
    }
}

/// Parses a calendar date.
///
/// Configured formats are tried first, then `YYYY-MM-DD`, `YYYY/MM/DD`,
/// `DD.MM.YYYY`, and finally date-time forms whose date part is kept.
pub fn parse_date(raw: &str, config: &EngineConfig) -> Result<NaiveDate> {
    config
        .date_formats
        .iter()
        .map(String::as_str)
        .chain(DATE_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| parse_datetime_only(raw, config).map(|dt| dt.date()))
        .ok_or_else(|| SpecError::InvalidDate {
            value: raw.to_string(),
        })
}

/// Parses a date-time; a bare date reads as midnight.
pub fn parse_datetime(raw: &str, config: &EngineConfig) -> Result<NaiveDateTime> {
    parse_datetime_only(raw, config)
        .or_else(|| {
            config
                .date_formats
                .iter()
                .map(String::as_str)
                .chain(DATE_FORMATS.iter().copied())
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| SpecError::InvalidDate {
            value: raw.to_string(),
        })
}

fn parse_datetime_only(raw: &str, config: &EngineConfig) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    config
        .date_formats
        .iter()
        .map(String::as_str)
        .chain(DATETIME_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
