//! Conversion helpers shared by backends whose native values are dynamically
//! typed or textual.

use crate::error::{BridgeError, ConversionError, QueryError};
use crate::exchange::{ExchangeType, Indicator, IntoData, UseData};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Text layout used when a timestamp travels as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Backend-neutral representation of a single database value.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl NativeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NativeValue::Null)
    }

    /// Storage class name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            NativeValue::Null => "null",
            NativeValue::Integer(_) => "integer",
            NativeValue::Real(_) => "real",
            NativeValue::Text(_) => "text",
            NativeValue::Blob(_) => "blob",
        }
    }
}

/// Outcome of writing a native value into application storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stored {
    Complete,
    /// The target buffer was too small; `capacity` is its size in characters.
    Truncated { capacity: usize },
}

/// Record the outcome of a conversion in the caller's indicator slot.
///
/// A truncation without an indicator slot is an error.
pub fn record_outcome(
    stored: Stored,
    indicator: Option<&mut Indicator>,
    position: usize,
) -> Result<(), BridgeError> {
    match (stored, indicator) {
        (Stored::Complete, Some(ind)) => {
            *ind = Indicator::Ok;
            Ok(())
        }
        (Stored::Complete, None) => Ok(()),
        (Stored::Truncated { .. }, Some(ind)) => {
            *ind = Indicator::Truncated;
            Ok(())
        }
        (Stored::Truncated { capacity }, None) => {
            Err(QueryError::Truncated { position, capacity }.into())
        }
    }
}

/// Record a NULL in the caller's indicator slot, failing when there is none.
pub fn record_null(indicator: Option<&mut Indicator>, position: usize) -> Result<(), BridgeError> {
    match indicator {
        Some(ind) => {
            *ind = Indicator::Null;
            Ok(())
        }
        None => Err(QueryError::NullWithoutIndicator { position }.into()),
    }
}

/// Record that a query produced no row, failing when there is no indicator
/// slot to say so.
pub fn record_no_data(
    indicator: Option<&mut Indicator>,
    position: usize,
) -> Result<(), BridgeError> {
    match indicator {
        Some(ind) => {
            *ind = Indicator::NoData;
            Ok(())
        }
        None => Err(QueryError::NoDataWithoutIndicator { position }.into()),
    }
}

/// Write a non-null native value into application storage.
///
/// Row identifiers and nested statements are backend specific and are
/// rejected here.
pub fn store(value: &NativeValue, target: &mut IntoData<'_>) -> Result<Stored, BridgeError> {
    match target {
        IntoData::Char(c) => {
            let text = as_text(value)?;
            **c = text.chars().next().unwrap_or('\0');
        }
        IntoData::CString(buf) => {
            let text = as_text(value)?;
            if buf.set(&text) {
                return Ok(Stored::Truncated {
                    capacity: buf.capacity(),
                });
            }
        }
        IntoData::String(s) => {
            **s = as_text(value)?;
        }
        IntoData::Int8(v) => **v = narrow(as_integer(value, "int8")?, "int8")?,
        IntoData::UInt8(v) => **v = narrow(as_integer(value, "uint8")?, "uint8")?,
        IntoData::Int16(v) => **v = narrow(as_integer(value, "int16")?, "int16")?,
        IntoData::UInt16(v) => **v = narrow(as_integer(value, "uint16")?, "uint16")?,
        IntoData::Int32(v) => **v = narrow(as_integer(value, "int32")?, "int32")?,
        IntoData::UInt32(v) => **v = narrow(as_integer(value, "uint32")?, "uint32")?,
        IntoData::Int64(v) => **v = as_integer(value, "int64")?,
        IntoData::UInt64(v) => {
            **v = match value {
                NativeValue::Text(text) => parse_integer::<u64>(text, "uint64")?,
                other => narrow(as_integer(other, "uint64")?, "uint64")?,
            }
        }
        IntoData::Double(v) => {
            **v = match value {
                NativeValue::Integer(i) => *i as f64,
                NativeValue::Real(r) => *r,
                NativeValue::Text(text) => parse_double(text)?,
                other => return Err(mismatch("double", other)),
            }
        }
        IntoData::DateTime(v) => {
            **v = match value {
                NativeValue::Text(text) => parse_datetime(text)?,
                NativeValue::Integer(secs) => DateTime::<Utc>::from_timestamp(*secs, 0)
                    .map(|dt| dt.naive_utc())
                    .ok_or_else(|| ConversionError::OutOfRange {
                        value: secs.to_string(),
                        target: "datetime",
                    })?,
                other => return Err(mismatch("datetime", other)),
            }
        }
        IntoData::Blob(blob) => match value {
            NativeValue::Blob(bytes) => blob.assign(bytes)?,
            NativeValue::Text(text) => blob.assign(text.as_bytes())?,
            other => return Err(mismatch("blob", other)),
        },
        IntoData::RowId(_) => {
            return Err(QueryError::UnsupportedExchange {
                exchange_type: ExchangeType::RowId,
                operation: "generic conversion",
            }
            .into())
        }
        IntoData::Statement(_) => {
            return Err(QueryError::UnsupportedExchange {
                exchange_type: ExchangeType::Statement,
                operation: "generic conversion",
            }
            .into())
        }
    }
    Ok(Stored::Complete)
}

/// Convert an application value into its native representation.
///
/// Native integers are 64-bit signed; unsigned values above `i64::MAX` are
/// rejected rather than stored as text or floating point.
pub fn to_native(data: &UseData<'_>) -> Result<NativeValue, BridgeError> {
    let value = match data {
        UseData::Char(c) => NativeValue::Text(c.to_string()),
        UseData::CString(buf) => NativeValue::Text(buf.as_str().to_string()),
        UseData::String(s) => NativeValue::Text((*s).to_string()),
        UseData::Int8(v) => NativeValue::Integer(i64::from(*v)),
        UseData::UInt8(v) => NativeValue::Integer(i64::from(*v)),
        UseData::Int16(v) => NativeValue::Integer(i64::from(*v)),
        UseData::UInt16(v) => NativeValue::Integer(i64::from(*v)),
        UseData::Int32(v) => NativeValue::Integer(i64::from(*v)),
        UseData::UInt32(v) => NativeValue::Integer(i64::from(*v)),
        UseData::Int64(v) => NativeValue::Integer(*v),
        UseData::UInt64(v) => {
            NativeValue::Integer(i64::try_from(*v).map_err(|_| ConversionError::OutOfRange {
                value: v.to_string(),
                target: "int64",
            })?)
        }
        UseData::Double(v) => NativeValue::Real(*v),
        UseData::DateTime(dt) => NativeValue::Text(format_datetime(dt)),
        UseData::Blob(blob) => NativeValue::Blob(blob.to_vec()?),
        UseData::RowId(_) | UseData::Statement(_) => {
            return Err(QueryError::UnsupportedExchange {
                exchange_type: data.exchange_type(),
                operation: "generic conversion",
            }
            .into())
        }
    };
    Ok(value)
}

/// Parse an integer, ignoring surrounding whitespace.
pub fn parse_integer<T: std::str::FromStr>(
    text: &str,
    target: &'static str,
) -> Result<T, ConversionError> {
    text.trim()
        .parse::<T>()
        .map_err(|_| ConversionError::InvalidNumber {
            value: text.to_string(),
            target,
        })
}

/// Parse a floating point number. Always uses `.` as the decimal separator.
pub fn parse_double(text: &str) -> Result<f64, ConversionError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| ConversionError::InvalidNumber {
            value: text.to_string(),
            target: "double",
        })
}

/// Parse a date, a time, or a date and time.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.fff]` (or with `T`) and
/// `HH:MM:SS`. A bare time is placed on 1900-01-01.
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime, ConversionError> {
    let trimmed = text.trim();
    let invalid = || ConversionError::InvalidDateTime(text.to_string());

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).ok_or_else(invalid);
    }
    if let Ok(time) = NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f") {
        let epoch = NaiveDate::from_ymd_opt(1900, 1, 1).ok_or_else(invalid)?;
        return Ok(epoch.and_time(time));
    }
    Err(invalid())
}

pub fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn as_text(value: &NativeValue) -> Result<String, BridgeError> {
    Ok(match value {
        NativeValue::Text(text) => text.clone(),
        NativeValue::Integer(i) => i.to_string(),
        NativeValue::Real(r) => r.to_string(),
        NativeValue::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        NativeValue::Null => return Err(mismatch("text", value)),
    })
}

fn as_integer(value: &NativeValue, target: &'static str) -> Result<i64, BridgeError> {
    match value {
        NativeValue::Integer(i) => Ok(*i),
        NativeValue::Real(r) => {
            // i64::MAX as f64 rounds up to 2^63, which does not fit.
            if r.fract() == 0.0 && *r >= i64::MIN as f64 && *r < i64::MAX as f64 {
                Ok(*r as i64)
            } else {
                Err(ConversionError::InvalidNumber {
                    value: r.to_string(),
                    target,
                }
                .into())
            }
        }
        NativeValue::Text(text) => Ok(parse_integer::<i64>(text, target)?),
        other => Err(mismatch(target, other)),
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, target: &'static str) -> Result<T, BridgeError> {
    T::try_from(value).map_err(|_| {
        ConversionError::OutOfRange {
            value: value.to_string(),
            target,
        }
        .into()
    })
}

fn mismatch(expected: &'static str, found: &NativeValue) -> BridgeError {
    ConversionError::TypeMismatch {
        expected,
        found: found.kind(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{CharBuf, Exchange};

    fn store_into<T: Exchange>(value: NativeValue, target: &mut T) -> Result<Stored, BridgeError> {
        let mut data = target.into_data();
        store(&value, &mut data)
    }

    #[test]
    fn test_store_integers_with_range_check() {
        let mut small = 0i8;
        store_into(NativeValue::Integer(-7), &mut small).unwrap();
        assert_eq!(small, -7);

        let err = store_into(NativeValue::Integer(300), &mut small).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion(ConversionError::OutOfRange { target: "int8", .. })
        ));

        let mut unsigned = 0u16;
        assert!(store_into(NativeValue::Integer(-1), &mut unsigned).is_err());
    }

    #[test]
    fn test_store_integer_from_text() {
        let mut value = 0i32;
        store_into(NativeValue::Text(" 42 ".into()), &mut value).unwrap();
        assert_eq!(value, 42);

        let err = store_into(NativeValue::Text("4x".into()), &mut value).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion(ConversionError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_store_large_unsigned_from_text() {
        let mut value = 0u64;
        store_into(NativeValue::Text(u64::MAX.to_string()), &mut value).unwrap();
        assert_eq!(value, u64::MAX);
    }

    #[test]
    fn test_to_native_rejects_unsigned_above_i64() {
        let big = u64::MAX;
        let err = to_native(&big.use_data()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion(ConversionError::OutOfRange { target: "int64", .. })
        ));

        let largest = i64::MAX as u64;
        assert_eq!(
            to_native(&largest.use_data()).unwrap(),
            NativeValue::Integer(i64::MAX)
        );
        let small = 5u64;
        assert_eq!(to_native(&small.use_data()).unwrap(), NativeValue::Integer(5));
    }

    #[test]
    fn test_store_real_at_integer_boundary() {
        let mut value = 0i64;
        let two_pow_63 = 9_223_372_036_854_775_808.0f64;
        let err = store_into(NativeValue::Real(two_pow_63), &mut value).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion(ConversionError::InvalidNumber { target: "int64", .. })
        ));
        assert_eq!(value, 0);

        store_into(NativeValue::Real(-two_pow_63), &mut value).unwrap();
        assert_eq!(value, i64::MIN);
        store_into(NativeValue::Real(4.0), &mut value).unwrap();
        assert_eq!(value, 4);
        assert!(store_into(NativeValue::Real(4.5), &mut value).is_err());
    }

    #[test]
    fn test_store_double_locale_independent() {
        let mut value = 0.0f64;
        store_into(NativeValue::Text("3.25".into()), &mut value).unwrap();
        assert_eq!(value, 3.25);
        store_into(NativeValue::Integer(2), &mut value).unwrap();
        assert_eq!(value, 2.0);
        assert!(store_into(NativeValue::Text("3,25".into()), &mut value).is_err());
    }

    #[test]
    fn test_store_cstring_truncation() {
        let mut buf = CharBuf::new(4);
        let stored = store_into(NativeValue::Text("Johnny".into()), &mut buf).unwrap();
        assert_eq!(stored, Stored::Truncated { capacity: 4 });
        assert_eq!(buf.as_str(), "John");

        let mut ind = Indicator::Ok;
        record_outcome(stored, Some(&mut ind), 1).unwrap();
        assert_eq!(ind, Indicator::Truncated);

        let err = record_outcome(stored, None, 1).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Query(QueryError::Truncated { position: 1, capacity: 4 })
        ));
    }

    #[test]
    fn test_record_null_requires_indicator() {
        let mut ind = Indicator::Ok;
        record_null(Some(&mut ind), 1).unwrap();
        assert_eq!(ind, Indicator::Null);
        assert!(matches!(
            record_null(None, 3).unwrap_err(),
            BridgeError::Query(QueryError::NullWithoutIndicator { position: 3 })
        ));
    }

    #[test]
    fn test_record_no_data_requires_indicator() {
        let mut ind = Indicator::Truncated;
        record_no_data(Some(&mut ind), 1).unwrap();
        assert_eq!(ind, Indicator::NoData);
        assert!(matches!(
            record_no_data(None, 2).unwrap_err(),
            BridgeError::Query(QueryError::NoDataWithoutIndicator { position: 2 })
        ));
    }

    #[test]
    fn test_parse_datetime_variants() {
        let dt = parse_datetime("2024-03-05 14:30:15").unwrap();
        assert_eq!(format_datetime(&dt), "2024-03-05 14:30:15");

        let dt = parse_datetime("2024-03-05T14:30:15.250").unwrap();
        assert_eq!(format_datetime(&dt), "2024-03-05 14:30:15");

        let dt = parse_datetime("2024-03-05").unwrap();
        assert_eq!(format_datetime(&dt), "2024-03-05 00:00:00");

        let dt = parse_datetime("08:15:00").unwrap();
        assert_eq!(format_datetime(&dt), "1900-01-01 08:15:00");

        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_store_char_and_string() {
        let mut c = ' ';
        store_into(NativeValue::Text("xyz".into()), &mut c).unwrap();
        assert_eq!(c, 'x');

        let mut s = String::new();
        store_into(NativeValue::Integer(12), &mut s).unwrap();
        assert_eq!(s, "12");
    }

    #[test]
    fn test_blob_mismatch() {
        let mut value = 0i64;
        let err = store_into(NativeValue::Blob(vec![1, 2]), &mut value).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion(ConversionError::TypeMismatch { found: "blob", .. })
        ));
    }
}
