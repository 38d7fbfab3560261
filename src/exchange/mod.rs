//! Typed value exchange between application storage and backend buffers.
//!
//! Every exchangeable application type implements [`Exchange`], which yields a
//! borrowed [`UseData`] view for input and an [`IntoData`] view for output.
//! Backends match these closed enums exhaustively.

pub mod convert;
mod handle;
mod indicator;

pub use handle::{Blob, NestedStatement, RowId};
pub use indicator::{ExchangeType, Indicator};

use chrono::NaiveDateTime;

/// Read-only view of an application value bound for input.
#[derive(Debug)]
pub enum UseData<'r> {
    Char(char),
    CString(&'r CharBuf),
    String(&'r str),
    Int8(i8),
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    DateTime(&'r NaiveDateTime),
    Blob(&'r Blob),
    RowId(&'r RowId),
    Statement(&'r NestedStatement),
}

impl UseData<'_> {
    /// The exchange type tag of this view.
    pub fn exchange_type(&self) -> ExchangeType {
        match self {
            UseData::Char(_) => ExchangeType::Char,
            UseData::CString(_) => ExchangeType::CString,
            UseData::String(_) => ExchangeType::String,
            UseData::Int8(_) => ExchangeType::Int8,
            UseData::UInt8(_) => ExchangeType::UInt8,
            UseData::Int16(_) => ExchangeType::Int16,
            UseData::UInt16(_) => ExchangeType::UInt16,
            UseData::Int32(_) => ExchangeType::Int32,
            UseData::UInt32(_) => ExchangeType::UInt32,
            UseData::Int64(_) => ExchangeType::Int64,
            UseData::UInt64(_) => ExchangeType::UInt64,
            UseData::Double(_) => ExchangeType::Double,
            UseData::DateTime(_) => ExchangeType::DateTime,
            UseData::Blob(_) => ExchangeType::Blob,
            UseData::RowId(_) => ExchangeType::RowId,
            UseData::Statement(_) => ExchangeType::Statement,
        }
    }
}

/// Mutable view of application storage receiving a fetched value.
#[derive(Debug)]
pub enum IntoData<'r> {
    Char(&'r mut char),
    CString(&'r mut CharBuf),
    String(&'r mut String),
    Int8(&'r mut i8),
    UInt8(&'r mut u8),
    Int16(&'r mut i16),
    UInt16(&'r mut u16),
    Int32(&'r mut i32),
    UInt32(&'r mut u32),
    Int64(&'r mut i64),
    UInt64(&'r mut u64),
    Double(&'r mut f64),
    DateTime(&'r mut NaiveDateTime),
    Blob(&'r mut Blob),
    RowId(&'r mut RowId),
    Statement(&'r mut NestedStatement),
}

impl IntoData<'_> {
    /// The exchange type tag of this view.
    pub fn exchange_type(&self) -> ExchangeType {
        match self {
            IntoData::Char(_) => ExchangeType::Char,
            IntoData::CString(_) => ExchangeType::CString,
            IntoData::String(_) => ExchangeType::String,
            IntoData::Int8(_) => ExchangeType::Int8,
            IntoData::UInt8(_) => ExchangeType::UInt8,
            IntoData::Int16(_) => ExchangeType::Int16,
            IntoData::UInt16(_) => ExchangeType::UInt16,
            IntoData::Int32(_) => ExchangeType::Int32,
            IntoData::UInt32(_) => ExchangeType::UInt32,
            IntoData::Int64(_) => ExchangeType::Int64,
            IntoData::UInt64(_) => ExchangeType::UInt64,
            IntoData::Double(_) => ExchangeType::Double,
            IntoData::DateTime(_) => ExchangeType::DateTime,
            IntoData::Blob(_) => ExchangeType::Blob,
            IntoData::RowId(_) => ExchangeType::RowId,
            IntoData::Statement(_) => ExchangeType::Statement,
        }
    }
}

/// Application type that can be bound as a use value or an into target.
pub trait Exchange {
    /// Tag describing this type to backends.
    const EXCHANGE_TYPE: ExchangeType;

    /// Borrow the value for input.
    fn use_data(&self) -> UseData<'_>;

    /// Borrow the storage for output.
    fn into_data(&mut self) -> IntoData<'_>;
}

macro_rules! impl_exchange_copy {
    ($ty:ty, $variant:ident) => {
        impl Exchange for $ty {
            const EXCHANGE_TYPE: ExchangeType = ExchangeType::$variant;

            fn use_data(&self) -> UseData<'_> {
                UseData::$variant(*self)
            }

            fn into_data(&mut self) -> IntoData<'_> {
                IntoData::$variant(self)
            }
        }
    };
}

macro_rules! impl_exchange_ref {
    ($ty:ty, $variant:ident) => {
        impl Exchange for $ty {
            const EXCHANGE_TYPE: ExchangeType = ExchangeType::$variant;

            fn use_data(&self) -> UseData<'_> {
                UseData::$variant(self)
            }

            fn into_data(&mut self) -> IntoData<'_> {
                IntoData::$variant(self)
            }
        }
    };
}

impl_exchange_copy!(char, Char);
impl_exchange_copy!(i8, Int8);
impl_exchange_copy!(u8, UInt8);
impl_exchange_copy!(i16, Int16);
impl_exchange_copy!(u16, UInt16);
impl_exchange_copy!(i32, Int32);
impl_exchange_copy!(u32, UInt32);
impl_exchange_copy!(i64, Int64);
impl_exchange_copy!(u64, UInt64);
impl_exchange_copy!(f64, Double);
impl_exchange_ref!(CharBuf, CString);
impl_exchange_ref!(NaiveDateTime, DateTime);
impl_exchange_ref!(Blob, Blob);
impl_exchange_ref!(RowId, RowId);
impl_exchange_ref!(NestedStatement, Statement);

impl Exchange for String {
    const EXCHANGE_TYPE: ExchangeType = ExchangeType::String;

    fn use_data(&self) -> UseData<'_> {
        UseData::String(self.as_str())
    }

    fn into_data(&mut self) -> IntoData<'_> {
        IntoData::String(self)
    }
}

/// Fixed-capacity character buffer.
///
/// Values longer than the capacity are cut at a character boundary and the
/// exchange reports [`Indicator::Truncated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharBuf {
    text: String,
    capacity: usize,
}

impl CharBuf {
    /// Create an empty buffer holding at most `capacity` characters.
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a buffer initialized with `text`, truncated to `capacity`.
    pub fn from_text(text: &str, capacity: usize) -> Self {
        let mut buf = Self::new(capacity);
        buf.set(text);
        buf
    }

    /// Replace the contents. Returns `true` when the text was truncated.
    pub fn set(&mut self, text: &str) -> bool {
        self.text.clear();
        match text.char_indices().nth(self.capacity) {
            Some((cut, _)) => {
                self.text.push_str(&text[..cut]);
                true
            }
            None => {
                self.text.push_str(text);
                false
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}
