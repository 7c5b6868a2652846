//! Column values.
//!
//! A fetched record is a bag of columns whose shape is only known at runtime.
//! [`ColumnValue`] is the tagged value stored per column, and [`FromColumnValue`] is the
//! typed extraction used by `Row::get_column`: the caller names the type, no coercion
//! happens, and a tag mismatch is reported rather than converted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single column's value as decoded from the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl ColumnValue {
    /// Name of the variant, used in type-mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Bool(_) => "boolean",
            ColumnValue::Int(_) => "integer",
            ColumnValue::Float(_) => "float",
            ColumnValue::Text(_) => "text",
            ColumnValue::Timestamp(_) => "timestamp",
            ColumnValue::Json(_) => "json",
            ColumnValue::Bytes(_) => "bytes",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Convert into a bindable `sea_query::Value`
    pub fn into_sea_value(self) -> sea_query::Value {
        match self {
            ColumnValue::Null => sea_query::Value::String(None),
            ColumnValue::Bool(b) => b.into(),
            ColumnValue::Int(i) => i.into(),
            ColumnValue::Float(f) => f.into(),
            ColumnValue::Text(s) => s.into(),
            ColumnValue::Timestamp(t) => t.into(),
            ColumnValue::Json(j) => j.into(),
            ColumnValue::Bytes(b) => b.into(),
        }
    }
}

impl From<ColumnValue> for sea_query::Value {
    fn from(value: ColumnValue) -> Self {
        value.into_sea_value()
    }
}

macro_rules! column_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ColumnValue {
                fn from(v: $ty) -> Self {
                    ColumnValue::$variant(v.into())
                }
            }
        )*
    };
}

column_value_from!(
    bool => Bool,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
    DateTime<Utc> => Timestamp,
    serde_json::Value => Json,
    Vec<u8> => Bytes,
);

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ColumnValue::Null, Into::into)
    }
}

/// Error type for value extraction failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueExtractionError {
    /// The value is null
    NullValue,
    /// The stored tag doesn't match the requested type
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// The tag matches but the value does not fit (e.g. overflow)
    ConversionError(String),
}

impl std::fmt::Display for ValueExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueExtractionError::NullValue => write!(f, "Value is null"),
            ValueExtractionError::TypeMismatch { expected, actual } => {
                write!(f, "Type mismatch: expected {expected}, got {actual}")
            }
            ValueExtractionError::ConversionError(msg) => write!(f, "Conversion error: {msg}"),
        }
    }
}

impl std::error::Error for ValueExtractionError {}

/// Typed extraction from a [`ColumnValue`]
///
/// ```rust
/// use rowkeeper::{ColumnValue, FromColumnValue, ValueExtractionError};
///
/// assert_eq!(i64::from_column_value(&ColumnValue::Int(42)), Ok(42));
/// assert_eq!(Option::<i64>::from_column_value(&ColumnValue::Null), Ok(None));
/// assert!(matches!(
///     String::from_column_value(&ColumnValue::Int(42)),
///     Err(ValueExtractionError::TypeMismatch { .. })
/// ));
/// ```
pub trait FromColumnValue: Sized {
    /// Name reported as `expected` when extraction fails
    const TYPE_NAME: &'static str;

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError>;
}

fn mismatch<T: FromColumnValue>(value: &ColumnValue) -> ValueExtractionError {
    if value.is_null() {
        ValueExtractionError::NullValue
    } else {
        ValueExtractionError::TypeMismatch {
            expected: T::TYPE_NAME,
            actual: value.type_name(),
        }
    }
}

impl FromColumnValue for ColumnValue {
    const TYPE_NAME: &'static str = "any";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        Ok(value.clone())
    }
}

impl FromColumnValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Bool(b) => Ok(*b),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromColumnValue for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Int(i) => Ok(*i),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromColumnValue for i32 {
    const TYPE_NAME: &'static str = "integer";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        let wide = i64::from_column_value(value).map_err(|e| match e {
            ValueExtractionError::TypeMismatch { actual, .. } => ValueExtractionError::TypeMismatch {
                expected: Self::TYPE_NAME,
                actual,
            },
            other => other,
        })?;
        i32::try_from(wide).map_err(|_| {
            ValueExtractionError::ConversionError(format!("{wide} does not fit in i32"))
        })
    }
}

impl FromColumnValue for f64 {
    const TYPE_NAME: &'static str = "float";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Float(f) => Ok(*f),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromColumnValue for String {
    const TYPE_NAME: &'static str = "text";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Text(s) => Ok(s.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromColumnValue for DateTime<Utc> {
    const TYPE_NAME: &'static str = "timestamp";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Timestamp(t) => Ok(*t),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromColumnValue for serde_json::Value {
    const TYPE_NAME: &'static str = "json";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Json(j) => Ok(j.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromColumnValue for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Bytes(b) => Ok(b.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl<T: FromColumnValue> FromColumnValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_column_value(value: &ColumnValue) -> Result<Self, ValueExtractionError> {
        match value {
            ColumnValue::Null => Ok(None),
            other => T::from_column_value(other).map(Some),
        }
    }
}
