//! Index entry value.

use serde_json::{Number, Value};
use servicebus_core::error::ServiceBusError;

/// A scalar stored in an index.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    /// No value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A finite floating point number.
    Float(f64),
    /// A string, typically an identifier.
    String(String),
}

impl IndexValue {
    /// Converts the value into its JSON form for storage.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::StorageInteractionFailed` for a NaN or
    /// infinite float, which JSON cannot represent.
    pub fn to_json(&self) -> Result<Value, ServiceBusError> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Bool(*value),
            Self::Integer(value) => Value::Number((*value).into()),
            Self::Float(value) => Number::from_f64(*value).map(Value::Number).ok_or_else(|| {
                ServiceBusError::StorageInteractionFailed(format!(
                    "index value {value} is not a finite number"
                ))
            })?,
            Self::String(value) => Value::String(value.clone()),
        })
    }

    /// Restores a value from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns `ServiceBusError::RestoreFailed` if `json` is an array, an
    /// object, or a number outside the `i64`/`f64` range.
    pub fn from_json(json: Value) -> Result<Self, ServiceBusError> {
        match json {
            Value::Null => Ok(Self::Null),
            Value::Bool(value) => Ok(Self::Bool(value)),
            Value::String(value) => Ok(Self::String(value)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Float))
                .ok_or_else(|| {
                    ServiceBusError::RestoreFailed(format!(
                        "index value {number} does not fit a 64-bit number"
                    ))
                }),
            other => Err(ServiceBusError::RestoreFailed(format!(
                "index value must be a scalar, got {other}"
            ))),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<IndexValue>> From<Option<T>> for IndexValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
