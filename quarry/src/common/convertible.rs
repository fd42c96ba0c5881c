use crate::common::{Document, Value};
use crate::errors::{DataError, DataResult, ErrorKind};

/// Bidirectional mapping between a Rust type and a [Value].
///
/// Entities implement it to travel through the backend as documents; scalar
/// types implement it so interceptor results can be read back in the declared
/// return type.
pub trait Convertible {
    type Output;

    fn to_value(&self) -> DataResult<Value>;
    fn from_value(value: &Value) -> DataResult<Self::Output>;
}

fn mapping_error(value: &Value, expected: &str) -> DataError {
    log::error!("Value {} is not {}", value, expected);
    DataError::new(
        &format!("Value of type {} is not {}", value.type_name(), expected),
        ErrorKind::ObjectMapping,
    )
}

impl Convertible for bool {
    type Output = bool;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            _ => Err(mapping_error(value, "a bool")),
        }
    }
}

impl Convertible for i32 {
    type Output = i32;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::I32(*self))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::I32(i) => Ok(*i),
            _ => Err(mapping_error(value, "an i32")),
        }
    }
}

impl Convertible for i64 {
    type Output = i64;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::I64(*self))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::I64(i) => Ok(*i),
            _ => Err(mapping_error(value, "an i64")),
        }
    }
}

impl Convertible for u64 {
    type Output = u64;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::U64(*self))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::U64(i) => Ok(*i),
            _ => Err(mapping_error(value, "a u64")),
        }
    }
}

impl Convertible for f64 {
    type Output = f64;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::F64(*self))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::F64(f) => Ok(*f),
            _ => Err(mapping_error(value, "an f64")),
        }
    }
}

impl Convertible for String {
    type Output = String;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mapping_error(value, "a string")),
        }
    }
}

impl Convertible for Value {
    type Output = Value;

    fn to_value(&self) -> DataResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        Ok(value.clone())
    }
}

impl Convertible for Document {
    type Output = Document;

    fn to_value(&self) -> DataResult<Value> {
        Ok(Value::Document(self.clone()))
    }

    fn from_value(value: &Value) -> DataResult<Self> {
        match value {
            Value::Document(doc) => Ok(doc.clone()),
            _ => Err(mapping_error(value, "a document")),
        }
    }
}

impl<T> Convertible for Option<T>
where
    T: Convertible<Output = T>,
{
    type Output = Option<T>;

    fn to_value(&self) -> DataResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> DataResult<Self::Output> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T> Convertible for Vec<T>
where
    T: Convertible<Output = T>,
{
    type Output = Vec<T>;

    fn to_value(&self) -> DataResult<Value> {
        let values = self
            .iter()
            .map(|v| v.to_value())
            .collect::<DataResult<Vec<Value>>>()?;
        Ok(Value::Array(values))
    }

    fn from_value(value: &Value) -> DataResult<Self::Output> {
        match value {
            Value::Array(values) => values.iter().map(T::from_value).collect(),
            _ => Err(mapping_error(value, "an array")),
        }
    }
}
