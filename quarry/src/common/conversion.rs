use crate::common::Value;
use crate::errors::{DataError, DataResult, ErrorKind};
use dashmap::DashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Scalar types a repository method may declare as its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    I32,
    I64,
    U64,
    F64,
    String,
}

impl ValueType {
    /// Parses the name used in method metadata, e.g. `"i32"`.
    pub fn from_name(name: &str) -> Option<ValueType> {
        match name {
            "bool" => Some(ValueType::Bool),
            "i32" => Some(ValueType::I32),
            "i64" => Some(ValueType::I64),
            "u64" => Some(ValueType::U64),
            "f64" => Some(ValueType::F64),
            "string" => Some(ValueType::String),
            _ => None,
        }
    }

    /// Whether `value` already has this type.
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueType::Bool, Value::Bool(_))
                | (ValueType::I32, Value::I32(_))
                | (ValueType::I64, Value::I64(_))
                | (ValueType::U64, Value::U64(_))
                | (ValueType::F64, Value::F64(_))
                | (ValueType::String, Value::String(_))
        )
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U64 => "u64",
            ValueType::F64 => "f64",
            ValueType::String => "string",
        };
        write!(f, "{}", name)
    }
}

type Converter = Arc<dyn Fn(&Value) -> DataResult<Value> + Send + Sync>;

/// Coerces backend-native results to the type a method declares.
///
/// A backend typically answers a count with a `u64` while the repository method
/// says `i32`; interceptors run every scalar result through
/// [ConversionService::convert] before handing it back. Custom converters keyed
/// by source variant name and target type take precedence over the built-in
/// numeric and string rules.
#[derive(Clone, Default)]
pub struct ConversionService {
    converters: Arc<DashMap<(&'static str, ValueType), Converter>>,
}

impl ConversionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter for values whose [Value::type_name] is `source`.
    pub fn add_converter<F>(&self, source: &'static str, target: ValueType, converter: F)
    where
        F: Fn(&Value) -> DataResult<Value> + Send + Sync + 'static,
    {
        self.converters.insert((source, target), Arc::new(converter));
    }

    /// Converts `value` to `target`. [Value::Null] stays null.
    pub fn convert(&self, value: &Value, target: ValueType) -> DataResult<Value> {
        if value.is_null() || target.matches(value) {
            return Ok(value.clone());
        }

        let custom = self
            .converters
            .get(&(value.type_name(), target))
            .map(|entry| entry.value().clone());
        if let Some(converter) = custom {
            return converter(value);
        }

        match target {
            ValueType::Bool => match value {
                Value::String(s) => s
                    .parse::<bool>()
                    .map(Value::Bool)
                    .map_err(|_| conversion_error(value, target)),
                _ => match value.as_integer() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(conversion_error(value, target)),
                },
            },
            ValueType::I32 => self
                .to_integer(value, target)
                .and_then(|i| i32::try_from(i).map_err(|_| conversion_error(value, target)))
                .map(Value::I32),
            ValueType::I64 => self
                .to_integer(value, target)
                .and_then(|i| i64::try_from(i).map_err(|_| conversion_error(value, target)))
                .map(Value::I64),
            ValueType::U64 => self
                .to_integer(value, target)
                .and_then(|i| u64::try_from(i).map_err(|_| conversion_error(value, target)))
                .map(Value::U64),
            ValueType::F64 => match value {
                Value::String(s) => s
                    .parse::<f64>()
                    .map(Value::F64)
                    .map_err(|_| conversion_error(value, target)),
                _ => value
                    .as_decimal()
                    .map(Value::F64)
                    .ok_or_else(|| conversion_error(value, target)),
            },
            ValueType::String => match value {
                Value::Document(_) | Value::Array(_) => Err(conversion_error(value, target)),
                Value::String(s) => Ok(Value::String(s.clone())),
                other => Ok(Value::String(other.to_string())),
            },
        }
    }

    /// Whether a conversion from `value` to `target` would succeed.
    pub fn can_convert(&self, value: &Value, target: ValueType) -> bool {
        self.convert(value, target).is_ok()
    }

    fn to_integer(&self, value: &Value, target: ValueType) -> DataResult<i128> {
        match value {
            Value::F64(f) if f.fract() == 0.0 && f.is_finite() => Ok(*f as i128),
            Value::String(s) => s
                .trim()
                .parse::<i128>()
                .map_err(|_| conversion_error(value, target)),
            Value::Bool(b) => Ok(*b as i128),
            _ => value
                .as_integer()
                .ok_or_else(|| conversion_error(value, target)),
        }
    }
}

fn conversion_error(value: &Value, target: ValueType) -> DataError {
    log::error!("Cannot convert {} to {}", value, target);
    DataError::new(
        &format!("Cannot convert value {} of type {} to {}", value, value.type_name(), target),
        ErrorKind::Conversion,
    )
}
