use im::OrdMap;

use crate::common::Value;
use crate::errors::{DataError, DataResult, ErrorKind};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

/// Separator for embedded field paths such as `address.city`.
pub const FIELD_SEPARATOR: char = '.';

/// The storage shape of an entity.
///
/// A document is an ordered map of field names to [Value]s. Nested documents
/// are addressed with dotted paths: `doc.get("address.city")`.
///
/// Backed by `im::OrdMap`, so cloning a document is O(1) and every mutation
/// produces an independent copy through structural sharing. Entities are cloned
/// freely between the caller, the executor threads and the backend.
#[derive(Clone, Eq, PartialEq, Hash, Default, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Document {
    data: OrdMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Document { data: OrdMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with `key`, creating intermediate documents for
    /// embedded keys.
    pub fn put<K: AsRef<str>, T: Into<Value>>(&mut self, key: K, value: T) -> DataResult<()> {
        let key = key.as_ref();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DataError::new(
                "Document does not support empty key",
                ErrorKind::IllegalArgument,
            ));
        }

        let value = value.into();
        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data.insert(key.to_string(), value);
            Ok(())
        }
    }

    /// Returns the value at `key`, or [Value::Null] when absent.
    pub fn get(&self, key: &str) -> Value {
        match self.data.get(key) {
            Some(value) => value.clone(),
            None if key.contains(FIELD_SEPARATOR) => self.deep_get(key),
            None => Value::Null,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if self.data.contains_key(key) {
            return self.data.remove(key);
        }

        let (head, tail) = key.split_once(FIELD_SEPARATOR)?;
        let mut nested = match self.data.get(head) {
            Some(Value::Document(doc)) => doc.clone(),
            _ => return None,
        };
        let removed = nested.remove(tail);
        if nested.is_empty() {
            self.data.remove(head);
        } else {
            self.data.insert(head.to_string(), Value::Document(nested));
        }
        removed
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key) || (key.contains(FIELD_SEPARATOR) && !self.deep_get(key).is_null())
    }

    /// Top-level field names in key order.
    pub fn fields(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    /// Copies every field of `other` into this document, merging nested
    /// documents field by field.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            match (self.data.get(key), value) {
                (Some(Value::Document(existing)), Value::Document(incoming)) => {
                    let mut merged = existing.clone();
                    merged.merge(incoming);
                    self.data.insert(key.clone(), Value::Document(merged));
                }
                _ => {
                    self.data.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    fn deep_get(&self, key: &str) -> Value {
        let mut current = self;
        let mut splits = key.split(FIELD_SEPARATOR).peekable();
        while let Some(part) = splits.next() {
            let value = match current.data.get(part) {
                Some(value) => value,
                None => return Value::Null,
            };
            if splits.peek().is_none() {
                return value.clone();
            }
            match value {
                Value::Document(doc) => current = doc,
                _ => return Value::Null,
            }
        }
        Value::Null
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> DataResult<()> {
        let key = splits[0];
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(DataError::new(
                "Document does not support empty key",
                ErrorKind::IllegalArgument,
            ));
        }

        if splits.len() == 1 {
            self.data.insert(key.to_string(), value);
            return Ok(());
        }

        let mut nested = match self.data.get(key) {
            Some(Value::Document(doc)) => doc.clone(),
            _ => Document::new(),
        };
        nested.deep_put(&splits[1..], value)?;
        self.data.insert(key.to_string(), Value::Document(nested));
        Ok(())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{}\": {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Document{}", self)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Document {
            data: iter.into_iter().collect(),
        }
    }
}

/// Strips the quotes `stringify!` leaves around literal keys.
pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] from `key: value` pairs.
///
/// ```rust,ignore
/// let person = doc! {
///     "name": "Ada",
///     "age": 36,
///     "address": { "city": "London" },
///     "tags": ["math", "engines"]
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::common::Document::new()
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::common::Document::new();
            $(
                doc.put(&$crate::common::normalize(stringify!($key)), $crate::doc_value!($value))
                    .expect("document keys in doc! are non-empty literals");
            )*
            doc
        }
    };
}

/// Converts a `doc!` value token: nested document, array or expression.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{doc, val};

    #[cfg(feature = "serde")]
    #[test]
    fn documents_are_serializable_with_serde_feature() {
        fn assert_serde<T: serde::Serialize + serde::de::DeserializeOwned>() {}
        assert_serde::<Document>();
        assert_serde::<Value>();
    }

    fn set_up() -> Document {
        doc! {
            "name": "Ada",
            "age": 36,
            "address": {
                "city": "London",
                "zip": "N1"
            },
            "tags": ["math", "engines"]
        }
    }

    #[test]
    fn get_top_level_and_embedded() {
        let doc = set_up();
        assert_eq!(doc.get("name"), val!("Ada"));
        assert_eq!(doc.get("address.city"), val!("London"));
        assert_eq!(doc.get("missing"), Value::Null);
        assert_eq!(doc.get("name.first"), Value::Null);
        assert_eq!(doc.get("tags").as_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn put_embedded_creates_documents() {
        let mut doc = Document::new();
        doc.put("a.b.c", 1).unwrap();
        assert_eq!(doc.get("a.b.c"), val!(1));
        assert!(doc.get("a.b").is_document());
    }

    #[test]
    fn put_rejects_empty_key() {
        let mut doc = Document::new();
        assert!(doc.put("", 1).is_err());
        assert!(doc.put("a..b", 1).is_err());
    }

    #[test]
    fn remove_embedded_field() {
        let mut doc = set_up();
        assert_eq!(doc.remove("address.zip"), Some(val!("N1")));
        assert_eq!(doc.get("address.zip"), Value::Null);
        assert_eq!(doc.remove("address.city"), Some(val!("London")));
        assert!(!doc.contains_key("address"));
        assert_eq!(doc.remove("nothing.here"), None);
    }

    #[test]
    fn merge_nested_documents() {
        let mut doc = set_up();
        doc.merge(&doc! { "address": { "zip": "E1" }, "age": 37 });
        assert_eq!(doc.get("address.zip"), val!("E1"));
        assert_eq!(doc.get("address.city"), val!("London"));
        assert_eq!(doc.get("age"), val!(37));
    }

    #[test]
    fn clone_is_independent() {
        let original = set_up();
        let mut copy = original.clone();
        copy.put("name", "Grace").unwrap();
        assert_eq!(original.get("name"), val!("Ada"));
        assert_eq!(copy.get("name"), val!("Grace"));
    }

    #[test]
    fn fields_and_size() {
        let doc = set_up();
        assert_eq!(doc.size(), 4);
        assert_eq!(doc.fields(), vec!["address", "age", "name", "tags"]);
        assert!(doc.contains_key("address.city"));
        assert!(!Document::new().contains_key("x"));
    }
}
