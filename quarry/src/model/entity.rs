use crate::common::Convertible;
use std::fmt::{Display, Formatter};

/// Runtime descriptor of a persistent entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistentEntity {
    name: String,
    id_property: String,
}

impl PersistentEntity {
    pub fn new(name: &str, id_property: &str) -> Self {
        PersistentEntity {
            name: name.to_string(),
            id_property: id_property.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    /// Alias used when rendering queries, e.g. `person_` for `Person`.
    pub fn alias(&self) -> String {
        format!("{}_", self.name.to_lowercase())
    }
}

impl Display for PersistentEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A typed entity stored through a repository.
pub trait DataEntity: Convertible<Output = Self> + Send + Sync + Sized + 'static {
    fn persistent_entity() -> PersistentEntity;
}
