use crate::metadata::{ExecutableMethod, MethodSignature};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REPOSITORY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one repository instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryId(u64);

impl RepositoryId {
    pub fn next() -> Self {
        RepositoryId(NEXT_REPOSITORY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl Display for RepositoryId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one method of one repository instance.
///
/// Two instances of the same repository type get distinct keys, so each keeps
/// its own interceptors and stored queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryMethodKey {
    repository: RepositoryId,
    method: MethodSignature,
}

impl RepositoryMethodKey {
    pub fn new(repository: RepositoryId, method: MethodSignature) -> Self {
        RepositoryMethodKey { repository, method }
    }

    pub fn repository(&self) -> RepositoryId {
        self.repository
    }

    pub fn method(&self) -> &MethodSignature {
        &self.method
    }
}

impl Display for RepositoryMethodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.repository, self.method)
    }
}

/// Where a repository was requested; carries the datasource qualifier, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InjectionPoint {
    qualifier: Option<String>,
}

impl InjectionPoint {
    pub fn unqualified() -> Self {
        InjectionPoint { qualifier: None }
    }

    pub fn qualified(datasource: &str) -> Self {
        InjectionPoint {
            qualifier: Some(datasource.to_string()),
        }
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

/// One repository instance handed out by the runtime.
#[derive(Debug, Clone)]
pub struct RepositoryBean {
    id: RepositoryId,
    name: String,
    injection_point: InjectionPoint,
}

impl RepositoryBean {
    pub fn new(name: &str, injection_point: InjectionPoint) -> Self {
        RepositoryBean {
            id: RepositoryId::next(),
            name: name.to_string(),
            injection_point,
        }
    }

    pub fn id(&self) -> RepositoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn injection_point(&self) -> &InjectionPoint {
        &self.injection_point
    }

    pub fn key(&self, method: &ExecutableMethod) -> RepositoryMethodKey {
        RepositoryMethodKey::new(self.id, method.signature().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_combine_repository_and_method() {
        let first = RepositoryBean::new("PersonRepository", InjectionPoint::unqualified());
        let second = RepositoryBean::new("PersonRepository", InjectionPoint::unqualified());
        assert_ne!(first.id(), second.id());

        let find = MethodSignature::new("findByName", &["String"]);
        let count = MethodSignature::new("countByName", &["String"]);
        let keys: HashSet<_> = vec![
            RepositoryMethodKey::new(first.id(), find.clone()),
            RepositoryMethodKey::new(first.id(), find.clone()),
            RepositoryMethodKey::new(second.id(), find),
            RepositoryMethodKey::new(first.id(), count),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn overloads_are_distinct() {
        let id = RepositoryId::next();
        let by_name = RepositoryMethodKey::new(id, MethodSignature::new("find", &["String"]));
        let by_age = RepositoryMethodKey::new(id, MethodSignature::new("find", &["i32"]));
        assert_ne!(by_name, by_age);
    }

    #[test]
    fn injection_point_qualifier() {
        assert_eq!(InjectionPoint::qualified("reporting").qualifier(), Some("reporting"));
        assert_eq!(InjectionPoint::unqualified().qualifier(), None);
    }
}
