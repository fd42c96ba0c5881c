use indexmap::IndexMap;

/// Query annotation: `value` holds the query, `countQuery` the count query.
pub const QUERY: &str = "Query";
/// Method annotation written by the processor: `interceptor`, `resultType`.
pub const DATA_METHOD: &str = "DataMethod";
/// Repository annotation: `value` names the datasource.
pub const REPOSITORY: &str = "Repository";

pub const VALUE_MEMBER: &str = "value";
pub const COUNT_QUERY_MEMBER: &str = "countQuery";
pub const INTERCEPTOR_MEMBER: &str = "interceptor";
pub const RESULT_TYPE_MEMBER: &str = "resultType";

/// String-valued annotation members attached to a repository method.
///
/// This is the whole metadata surface the runtime reads: query strings,
/// interceptor references, result type overrides and datasource qualifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationMetadata {
    annotations: IndexMap<String, IndexMap<String, String>>,
}

impl AnnotationMetadata {
    pub fn new() -> Self {
        AnnotationMetadata {
            annotations: IndexMap::new(),
        }
    }

    pub fn put(&mut self, annotation: &str, member: &str, value: &str) {
        self.annotations
            .entry(annotation.to_string())
            .or_default()
            .insert(member.to_string(), value.to_string());
    }

    pub fn with(mut self, annotation: &str, member: &str, value: &str) -> Self {
        self.put(annotation, member, value);
        self
    }

    pub fn string_value(&self, annotation: &str, member: &str) -> Option<&str> {
        self.annotations
            .get(annotation)
            .and_then(|members| members.get(member))
            .map(|v| v.as_str())
    }

    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.contains_key(annotation)
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_scoped_by_annotation() {
        let metadata = AnnotationMetadata::new()
            .with(QUERY, VALUE_MEMBER, "SELECT p FROM Person p")
            .with(REPOSITORY, VALUE_MEMBER, "reporting");
        assert_eq!(metadata.string_value(QUERY, VALUE_MEMBER), Some("SELECT p FROM Person p"));
        assert_eq!(metadata.string_value(REPOSITORY, VALUE_MEMBER), Some("reporting"));
        assert_eq!(metadata.string_value(QUERY, COUNT_QUERY_MEMBER), None);
        assert!(!metadata.has_annotation(DATA_METHOD));
    }

    #[test]
    fn put_overwrites() {
        let mut metadata = AnnotationMetadata::new();
        metadata.put(DATA_METHOD, INTERCEPTOR_MEMBER, "A");
        metadata.put(DATA_METHOD, INTERCEPTOR_MEMBER, "B");
        assert_eq!(metadata.string_value(DATA_METHOD, INTERCEPTOR_MEMBER), Some("B"));
    }
}
