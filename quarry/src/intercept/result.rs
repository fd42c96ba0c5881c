use crate::common::{Convertible, Value};
use crate::errors::{DataError, DataResult, ErrorKind};
use crate::model::{Page, Slice};
use crate::operations::ValueIter;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use std::fmt::{Debug, Formatter};

/// Result of a method returning a reactive stream.
pub type Publisher = BoxStream<'static, DataResult<MethodResult>>;

/// Result of a method returning a future.
pub type CompletionStage = BoxFuture<'static, DataResult<MethodResult>>;

/// The type-erased value an interceptor produces for a repository call.
pub enum MethodResult {
    /// Nothing matched and the method allows that
    Absent,
    /// The method returns nothing
    Unit,
    Value(Value),
    List(Vec<Value>),
    Page(Page<Value>),
    Slice(Slice<Value>),
    Stream(ValueIter),
    Publisher(Publisher),
    CompletionStage(CompletionStage),
}

impl MethodResult {
    pub fn kind_name(&self) -> &'static str {
        match self {
            MethodResult::Absent => "absent",
            MethodResult::Unit => "unit",
            MethodResult::Value(_) => "value",
            MethodResult::List(_) => "list",
            MethodResult::Page(_) => "page",
            MethodResult::Slice(_) => "slice",
            MethodResult::Stream(_) => "stream",
            MethodResult::Publisher(_) => "publisher",
            MethodResult::CompletionStage(_) => "completion stage",
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, MethodResult::Absent)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            MethodResult::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The single value, `None` when absent.
    pub fn into_optional(self) -> DataResult<Option<Value>> {
        match self {
            MethodResult::Value(value) => Ok(Some(value)),
            MethodResult::Absent => Ok(None),
            other => Err(shape_error("value", &other)),
        }
    }

    /// Reads the single value back as `T`.
    pub fn into_entity<T: Convertible<Output = T>>(self) -> DataResult<Option<T>> {
        match self.into_optional()? {
            Some(value) => T::from_value(&value).map(Some),
            None => Ok(None),
        }
    }

    /// Every value of a list, slice, page or stream.
    pub fn into_list(self) -> DataResult<Vec<Value>> {
        match self {
            MethodResult::List(values) => Ok(values),
            MethodResult::Stream(values) => Ok(values.collect()),
            MethodResult::Page(page) => Ok(page.into_content()),
            MethodResult::Slice(slice) => Ok(slice.into_content()),
            other => Err(shape_error("list", &other)),
        }
    }

    pub fn into_entities<T: Convertible<Output = T>>(self) -> DataResult<Vec<T>> {
        self.into_list()?.iter().map(T::from_value).collect()
    }

    pub fn into_page(self) -> DataResult<Page<Value>> {
        match self {
            MethodResult::Page(page) => Ok(page),
            other => Err(shape_error("page", &other)),
        }
    }

    pub fn into_slice(self) -> DataResult<Slice<Value>> {
        match self {
            MethodResult::Slice(slice) => Ok(slice),
            MethodResult::Page(page) => Ok(page.into_slice()),
            other => Err(shape_error("slice", &other)),
        }
    }

    pub fn into_stream(self) -> DataResult<ValueIter> {
        match self {
            MethodResult::Stream(values) => Ok(values),
            MethodResult::List(values) => Ok(Box::new(values.into_iter())),
            other => Err(shape_error("stream", &other)),
        }
    }

    pub fn into_publisher(self) -> DataResult<Publisher> {
        match self {
            MethodResult::Publisher(publisher) => Ok(publisher),
            other => Err(shape_error("publisher", &other)),
        }
    }

    pub fn into_completion_stage(self) -> DataResult<CompletionStage> {
        match self {
            MethodResult::CompletionStage(stage) => Ok(stage),
            other => Err(shape_error("completion stage", &other)),
        }
    }
}

fn shape_error(expected: &str, actual: &MethodResult) -> DataError {
    log::error!("Expected a {} result but got a {}", expected, actual.kind_name());
    DataError::new(
        &format!("Expected a {} result but got a {}", expected, actual.kind_name()),
        ErrorKind::IllegalState,
    )
}

impl Debug for MethodResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodResult::Value(value) => write!(f, "Value({})", value),
            MethodResult::List(values) => write!(f, "List({} values)", values.len()),
            MethodResult::Page(page) => write!(
                f,
                "Page({} of {} values)",
                page.content().len(),
                page.total_size()
            ),
            MethodResult::Slice(slice) => write!(f, "Slice({} values)", slice.content().len()),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}
