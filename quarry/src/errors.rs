use backtrace::Backtrace;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for repository interception.
///
/// Each kind describes one category of failure so that callers can tell a
/// misconfigured repository from a backend failure or from the empty-result signal.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{DataError, ErrorKind, DataResult};
///
/// fn example() -> DataResult<()> {
///     Err(DataError::new("No backend named 'reporting'", ErrorKind::Configuration))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Missing backend, missing generated metadata or an unregistered interceptor
    Configuration,
    /// The runtime found itself in a state the metadata does not allow
    IllegalState,
    /// An argument or a backend did not have the expected shape
    IllegalArgument,
    /// An interceptor could not be created or used
    DataAccess,
    /// A query legitimately produced no result for a method that must return one
    EmptyResult,
    /// The method shape or operation is not supported
    UnsupportedOperation,
    /// A value could not be converted to the declared result type
    Conversion,
    /// Error mapping an entity to or from a value
    ObjectMapping,
    /// Error reported by the backend while executing a statement
    Backend,
    /// Internal error (usually indicates a bug)
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "Configuration error"),
            ErrorKind::IllegalState => write!(f, "Illegal state"),
            ErrorKind::IllegalArgument => write!(f, "Illegal argument"),
            ErrorKind::DataAccess => write!(f, "Data access error"),
            ErrorKind::EmptyResult => write!(f, "Empty result"),
            ErrorKind::UnsupportedOperation => write!(f, "Unsupported operation"),
            ErrorKind::Conversion => write!(f, "Conversion error"),
            ErrorKind::ObjectMapping => write!(f, "Object mapping error"),
            ErrorKind::Backend => write!(f, "Backend error"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

/// Error type used throughout the crate.
///
/// `DataError` carries a message, a kind, an optional cause and the backtrace
/// captured where the error was created.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{DataError, ErrorKind};
///
/// let cause = DataError::new("connection reset", ErrorKind::Backend);
/// let err = DataError::new_with_cause("Failed to count users", ErrorKind::DataAccess, cause);
/// ```
#[derive(Clone)]
pub struct DataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DataError>>,
    // resolved lazily on first debug print
    backtrace: Arc<Mutex<Backtrace>>,
}

impl DataError {
    /// Creates a new `DataError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `DataError` wrapping a cause.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DataError) -> Self {
        DataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// The empty-result signal: a query returned nothing for a method that must
    /// return exactly one value.
    pub fn empty_result() -> Self {
        DataError::new("Query produced no result", ErrorKind::EmptyResult)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DataError> {
        self.cause.as_deref()
    }

    #[inline]
    pub fn is_empty_result(&self) -> bool {
        self.error_kind == ErrorKind::EmptyResult
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, *backtrace)
            }
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, DataError>`.
pub type DataResult<T> = Result<T, DataError>;

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::new(&format!("IO error: {}", err), ErrorKind::Backend)
    }
}

impl From<std::fmt::Error> for DataError {
    fn from(err: std::fmt::Error) -> Self {
        DataError::new(&format!("Formatting error: {}", err), ErrorKind::Internal)
    }
}

impl From<regex::Error> for DataError {
    fn from(err: regex::Error) -> Self {
        DataError::new(&format!("Invalid pattern: {}", err), ErrorKind::IllegalArgument)
    }
}

impl From<String> for DataError {
    fn from(msg: String) -> Self {
        DataError::new(&msg, ErrorKind::Internal)
    }
}

impl From<&str> for DataError {
    fn from(msg: &str) -> Self {
        DataError::new(msg, ErrorKind::Internal)
    }
}
