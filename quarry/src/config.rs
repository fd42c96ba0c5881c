//! Runtime configuration.

use crate::errors::{DataError, DataResult, ErrorKind};
use crate::get_cpu_count;
use std::sync::{Arc, OnceLock};

pub const DEFAULT_DATASOURCE: &str = "default";
pub const DEFAULT_THREAD_PREFIX: &str = "quarry-io-";

/// Settings read once while the runtime is assembled.
///
/// Every setting may be written at most once; an unset setting falls back to
/// its default.
///
/// # Examples
///
/// ```rust,ignore
/// let config = DataConfig::new();
/// config.set_primary_datasource("main")?;
/// assert_eq!(config.primary_datasource(), "main");
/// ```
#[derive(Clone, Default)]
pub struct DataConfig {
    inner: Arc<DataConfigInner>,
}

impl DataConfig {
    pub fn new() -> Self {
        DataConfig {
            inner: Arc::new(DataConfigInner::default()),
        }
    }

    /// Datasource used when neither the method nor the injection point names one.
    pub fn primary_datasource(&self) -> String {
        self.inner
            .primary_datasource
            .get()
            .cloned()
            .unwrap_or_else(|| DEFAULT_DATASOURCE.to_string())
    }

    /// # Errors
    ///
    /// Returns error if already set or if `name` is empty.
    pub fn set_primary_datasource(&self, name: &str) -> DataResult<()> {
        if name.is_empty() {
            log::error!("Primary datasource name cannot be empty");
            return Err(DataError::new(
                "Primary datasource name cannot be empty",
                ErrorKind::IllegalArgument,
            ));
        }
        set_once(&self.inner.primary_datasource, name.to_string(), "primary datasource")
    }

    /// Worker threads of the executor backing asynchronous operations.
    pub fn executor_pool_size(&self) -> usize {
        self.inner
            .executor_pool_size
            .get()
            .copied()
            .unwrap_or_else(get_cpu_count)
    }

    /// # Errors
    ///
    /// Returns error if already set or if `size` is zero.
    pub fn set_executor_pool_size(&self, size: usize) -> DataResult<()> {
        if size == 0 {
            log::error!("Executor pool size must be positive");
            return Err(DataError::new(
                "Executor pool size must be positive",
                ErrorKind::IllegalArgument,
            ));
        }
        set_once(&self.inner.executor_pool_size, size, "executor pool size")
    }

    pub fn executor_thread_prefix(&self) -> String {
        self.inner
            .executor_thread_prefix
            .get()
            .cloned()
            .unwrap_or_else(|| DEFAULT_THREAD_PREFIX.to_string())
    }

    /// # Errors
    ///
    /// Returns error if already set.
    pub fn set_executor_thread_prefix(&self, prefix: &str) -> DataResult<()> {
        set_once(&self.inner.executor_thread_prefix, prefix.to_string(), "executor thread prefix")
    }
}

#[derive(Default)]
struct DataConfigInner {
    primary_datasource: OnceLock<String>,
    executor_pool_size: OnceLock<usize>,
    executor_thread_prefix: OnceLock<String>,
}

fn set_once<T>(cell: &OnceLock<T>, value: T, setting: &str) -> DataResult<()> {
    cell.set(value).map_err(|_| {
        log::error!("The {} is already configured", setting);
        DataError::new(
            &format!("The {} is already configured", setting),
            ErrorKind::Configuration,
        )
    })
}
