use crate::errors::{DataError, DataResult, ErrorKind};
use futures::executor::ThreadPool;
use std::sync::Arc;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking tasks off the caller's thread.
///
/// The queueing and backpressure policy belongs entirely to the implementation;
/// no ordering is guaranteed between concurrently submitted tasks.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: Task);
}

impl TaskExecutor for ThreadPool {
    fn execute(&self, task: Task) {
        self.spawn_ok(async move { task() });
    }
}

impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    fn execute(&self, task: Task) {
        (**self).execute(task)
    }
}

/// Spawns a fresh thread per task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnExecutor;

impl TaskExecutor for SpawnExecutor {
    fn execute(&self, task: Task) {
        std::thread::spawn(task);
    }
}

/// Creates a bounded thread pool for the blocking-to-async bridge.
pub fn thread_pool(size: usize, name_prefix: &str) -> DataResult<ThreadPool> {
    ThreadPool::builder()
        .pool_size(size.max(1))
        .name_prefix(name_prefix)
        .create()
        .map_err(|err| {
            log::error!("Failed to create executor pool: {}", err);
            DataError::new_with_cause(
                "Failed to create executor pool",
                ErrorKind::Configuration,
                DataError::from(err),
            )
        })
}
