//! Execution contexts for blocking storage calls.

use rxcache_core::{CacheResult, StorageError};
use tokio::runtime::Handle;

/// Where the engine runs storage reads and write-through puts.
///
/// Storage backends are synchronous and may block on disk I/O, so by default
/// they run on the blocking pool instead of the task polling the stream.
#[derive(Debug, Clone, Default)]
pub enum Scheduler {
    /// Blocking pool of the runtime polling the stream.
    #[default]
    Io,
    /// Blocking pool of an explicit runtime.
    Runtime(Handle),
    /// Inline on the polling task.
    Immediate,
}

impl Scheduler {
    /// Run a storage call on this scheduler.
    ///
    /// With [`Scheduler::Io`] the future must be polled inside a tokio
    /// runtime. A call already handed to a blocking pool runs to completion
    /// even if the returned future is dropped.
    pub async fn run<F, R>(&self, task: F) -> CacheResult<R>
    where
        F: FnOnce() -> CacheResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let handle = match self {
            Scheduler::Immediate => return task(),
            Scheduler::Io => tokio::task::spawn_blocking(task),
            Scheduler::Runtime(runtime) => runtime.spawn_blocking(task),
        };

        handle.await.map_err(|e| StorageError::Backend {
            reason: format!("storage task failed: {e}"),
        })?
    }

    pub fn is_immediate(&self) -> bool {
        matches!(self, Scheduler::Immediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_immediate_runs_inline() {
        let thread = std::thread::current().id();
        let ran_on = Scheduler::Immediate
            .run(move || Ok(std::thread::current().id()))
            .await
            .expect("task should succeed");
        assert_eq!(ran_on, thread);
    }

    #[tokio::test]
    async fn test_io_runs_off_the_polling_thread() {
        let thread = std::thread::current().id();
        let ran_on = Scheduler::Io
            .run(move || Ok(std::thread::current().id()))
            .await
            .expect("task should succeed");
        assert_ne!(ran_on, thread);
    }

    #[tokio::test]
    async fn test_runtime_handle() {
        let scheduler = Scheduler::Runtime(Handle::current());
        let value = scheduler.run(|| Ok(21 * 2)).await.expect("task should succeed");
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_task_error_is_returned() {
        let result: CacheResult<()> = Scheduler::Io
            .run(|| Err(StorageError::LockPoisoned.into()))
            .await;
        assert_eq!(result, Err(StorageError::LockPoisoned.into()));
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_backend_error() {
        let result: CacheResult<()> = Scheduler::Io.run(|| panic!("backend exploded")).await;
        assert!(matches!(
            result,
            Err(rxcache_core::CacheError::Storage(StorageError::Backend { .. }))
        ));
    }

    #[test]
    fn test_default_is_io() {
        assert!(matches!(Scheduler::default(), Scheduler::Io));
        assert!(!Scheduler::default().is_immediate());
    }
}
