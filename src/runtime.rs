//! Runtime abstraction layer for background work
//!
//! Controller initialization is blocking (engine setup, scene file I/O), so
//! it never runs on the UI thread. This module provides runtime-agnostic
//! executors for that work, so the view can run on plain threads or on an
//! existing Tokio runtime.

use crate::{MapError, Result};
use std::sync::{Arc, OnceLock};

/// A blocking job handed to a background worker.
pub type BlockingJob = Box<dyn FnOnce() + Send + 'static>;

/// A trait for running blocking jobs off the UI thread (object-safe)
pub trait BackgroundExecutor: Send + Sync + 'static {
    /// Start `job` on a background worker. Returns once the job is handed
    /// off, not when it finishes.
    fn execute(&self, job: BlockingJob) -> Result<()>;

    /// Short name used in log output
    fn name(&self) -> &'static str;
}

/// Default executor implementations
pub mod executors {
    use super::*;
    use crate::core::constants::INIT_THREAD_NAME;

    /// Spawns one named OS thread per job.
    #[derive(Debug, Clone)]
    pub struct ThreadExecutor {
        thread_name: String,
    }

    impl ThreadExecutor {
        pub fn new(thread_name: impl Into<String>) -> Self {
            Self {
                thread_name: thread_name.into(),
            }
        }
    }

    impl Default for ThreadExecutor {
        fn default() -> Self {
            Self::new(INIT_THREAD_NAME)
        }
    }

    impl BackgroundExecutor for ThreadExecutor {
        fn execute(&self, job: BlockingJob) -> Result<()> {
            std::thread::Builder::new()
                .name(self.thread_name.clone())
                .spawn(job)
                .map(|_| ())
                .map_err(|e| MapError::Executor(format!("failed to spawn worker thread: {e}")))
        }

        fn name(&self) -> &'static str {
            "thread"
        }
    }

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::runtime::Handle;

        /// Runs jobs on the blocking pool of a Tokio runtime.
        #[derive(Debug, Clone)]
        pub struct TokioExecutor {
            handle: Handle,
        }

        impl TokioExecutor {
            pub fn new(handle: Handle) -> Self {
                Self { handle }
            }

            /// Bind to the runtime the caller is currently running in.
            pub fn current() -> Result<Self> {
                Handle::try_current()
                    .map(Self::new)
                    .map_err(|e| MapError::Executor(format!("no tokio runtime: {e}")))
            }
        }

        impl BackgroundExecutor for TokioExecutor {
            fn execute(&self, job: BlockingJob) -> Result<()> {
                // Completion is reported by the job itself. A runtime that is
                // shutting down drops the job unrun, which the job observes.
                drop(self.handle.spawn_blocking(job));
                Ok(())
            }

            fn name(&self) -> &'static str {
                "tokio"
            }
        }
    }
}

/// Global executor instance
static EXECUTOR: OnceLock<Arc<dyn BackgroundExecutor>> = OnceLock::new();

/// Install the process-wide default executor. Only the first call wins;
/// returns `false` if a default was already in place.
pub fn init_executor(executor: Arc<dyn BackgroundExecutor>) -> bool {
    EXECUTOR.set(executor).is_ok()
}

/// The executor installed with [`init_executor`], if any.
pub fn installed_executor() -> Option<Arc<dyn BackgroundExecutor>> {
    EXECUTOR.get().cloned()
}

/// The installed executor, or a fresh [`executors::ThreadExecutor`] when none
/// is installed. Never installs one.
pub fn executor() -> Arc<dyn BackgroundExecutor> {
    installed_executor().unwrap_or_else(|| Arc::new(executors::ThreadExecutor::default()))
}
