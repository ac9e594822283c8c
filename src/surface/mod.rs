//! Accelerated drawing surface and its render thread
//!
//! A [`Surface`] is created with a fixed [`SurfaceConfig`] and owns a
//! dedicated render thread. Work reaches that thread only through
//! [`SurfaceHandle::queue_event`], which runs tasks in FIFO order. Controllers
//! keep a cloned [`SurfaceHandle`] as their back-reference to the surface; the
//! [`Surface`] itself stays with the view that created it.

use crate::core::config::SurfaceConfig;
use crate::{MapError, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// Unit of work executed on the render thread.
pub type RenderTask = Box<dyn FnOnce() + Send + 'static>;

enum RenderCommand {
    Run(RenderTask),
    Shutdown,
}

#[derive(Debug)]
struct SurfaceShared {
    config: SurfaceConfig,
    render_thread: OnceLock<ThreadId>,
    // Senders hold the read side while enqueueing, shutdown takes the write
    // side, so every accepted task is ahead of the shutdown marker.
    closed: RwLock<bool>,
    tasks_run: AtomicUsize,
}

/// Cloneable reference to a surface's render queue.
#[derive(Clone)]
pub struct SurfaceHandle {
    tx: Sender<RenderCommand>,
    shared: Arc<SurfaceShared>,
}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("render_thread", &self.shared.render_thread.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SurfaceHandle {
    /// Enqueue a task on the render thread.
    ///
    /// A task accepted here always runs, even when the surface is shut down
    /// concurrently from another thread.
    pub fn queue_event(&self, task: RenderTask) -> Result<()> {
        let closed = self
            .shared
            .closed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *closed {
            return Err(MapError::SurfaceClosed);
        }
        self.tx
            .send(RenderCommand::Run(task))
            .map_err(|_| MapError::SurfaceClosed)
    }

    /// Whether the calling thread is this surface's render thread.
    pub fn is_render_thread(&self) -> bool {
        self.shared.render_thread.get() == Some(&thread::current().id())
    }

    pub fn render_thread_id(&self) -> Option<ThreadId> {
        self.shared.render_thread.get().copied()
    }

    pub fn config(&self) -> &SurfaceConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        *self
            .shared
            .closed
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of render tasks that have finished running.
    pub fn tasks_run(&self) -> usize {
        self.shared.tasks_run.load(Ordering::SeqCst)
    }

    /// Block until every task queued before this call has run.
    ///
    /// Returns `Ok(false)` if the queue did not drain within `timeout`.
    pub fn flush(&self, timeout: Duration) -> Result<bool> {
        let (done_tx, done_rx) = bounded(1);
        self.queue_event(Box::new(move || {
            let _ = done_tx.send(());
        }))?;
        Ok(done_rx.recv_timeout(timeout).is_ok())
    }
}

/// An accelerated drawing area with a dedicated render thread.
pub struct Surface {
    handle: SurfaceHandle,
    worker: Option<JoinHandle<()>>,
}

impl Surface {
    /// Create the surface and start its render thread.
    pub fn new(config: SurfaceConfig) -> Result<Self> {
        log::debug!(
            "creating surface: format={:?} client_version={} preserve_context={}",
            config.pixel_format.as_tuple(),
            config.client_version,
            config.preserve_context_on_pause
        );

        let (tx, rx) = unbounded();
        let shared = Arc::new(SurfaceShared {
            config,
            render_thread: OnceLock::new(),
            closed: RwLock::new(false),
            tasks_run: AtomicUsize::new(0),
        });

        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(shared.config.render_thread_name.clone())
            .spawn(move || Self::render_loop(rx, worker_shared))?;

        // The render loop records its own id too; whichever lands first wins
        // and both are the same thread.
        let _ = shared.render_thread.set(worker.thread().id());

        Ok(Self {
            handle: SurfaceHandle { tx, shared },
            worker: Some(worker),
        })
    }

    /// A handle controllers can keep to reach the render thread.
    pub fn handle(&self) -> SurfaceHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &SurfaceConfig {
        self.handle.config()
    }

    pub fn queue_event(&self, task: RenderTask) -> Result<()> {
        self.handle.queue_event(task)
    }

    pub fn render_thread_id(&self) -> Option<ThreadId> {
        self.handle.render_thread_id()
    }

    /// Stop accepting work, let already-queued tasks run, then join the
    /// render thread. Safe to call more than once.
    pub fn shutdown(&mut self) {
        {
            let mut closed = self
                .handle
                .shared
                .closed
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if *closed {
                return;
            }
            *closed = true;
            let _ = self.handle.tx.send(RenderCommand::Shutdown);
        }

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                log::warn!("surface shut down from its own render thread, not joining");
                return;
            }
            if worker.join().is_err() {
                log::error!("render thread terminated abnormally");
            }
        }
        log::debug!("surface render thread stopped");
    }

    fn render_loop(rx: Receiver<RenderCommand>, shared: Arc<SurfaceShared>) {
        let _ = shared.render_thread.set(thread::current().id());
        log::debug!("render thread started");

        while let Ok(command) = rx.recv() {
            match command {
                RenderCommand::Run(task) => {
                    if catch_unwind(AssertUnwindSafe(task)).is_err() {
                        log::error!("render task panicked");
                    }
                    shared.tasks_run.fetch_add(1, Ordering::SeqCst);
                }
                RenderCommand::Shutdown => break,
            }
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        self.shutdown();
    }
}
