//! Request Scheduler
//!
//! One bounded FIFO queue and one worker task per [`RequestKind`]. Callers
//! enqueue requests and await their completion signal; each worker pops its
//! queue in order and hands the request to the kind's resource manager.
//! Kinds never wait on each other.

pub mod queue;
pub mod stats;
mod worker;

use crate::config::SyscoreConfig;
use crate::error::SyscallError;
use crate::manager::{
    InferenceManager, MemoryManager, ResourceManager, StorageManager, ToolManager,
};
use crate::metrics::LatencyReport;
use crate::request::{Request, RequestHandle, Response, StatusSnapshot};
use crate::types::RequestKind;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub use queue::RequestQueue;
pub use stats::QueueStats;

use stats::KindStats;
use worker::Worker;

/// Queue, manager, and counters for one kind
struct Lane {
    queue: Arc<RequestQueue>,
    manager: Arc<dyn ResourceManager>,
    stats: Arc<KindStats>,
}

/// Worker handles and the stop signal of the current run
#[derive(Default)]
struct Lifecycle {
    workers: Vec<JoinHandle<()>>,
    /// Wakes idle workers on stop; replaced on every start
    shutdown: Option<watch::Sender<bool>>,
}

/// Multi-resource request scheduler
pub struct Scheduler {
    /// Indexed by `RequestKind::index`
    lanes: Vec<Lane>,
    poll_interval: Duration,
    /// Locked before `running`; start and stop change both under it
    lifecycle: Mutex<Lifecycle>,
    /// Running state
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    /// Scheduler with the stock managers sized from `config`.
    pub fn from_config(config: &SyscoreConfig) -> Result<Self, SyscallError> {
        SchedulerBuilder::from_config(config)?.build()
    }

    fn lane(&self, kind: RequestKind) -> &Lane {
        &self.lanes[kind.index()]
    }

    /// Submit `request` to the `kind` queue.
    ///
    /// Only inserts; the request runs once a worker picks it up, which may
    /// be after a later `start`.
    pub fn enqueue(&self, kind: RequestKind, request: Request) -> Result<RequestHandle, SyscallError> {
        let handle = RequestHandle::new(kind, request);
        self.submit(handle.clone())?;
        Ok(handle)
    }

    /// Submit a handle built by the caller. A handle can be submitted once.
    pub fn submit(&self, handle: RequestHandle) -> Result<(), SyscallError> {
        self.lane(handle.kind()).queue.push(handle)
    }

    /// Launch one worker per kind.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), SyscallError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SyscallError::ConfigError("scheduler must be started inside a tokio runtime".to_string())
        })?;

        let mut lifecycle = self.lifecycle.lock();
        let mut running = self.running.write();
        if *running {
            return Err(SyscallError::AlreadyRunning);
        }
        *running = true;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        for (kind, lane) in RequestKind::ALL.iter().zip(&self.lanes) {
            let worker = Worker {
                kind: *kind,
                queue: Arc::clone(&lane.queue),
                manager: Arc::clone(&lane.manager),
                stats: Arc::clone(&lane.stats),
                running: Arc::clone(&self.running),
                shutdown: shutdown_rx.clone(),
                poll_interval: self.poll_interval,
            };
            lifecycle.workers.push(runtime.spawn(worker.run()));
        }
        lifecycle.shutdown = Some(shutdown_tx);
        let worker_count = lifecycle.workers.len();
        drop(running);
        drop(lifecycle);

        info!(
            worker_count,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Started scheduler workers"
        );
        Ok(())
    }

    /// Stop every worker and wait for them to exit.
    ///
    /// A request already executing finishes first; queued requests stay
    /// queued for the next `start`.
    ///
    /// Only the workers of the run being stopped are awaited. A `start` that
    /// lands while they drain begins a fresh run with its own workers.
    pub async fn stop(&self) -> Result<(), SyscallError> {
        let workers = {
            let mut lifecycle = self.lifecycle.lock();
            let mut running = self.running.write();
            if !*running {
                return Ok(());
            }
            *running = false;
            if let Some(shutdown) = lifecycle.shutdown.take() {
                shutdown.send_replace(true);
            }
            std::mem::take(&mut lifecycle.workers)
        };

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler worker exited abnormally");
            }
        }

        info!("Stopped scheduler workers");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Wait for `handle` to finish and return its outcome.
    pub async fn await_completion(&self, handle: &RequestHandle) -> Result<Response, SyscallError> {
        handle.wait().await
    }

    pub fn get_status(&self, handle: &RequestHandle) -> StatusSnapshot {
        handle.status()
    }

    /// Get queue statistics for `kind`
    pub fn stats(&self, kind: RequestKind) -> QueueStats {
        let lane = self.lane(kind);
        lane.stats.snapshot(lane.queue.len())
    }

    /// Waiting and turnaround latency of finished `kind` requests
    pub fn latency(&self, kind: RequestKind) -> LatencyReport {
        self.lane(kind).stats.latency()
    }

    pub fn manager(&self, kind: RequestKind) -> Arc<dyn ResourceManager> {
        Arc::clone(&self.lane(kind).manager)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        *self.running.write() = false;
        if let Some(shutdown) = self.lifecycle.get_mut().shutdown.take() {
            shutdown.send_replace(true);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.is_running())
            .field("poll_interval", &self.poll_interval)
            .field(
                "queues",
                &self.lanes.iter().map(|lane| &lane.queue).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Assembles a [`Scheduler`] from injected queues and managers
pub struct SchedulerBuilder {
    poll_interval: Duration,
    queue_capacity: usize,
    queues: [Option<Arc<RequestQueue>>; 4],
    managers: [Option<Arc<dyn ResourceManager>>; 4],
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        let defaults = crate::config::SchedulerConfig::default();
        Self {
            poll_interval: defaults.poll_interval(),
            queue_capacity: defaults.queue_capacity,
            queues: Default::default(),
            managers: Default::default(),
        }
    }

    /// Builder with the stock managers and sizes from `config`; any of them
    /// can still be replaced before `build`.
    pub fn from_config(config: &SyscoreConfig) -> Result<Self, SyscallError> {
        config.validate()?;
        let builder = Self::new()
            .poll_interval(config.scheduler.poll_interval())
            .queue_capacity(config.scheduler.queue_capacity)
            .manager(Arc::new(InferenceManager::default()))
            .manager(Arc::new(MemoryManager::with_zlib(
                config.memory.block_size,
                config.memory.block_count,
                config.memory.compression_level,
            )))
            .manager(Arc::new(StorageManager::with_policy(
                config.store.capacity,
                config.store.eviction,
            )))
            .manager(Arc::new(ToolManager::default()));
        Ok(builder)
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Capacity of queues the builder creates itself
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Use `queue` for its kind instead of a fresh one
    pub fn queue(mut self, queue: Arc<RequestQueue>) -> Self {
        let index = queue.kind().index();
        self.queues[index] = Some(queue);
        self
    }

    /// Register `manager` for the kind it reports
    pub fn manager(mut self, manager: Arc<dyn ResourceManager>) -> Self {
        let index = manager.kind().index();
        self.managers[index] = Some(manager);
        self
    }

    pub fn build(self) -> Result<Scheduler, SyscallError> {
        if self.poll_interval.is_zero() {
            return Err(SyscallError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SyscallError::ConfigError(
                "queue capacity must be greater than zero".to_string(),
            ));
        }

        let Self {
            poll_interval,
            queue_capacity,
            mut queues,
            mut managers,
        } = self;

        let mut lanes = Vec::with_capacity(RequestKind::ALL.len());
        for kind in RequestKind::ALL {
            let manager = managers[kind.index()].take().ok_or_else(|| {
                SyscallError::ConfigError(format!("no resource manager registered for {}", kind))
            })?;
            let queue = queues[kind.index()]
                .take()
                .unwrap_or_else(|| Arc::new(RequestQueue::new(kind, queue_capacity)));
            debug!(kind = %kind, capacity = queue.capacity(), "Configured scheduler lane");
            lanes.push(Lane {
                queue,
                manager,
                stats: Arc::new(KindStats::default()),
            });
        }

        Ok(Scheduler {
            lanes,
            poll_interval,
            lifecycle: Mutex::new(Lifecycle::default()),
            running: Arc::new(RwLock::new(false)),
        })
    }
}
