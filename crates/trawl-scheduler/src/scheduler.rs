use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use rayon::ThreadPool;
use tokio::sync::{broadcast, oneshot};

use trawl_core::panic_payload_to_str;

use crate::{task::BlockingTask, CancellationToken, Cancelled, ProgressSender, TaskError};

enum BlockingPool {
    Rayon(ThreadPool),
    Inline,
}

impl BlockingPool {
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            BlockingPool::Rayon(pool) => pool.spawn(job),
            BlockingPool::Inline => job(),
        }
    }

    fn install<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match self {
            BlockingPool::Rayon(pool) => pool.install(f),
            BlockingPool::Inline => f(),
        }
    }

    fn threads(&self) -> usize {
        match self {
            BlockingPool::Rayon(pool) => pool.current_num_threads(),
            BlockingPool::Inline => 1,
        }
    }
}

fn build_rayon_pool(prefix: &'static str, threads: usize) -> BlockingPool {
    // Thread creation can fail under low process/thread limits; degrade to a smaller pool
    // instead of failing startup.
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return BlockingPool::Rayon(pool),
            Err(err) if threads > 1 => {
                tracing::debug!(
                    target: "trawl.scheduler",
                    pool = prefix,
                    threads,
                    error = %err,
                    "failed to build worker pool; retrying with fewer threads"
                );
                threads = (threads / 2).max(1);
            }
            Err(err) => {
                tracing::warn!(
                    target: "trawl.scheduler",
                    pool = prefix,
                    error = %err,
                    "failed to build worker pool; running jobs inline"
                );
                return BlockingPool::Inline;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Parsing and resolving. Bounded by hardware concurrency.
    Compute,
    /// Fire-and-forget persistence work.
    Background,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub compute_threads: usize,
    pub background_threads: usize,
    pub progress_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Config with an explicit compute bound; everything else is defaulted.
    pub fn with_compute_threads(compute_threads: usize) -> Self {
        Self {
            compute_threads: compute_threads.max(1),
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            compute_threads: available,
            background_threads: available.clamp(1, 2),
            progress_channel_capacity: 1024,
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    compute_pool: BlockingPool,
    background_pool: BlockingPool,
    progress: ProgressSender,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let compute_pool = build_rayon_pool("trawl-compute", config.compute_threads);
        let background_pool = build_rayon_pool("trawl-background", config.background_threads);

        let (progress_tx, _) = broadcast::channel(config.progress_channel_capacity.max(1));
        let progress = ProgressSender::new(progress_tx);

        Self {
            inner: Arc::new(SchedulerInner {
                compute_pool,
                background_pool,
                progress,
            }),
        }
    }

    pub fn progress(&self) -> ProgressSender {
        self.inner.progress.clone()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<crate::ProgressEvent> {
        self.inner.progress.subscribe()
    }

    /// Number of worker threads in the compute pool (the parallelism bound for fan-out).
    pub fn compute_parallelism(&self) -> usize {
        self.inner.compute_pool.threads()
    }

    /// Run `f` inside the compute pool so rayon parallel iterators it creates are bounded by
    /// the pool size. Blocks the calling thread until `f` returns.
    pub fn install_compute<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.inner.compute_pool.install(f)
    }

    /// Run `f` on `pool`, resolving the returned task with its result.
    ///
    /// A token that is already cancelled skips the job entirely. Panics inside `f` are
    /// caught and surface as [`TaskError::Panicked`].
    pub fn spawn_on<T, F>(&self, pool: PoolKind, token: CancellationToken, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if token.is_cancelled() {
            let _ = tx.send(Err(TaskError::Cancelled));
            return BlockingTask::new(token, rx);
        }

        let job_token = token.clone();
        let job = move || {
            let _ = tx.send(run_guarded(pool, job_token, f));
        };
        match pool {
            PoolKind::Compute => self.inner.compute_pool.spawn(job),
            PoolKind::Background => self.inner.background_pool.spawn(job),
        }
        BlockingTask::new(token, rx)
    }

    pub fn spawn_compute<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_on(PoolKind::Compute, CancellationToken::new(), f)
    }

    pub fn spawn_background<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_on(PoolKind::Background, CancellationToken::new(), f)
    }
}

fn run_guarded<T, F>(pool: PoolKind, token: CancellationToken, f: F) -> Result<T, TaskError>
where
    F: FnOnce(CancellationToken) -> Result<T, Cancelled>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(|| f(token))) {
        Ok(result) => result.map_err(TaskError::from),
        Err(panic) => {
            tracing::error!(
                target: "trawl.scheduler",
                pool = ?pool,
                panic = %panic_payload_to_str(&*panic),
                "task panicked"
            );
            Err(TaskError::Panicked)
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
