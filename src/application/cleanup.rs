//! Background removal of local scratch files.
//!
//! Jobs go through a bounded queue consumed by a fixed set of workers. A job
//! is retried until every path is gone or `max_attempts` is reached; jobs
//! that still fail are counted as orphans so leaked files stay visible.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CleanupJob {
    pub video_id: String,
    pub paths: Vec<PathBuf>,
}

impl CleanupJob {
    pub fn new(video_id: impl Into<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            video_id: video_id.into(),
            paths,
        }
    }
}

#[derive(Debug, Default)]
pub struct CleanupStats {
    completed: AtomicU64,
    retried: AtomicU64,
    orphaned: AtomicU64,
    orphaned_paths: Mutex<Vec<PathBuf>>,
}

impl CleanupStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn orphaned(&self) -> u64 {
        self.orphaned.load(Ordering::Relaxed)
    }

    pub fn orphaned_paths(&self) -> Vec<PathBuf> {
        match self.orphaned_paths.lock() {
            Ok(paths) => paths.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_orphans(&self, paths: Vec<PathBuf>) {
        self.orphaned.fetch_add(1, Ordering::Relaxed);
        match self.orphaned_paths.lock() {
            Ok(mut orphaned) => orphaned.extend(paths),
            Err(poisoned) => poisoned.into_inner().extend(paths),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupSettings {
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            max_attempts: 5,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Cheap handle used by the pipeline to submit jobs.
#[derive(Debug, Clone)]
pub struct CleanupHandle {
    sender: mpsc::Sender<CleanupJob>,
    stats: Arc<CleanupStats>,
}

impl CleanupHandle {
    /// Queue a job. Falls back to removing the paths inline when the pool
    /// is gone, so a job is never silently dropped.
    pub async fn schedule(&self, job: CleanupJob) {
        debug!(video_id = %job.video_id, paths = job.paths.len(), "scheduling cleanup");
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job).await {
            warn!(video_id = %job.video_id, "cleanup pool closed, cleaning up inline");
            let remaining = remove_paths(&job.paths).await;
            if remaining.is_empty() {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
            } else {
                error!(video_id = %job.video_id, ?remaining, "leaving orphaned scratch files");
                self.stats.record_orphans(remaining);
            }
        }
    }

    pub fn stats(&self) -> Arc<CleanupStats> {
        self.stats.clone()
    }
}

/// Worker pool owning the receiving end of the cleanup queue.
pub struct CleanupPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
    stats: Arc<CleanupStats>,
}

impl CleanupPool {
    /// Spawn the workers. Returns the pool and a handle for submitting jobs.
    pub fn start(settings: CleanupSettings) -> (Self, CleanupHandle) {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let stats = Arc::new(CleanupStats::default());
        let shutdown = CancellationToken::new();

        let handles = (0..settings.workers.max(1))
            .map(|worker_id| {
                let receiver = receiver.clone();
                let stats = stats.clone();
                let shutdown = shutdown.clone();
                let settings = settings.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, receiver, stats, shutdown, settings).await;
                })
            })
            .collect();

        info!(workers = settings.workers.max(1), "cleanup pool started");

        let handle = CleanupHandle {
            sender,
            stats: stats.clone(),
        };
        (
            Self {
                handles,
                shutdown,
                stats,
            },
            handle,
        )
    }

    pub fn stats(&self) -> Arc<CleanupStats> {
        self.stats.clone()
    }

    /// Stop accepting new work once the queue is drained and wait for the workers.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "cleanup worker panicked");
            }
        }
        info!(
            completed = self.stats.completed(),
            retried = self.stats.retried(),
            orphaned = self.stats.orphaned(),
            "cleanup pool stopped"
        );
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<CleanupJob>>>,
    stats: Arc<CleanupStats>,
    shutdown: CancellationToken,
    settings: CleanupSettings,
) {
    debug!(worker_id, "cleanup worker started");
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                job = receiver.recv() => job,
                _ = shutdown.cancelled() => receiver.try_recv().ok(),
            }
        };

        let Some(job) = job else {
            break;
        };
        run_job(job, &stats, &settings).await;
    }
    debug!(worker_id, "cleanup worker stopped");
}

async fn run_job(job: CleanupJob, stats: &CleanupStats, settings: &CleanupSettings) {
    let mut remaining = job.paths;
    let max_attempts = settings.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        remaining = remove_paths(&remaining).await;
        if remaining.is_empty() {
            stats.completed.fetch_add(1, Ordering::Relaxed);
            debug!(video_id = %job.video_id, attempt, "cleanup done");
            return;
        }
        if attempt < max_attempts {
            stats.retried.fetch_add(1, Ordering::Relaxed);
            warn!(video_id = %job.video_id, attempt, ?remaining, "cleanup incomplete, retrying");
            tokio::time::sleep(settings.retry_delay).await;
        }
    }

    error!(video_id = %job.video_id, ?remaining, "cleanup gave up, scratch files orphaned");
    stats.record_orphans(remaining);
}

/// Removes every path, returning the ones that could not be removed.
async fn remove_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut remaining = Vec::new();
    for path in paths {
        if let Err(e) = remove_path(path).await {
            warn!(path = %path.display(), error = %e, "failed to remove scratch path");
            remaining.push(path.clone());
        }
    }
    remaining
}

async fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
