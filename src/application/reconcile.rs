//! Recovery for runs interrupted by a crash.
//!
//! Status updates are not transactional across pipeline steps, so a crash
//! can leave a record in `processing` forever and its run directory on disk.
//! Records stuck longer than the grace period are marked `error`; their run
//! directories, and any directory without a live record, are handed to the
//! cleanup pool. Failed runs are never resumed.

use crate::application::cleanup::{CleanupHandle, CleanupJob};
use crate::domain::video::VideoStatus;
use crate::ports::repository::{RepositoryError, VideoRepository};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub failed_stale: usize,
    pub swept_dirs: usize,
}

pub struct Reconciler<R> {
    repo: R,
    cleanup: CleanupHandle,
    scratch_dir: PathBuf,
    grace: Duration,
}

impl<R> Reconciler<R>
where
    R: VideoRepository + 'static,
{
    pub fn new(repo: R, cleanup: CleanupHandle, scratch_dir: PathBuf, grace: Duration) -> Self {
        Self {
            repo,
            cleanup,
            scratch_dir,
            grace,
        }
    }

    /// Marks records that stayed in `processing` past the grace period as `error`.
    pub async fn fail_stale_processing(&self) -> Result<usize, RepositoryError> {
        let grace_secs = self.grace.as_secs().min(i64::MAX as u64 / 1000) as i64;
        let cutoff = Utc::now() - chrono::Duration::seconds(grace_secs);
        let mut failed = 0;

        for record in self.repo.find_by_status(VideoStatus::Processing).await? {
            if record.updated_at > cutoff {
                continue;
            }
            match self.repo.update_status(&record.id, VideoStatus::Error).await {
                Ok(_) => {
                    warn!(
                        video_id = %record.id,
                        owner_id = %record.owner_id,
                        since = %record.updated_at,
                        "stale processing record marked as error"
                    );
                    failed += 1;
                }
                // finished concurrently
                Err(RepositoryError::InvalidTransition(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(failed)
    }

    /// Queues removal of run directories that no live run owns anymore.
    pub async fn sweep_scratch(&self) -> Result<usize, RepositoryError> {
        let mut entries = match tokio::fs::read_dir(&self.scratch_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(RepositoryError::Backend(e.to_string())),
        };

        let mut swept = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read scratch directory");
                    break;
                }
            };
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_dir() || !self.is_older_than_grace(metadata.modified().ok()) {
                continue;
            }
            // Dot-directories (the upload spool) are not run workspaces.
            let Some(video_id) = entry
                .file_name()
                .to_str()
                .filter(|name| !name.starts_with('.'))
                .map(String::from)
            else {
                continue;
            };

            let orphaned = match self.repo.find_by_id(&video_id).await? {
                Some(record) => record.status.is_terminal(),
                None => true,
            };
            if orphaned {
                debug!(video_id = %video_id, "sweeping abandoned run directory");
                self.cleanup
                    .schedule(CleanupJob::new(video_id, vec![entry.path()]))
                    .await;
                swept += 1;
            }
        }
        Ok(swept)
    }

    pub async fn run_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        match self.fail_stale_processing().await {
            Ok(count) => report.failed_stale = count,
            Err(e) => error!(error = %e, "failed to reconcile stale records"),
        }
        match self.sweep_scratch().await {
            Ok(count) => report.swept_dirs = count,
            Err(e) => error!(error = %e, "failed to sweep scratch directory"),
        }
        if report != ReconcileReport::default() {
            info!(
                failed_stale = report.failed_stale,
                swept_dirs = report.swept_dirs,
                "reconciliation pass finished"
            );
        }
        report
    }

    /// Runs a pass immediately, then every `every` until `shutdown` fires.
    pub fn start(self: Arc<Self>, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }
            debug!("reconciler stopped");
        })
    }

    fn is_older_than_grace(&self, modified: Option<SystemTime>) -> bool {
        modified
            .and_then(|m| m.elapsed().ok())
            .map(|age| age >= self.grace)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::memory::InMemoryRepository;
    use crate::application::cleanup::{CleanupPool, CleanupSettings};
    use crate::domain::video::VideoRecord;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_stale_processing_becomes_error() {
        let repo = InMemoryRepository::new();
        let mut stale = VideoRecord::new("1");
        stale.updated_at = Utc::now() - chrono::Duration::hours(2);
        let fresh = VideoRecord::new("1");
        let mut done = VideoRecord::new("1");
        done.transition(VideoStatus::ReadyToDownload).unwrap();
        done.updated_at = stale.updated_at;
        for record in [&stale, &fresh, &done] {
            repo.save(record).await.unwrap();
        }

        let (pool, handle) = CleanupPool::start(CleanupSettings::default());
        let scratch = tempdir().unwrap();
        let reconciler = Reconciler::new(
            repo.clone(),
            handle,
            scratch.path().to_path_buf(),
            Duration::from_secs(3600),
        );

        assert_eq!(reconciler.fail_stale_processing().await.unwrap(), 1);
        let status = |id: String| {
            let repo = repo.clone();
            async move { repo.find_by_id(&id).await.unwrap().unwrap().status }
        };
        assert_eq!(status(stale.id.clone()).await, VideoStatus::Error);
        assert_eq!(status(fresh.id.clone()).await, VideoStatus::Processing);
        assert_eq!(status(done.id.clone()).await, VideoStatus::ReadyToDownload);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweep_removes_only_abandoned_dirs() {
        let repo = InMemoryRepository::new();
        let running = VideoRecord::new("1");
        let mut finished = VideoRecord::new("1");
        finished.transition(VideoStatus::Error).unwrap();
        repo.save(&running).await.unwrap();
        repo.save(&finished).await.unwrap();

        let scratch = tempdir().unwrap();
        for id in [running.id.as_str(), finished.id.as_str(), "unknown-run"] {
            std::fs::create_dir_all(scratch.path().join(id)).unwrap();
        }
        std::fs::write(scratch.path().join("loose-file"), b"x").unwrap();

        let (pool, handle) = CleanupPool::start(CleanupSettings::default());
        let reconciler = Reconciler::new(
            repo.clone(),
            handle,
            scratch.path().to_path_buf(),
            Duration::ZERO,
        );
        assert_eq!(reconciler.sweep_scratch().await.unwrap(), 2);
        pool.shutdown().await;

        assert!(scratch.path().join(&running.id).exists());
        assert!(!scratch.path().join(&finished.id).exists());
        assert!(!scratch.path().join("unknown-run").exists());
        assert!(scratch.path().join("loose-file").exists());
    }

    #[tokio::test]
    async fn test_sweep_respects_grace_period() {
        let scratch = tempdir().unwrap();
        std::fs::create_dir_all(scratch.path().join("just-started")).unwrap();

        let (pool, handle) = CleanupPool::start(CleanupSettings::default());
        let reconciler = Reconciler::new(
            InMemoryRepository::new(),
            handle,
            scratch.path().to_path_buf(),
            Duration::from_secs(3600),
        );
        let report = reconciler.run_once().await;
        pool.shutdown().await;

        assert_eq!(report, ReconcileReport::default());
        assert!(scratch.path().join("just-started").exists());
    }

    #[tokio::test]
    async fn test_missing_scratch_dir_is_fine() {
        let scratch = tempdir().unwrap();
        let (pool, handle) = CleanupPool::start(CleanupSettings::default());
        let reconciler = Reconciler::new(
            InMemoryRepository::new(),
            handle,
            scratch.path().join("absent"),
            Duration::ZERO,
        );
        assert_eq!(reconciler.sweep_scratch().await.unwrap(), 0);
        pool.shutdown().await;
    }
}
