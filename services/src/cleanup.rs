//! Deferred filesystem cleanup.
//!
//! Working copies and report artifacts are scheduled for deletion instead of
//! being removed inline, so cleanup never blocks the caller's response and
//! cannot be skipped by an error path. Tasks go through an explicit queue
//! whose enqueue count is observable, so tests can assert that cleanup was
//! scheduled without waiting for it to run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

#[derive(Debug)]
struct CleanupTask {
    path: PathBuf,
    delay: Duration,
}

#[derive(Clone)]
pub struct CleanupQueue {
    tx: mpsc::UnboundedSender<CleanupTask>,
    scheduled: Arc<AtomicUsize>,
}

impl CleanupQueue {
    /// Spawns the worker and returns a handle. The worker lives as long as
    /// the runtime; each task sleeps out its delay independently.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<CleanupTask>();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                tokio::spawn(async move {
                    tokio::time::sleep(task.delay).await;
                    remove_path(&task.path).await;
                });
            }
        });
        Self {
            tx,
            scheduled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Best-effort: a full queue or stopped worker is logged, never surfaced.
    pub fn schedule_path_for_deletion(&self, path: impl Into<PathBuf>, delay: Duration) {
        let path = path.into();
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        log::debug!("Scheduling {} for deletion in {:?}", path.display(), delay);
        if self.tx.send(CleanupTask { path: path.clone(), delay }).is_err() {
            log::warn!(
                "Cleanup worker is gone; {} will not be deleted",
                path.display()
            );
        }
    }

    /// Number of deletions scheduled since start.
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }
}

async fn remove_path(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        // Already gone; nothing to do.
        Err(_) => return,
    };
    match result {
        Ok(()) => log::debug!("Deleted {}", path.display()),
        Err(e) => log::warn!("Could not delete {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deletes_scheduled_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("report.html");
        tokio::fs::write(&file, b"<html></html>").await.expect("write");

        let queue = CleanupQueue::start();
        queue.schedule_path_for_deletion(&file, Duration::from_millis(10));
        assert_eq!(queue.scheduled_count(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn missing_paths_are_ignored() {
        let queue = CleanupQueue::start();
        queue.schedule_path_for_deletion("/nonexistent/nowhere", Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.scheduled_count(), 1);
    }
}
