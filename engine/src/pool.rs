use std::{future::Future, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
  /// Tasks still running when the grace period ran out.
  pub aborted: usize,
}

/// Every task of one simulation run.
///
/// All tasks share one cancellation token. Shutdown cancels it, gives the
/// tasks a grace period to notice, then aborts whatever is left.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
  tracker: TaskTracker,
  cancel: CancellationToken,
  handles: Arc<Mutex<Vec<AbortHandle>>>,
}

impl WorkerPool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Cancelled once the pool starts shutting down.
  pub fn token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Number of tasks that have not finished yet.
  pub fn len(&self) -> usize {
    self.tracker.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tracker.is_empty()
  }

  /// Spawns `task` into the pool. Refused once shutdown has begun.
  pub fn spawn<F>(&self, task: F) -> bool
  where
    F: Future<Output = ()> + Send + 'static,
  {
    if self.cancel.is_cancelled() {
      return false;
    }

    let handle = self.tracker.spawn(task);
    let mut handles = self.handles.lock();
    handles.retain(|h| !h.is_finished());
    handles.push(handle.abort_handle());
    true
  }

  pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
    self.cancel.cancel();
    self.tracker.close();

    if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
      return ShutdownReport { aborted: 0 };
    }

    let aborted = {
      let handles = std::mem::take(&mut *self.handles.lock());
      handles
        .into_iter()
        .filter(|h| !h.is_finished())
        .inspect(|h| h.abort())
        .count()
    };
    if aborted > 0 {
      tracing::warn!("{aborted} tasks ignored cancellation and were aborted");
    }

    self.tracker.wait().await;
    ShutdownReport { aborted }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_cooperative_tasks_finish_within_grace() {
    let pool = WorkerPool::new();
    let finished = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
      let cancel = pool.token();
      let finished = finished.clone();
      assert!(pool.spawn(async move {
        cancel.cancelled().await;
        finished.fetch_add(1, Ordering::SeqCst);
      }));
    }
    assert_eq!(pool.len(), 5);

    let report = pool.shutdown(Duration::from_secs(5)).await;
    assert_eq!(report, ShutdownReport { aborted: 0 });
    assert_eq!(finished.load(Ordering::SeqCst), 5);
    assert!(pool.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_stubborn_tasks_are_aborted_after_grace() {
    let pool = WorkerPool::new();
    let reached_end = Arc::new(AtomicUsize::new(0));

    {
      let reached_end = reached_end.clone();
      pool.spawn(async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        reached_end.fetch_add(1, Ordering::SeqCst);
      });
    }
    let cancel = pool.token();
    pool.spawn(async move { cancel.cancelled().await });

    let start = tokio::time::Instant::now();
    let report = pool.shutdown(Duration::from_secs(5)).await;

    assert_eq!(report.aborted, 1);
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(6));
    assert_eq!(reached_end.load(Ordering::SeqCst), 0);
    assert!(pool.is_empty());
  }

  #[tokio::test]
  async fn test_spawn_refused_after_shutdown() {
    let pool = WorkerPool::new();
    pool.shutdown(Duration::from_millis(10)).await;
    assert!(pool.is_cancelled());
    assert!(!pool.spawn(async {}));
  }
}
