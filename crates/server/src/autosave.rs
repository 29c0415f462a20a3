//! Periodic background persistence of every open world.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use blockforge_engine::manager::WorldManager;

/// Running autosave task. Dropping the handle without calling
/// [`stop`](Self::stop) also ends the task after one last save.
pub struct AutosaveHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Save every world in `manager` each `interval`. The first save happens one
/// full interval after start.
pub fn start(manager: Arc<WorldManager>, interval: Duration) -> AutosaveHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick is immediate, skip it
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::info!("Autosaving...");
                    save_all(&manager).await;
                }
                // Fires on `stop` and when the handle is dropped.
                _ = stop_rx.changed() => break,
            }
        }
        tracing::info!("Autosave stopping, flushing worlds...");
        save_all(&manager).await;
    });
    AutosaveHandle { stop_tx, task }
}

/// Saves run on the blocking pool: they do file I/O and take chunk locks.
async fn save_all(manager: &Arc<WorldManager>) {
    let manager = Arc::clone(manager);
    match tokio::task::spawn_blocking(move || manager.save_all()).await {
        Ok(reports) => {
            for (name, report) in reports {
                if !report.is_complete() {
                    tracing::warn!(
                        "World '{}': {} chunks left dirty for the next save",
                        name,
                        report.failed.len()
                    );
                }
            }
        }
        Err(e) => tracing::error!("Autosave failed: {}", e),
    }
}

impl AutosaveHandle {
    /// Signal the task, let it run its final save, and wait at most `timeout`
    /// for it. Returns whether the final save finished in time.
    pub async fn stop(self, timeout: Duration) -> bool {
        // A send error means the task is already gone.
        let _ = self.stop_tx.send(true);
        match tokio::time::timeout(timeout, self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!("Autosave task ended abnormally: {}", e);
                false
            }
            Err(_) => {
                tracing::error!("Final save did not finish within {:.1?}; giving up", timeout);
                false
            }
        }
    }
}
