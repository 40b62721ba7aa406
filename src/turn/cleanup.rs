//! Background sweep of expired credentials

use crate::auth::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Handle to the running cleanup task
///
/// The task exits when [`shutdown`](Self::shutdown) is called or when this
/// handle is dropped, since either closes the shutdown channel.
pub struct CleanupScheduler {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl CleanupScheduler {
    /// Spawns the sweep loop; the first sweep runs one `period` from now
    pub fn spawn(store: Arc<CredentialStore>, period: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let evicted = store.cleanup_expired().await;
                        if evicted > 0 {
                            log::debug!("Swept {} expired TURN credentials", evicted);
                        }
                    }
                    _ = &mut shutdown_rx => {
                        log::debug!("Cleanup scheduler received shutdown");
                        return;
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Signals the task and waits until it has exited
    pub async fn shutdown(self) {
        // Receiver is gone only if the task already ended
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            log::error!("Cleanup task failed: {}", e);
        }
    }
}
