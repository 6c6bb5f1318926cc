use quiz_core::model::TickOutcome;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::controller::SharedController;
use crate::error::QuizError;

/// Background countdown bound to one session.
///
/// Ticks the controller once per tick period. The task ends when the quiz
/// completes, when the session is replaced or cleared, or when stopped.
/// Dropping the handle signals the task to stop without waiting for it.
#[derive(Debug)]
pub struct QuizTimer {
    controller: SharedController,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl QuizTimer {
    /// Start ticking the controller's current session.
    ///
    /// If nothing is running the task exits on its first tick.
    pub async fn start(controller: SharedController) -> Self {
        let (epoch, period) = {
            let guard = controller.lock().await;
            (guard.epoch(), guard.settings().tick_period)
        };
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let shared = SharedController::clone(&controller);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                if *stop_rx.borrow() {
                    break;
                }

                let mut guard = shared.lock().await;
                // Stop may have been requested while waiting for the lock.
                if *stop_rx.borrow() {
                    break;
                }
                if guard.epoch() != epoch || !guard.is_running() {
                    debug!(epoch, "timer detached from session");
                    break;
                }
                match guard.tick().await {
                    Ok(TickOutcome::Running(_)) => {}
                    Ok(TickOutcome::Expired) => break,
                    Err(err) => {
                        warn!(error = %err, "timer tick failed");
                        break;
                    }
                }
            }
        });

        Self {
            controller,
            stop_tx,
            handle: Some(handle),
        }
    }

    /// True until the background task has ended.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop ticking, wait for the task to end, then save the current state.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Persistence` if the final save fails.
    pub async fn stop(mut self) -> Result<(), QuizError> {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "timer task ended abnormally");
            }
        }
        self.controller.lock().await.save_current_state().await
    }
}

impl Drop for QuizTimer {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}
