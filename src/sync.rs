use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::api::Api;
use crate::pending::PendingTracker;
use crate::types::Snapshot;

/// Recurring fetch loop for one session.
///
/// Fetches immediately on start and then on a fixed interval. Each tick
/// is fire-and-forget: the fetch runs in its own task so a slow
/// response never delays the next scheduled tick; delivery is
/// last-writer-wins through the watch channel. Failed ticks are logged
/// and skipped, never clearing previously published state.
pub struct Poller {
    cancel: watch::Sender<bool>,
}

impl Poller {
    pub fn start(
        api: Api,
        tracker: Arc<Mutex<PendingTracker>>,
        code: String,
        player_id: String,
        interval: Duration,
        updates: watch::Sender<Option<Snapshot>>,
    ) -> Self {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let tick_cancel = cancel_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        spawn_tick(
                            api.clone(),
                            tracker.clone(),
                            code.clone(),
                            player_id.clone(),
                            updates.clone(),
                            tick_cancel.clone(),
                        );
                    }
                    _ = cancel_rx.changed() => {
                        tracing::debug!(code = %code, "poller stopped");
                        break;
                    }
                }
            }
        });

        Self { cancel: cancel_tx }
    }

    /// Stop polling. Safe to call at any time; a tick already in flight
    /// discards its response instead of publishing it.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_tick(
    api: Api,
    tracker: Arc<Mutex<PendingTracker>>,
    code: String,
    player_id: String,
    updates: watch::Sender<Option<Snapshot>>,
    cancel: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        match api.fetch_state(&code, Some(&player_id)).await {
            Ok(raw) => {
                // No update after stop, even for a response that was
                // already on the wire.
                if *cancel.borrow() {
                    return;
                }
                // Publish while still holding the lock so ticks and
                // optimistic records serialize their sends.
                let mut tracker = tracker.lock().await;
                let merged = tracker.merge(&raw);
                if *cancel.borrow() {
                    return;
                }
                updates.send_replace(Some(merged));
            }
            Err(err) => {
                tracing::warn!(code = %code, "poll tick failed, skipping: {err}");
            }
        }
    });
}
