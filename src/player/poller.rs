use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use super::{sdk::SdkPlayer, state::PlaybackState, state::clamp_position};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically queries the player while something is playing and pushes
/// the reported position into the shared playback state.
///
/// At most one polling task runs at a time. Stopping aborts it, and a tick
/// that observes a stopped playback writes nothing.
pub struct ProgressPoller {
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ProgressPoller {
    fn default() -> Self {
        Self::new(POLL_INTERVAL)
    }
}

impl ProgressPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts polling unless a poll task is already running.
    ///
    /// Returns `true` when a new task was spawned.
    pub fn start(
        &self,
        runtime: &Handle,
        player: Arc<dyn SdkPlayer>,
        state: Arc<watch::Sender<PlaybackState>>,
    ) -> bool {
        let mut task = self.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "progress polling started");
        *task = Some(runtime.spawn(poll(self.interval, player, state)));
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
            tracing::debug!("progress polling stopped");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll(
    interval: Duration,
    player: Arc<dyn SdkPlayer>,
    state: Arc<watch::Sender<PlaybackState>>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let polled = match player.get_current_state().await {
            Ok(Some(polled)) if !polled.paused => polled,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "progress poll failed");
                continue;
            }
        };

        state.send_if_modified(|current| {
            if !current.is_playing {
                return false;
            }
            let position_ms = clamp_position(polled.position_ms, polled.duration_ms);
            let changed =
                current.position_ms != position_ms || current.duration_ms != polled.duration_ms;
            current.position_ms = position_ms;
            current.duration_ms = polled.duration_ms;
            changed
        });
    }
}
