//! Lease sweeper: background release of expired element locks.
//!
//! DESIGN
//! ======
//! One task ticks at `LOCK_SWEEP_INTERVAL_MS`. Each tick takes the canvas
//! map write lock once, expires overdue leases on every loaded canvas, and
//! fans the resulting `element:unlocked` events out with reason `expired`.

use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::canvas::fan_out;
use crate::state::AppState;

/// Spawn the background lease sweeper. Returns a handle for shutdown.
pub fn spawn_lease_sweeper(state: AppState) -> JoinHandle<()> {
    let interval = state.config.sweep_interval;
    info!(
        sweep_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        lease_secs = state.config.lock_lease.as_secs(),
        "lock lease sweeper configured"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            sweep_expired_leases(&state, Instant::now()).await;
        }
    })
}

/// Release every lease that ran out at or before `now`. Returns how many
/// locks were released across all canvases.
pub async fn sweep_expired_leases(state: &AppState, now: Instant) -> usize {
    let mut canvases = state.canvases.write().await;
    let mut released = 0;
    for (canvas_id, canvas) in canvases.iter_mut() {
        let events = canvas.doc.expire_leases(now);
        if events.is_empty() {
            continue;
        }
        released += events.len();
        let frames = canvas.stamp(*canvas_id, None, events);
        fan_out(&canvas.clients, &frames, None);
        info!(%canvas_id, count = frames.len(), "released expired locks");
    }
    released
}

#[cfg(test)]
#[path = "lease_test.rs"]
mod tests;
