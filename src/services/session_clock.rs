use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::AttendanceApi;
use crate::services::qr_session::{SessionCore, SessionSettings, Tick, stop_remote};

pub const TICK: Duration = Duration::from_secs(1);

/// One-second clock for a running session. Decrements the session countdown and the
/// refresh countdown together, fires refreshes without waiting for them, and ends the
/// session when time runs out.
pub(crate) async fn run(
    core: Arc<Mutex<SessionCore>>,
    api: Arc<dyn AttendanceApi>,
    settings: SessionSettings,
    epoch: u64,
    poller: AbortHandle,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let tick = core
            .lock()
            .await
            .advance(epoch, settings.refresh_interval_secs);

        match tick {
            Tick::Counting => {}
            Tick::Refresh { session_id, seq } => {
                tokio::spawn(refresh(core.clone(), api.clone(), session_id, epoch, seq));
            }
            Tick::Expired { session_id } => {
                info!("Session {} timed out", session_id);
                poller.abort();
                stop_remote(core.clone(), api.clone(), session_id).await;
                break;
            }
            Tick::Stopped => {
                poller.abort();
                break;
            }
        }
    }
}

async fn refresh(
    core: Arc<Mutex<SessionCore>>,
    api: Arc<dyn AttendanceApi>,
    session_id: String,
    epoch: u64,
    seq: u64,
) {
    match api.refresh_qr(&session_id).await {
        Ok(refreshed) if refreshed.success => {
            let server_version = refreshed.qr_version;
            if core.lock().await.apply_refresh(epoch, seq, refreshed) {
                debug!("QR refreshed for {} (server v{})", session_id, server_version);
            } else {
                debug!("Discarding stale refresh #{} for {}", seq, session_id);
            }
        }
        Ok(_) => warn!("QR refresh for {} was not accepted", session_id),
        // the stale payload stays up until the next countdown expiry
        Err(e) => warn!("QR refresh failed for {}: {}", session_id, e),
    }
}
