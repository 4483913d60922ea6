use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::api::AttendanceApi;
use crate::services::qr_session::SessionCore;

pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Pulls self-marked attendance for a running session, first immediately and then
/// every [`POLL_INTERVAL`]. Failures are only logged; the next poll retries.
pub(crate) async fn run(
    core: Arc<Mutex<SessionCore>>,
    api: Arc<dyn AttendanceApi>,
    session_id: String,
    epoch: u64,
) {
    let mut interval = tokio::time::interval(POLL_INTERVAL);

    loop {
        interval.tick().await;

        match api.get_session_attendance(&session_id).await {
            Ok(attendees) => {
                if !core.lock().await.merge_live(epoch, attendees) {
                    break;
                }
            }
            Err(e) => {
                debug!("Failed to fetch live attendance for {}: {}", session_id, e);
                if core.lock().await.epoch != epoch {
                    break;
                }
            }
        }
    }
}
