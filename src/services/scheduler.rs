use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub type SharedClock = Arc<RwLock<DateTime<Local>>>;

/// Wall-clock ticker behind the "current time" label.
/// Runs for the whole process, independent of any session.
pub struct WallClock {
    now: SharedClock,
    interval: Duration,
}

impl WallClock {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            now: Arc::new(RwLock::new(Local::now())),
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub fn handle(&self) -> SharedClock {
        self.now.clone()
    }

    /// Refreshes the shared time forever; abort the task to stop it.
    pub async fn start(self) {
        info!("Starting wall clock (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;

            let now = Local::now();
            *self.now.write().await = now;
            debug!("Wall clock tick: {}", now.format("%H:%M"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_ticks() {
        let clock = WallClock::new(30);
        let handle = clock.handle();
        let before = *handle.read().await;

        let task = tokio::spawn(clock.start());
        tokio::time::sleep(Duration::from_secs(31)).await;
        task.abort();

        assert!(*handle.read().await >= before);
    }
}
