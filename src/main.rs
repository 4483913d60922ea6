use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use attendance_desk::api::{ApiConfig, AttendanceApi, HttpAttendanceApi, InMemoryAttendanceApi};
use attendance_desk::config::AppConfig;
use attendance_desk::routes::router;
use attendance_desk::services::WallClock;
use attendance_desk::state::AppState;

/// Interval of the "current time" label refresh.
const WALL_CLOCK_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "attendance_desk=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let api: Arc<dyn AttendanceApi> = if config.offline {
        warn!("ATTENDANCE_OFFLINE is set; using the in-memory backend");
        Arc::new(InMemoryAttendanceApi::new())
    } else {
        info!("Using attendance backend at {}", config.api_base_url);
        Arc::new(HttpAttendanceApi::new(ApiConfig::from_app_config(&config)?)?)
    };

    let wall_clock = WallClock::new(WALL_CLOCK_SECS);
    let state = AppState::new(api, config.session_settings(), wall_clock.handle());
    tokio::spawn(wall_clock.start());

    if let Err(e) = state.refresh_courses().await {
        warn!("Initial course load failed: {}", e);
    }

    let app = router(state);

    info!("listening on http://{}", config.console_addr);

    let listener = tokio::net::TcpListener::bind(config.console_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
