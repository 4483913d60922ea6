//! Runtime configuration loaded from `.env` and the process environment.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::AppError;
use crate::services::SessionSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub offline: bool,
    pub console_addr: SocketAddr,
    /// Total session length, in minutes.
    pub qr_validity_minutes: u32,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u32,
    pub location_radius_meters: u32,
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        _ => Ok(default),
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_token = env::var("ATTENDANCE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let config = Self {
            api_base_url: env::var("ATTENDANCE_API_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            api_token,
            offline: parse_var("ATTENDANCE_OFFLINE", false)?,
            console_addr: parse_var("CONSOLE_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            qr_validity_minutes: parse_var::<u32>("QR_VALIDITY_MINUTES", 5)?.max(1),
            auto_refresh: parse_var("QR_AUTO_REFRESH", true)?,
            refresh_interval_secs: parse_var::<u32>("QR_REFRESH_SECONDS", 10)?.max(1),
            location_radius_meters: parse_var::<u32>("LOCATION_RADIUS_METERS", 1100)?
                .clamp(5, 2000),
        };

        if !config.offline && config.api_token.is_none() {
            return Err(AppError::Config(
                "ATTENDANCE_API_TOKEN is not set (or set ATTENDANCE_OFFLINE=true)".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            session_length_secs: self.qr_validity_minutes.saturating_mul(60),
            auto_refresh: self.auto_refresh,
            refresh_interval_secs: self.refresh_interval_secs,
            radius_meters: self.location_radius_meters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_settings_from_config() {
        let config = AppConfig {
            api_base_url: "http://localhost:4000".to_string(),
            api_token: None,
            offline: true,
            console_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            qr_validity_minutes: 2,
            auto_refresh: false,
            refresh_interval_secs: 15,
            location_radius_meters: 50,
        };

        let settings = config.session_settings();
        assert_eq!(settings.session_length_secs, 120);
        assert!(!settings.auto_refresh);
        assert_eq!(settings.refresh_interval_secs, 15);
        assert_eq!(settings.radius_meters, 50);
    }

    #[test]
    fn test_huge_validity_saturates() {
        let config = AppConfig {
            api_base_url: "http://localhost:4000".to_string(),
            api_token: None,
            offline: true,
            console_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            qr_validity_minutes: 80_000_000,
            auto_refresh: true,
            refresh_interval_secs: 10,
            location_radius_meters: 1100,
        };

        assert_eq!(config.session_settings().session_length_secs, u32::MAX);
    }
}
