use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timetable::ClassType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_meters: u32,
}

/// Attendance session as seen by the client. The payload is an opaque token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrSession {
    pub session_id: String,
    pub course_id: String,
    pub qr_payload: String,
    pub qr_version: u32,
    pub validity_seconds: u32,
    pub class_type: ClassType,
    pub geofence: Geofence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session: QrSession,
    pub session_time_remaining: u32,
    /// `None` when auto-refresh is disabled.
    pub qr_refresh_countdown: Option<u32>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Operator,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedSession {
    pub session_id: String,
    pub course_id: String,
    pub reason: EndReason,
    pub ended_at: DateTime<Utc>,
    /// Whether the stop call reached the backend.
    pub stop_synced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Active(ActiveSession),
    Ended(EndedSession),
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended(_))
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::Active(active) => Some(&active.session.session_id),
            SessionState::Ended(ended) => Some(&ended.session_id),
        }
    }
}

/// Locally aggregated counts shown once a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub present: usize,
    pub absent: usize,
    pub total_students: u32,
    pub attendance_percentage: f64,
}

impl SessionSummary {
    pub fn new(present: usize, absent: usize, total_students: u32) -> Self {
        let attendance_percentage = if total_students == 0 {
            0.0
        } else {
            ((present as f64 / total_students as f64) * 1000.0).round() / 10.0
        };
        Self {
            present,
            absent,
            total_students,
            attendance_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_percentage_one_decimal() {
        let summary = SessionSummary::new(2, 1, 3);
        assert_eq!(summary.attendance_percentage, 66.7);
        assert_eq!(SessionSummary::new(0, 0, 0).attendance_percentage, 0.0);
    }

    #[test]
    fn test_state_serializes_phase_tag() {
        let json = serde_json::to_value(SessionState::Idle).unwrap();
        assert_eq!(json["phase"], "idle");
    }
}
