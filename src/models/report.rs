use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::student::AttendanceStatus;
use super::timetable::ClassType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSession {
    pub id: String,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default, rename = "type")]
    pub class_type: Option<ClassType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStudent {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    /// Status per session id. Sessions missing here count as absent.
    pub sessions: HashMap<String, AttendanceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceGrid {
    pub sessions: Vec<GridSession>,
    pub students: Vec<GridStudent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub session_id: String,
    pub date: String,
    pub start_time: String,
    pub class_type: Option<ClassType>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub attendance_percentage: u32,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseReport {
    pub course_id: String,
    pub total_sessions: usize,
    pub students: Vec<StudentReport>,
    pub at_risk: Vec<String>,
}
