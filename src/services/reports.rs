use chrono::{DateTime, NaiveDate, Utc};

use crate::api::AttendanceApi;
use crate::error::AppError;
use crate::models::{
    AttendanceGrid, AttendanceStatus, CourseReport, GridSession, HistoryEntry, StudentReport,
};

/// Students below this percentage are flagged.
pub const AT_RISK_THRESHOLD: u32 = 75;

fn session_time(session: &GridSession) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&session.date)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(&session.date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}

pub fn attendance_percentage(present: usize, total_sessions: usize) -> u32 {
    if total_sessions == 0 {
        return 0;
    }
    ((present as f64 / total_sessions as f64) * 100.0).round() as u32
}

pub fn build_report(course_id: &str, grid: &AttendanceGrid) -> CourseReport {
    let mut sessions: Vec<&GridSession> = grid.sessions.iter().collect();
    // newest first, undated sessions last
    sessions.sort_by(|a, b| session_time(b).cmp(&session_time(a)));

    let students: Vec<StudentReport> = grid
        .students
        .iter()
        .map(|student| {
            let history: Vec<HistoryEntry> = sessions
                .iter()
                .map(|session| HistoryEntry {
                    session_id: session.id.clone(),
                    date: session.date.clone(),
                    start_time: session.start_time.clone(),
                    class_type: session.class_type,
                    status: student
                        .sessions
                        .get(&session.id)
                        .copied()
                        .unwrap_or(AttendanceStatus::Absent),
                })
                .collect();
            let present = history
                .iter()
                .filter(|h| h.status == AttendanceStatus::Present)
                .count();

            StudentReport {
                id: student.id.clone(),
                name: student.name.clone(),
                roll_number: student.roll_number.clone(),
                attendance_percentage: attendance_percentage(present, sessions.len()),
                history,
            }
        })
        .collect();

    let at_risk = if sessions.is_empty() {
        Vec::new()
    } else {
        students
            .iter()
            .filter(|s| s.attendance_percentage < AT_RISK_THRESHOLD)
            .map(|s| s.id.clone())
            .collect()
    };

    CourseReport {
        course_id: course_id.to_string(),
        total_sessions: sessions.len(),
        students,
        at_risk,
    }
}

pub async fn course_report(
    api: &dyn AttendanceApi,
    course_id: &str,
) -> Result<CourseReport, AppError> {
    let grid = api.get_course_attendance_grid(course_id).await?;
    Ok(build_report(course_id, &grid))
}
