use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::models::{
    AcademicSession, AttendanceGrid, AttendanceStatus, ClassType, Course, FacultyProfile,
    GridSession, GridStudent, LiveAttendee, NewClassRequest, SlotType, StudentRecord, TimeSlot,
};

/// Ids and years come back as JSON numbers from some endpoints and strings from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(s)| s))
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListCoursesResponse {
    #[serde(default)]
    pub courses: Vec<CourseDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDto {
    pub day: String,
    pub time: String,
    #[serde(default, rename = "type")]
    pub slot_type: Option<SlotType>,
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub enrolled_count: Option<u32>,
    #[serde(default)]
    pub timetable: Vec<SlotDto>,
    #[serde(default)]
    pub join_code: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub credits: Option<u32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub session: Option<AcademicSession>,
}

impl CourseDto {
    /// Maps the backend record onto the client model. Slots that do not name a known
    /// day and time label are dropped.
    pub fn into_course(self) -> Option<Course> {
        if self.id.trim().is_empty() {
            return None;
        }

        let branch = self.department.unwrap_or_default();
        let timetable = self
            .timetable
            .into_iter()
            .filter_map(|slot| match (slot.day.parse(), slot.time.parse()) {
                (Ok(day), Ok(time)) => Some(TimeSlot {
                    day,
                    time,
                    slot_type: slot.slot_type.unwrap_or(SlotType::Theory),
                    branch: branch.clone(),
                    room: slot.room,
                }),
                _ => {
                    warn!(
                        "Dropping unparseable slot {} / {} on course {}",
                        slot.day, slot.time, self.id
                    );
                    None
                }
            })
            .collect();

        Some(Course {
            id: self.id,
            course_code: self.code,
            course_name: self.name,
            section: self.section.unwrap_or_else(|| "A".to_string()),
            branch,
            year: self.academic_year.unwrap_or_default(),
            class_name: self.class_name.unwrap_or_default(),
            credits: self.credits.unwrap_or(3),
            semester: self.semester.unwrap_or_default(),
            session: self.session.unwrap_or_default(),
            join_code: self.join_code.unwrap_or_default(),
            timetable,
            total_students: self.enrolled_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPayload<'a> {
    pub day: &'a str,
    pub time: &'a str,
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<&'a str>,
}

/// Body of `createFullClass`. Slots are sent without their branch, the course already names it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFullClassPayload<'a> {
    pub branch: &'a str,
    pub year: &'a str,
    pub course_name: &'a str,
    pub course_code: &'a str,
    pub class_name: &'a str,
    pub timetable: Vec<SlotPayload<'a>>,
    pub section: &'a str,
    pub credits: u32,
    pub semester: &'a str,
    pub session: AcademicSession,
}

impl<'a> From<&'a NewClassRequest> for CreateFullClassPayload<'a> {
    fn from(req: &'a NewClassRequest) -> Self {
        Self {
            branch: &req.branch,
            year: &req.year,
            course_name: &req.course_name,
            course_code: &req.course_code,
            class_name: &req.class_name,
            timetable: req
                .timetable
                .iter()
                .map(|slot| SlotPayload {
                    day: slot.day.as_str(),
                    time: slot.time.as_str(),
                    slot_type: slot.slot_type,
                    room: slot.room.as_deref(),
                })
                .collect(),
            section: &req.section,
            credits: req.credits,
            semester: &req.semester,
            session: req.session,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCourse {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub join_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFullClassResponse {
    #[serde(default)]
    pub course: Option<CreatedCourse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQrRequest {
    pub course_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub radius: u32,
    pub validity_seconds: u32,
    pub class_type: ClassType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQr {
    pub qr_data: String,
    #[serde(deserialize_with = "string_or_number")]
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedQr {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub qr_data: String,
    #[serde(default)]
    pub qr_version: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeDto {
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
    #[serde(default)]
    pub marked_at: Option<serde_json::Value>,
}

impl AttendeeDto {
    pub fn into_attendee(self) -> Option<LiveAttendee> {
        let status = self.status?;
        Some(LiveAttendee {
            student_id: self.student_id,
            name: self.student_name,
            roll_number: self.roll_no.unwrap_or_default(),
            status,
            marked_at: self.marked_at.as_ref().and_then(timestamp_to_rfc3339),
        })
    }
}

/// Accepts an RFC 3339 string or a `{ "_seconds": .. }` / `{ "seconds": .. }` timestamp object.
fn timestamp_to_rfc3339(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339()),
        serde_json::Value::Object(map) => map
            .get("_seconds")
            .or_else(|| map.get("seconds"))
            .and_then(|s| s.as_i64())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionAttendanceResponse {
    #[serde(default)]
    pub attendees: Vec<AttendeeDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub roll_no: Option<String>,
}

impl From<StudentDto> for StudentRecord {
    fn from(dto: StudentDto) -> Self {
        StudentRecord {
            id: dto.id,
            name: dto.name,
            roll_number: dto.roll_no.unwrap_or_default(),
            status: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CourseStudentsResponse {
    #[serde(default)]
    pub students: Vec<StudentDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAttendancePayload<'a> {
    pub student_id: &'a str,
    pub status: AttendanceStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridStudentDto {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub sessions: HashMap<String, AttendanceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceGridResponse {
    #[serde(default)]
    pub sessions: Vec<GridSession>,
    #[serde(default)]
    pub students: Vec<GridStudentDto>,
}

impl From<AttendanceGridResponse> for AttendanceGrid {
    fn from(res: AttendanceGridResponse) -> Self {
        AttendanceGrid {
            sessions: res.sessions,
            students: res
                .students
                .into_iter()
                .map(|s| GridStudent {
                    id: s.id,
                    name: s.name,
                    roll_number: s.roll_no.unwrap_or_default(),
                    sessions: s.sessions,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileDto {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub faculty: Option<ProfileDto>,
}

impl From<ProfileDto> for FacultyProfile {
    fn from(dto: ProfileDto) -> Self {
        FacultyProfile {
            name: dto.name,
            email: dto.email,
            phone: dto.phone.or(dto.mobile).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SaveProfilePayload<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub mobile: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Day;

    #[test]
    fn test_course_dto_maps_backend_fields() {
        let raw = serde_json::json!({
            "id": 42,
            "code": "CS101",
            "name": "Data Structures",
            "enrolledCount": 45,
            "department": "CSE",
            "academicYear": 2024,
            "joinCode": "AB12CD",
            "timetable": [
                { "day": "Tuesday", "time": "10:00 AM - 11:00 AM", "type": "lab", "room": "L1" },
                { "day": "Sunday", "time": "10:00 AM - 11:00 AM", "type": "lab" }
            ]
        });

        let dto: CourseDto = serde_json::from_value(raw).unwrap();
        let course = dto.into_course().unwrap();

        assert_eq!(course.id, "42");
        assert_eq!(course.year, "2024");
        assert_eq!(course.section, "A");
        assert_eq!(course.credits, 3);
        assert_eq!(course.session, AcademicSession::Spring);
        assert_eq!(course.total_students, 45);
        assert_eq!(course.timetable.len(), 1);
        assert_eq!(course.timetable[0].day, Day::Tuesday);
        assert_eq!(course.timetable[0].branch, "CSE");
        assert_eq!(course.timetable[0].slot_type, SlotType::Lab);
    }

    #[test]
    fn test_attendee_marked_at_object() {
        let raw = serde_json::json!({
            "studentId": 7,
            "studentName": "Isha Reddy",
            "rollNo": "2024006",
            "status": "present",
            "markedAt": { "_seconds": 1_700_000_000, "_nanoseconds": 0 }
        });

        let dto: AttendeeDto = serde_json::from_value(raw).unwrap();
        let attendee = dto.into_attendee().unwrap();

        assert_eq!(attendee.student_id, "7");
        assert_eq!(attendee.status, AttendanceStatus::Present);
        assert!(attendee.marked_at.unwrap().starts_with("2023-11-14"));
    }

    #[test]
    fn test_generate_request_skips_missing_location() {
        let req = GenerateQrRequest {
            course_id: "c1".to_string(),
            latitude: None,
            longitude: None,
            radius: 1100,
            validity_seconds: 10,
            class_type: ClassType::Lab,
        };

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("latitude").is_none());
        assert_eq!(json["validitySeconds"], 10);
        assert_eq!(json["classType"], "Lab");
    }

    #[test]
    fn test_profile_falls_back_to_mobile() {
        let res: ProfileResponse = serde_json::from_value(serde_json::json!({
            "faculty": { "name": "Dr. Rao", "email": "rao@example.edu", "mobile": "98765" }
        }))
        .unwrap();

        let profile: FacultyProfile = res.faculty.unwrap().into();
        assert_eq!(profile.phone, "98765");
    }
}
