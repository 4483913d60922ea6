pub mod course;
pub mod profile;
pub mod report;
pub mod session;
pub mod student;
pub mod timetable;

pub use course::{AcademicSession, Course, CreatedClass, NewClassRequest};
pub use profile::FacultyProfile;
pub use report::{
    AttendanceGrid, CourseReport, GridSession, GridStudent, HistoryEntry, StudentReport,
};
pub use session::{
    ActiveSession, EndReason, EndedSession, Geofence, QrSession, SessionState, SessionSummary,
};
pub use student::{AttendanceStatus, LiveAttendee, Roster, StudentRecord};
pub use timetable::{ClassType, Day, SlotType, TIME_LABELS, TimeLabel, TimeSlot};
