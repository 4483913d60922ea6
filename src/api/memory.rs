use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AttendanceApi, CreatedCourse, GenerateQrRequest, GeneratedQr, RefreshedQr};
use crate::error::AppError;
use crate::models::{
    AttendanceGrid, AttendanceStatus, Course, FacultyProfile, GridSession, GridStudent,
    LiveAttendee, NewClassRequest, StudentRecord,
};

struct StoredSession {
    course_id: String,
    request: GenerateQrRequest,
    version: u32,
    active: bool,
    started_at: DateTime<Utc>,
    marks: HashMap<String, (AttendanceStatus, DateTime<Utc>)>,
}

#[derive(Default)]
struct Store {
    courses: Vec<Course>,
    rosters: HashMap<String, Vec<StudentRecord>>,
    sessions: HashMap<String, StoredSession>,
    session_order: Vec<String>,
    profile: Option<FacultyProfile>,
}

#[derive(Default)]
struct Calls {
    create: AtomicUsize,
    generate: AtomicUsize,
    refresh: AtomicUsize,
    stop: AtomicUsize,
    attendance: AtomicUsize,
    manual: AtomicUsize,
}

#[derive(Default)]
struct Failures {
    /// Successful creates allowed plus one; zero never fails.
    create_after: AtomicUsize,
    generate: AtomicBool,
    refresh: AtomicBool,
    stop: AtomicBool,
    roster: AtomicBool,
    attendance: AtomicBool,
}

/// Attendance backend kept entirely in memory. Backs offline mode and the test suite.
#[derive(Default)]
pub struct InMemoryAttendanceApi {
    store: Mutex<Store>,
    calls: Calls,
    failures: Failures,
}

fn unavailable(what: &str) -> AppError {
    AppError::Api {
        status: 503,
        message: format!("{} unavailable", what),
    }
}

fn not_found(what: &str, id: &str) -> AppError {
    AppError::Api {
        status: 404,
        message: format!("{} {} not found", what, id),
    }
}

fn new_payload(session_id: &str, version: u32) -> String {
    serde_json::json!({
        "sessionId": session_id,
        "v": version,
        "nonce": Uuid::new_v4().simple().to_string(),
    })
    .to_string()
}

impl InMemoryAttendanceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_course(&self, course: Course) {
        self.store.lock().await.courses.push(course);
    }

    pub async fn enroll(&self, course_id: &str, students: Vec<StudentRecord>) {
        let mut store = self.store.lock().await;
        if let Some(course) = store.courses.iter_mut().find(|c| c.id == course_id) {
            course.total_students = students.len() as u32;
        }
        store.rosters.insert(course_id.to_string(), students);
    }

    /// A student scanning the QR code of a running session.
    pub async fn scan(&self, session_id: &str, student_id: &str) -> Result<(), AppError> {
        let mut store = self.store.lock().await;
        let session = store
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("session", session_id))?;
        if !session.active {
            return Err(AppError::Api {
                status: 410,
                message: "session closed".to_string(),
            });
        }
        session
            .marks
            .entry(student_id.to_string())
            .or_insert((AttendanceStatus::Present, Utc::now()));
        Ok(())
    }

    pub async fn is_session_active(&self, session_id: &str) -> bool {
        self.store
            .lock()
            .await
            .sessions
            .get(session_id)
            .is_some_and(|s| s.active)
    }

    pub async fn last_generate_request(&self) -> Option<GenerateQrRequest> {
        let store = self.store.lock().await;
        store
            .session_order
            .last()
            .and_then(|id| store.sessions.get(id))
            .map(|s| s.request.clone())
    }

    pub fn create_calls(&self) -> usize {
        self.calls.create.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.calls.generate.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls.refresh.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.calls.stop.load(Ordering::SeqCst)
    }

    pub fn attendance_calls(&self) -> usize {
        self.calls.attendance.load(Ordering::SeqCst)
    }

    pub fn manual_calls(&self) -> usize {
        self.calls.manual.load(Ordering::SeqCst)
    }

    /// Lets `successes` class creations through, then fails every later one.
    pub fn fail_create_after(&self, successes: usize) {
        self.failures
            .create_after
            .store(successes + 1, Ordering::SeqCst);
    }

    pub fn fail_generate(&self, fail: bool) {
        self.failures.generate.store(fail, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.failures.refresh.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.failures.stop.store(fail, Ordering::SeqCst);
    }

    pub fn fail_roster(&self, fail: bool) {
        self.failures.roster.store(fail, Ordering::SeqCst);
    }

    pub fn fail_attendance(&self, fail: bool) {
        self.failures.attendance.store(fail, Ordering::SeqCst);
    }

    fn failing(flag: &AtomicBool) -> bool {
        flag.load(Ordering::SeqCst)
    }

    fn unique_join_code(courses: &[Course]) -> String {
        loop {
            let candidate = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
            if !courses.iter().any(|c| c.join_code == candidate) {
                return candidate;
            }
        }
    }
}

#[async_trait]
impl AttendanceApi for InMemoryAttendanceApi {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        Ok(self.store.lock().await.courses.clone())
    }

    async fn create_full_class(&self, req: &NewClassRequest) -> Result<CreatedCourse, AppError> {
        let previous = self.calls.create.fetch_add(1, Ordering::SeqCst);
        let limit = self.failures.create_after.load(Ordering::SeqCst);
        if limit != 0 && previous + 1 >= limit {
            return Err(unavailable("course service"));
        }

        let mut store = self.store.lock().await;

        let id = Uuid::new_v4().to_string();
        let join_code = Self::unique_join_code(&store.courses);
        let timetable = req
            .timetable
            .iter()
            .cloned()
            .map(|mut slot| {
                slot.branch = req.branch.clone();
                slot
            })
            .collect();

        store.courses.push(Course {
            id: id.clone(),
            course_code: req.course_code.clone(),
            course_name: req.course_name.clone(),
            section: req.section.clone(),
            branch: req.branch.clone(),
            year: req.year.clone(),
            class_name: req.class_name.clone(),
            credits: req.credits,
            semester: req.semester.clone(),
            session: req.session,
            join_code: join_code.clone(),
            timetable,
            total_students: 0,
        });

        Ok(CreatedCourse {
            id: Some(id),
            join_code: Some(join_code),
        })
    }

    async fn delete_course(&self, course_id: &str) -> Result<(), AppError> {
        let mut store = self.store.lock().await;
        let before = store.courses.len();
        store.courses.retain(|c| c.id != course_id);
        if store.courses.len() == before {
            return Err(not_found("course", course_id));
        }
        store.rosters.remove(course_id);
        Ok(())
    }

    async fn generate_qr(&self, req: &GenerateQrRequest) -> Result<GeneratedQr, AppError> {
        self.calls.generate.fetch_add(1, Ordering::SeqCst);
        if Self::failing(&self.failures.generate) {
            return Err(unavailable("session service"));
        }

        let mut store = self.store.lock().await;
        if !store.courses.iter().any(|c| c.id == req.course_id) {
            return Err(not_found("course", &req.course_id));
        }

        let session_id = Uuid::new_v4().to_string();
        let qr_data = new_payload(&session_id, 1);
        store.sessions.insert(
            session_id.clone(),
            StoredSession {
                course_id: req.course_id.clone(),
                request: req.clone(),
                version: 1,
                active: true,
                started_at: Utc::now(),
                marks: HashMap::new(),
            },
        );
        store.session_order.push(session_id.clone());

        Ok(GeneratedQr { qr_data, session_id })
    }

    async fn refresh_qr(&self, session_id: &str) -> Result<RefreshedQr, AppError> {
        self.calls.refresh.fetch_add(1, Ordering::SeqCst);
        if Self::failing(&self.failures.refresh) {
            return Err(unavailable("session service"));
        }

        let mut store = self.store.lock().await;
        let session = store
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("session", session_id))?;
        if !session.active {
            return Ok(RefreshedQr {
                success: false,
                qr_data: String::new(),
                qr_version: session.version,
            });
        }

        session.version += 1;
        Ok(RefreshedQr {
            success: true,
            qr_data: new_payload(session_id, session.version),
            qr_version: session.version,
        })
    }

    async fn stop_session(&self, session_id: &str) -> Result<(), AppError> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        if Self::failing(&self.failures.stop) {
            return Err(unavailable("session service"));
        }

        let mut store = self.store.lock().await;
        let session = store
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("session", session_id))?;
        session.active = false;
        Ok(())
    }

    async fn get_session_attendance(
        &self,
        session_id: &str,
    ) -> Result<Vec<LiveAttendee>, AppError> {
        self.calls.attendance.fetch_add(1, Ordering::SeqCst);
        if Self::failing(&self.failures.attendance) {
            return Err(unavailable("attendance feed"));
        }

        let store = self.store.lock().await;
        let session = store
            .sessions
            .get(session_id)
            .ok_or_else(|| not_found("session", session_id))?;
        let roster = store.rosters.get(&session.course_id);

        let mut attendees: Vec<LiveAttendee> = session
            .marks
            .iter()
            .map(|(student_id, (status, marked_at))| {
                let student = roster.and_then(|r| r.iter().find(|s| &s.id == student_id));
                LiveAttendee {
                    student_id: student_id.clone(),
                    name: student.map(|s| s.name.clone()).unwrap_or_default(),
                    roll_number: student.map(|s| s.roll_number.clone()).unwrap_or_default(),
                    status: *status,
                    marked_at: Some(marked_at.to_rfc3339()),
                }
            })
            .collect();
        attendees.sort_by(|a, b| a.marked_at.cmp(&b.marked_at));
        Ok(attendees)
    }

    async fn list_course_students(&self, course_id: &str) -> Result<Vec<StudentRecord>, AppError> {
        if Self::failing(&self.failures.roster) {
            return Err(unavailable("roster service"));
        }
        Ok(self
            .store
            .lock()
            .await
            .rosters
            .get(course_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_manual_attendance(
        &self,
        session_id: &str,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<(), AppError> {
        self.calls.manual.fetch_add(1, Ordering::SeqCst);
        let mut store = self.store.lock().await;
        let session = store
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| not_found("session", session_id))?;
        session
            .marks
            .insert(student_id.to_string(), (status, Utc::now()));
        Ok(())
    }

    async fn get_course_attendance_grid(
        &self,
        course_id: &str,
    ) -> Result<AttendanceGrid, AppError> {
        let store = self.store.lock().await;

        let sessions: Vec<(&String, &StoredSession)> = store
            .session_order
            .iter()
            .filter_map(|id| store.sessions.get(id).map(|s| (id, s)))
            .filter(|(_, s)| s.course_id == course_id)
            .collect();

        let students = store
            .rosters
            .get(course_id)
            .map(|roster| {
                roster
                    .iter()
                    .map(|student| GridStudent {
                        id: student.id.clone(),
                        name: student.name.clone(),
                        roll_number: student.roll_number.clone(),
                        sessions: sessions
                            .iter()
                            .filter_map(|(id, s)| {
                                s.marks.get(&student.id).map(|(status, _)| ((*id).clone(), *status))
                            })
                            .collect(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(AttendanceGrid {
            sessions: sessions
                .iter()
                .map(|(id, s)| GridSession {
                    id: (*id).clone(),
                    date: s.started_at.to_rfc3339(),
                    start_time: s.started_at.format("%I:%M %p").to_string(),
                    room_number: None,
                    class_type: Some(s.request.class_type),
                })
                .collect(),
            students,
        })
    }

    async fn get_faculty_profile(&self) -> Result<Option<FacultyProfile>, AppError> {
        Ok(self.store.lock().await.profile.clone())
    }

    async fn save_faculty_profile(&self, profile: &FacultyProfile) -> Result<(), AppError> {
        self.store.lock().await.profile = Some(profile.clone());
        Ok(())
    }
}
