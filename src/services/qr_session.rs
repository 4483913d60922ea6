//! QR attendance session lifecycle: `Idle -> Active -> Ended -> Idle`.
//!
//! While a session is active two background tasks run: the one-second session clock
//! ([`session_clock`](super::session_clock)) driving both countdowns, and the
//! live-attendance poller ([`attendance_poller`](super::attendance_poller)). Both are
//! bound to the session's epoch and stop touching state as soon as that session is no
//! longer the active one.

use std::sync::Arc;

use chrono::{Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{AttendanceApi, GenerateQrRequest, GeneratedQr, RefreshedQr};
use crate::error::AppError;
use crate::models::{
    ActiveSession, AttendanceStatus, Course, Day, EndReason, EndedSession, Geofence, LiveAttendee,
    QrSession, Roster, SessionState, SessionSummary, StudentRecord,
};
use crate::services::{attendance_poller, session_clock};

/// Validity sent to the backend when auto-refresh is off.
pub const FALLBACK_VALIDITY_SECS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    pub session_length_secs: u32,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u32,
    pub radius_meters: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_length_secs: 5 * 60,
            auto_refresh: true,
            refresh_interval_secs: 10,
            radius_meters: 1100,
        }
    }
}

impl SessionSettings {
    pub fn validity_seconds(&self) -> u32 {
        if self.auto_refresh {
            self.refresh_interval_secs.max(1)
        } else {
            FALLBACK_VALIDITY_SECS
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug)]
pub(crate) enum Tick {
    Stopped,
    Counting,
    Refresh { session_id: String, seq: u64 },
    Expired { session_id: String },
}

/// State shared between the controller and its background tasks.
#[derive(Debug)]
pub(crate) struct SessionCore {
    pub(crate) state: SessionState,
    pub(crate) course: Option<Course>,
    pub(crate) roster: Roster,
    pub(crate) live: Vec<LiveAttendee>,
    pub(crate) epoch: u64,
    refresh_issued: u64,
    refresh_applied: u64,
}

impl Default for SessionCore {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            course: None,
            roster: Roster::default(),
            live: Vec::new(),
            epoch: 0,
            refresh_issued: 0,
            refresh_applied: 0,
        }
    }
}

impl SessionCore {
    pub(crate) fn activate(&mut self, session: QrSession, settings: &SessionSettings) -> u64 {
        self.epoch += 1;
        self.refresh_issued = 0;
        self.refresh_applied = 0;
        self.live.clear();
        self.state = SessionState::Active(ActiveSession {
            session,
            session_time_remaining: settings.session_length_secs.max(1),
            qr_refresh_countdown: settings
                .auto_refresh
                .then_some(settings.refresh_interval_secs.max(1)),
            started_at: Utc::now(),
        });
        self.epoch
    }

    /// One second of session time. The session countdown is checked first, so a refresh
    /// due on the expiry tick is never issued.
    pub(crate) fn advance(&mut self, epoch: u64, refresh_interval_secs: u32) -> Tick {
        if epoch != self.epoch {
            return Tick::Stopped;
        }
        let SessionState::Active(active) = &mut self.state else {
            return Tick::Stopped;
        };

        active.session_time_remaining = active.session_time_remaining.saturating_sub(1);
        if active.session_time_remaining == 0 {
            let session_id = active.session.session_id.clone();
            self.finish(EndReason::Timeout);
            return Tick::Expired { session_id };
        }

        if let Some(countdown) = active.qr_refresh_countdown.as_mut() {
            *countdown = countdown.saturating_sub(1);
            if *countdown == 0 {
                *countdown = refresh_interval_secs.max(1);
                let session_id = active.session.session_id.clone();
                self.refresh_issued += 1;
                return Tick::Refresh {
                    session_id,
                    seq: self.refresh_issued,
                };
            }
        }

        Tick::Counting
    }

    /// Swaps the running session for a newly generated one under a fresh epoch. The session
    /// countdown carries on; the refresh countdown starts over.
    /// Returns the new epoch, the updated session, and the id it replaced.
    pub(crate) fn rebind(
        &mut self,
        generated: GeneratedQr,
        validity_seconds: u32,
        geofence: Geofence,
        settings: &SessionSettings,
    ) -> Option<(u64, QrSession, String)> {
        let SessionState::Active(active) = &mut self.state else {
            return None;
        };
        let replaced = std::mem::replace(&mut active.session.session_id, generated.session_id);
        active.session.qr_payload = generated.qr_data;
        active.session.qr_version += 1;
        active.session.validity_seconds = validity_seconds;
        active.session.geofence = geofence;
        active.qr_refresh_countdown = settings
            .auto_refresh
            .then_some(settings.refresh_interval_secs.max(1));
        let session = active.session.clone();

        self.epoch += 1;
        self.refresh_issued = 0;
        self.refresh_applied = 0;
        self.live.clear();
        Some((self.epoch, session, replaced))
    }

    /// Leaves `Active`. Returns the session id only for the caller that made the transition.
    pub(crate) fn finish(&mut self, reason: EndReason) -> Option<String> {
        let SessionState::Active(active) = &self.state else {
            return None;
        };
        let ended = EndedSession {
            session_id: active.session.session_id.clone(),
            course_id: active.session.course_id.clone(),
            reason,
            ended_at: Utc::now(),
            stop_synced: false,
        };
        let session_id = ended.session_id.clone();
        self.state = SessionState::Ended(ended);
        Some(session_id)
    }

    /// Swaps in a refreshed payload unless a later request already landed or the
    /// session is gone.
    pub(crate) fn apply_refresh(&mut self, epoch: u64, seq: u64, refreshed: RefreshedQr) -> bool {
        if epoch != self.epoch || seq <= self.refresh_applied || !refreshed.success {
            return false;
        }
        let SessionState::Active(active) = &mut self.state else {
            return false;
        };
        active.session.qr_payload = refreshed.qr_data;
        active.session.qr_version += 1;
        self.refresh_applied = seq;
        true
    }

    pub(crate) fn merge_live(&mut self, epoch: u64, attendees: Vec<LiveAttendee>) -> bool {
        if epoch != self.epoch || !self.state.is_active() {
            return false;
        }
        let present: Vec<LiveAttendee> = attendees
            .into_iter()
            .filter(|a| a.status == AttendanceStatus::Present)
            .collect();
        let changed = self.roster.merge_present(&present);
        if changed > 0 {
            debug!("{} student(s) scanned in", changed);
        }
        self.live = present;
        true
    }

    pub(crate) fn mark_stop_synced(&mut self, session_id: &str) {
        if let SessionState::Ended(ended) = &mut self.state {
            if ended.session_id == session_id {
                ended.stop_synced = true;
            }
        }
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.roster.clear_statuses();
        self.live.clear();
    }

    pub(crate) fn summary(&self) -> SessionSummary {
        let total = match self.course.as_ref().map(|c| c.total_students) {
            Some(total) if total > 0 => total,
            _ => self.roster.students().len() as u32,
        };
        SessionSummary::new(
            self.roster.count(AttendanceStatus::Present),
            self.roster.count(AttendanceStatus::Absent),
            total,
        )
    }
}

/// Calls the stop endpoint once on its own task, so cancelling the caller never
/// cancels the request.
pub(crate) async fn stop_remote(
    core: Arc<Mutex<SessionCore>>,
    api: Arc<dyn AttendanceApi>,
    session_id: String,
) -> bool {
    let task = tokio::spawn(async move {
        match api.stop_session(&session_id).await {
            Ok(()) => {
                core.lock().await.mark_stop_synced(&session_id);
                info!("Session {} ended", session_id);
                true
            }
            Err(e) => {
                warn!("Failed to sync session end with server: {}", e);
                false
            }
        }
    });
    task.await.unwrap_or_else(|e| {
        warn!("stop task did not complete: {}", e);
        false
    })
}

/// Stops a backend session nobody is tracking anymore. Failures are only logged.
fn stop_detached(api: Arc<dyn AttendanceApi>, session_id: String) {
    tokio::spawn(async move {
        if let Err(e) = api.stop_session(&session_id).await {
            warn!("Failed to stop replaced session {}: {}", session_id, e);
        }
    });
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRef {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub course: Option<CourseRef>,
    pub students: Vec<StudentRecord>,
    pub live_attendance: Vec<LiveAttendee>,
    pub summary: SessionSummary,
    pub settings: SessionSettings,
}

pub struct QrSessionController {
    api: Arc<dyn AttendanceApi>,
    settings: SessionSettings,
    core: Arc<Mutex<SessionCore>>,
    ticker: Option<JoinHandle<()>>,
    poller: Option<JoinHandle<()>>,
}

impl QrSessionController {
    pub fn new(api: Arc<dyn AttendanceApi>, settings: SessionSettings) -> Self {
        Self {
            api,
            settings,
            core: Arc::new(Mutex::new(SessionCore::default())),
            ticker: None,
            poller: None,
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub async fn update_settings(&mut self, settings: SessionSettings) -> Result<(), AppError> {
        if self.core.lock().await.state.is_active() {
            return Err(AppError::invalid_state(
                "Settings cannot change while a session is running",
            ));
        }
        self.settings = settings;
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        self.core.lock().await.state.clone()
    }

    /// Picks the course the next session is for and loads its enrolled students.
    pub async fn select_course(&mut self, course: Course) -> Result<(), AppError> {
        {
            let mut core = self.core.lock().await;
            if core.state.is_active() {
                return Err(AppError::invalid_state("End the running session first"));
            }
            core.state = SessionState::Idle;
            core.live.clear();
            core.roster = Roster::default();
            core.course = Some(course.clone());
        }

        match self.api.list_course_students(&course.id).await {
            Ok(students) => {
                debug!("Loaded {} students for {}", students.len(), course.course_code);
                let mut core = self.core.lock().await;
                if core.course.as_ref().is_some_and(|c| c.id == course.id) {
                    core.roster = Roster::new(students);
                }
                Ok(())
            }
            Err(e) => {
                warn!("Failed to fetch enrolled students: {}", e);
                Err(e)
            }
        }
    }

    pub async fn generate(&mut self, location: Location) -> Result<QrSession, AppError> {
        let today = Day::from_weekday(Local::now().weekday());
        self.generate_for_day(location, today).await
    }

    /// Starts a session, picking the class type from the course's slot on `today`.
    pub async fn generate_for_day(
        &mut self,
        location: Location,
        today: Option<Day>,
    ) -> Result<QrSession, AppError> {
        let course = {
            let core = self.core.lock().await;
            match &core.state {
                SessionState::Active(_) => {
                    return Err(AppError::invalid_state("A session is already running"));
                }
                SessionState::Ended(_) => {
                    return Err(AppError::invalid_state("Start a new session first"));
                }
                SessionState::Idle => {}
            }
            core.course
                .clone()
                .ok_or_else(|| AppError::validation("No course selected"))?
        };

        let class_type = course.class_type_on(today);
        let request = GenerateQrRequest {
            course_id: course.id.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
            radius: self.settings.radius_meters,
            validity_seconds: self.settings.validity_seconds(),
            class_type,
        };

        let generated = self.api.generate_qr(&request).await?;

        let session = QrSession {
            session_id: generated.session_id,
            course_id: course.id.clone(),
            qr_payload: generated.qr_data,
            qr_version: 1,
            validity_seconds: request.validity_seconds,
            class_type,
            geofence: Geofence {
                latitude: location.latitude,
                longitude: location.longitude,
                radius_meters: request.radius,
            },
        };

        let epoch = self
            .core
            .lock()
            .await
            .activate(session.clone(), &self.settings);
        self.spawn_tasks(session.session_id.clone(), epoch);

        info!(
            "Session {} started for {} ({})",
            session.session_id, course.course_code, class_type
        );
        Ok(session)
    }

    /// Issues a brand-new QR session for the running class, e.g. when the projected code was
    /// shared. The old backend session is stopped and both background tasks follow the new id.
    pub async fn regenerate(&mut self, location: Location) -> Result<QrSession, AppError> {
        let (course_id, class_type) = {
            let core = self.core.lock().await;
            let SessionState::Active(active) = &core.state else {
                return Err(AppError::invalid_state("No active session to regenerate"));
            };
            (active.session.course_id.clone(), active.session.class_type)
        };

        let request = GenerateQrRequest {
            course_id,
            latitude: location.latitude,
            longitude: location.longitude,
            radius: self.settings.radius_meters,
            validity_seconds: self.settings.session_length_secs.max(1),
            class_type,
        };
        let generated = self.api.generate_qr(&request).await?;
        let new_id = generated.session_id.clone();

        let geofence = Geofence {
            latitude: location.latitude,
            longitude: location.longitude,
            radius_meters: request.radius,
        };
        let rebound = self.core.lock().await.rebind(
            generated,
            request.validity_seconds,
            geofence,
            &self.settings,
        );
        let Some((epoch, session, replaced)) = rebound else {
            // ended while the request was in flight
            stop_detached(self.api.clone(), new_id);
            return Err(AppError::invalid_state("Session ended before the new QR arrived"));
        };

        stop_detached(self.api.clone(), replaced.clone());
        self.spawn_tasks(session.session_id.clone(), epoch);

        info!("QR regenerated: {} replaces {}", session.session_id, replaced);
        Ok(session)
    }

    /// Operator ends the session. The local transition happens even if the backend
    /// rejects the stop call.
    pub async fn end(&mut self) -> Result<SessionSummary, AppError> {
        let session_id = self
            .core
            .lock()
            .await
            .finish(EndReason::Operator)
            .ok_or_else(|| AppError::invalid_state("No active session"))?;
        self.abort_tasks();

        stop_remote(self.core.clone(), self.api.clone(), session_id).await;
        Ok(self.core.lock().await.summary())
    }

    /// Back to `Idle` after a session ended, clearing local attendance.
    pub async fn restart(&mut self) -> Result<(), AppError> {
        let mut core = self.core.lock().await;
        if core.state.is_active() {
            return Err(AppError::invalid_state("End the running session first"));
        }
        if core.state.is_ended() {
            core.reset();
        }
        Ok(())
    }

    pub async fn mark(
        &mut self,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<(), AppError> {
        let session_id = self
            .core
            .lock()
            .await
            .state
            .session_id()
            .map(str::to_string)
            .ok_or_else(|| AppError::invalid_state("No session to mark attendance for"))?;

        self.api
            .save_manual_attendance(&session_id, student_id, status)
            .await?;

        let mut core = self.core.lock().await;
        if core.state.session_id() == Some(session_id.as_str()) {
            core.roster.set_status(student_id, status);
            if status == AttendanceStatus::Absent {
                core.live.retain(|a| a.student_id != student_id);
            }
        }
        info!("Student {} marked {:?}", student_id, status);
        Ok(())
    }

    /// Enrolled students whose name or roll number contains `query`.
    pub async fn search_students(&self, query: &str) -> Vec<StudentRecord> {
        self.core
            .lock()
            .await
            .roster
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let core = self.core.lock().await;
        SessionSnapshot {
            state: core.state.clone(),
            course: core.course.as_ref().map(|c| CourseRef {
                id: c.id.clone(),
                course_code: c.course_code.clone(),
                course_name: c.course_name.clone(),
            }),
            students: core.roster.students().to_vec(),
            live_attendance: core.live.clone(),
            summary: core.summary(),
            settings: self.settings,
        }
    }

    /// Binds a fresh poller and session clock to `epoch`, replacing any running ones.
    fn spawn_tasks(&mut self, session_id: String, epoch: u64) {
        self.abort_tasks();

        let poller = tokio::spawn(attendance_poller::run(
            self.core.clone(),
            self.api.clone(),
            session_id,
            epoch,
        ));
        let ticker = tokio::spawn(session_clock::run(
            self.core.clone(),
            self.api.clone(),
            self.settings,
            epoch,
            poller.abort_handle(),
        ));
        self.poller = Some(poller);
        self.ticker = Some(ticker);
    }

    fn abort_tasks(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

impl Drop for QrSessionController {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
