use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::{
    AttendanceStatus, Course, CourseReport, Day, FacultyProfile, QrSession, SessionSummary,
    TimeLabel, TimeSlot,
};
use crate::services::{
    BatchOutcome, ClassDraft, Location, OccupiedSlot, SessionSnapshot, create_classes,
    occupied_slot_info, profile, reports,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{id}", delete(delete_course))
        .route("/courses/{id}/report", get(course_report))
        .route("/classes", post(create_class_batch))
        .route("/timetable", get(timetable))
        .route("/timetable/occupied", get(slot_occupancy))
        .route("/session", get(session_snapshot))
        .route("/session/select", post(select_course))
        .route("/session/start", post(start_session))
        .route("/session/regenerate", post(regenerate_session))
        .route("/session/end", post(end_session))
        .route("/session/restart", post(restart_session))
        .route("/session/students/{id}/mark", post(mark_student))
        .route("/profile", get(get_profile).put(put_profile))
        .route("/clock", get(clock))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> StatusCode {
    match state.api.list_courses().await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            error!("health check failed: {}", err);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    Ok(Json(state.refresh_courses().await?))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.api.delete_course(&id).await?;
    state.refresh_courses().await?;
    info!("Course {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateClassesRequest {
    #[serde(flatten)]
    pub draft: ClassDraft,
    pub slots: Vec<TimeSlot>,
}

/// Checks the submitted slot set against persisted classes before creating anything.
async fn create_class_batch(
    State(state): State<AppState>,
    Json(req): Json<CreateClassesRequest>,
) -> Result<(StatusCode, Json<BatchOutcome>), AppError> {
    let existing = state.refresh_courses().await?;
    let selection = req.draft.select_slots(&existing, &req.slots)?;

    let result = create_classes(state.api.as_ref(), &req.draft, &selection).await;
    // earlier branches may be persisted even when a later one failed
    if let Err(e) = state.refresh_courses().await {
        warn!("Failed to reload courses after class creation: {}", e);
    }

    Ok((StatusCode::CREATED, Json(result?)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedCell {
    pub day: Day,
    pub time: TimeLabel,
    #[serde(flatten)]
    pub occupied: OccupiedSlot,
}

async fn timetable(State(state): State<AppState>) -> Result<Json<Vec<OccupiedCell>>, AppError> {
    let courses = state.refresh_courses().await?;

    let cells = Day::ALL
        .into_iter()
        .flat_map(|day| TimeLabel::all().map(move |time| (day, time)))
        .filter_map(|(day, time)| {
            occupied_slot_info(&courses, day, time).map(|occupied| OccupiedCell {
                day,
                time,
                occupied,
            })
        })
        .collect();

    Ok(Json(cells))
}

#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    pub day: String,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct OccupancyResponse {
    pub occupied: bool,
    pub slot: Option<OccupiedSlot>,
}

async fn slot_occupancy(
    State(state): State<AppState>,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<OccupancyResponse>, AppError> {
    let day: Day = query.day.parse().map_err(AppError::Validation)?;
    let time: TimeLabel = query.time.parse().map_err(AppError::Validation)?;

    let courses = state.courses.read().await;
    let slot = occupied_slot_info(&courses, day, time);
    Ok(Json(OccupancyResponse {
        occupied: slot.is_some(),
        slot,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Filters the student list by name or roll number. Counts stay unfiltered.
    pub q: Option<String>,
}

async fn session_snapshot(
    State(state): State<AppState>,
    Query(query): Query<SnapshotQuery>,
) -> Json<SessionSnapshot> {
    let controller = state.controller.lock().await;
    let mut snapshot = controller.snapshot().await;
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        snapshot.students = controller.search_students(q).await;
    }
    Json(snapshot)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectCourseRequest {
    pub course_id: String,
}

async fn select_course(
    State(state): State<AppState>,
    Json(req): Json<SelectCourseRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let course = state.find_course(&req.course_id).await?;
    let mut controller = state.controller.lock().await;
    controller.select_course(course).await?;
    Ok(Json(controller.snapshot().await))
}

async fn start_session(
    State(state): State<AppState>,
    Json(location): Json<Location>,
) -> Result<(StatusCode, Json<QrSession>), AppError> {
    let session = state.controller.lock().await.generate(location).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn regenerate_session(
    State(state): State<AppState>,
    Json(location): Json<Location>,
) -> Result<Json<QrSession>, AppError> {
    Ok(Json(state.controller.lock().await.regenerate(location).await?))
}

async fn end_session(State(state): State<AppState>) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(state.controller.lock().await.end().await?))
}

async fn restart_session(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    let mut controller = state.controller.lock().await;
    controller.restart().await?;
    Ok(Json(controller.snapshot().await))
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    pub status: AttendanceStatus,
}

async fn mark_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(req): Json<MarkRequest>,
) -> Result<StatusCode, AppError> {
    state
        .controller
        .lock()
        .await
        .mark(&student_id, req.status)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn course_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseReport>, AppError> {
    Ok(Json(reports::course_report(state.api.as_ref(), &id).await?))
}

async fn get_profile(State(state): State<AppState>) -> Result<Json<FacultyProfile>, AppError> {
    Ok(Json(profile::load_profile(state.api.as_ref()).await?))
}

async fn put_profile(
    State(state): State<AppState>,
    Json(req): Json<FacultyProfile>,
) -> Result<Json<FacultyProfile>, AppError> {
    Ok(Json(profile::save_profile(state.api.as_ref(), req).await?))
}

#[derive(Debug, Serialize)]
pub struct ClockResponse {
    pub now: DateTime<Local>,
    pub label: String,
}

async fn clock(State(state): State<AppState>) -> Json<ClockResponse> {
    let now = *state.clock.read().await;
    Json(ClockResponse {
        now,
        label: now.format("%H:%M").to_string(),
    })
}
