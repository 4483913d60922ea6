use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::api::AttendanceApi;
use crate::error::AppError;
use crate::models::Course;
use crate::services::{QrSessionController, SessionSettings, SharedClock};

#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn AttendanceApi>,
    pub courses: Arc<RwLock<Vec<Course>>>,
    pub controller: Arc<Mutex<QrSessionController>>,
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(api: Arc<dyn AttendanceApi>, settings: SessionSettings, clock: SharedClock) -> Self {
        Self {
            controller: Arc::new(Mutex::new(QrSessionController::new(api.clone(), settings))),
            api,
            courses: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    /// Re-fetches the faculty's courses into the cache.
    pub async fn refresh_courses(&self) -> Result<Vec<Course>, AppError> {
        let courses = self.api.list_courses().await?;
        *self.courses.write().await = courses.clone();
        Ok(courses)
    }

    pub async fn find_course(&self, course_id: &str) -> Result<Course, AppError> {
        if let Some(course) = self
            .courses
            .read()
            .await
            .iter()
            .find(|c| c.id == course_id)
        {
            return Ok(course.clone());
        }

        self.refresh_courses()
            .await?
            .into_iter()
            .find(|c| c.id == course_id)
            .ok_or(AppError::NotFound)
    }
}
