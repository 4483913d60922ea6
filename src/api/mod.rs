pub mod dto;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{
    AttendanceGrid, AttendanceStatus, Course, FacultyProfile, LiveAttendee, NewClassRequest,
    StudentRecord,
};

pub use dto::{CreatedCourse, GenerateQrRequest, GeneratedQr, RefreshedQr};
pub use memory::InMemoryAttendanceApi;

/// Remote attendance backend. Every piece of persistent state lives behind this trait.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError>;
    async fn create_full_class(&self, req: &NewClassRequest) -> Result<CreatedCourse, AppError>;
    async fn delete_course(&self, course_id: &str) -> Result<(), AppError>;

    async fn generate_qr(&self, req: &GenerateQrRequest) -> Result<GeneratedQr, AppError>;
    async fn refresh_qr(&self, session_id: &str) -> Result<RefreshedQr, AppError>;
    async fn stop_session(&self, session_id: &str) -> Result<(), AppError>;

    async fn get_session_attendance(&self, session_id: &str) -> Result<Vec<LiveAttendee>, AppError>;
    async fn list_course_students(&self, course_id: &str) -> Result<Vec<StudentRecord>, AppError>;
    async fn save_manual_attendance(
        &self,
        session_id: &str,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<(), AppError>;
    async fn get_course_attendance_grid(&self, course_id: &str) -> Result<AttendanceGrid, AppError>;

    async fn get_faculty_profile(&self) -> Result<Option<FacultyProfile>, AppError>;
    async fn save_faculty_profile(&self, profile: &FacultyProfile) -> Result<(), AppError>;
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, AppError> {
        let api_token = config
            .api_token
            .clone()
            .ok_or_else(|| AppError::Config("ATTENDANCE_API_TOKEN is not set".to_string()))?;

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token,
            timeout: Duration::from_secs(15),
        })
    }
}

pub struct HttpAttendanceApi {
    client: Client,
    config: ApiConfig,
}

impl HttpAttendanceApi {
    pub fn new(config: ApiConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.config.api_token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, AppError> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = serde_json::from_str::<dto::ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.or(b.message))
                .unwrap_or(body);
            return Err(AppError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AppError> {
        let body = self.send(builder).await?;
        serde_json::from_str::<T>(&body).map_err(|e| {
            tracing::error!("Failed to parse: {}", e);
            AppError::Decode(e.to_string())
        })
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        let response: dto::ListCoursesResponse =
            self.send_json(self.client.get(self.url("/courses"))).await?;

        let mut courses = Vec::new();
        for raw in response.courses {
            let id = raw.id.clone();
            match raw.into_course() {
                Some(course) => courses.push(course),
                None => warn!("Skipping course record without id ({:?})", id),
            }
        }
        debug!("Loaded {} courses", courses.len());
        Ok(courses)
    }

    async fn create_full_class(&self, req: &NewClassRequest) -> Result<CreatedCourse, AppError> {
        let payload = dto::CreateFullClassPayload::from(req);
        let response: dto::CreateFullClassResponse = self
            .send_json(self.client.post(self.url("/courses/full")).json(&payload))
            .await?;
        Ok(response.course.unwrap_or_default())
    }

    async fn delete_course(&self, course_id: &str) -> Result<(), AppError> {
        self.send(self.client.delete(self.url(&format!("/courses/{}", course_id))))
            .await?;
        Ok(())
    }

    async fn generate_qr(&self, req: &GenerateQrRequest) -> Result<GeneratedQr, AppError> {
        self.send_json(self.client.post(self.url("/sessions/qr")).json(req))
            .await
    }

    async fn refresh_qr(&self, session_id: &str) -> Result<RefreshedQr, AppError> {
        self.send_json(
            self.client
                .post(self.url(&format!("/sessions/{}/refresh", session_id))),
        )
        .await
    }

    async fn stop_session(&self, session_id: &str) -> Result<(), AppError> {
        self.send(
            self.client
                .post(self.url(&format!("/sessions/{}/stop", session_id))),
        )
        .await?;
        Ok(())
    }

    async fn get_session_attendance(
        &self,
        session_id: &str,
    ) -> Result<Vec<LiveAttendee>, AppError> {
        let response: dto::SessionAttendanceResponse = self
            .send_json(
                self.client
                    .get(self.url(&format!("/sessions/{}/attendance", session_id))),
            )
            .await?;
        Ok(response
            .attendees
            .into_iter()
            .filter_map(dto::AttendeeDto::into_attendee)
            .collect())
    }

    async fn list_course_students(&self, course_id: &str) -> Result<Vec<StudentRecord>, AppError> {
        let response: dto::CourseStudentsResponse = self
            .send_json(
                self.client
                    .get(self.url(&format!("/courses/{}/students", course_id))),
            )
            .await?;
        Ok(response.students.into_iter().map(StudentRecord::from).collect())
    }

    async fn save_manual_attendance(
        &self,
        session_id: &str,
        student_id: &str,
        status: AttendanceStatus,
    ) -> Result<(), AppError> {
        let payload = dto::ManualAttendancePayload { student_id, status };
        self.send(
            self.client
                .post(self.url(&format!("/sessions/{}/attendance", session_id)))
                .json(&payload),
        )
        .await?;
        Ok(())
    }

    async fn get_course_attendance_grid(
        &self,
        course_id: &str,
    ) -> Result<AttendanceGrid, AppError> {
        let response: dto::AttendanceGridResponse = self
            .send_json(
                self.client
                    .get(self.url(&format!("/courses/{}/attendance-grid", course_id))),
            )
            .await?;
        Ok(response.into())
    }

    async fn get_faculty_profile(&self) -> Result<Option<FacultyProfile>, AppError> {
        let response: dto::ProfileResponse = self
            .send_json(self.client.get(self.url("/faculty/profile")))
            .await?;
        Ok(response.faculty.map(FacultyProfile::from))
    }

    async fn save_faculty_profile(&self, profile: &FacultyProfile) -> Result<(), AppError> {
        let payload = dto::SaveProfilePayload {
            name: &profile.name,
            email: &profile.email,
            phone: &profile.phone,
            mobile: &profile.phone,
        };
        self.send(self.client.post(self.url("/faculty/profile")).json(&payload))
            .await?;
        Ok(())
    }
}
