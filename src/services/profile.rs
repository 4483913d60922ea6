use tracing::info;

use crate::api::AttendanceApi;
use crate::error::AppError;
use crate::models::FacultyProfile;

pub async fn load_profile(api: &dyn AttendanceApi) -> Result<FacultyProfile, AppError> {
    Ok(api.get_faculty_profile().await?.unwrap_or_default())
}

pub async fn save_profile(
    api: &dyn AttendanceApi,
    profile: FacultyProfile,
) -> Result<FacultyProfile, AppError> {
    if profile.name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }

    let profile = FacultyProfile {
        name: profile.name.trim().to_string(),
        email: profile.email.trim().to_string(),
        phone: profile.phone.trim().to_string(),
    };
    api.save_faculty_profile(&profile).await?;
    info!("Faculty profile saved for {}", profile.name);
    Ok(profile)
}
