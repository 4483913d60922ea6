use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::AttendanceApi;
use crate::error::AppError;
use crate::models::{AcademicSession, Course, CreatedClass, NewClassRequest, SlotType, TimeSlot};
use crate::services::slot_validator::SlotSelection;

/// Basic information for a batch of classes, one per branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDraft {
    pub branches: Vec<String>,
    pub year: String,
    pub course_name: String,
    pub course_code: String,
    #[serde(default)]
    pub credits: Option<u32>,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub session: AcademicSession,
}

impl ClassDraft {
    pub fn validate(&self) -> Result<(), AppError> {
        let blank = |s: &str| s.trim().is_empty();
        if self.branches.iter().all(|b| blank(b))
            || blank(&self.year)
            || blank(&self.course_name)
            || blank(&self.course_code)
        {
            return Err(AppError::validation(
                "Please fill all required fields and select at least one branch",
            ));
        }
        Ok(())
    }

    /// Starts the timetable step in theory mode for the first branch.
    pub fn start_selection(&self) -> Result<SlotSelection, AppError> {
        self.validate()?;
        let first = self
            .branches
            .iter()
            .find(|b| !b.trim().is_empty())
            .cloned()
            .unwrap_or_default();
        Ok(SlotSelection::with_mode(SlotType::Theory, first))
    }

    /// Builds the selection from a submitted slot set. Every slot is added once; a repeated
    /// (day, time, branch) or a branch outside the draft is rejected, as is any occupied cell.
    /// Slots without a branch go to the first drafted branch.
    pub fn select_slots(
        &self,
        existing: &[Course],
        slots: &[TimeSlot],
    ) -> Result<SlotSelection, AppError> {
        let mut selection = self.start_selection()?;
        let first = selection
            .mode()
            .map(|m| m.branch.clone())
            .unwrap_or_default();

        for slot in slots {
            let branch = if slot.branch.trim().is_empty() {
                first.clone()
            } else {
                slot.branch.trim().to_string()
            };
            if !self.branches.iter().any(|b| b.trim() == branch) {
                return Err(AppError::validation(format!(
                    "Branch {} is not part of this class",
                    branch
                )));
            }
            if selection.is_selected(slot.day, slot.time, Some(&branch)) {
                return Err(AppError::validation(format!(
                    "{} {} is listed twice for {}",
                    slot.day, slot.time, branch
                )));
            }

            selection.set_mode(slot.slot_type, branch);
            selection.toggle(existing, slot.day, slot.time)?;
        }

        Ok(selection)
    }

    fn request_for(&self, branch: &str, slots: Vec<TimeSlot>) -> NewClassRequest {
        NewClassRequest {
            branch: branch.to_string(),
            year: self.year.clone(),
            course_name: self.course_name.clone(),
            course_code: self.course_code.clone(),
            class_name: format!("{}{}", branch, self.year),
            timetable: slots,
            section: "A".to_string(),
            credits: self.credits.filter(|c| *c > 0).unwrap_or(3),
            semester: self.semester.clone(),
            session: self.session,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub created: Vec<CreatedClass>,
    /// Branches the backend accepted without returning a join code.
    pub missing_join_codes: Vec<String>,
}

/// Creates one course per drafted branch that has at least one selected slot.
pub async fn create_classes(
    api: &dyn AttendanceApi,
    draft: &ClassDraft,
    selection: &SlotSelection,
) -> Result<BatchOutcome, AppError> {
    draft.validate()?;
    if selection.is_empty() {
        return Err(AppError::validation("Please select at least one time slot"));
    }

    let mut outcome = BatchOutcome::default();

    for branch in &draft.branches {
        let slots: Vec<TimeSlot> = selection.slots_for_branch(branch).cloned().collect();
        if slots.is_empty() {
            info!("Skipping {} - no slots selected", branch);
            continue;
        }

        let request = draft.request_for(branch, slots);
        let created = api.create_full_class(&request).await?;

        match created.join_code.filter(|c| !c.is_empty()) {
            Some(join_code) => {
                info!("Created {} for {} (join code {})", request.class_name, branch, join_code);
                outcome.created.push(CreatedClass {
                    branch: branch.clone(),
                    join_code,
                    course_name: draft.course_name.clone(),
                    course_code: draft.course_code.clone(),
                });
            }
            None => {
                warn!("No join code in response for {}", branch);
                outcome.missing_join_codes.push(branch.clone());
            }
        }
    }

    if outcome.created.is_empty() && outcome.missing_join_codes.is_empty() {
        return Err(AppError::validation("No classes were created"));
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::InMemoryAttendanceApi;
    use crate::models::Day;

    fn draft(branches: &[&str]) -> ClassDraft {
        ClassDraft {
            branches: branches.iter().map(|b| b.to_string()).collect(),
            year: "2024".to_string(),
            course_name: "Data Structures".to_string(),
            course_code: "CS101".to_string(),
            credits: None,
            semester: "3".to_string(),
            session: AcademicSession::Autumn,
        }
    }

    #[test]
    fn test_validate_requires_fields() {
        let mut d = draft(&["CSE"]);
        assert!(d.validate().is_ok());
        d.course_code = "  ".to_string();
        assert!(matches!(d.validate(), Err(AppError::Validation(_))));
        assert!(draft(&[]).validate().is_err());
    }

    #[test]
    fn test_request_defaults() {
        let request = draft(&["DSAI"]).request_for("DSAI", vec![]);
        assert_eq!(request.class_name, "DSAI2024");
        assert_eq!(request.section, "A");
        assert_eq!(request.credits, 3);
    }

    fn slot(day: Day, time: &str, branch: &str) -> TimeSlot {
        TimeSlot {
            day,
            time: time.parse().unwrap(),
            slot_type: SlotType::Theory,
            branch: branch.to_string(),
            room: None,
        }
    }

    #[test]
    fn test_select_slots_keeps_every_slot() {
        let d = draft(&["CSE", "ECE"]);
        let slots = vec![
            slot(Day::Monday, "09:00 AM - 10:00 AM", "CSE"),
            slot(Day::Monday, "09:00 AM - 10:00 AM", "ECE"),
            slot(Day::Tuesday, "10:00 AM - 11:00 AM", ""),
        ];

        let selection = d.select_slots(&[], &slots).unwrap();
        assert_eq!(selection.slots().len(), 3);
        assert_eq!(selection.slots_for_branch("CSE").count(), 2);
    }

    #[test]
    fn test_select_slots_rejects_repeats_and_unknown_branches() {
        let d = draft(&["CSE"]);
        let repeated = vec![
            slot(Day::Monday, "09:00 AM - 10:00 AM", "CSE"),
            slot(Day::Monday, "09:00 AM - 10:00 AM", "CSE"),
        ];
        assert!(matches!(d.select_slots(&[], &repeated), Err(AppError::Validation(_))));

        let foreign = vec![slot(Day::Monday, "09:00 AM - 10:00 AM", "MECH")];
        assert!(matches!(d.select_slots(&[], &foreign), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_selection_is_rejected_before_network() {
        let api = InMemoryAttendanceApi::new();
        let d = draft(&["CSE"]);
        let selection = d.start_selection().unwrap();

        let err = create_classes(&api, &d, &selection).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(api.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_branches_without_slots_are_skipped() {
        let api = InMemoryAttendanceApi::new();
        let d = draft(&["CSE", "ECE"]);
        let mut selection = d.start_selection().unwrap();
        selection
            .toggle(&[], Day::Thursday, "03:00 PM - 04:00 PM".parse().unwrap())
            .unwrap();

        let outcome = create_classes(&api, &d, &selection).await.unwrap();
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.created[0].branch, "CSE");
        assert_eq!(api.create_calls(), 1);
    }
}
