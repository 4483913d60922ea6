use serde::Serialize;

use crate::error::AppError;
use crate::models::{Course, Day, SlotType, TimeLabel, TimeSlot};

/// Course code and slot type of the class already holding a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedSlot {
    pub course_code: String,
    pub slot_type: SlotType,
}

/// A (day, time) cell is one shared resource: any persisted class holding it blocks
/// every other class, whatever the branch or slot type.
pub fn is_slot_occupied(existing: &[Course], day: Day, time: TimeLabel) -> bool {
    occupied_slot_info(existing, day, time).is_some()
}

pub fn occupied_slot_info(existing: &[Course], day: Day, time: TimeLabel) -> Option<OccupiedSlot> {
    existing.iter().find_map(|course| {
        course
            .timetable
            .iter()
            .find(|slot| slot.occupies(day, time))
            .map(|slot| OccupiedSlot {
                course_code: course.course_code.clone(),
                slot_type: slot.slot_type,
            })
    })
}

/// Branch and slot type new selections are made under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMode {
    pub slot_type: SlotType,
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotToggle {
    Added,
    Removed,
    Retyped,
}

/// Timetable picked for a batch of new classes, scoped per branch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SlotSelection {
    mode: Option<SlotMode>,
    slots: Vec<TimeSlot>,
}

impl SlotSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(slot_type: SlotType, branch: impl Into<String>) -> Self {
        Self {
            mode: Some(SlotMode {
                slot_type,
                branch: branch.into(),
            }),
            slots: Vec::new(),
        }
    }

    pub fn set_mode(&mut self, slot_type: SlotType, branch: impl Into<String>) {
        self.mode = Some(SlotMode {
            slot_type,
            branch: branch.into(),
        });
    }

    pub fn mode(&self) -> Option<&SlotMode> {
        self.mode.as_ref()
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots_for_branch<'a>(
        &'a self,
        branch: &'a str,
    ) -> impl Iterator<Item = &'a TimeSlot> + 'a {
        self.slots.iter().filter(move |s| s.branch == branch)
    }

    pub fn is_selected(&self, day: Day, time: TimeLabel, branch: Option<&str>) -> bool {
        self.slots
            .iter()
            .any(|s| s.occupies(day, time) && branch.is_none_or(|b| s.branch == b))
    }

    /// Clicks the (day, time) cell under the current mode.
    ///
    /// Same branch and type selected: removed. Same branch, other type: retyped in place.
    /// Otherwise the cell is added, unless a persisted class already holds it.
    pub fn toggle(
        &mut self,
        existing: &[Course],
        day: Day,
        time: TimeLabel,
    ) -> Result<SlotToggle, AppError> {
        let mode = self
            .mode
            .clone()
            .ok_or_else(|| AppError::validation("Please select a branch and type first"))?;

        let position = self
            .slots
            .iter()
            .position(|s| s.occupies(day, time) && s.branch == mode.branch);

        if let Some(index) = position {
            if self.slots[index].slot_type == mode.slot_type {
                self.slots.remove(index);
                return Ok(SlotToggle::Removed);
            }
        }

        if let Some(occupied) = occupied_slot_info(existing, day, time) {
            return Err(AppError::SlotConflict {
                course_code: occupied.course_code,
                slot_type: occupied.slot_type,
            });
        }

        match position {
            Some(index) => {
                self.slots[index].slot_type = mode.slot_type;
                Ok(SlotToggle::Retyped)
            }
            None => {
                self.slots.push(TimeSlot {
                    day,
                    time,
                    slot_type: mode.slot_type,
                    branch: mode.branch,
                    room: None,
                });
                Ok(SlotToggle::Added)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AcademicSession;

    fn label(s: &str) -> TimeLabel {
        s.parse().unwrap()
    }

    fn persisted(code: &str, branch: &str, day: Day, time: &str, slot_type: SlotType) -> Course {
        Course {
            id: format!("id-{}", code),
            course_code: code.to_string(),
            course_name: format!("{} course", code),
            section: "A".to_string(),
            branch: branch.to_string(),
            year: "2024".to_string(),
            class_name: format!("{}2024", branch),
            credits: 3,
            semester: "1".to_string(),
            session: AcademicSession::Spring,
            join_code: "XYZ123".to_string(),
            timetable: vec![TimeSlot {
                day,
                time: label(time),
                slot_type,
                branch: branch.to_string(),
                room: None,
            }],
            total_students: 0,
        }
    }

    #[test]
    fn test_occupied_regardless_of_branch_and_type() {
        let existing = vec![persisted(
            "CS201",
            "ECE",
            Day::Tuesday,
            "10:00 AM - 11:00 AM",
            SlotType::Lab,
        )];
        let info =
            occupied_slot_info(&existing, Day::Tuesday, label("10:00 AM - 11:00 AM")).unwrap();
        assert_eq!(info.course_code, "CS201");
        assert_eq!(info.slot_type, SlotType::Lab);

        let mut selection = SlotSelection::with_mode(SlotType::Theory, "CSE");
        let err = selection
            .toggle(&existing, Day::Tuesday, label("10:00 AM - 11:00 AM"))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::SlotConflict { ref course_code, .. } if course_code == "CS201"
        ));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_adjacent_labels_do_not_conflict() {
        let existing = vec![persisted(
            "CS201",
            "CSE",
            Day::Tuesday,
            "10:00 AM - 11:00 AM",
            SlotType::Theory,
        )];
        assert!(!is_slot_occupied(&existing, Day::Tuesday, label("11:00 AM - 12:00 PM")));
        assert!(!is_slot_occupied(&existing, Day::Wednesday, label("10:00 AM - 11:00 AM")));
    }

    #[test]
    fn test_toggle_twice_restores_selection() {
        let mut selection = SlotSelection::with_mode(SlotType::Theory, "CSE");
        let time = label("09:00 AM - 10:00 AM");

        assert_eq!(selection.toggle(&[], Day::Monday, time).unwrap(), SlotToggle::Added);
        assert_eq!(selection.toggle(&[], Day::Monday, time).unwrap(), SlotToggle::Removed);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_other_type_retypes_in_place() {
        let mut selection = SlotSelection::with_mode(SlotType::Theory, "CSE");
        let time = label("02:00 PM - 03:00 PM");
        selection.toggle(&[], Day::Friday, time).unwrap();

        selection.set_mode(SlotType::Lab, "CSE");
        assert_eq!(selection.toggle(&[], Day::Friday, time).unwrap(), SlotToggle::Retyped);
        assert_eq!(selection.slots().len(), 1);
        assert_eq!(selection.slots()[0].slot_type, SlotType::Lab);
    }

    #[test]
    fn test_same_cell_allowed_per_branch_in_one_batch() {
        let mut selection = SlotSelection::with_mode(SlotType::Theory, "CSE");
        let time = label("09:00 AM - 10:00 AM");
        selection.toggle(&[], Day::Monday, time).unwrap();

        selection.set_mode(SlotType::Theory, "ECE");
        assert_eq!(selection.toggle(&[], Day::Monday, time).unwrap(), SlotToggle::Added);
        assert_eq!(selection.slots().len(), 2);
        assert!(selection.is_selected(Day::Monday, time, Some("ECE")));
        assert_eq!(selection.slots_for_branch("CSE").count(), 1);
    }

    #[test]
    fn test_toggle_requires_mode() {
        let mut selection = SlotSelection::new();
        let err = selection
            .toggle(&[], Day::Monday, label("09:00 AM - 10:00 AM"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
