use serde::{Deserialize, Serialize};

use super::timetable::{ClassType, Day, TimeSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcademicSession {
    #[default]
    Spring,
    Autumn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
    pub section: String,
    pub branch: String,
    pub year: String,
    pub class_name: String,
    pub credits: u32,
    pub semester: String,
    pub session: AcademicSession,
    pub join_code: String,
    pub timetable: Vec<TimeSlot>,
    pub total_students: u32,
}

impl Course {
    /// Type of the first slot scheduled on `day`, falling back to theory.
    pub fn class_type_on(&self, day: Option<Day>) -> ClassType {
        day.and_then(|day| self.timetable.iter().find(|slot| slot.day == day))
            .map(|slot| slot.slot_type.into())
            .unwrap_or(ClassType::Theory)
    }
}

/// One course as sent to `createFullClass`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClassRequest {
    pub branch: String,
    pub year: String,
    pub course_name: String,
    pub course_code: String,
    pub class_name: String,
    pub timetable: Vec<TimeSlot>,
    pub section: String,
    pub credits: u32,
    pub semester: String,
    pub session: AcademicSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedClass {
    pub branch: String,
    pub join_code: String,
    pub course_name: String,
    pub course_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotType;

    fn course_with(slots: Vec<TimeSlot>) -> Course {
        Course {
            id: "c1".to_string(),
            course_code: "CS101".to_string(),
            course_name: "Data Structures".to_string(),
            section: "A".to_string(),
            branch: "CSE".to_string(),
            year: "2024".to_string(),
            class_name: "CSE2024".to_string(),
            credits: 3,
            semester: "3".to_string(),
            session: AcademicSession::Autumn,
            join_code: "JOIN01".to_string(),
            timetable: slots,
            total_students: 40,
        }
    }

    #[test]
    fn test_class_type_uses_todays_slot() {
        let course = course_with(vec![
            TimeSlot {
                day: Day::Monday,
                time: "09:00 AM - 10:00 AM".parse().unwrap(),
                slot_type: SlotType::Theory,
                branch: "CSE".to_string(),
                room: None,
            },
            TimeSlot {
                day: Day::Wednesday,
                time: "02:00 PM - 03:00 PM".parse().unwrap(),
                slot_type: SlotType::Lab,
                branch: "CSE".to_string(),
                room: Some("Lab 201".to_string()),
            },
        ]);

        assert_eq!(course.class_type_on(Some(Day::Wednesday)), ClassType::Lab);
        assert_eq!(course.class_type_on(Some(Day::Monday)), ClassType::Theory);
    }

    #[test]
    fn test_class_type_defaults_to_theory() {
        let course = course_with(vec![]);
        assert_eq!(course.class_type_on(Some(Day::Friday)), ClassType::Theory);
        assert_eq!(course.class_type_on(None), ClassType::Theory);
    }
}
