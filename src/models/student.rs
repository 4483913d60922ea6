use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// An enrolled student with today's status. `None` means not yet marked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub status: Option<AttendanceStatus>,
}

/// A student who scanned the QR code during the running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveAttendee {
    pub student_id: String,
    pub name: String,
    pub roll_number: String,
    pub status: AttendanceStatus,
    pub marked_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Roster {
    students: Vec<StudentRecord>,
}

impl Roster {
    pub fn new(students: Vec<StudentRecord>) -> Self {
        Self { students }
    }

    pub fn students(&self) -> &[StudentRecord] {
        &self.students
    }

    /// Marks every listed present attendee as present. Never clears a status.
    /// Returns how many students changed.
    pub fn merge_present(&mut self, attendees: &[LiveAttendee]) -> usize {
        let mut changed = 0;
        for student in &mut self.students {
            let scanned = attendees
                .iter()
                .any(|a| a.status == AttendanceStatus::Present && a.student_id == student.id);
            if scanned && student.status != Some(AttendanceStatus::Present) {
                student.status = Some(AttendanceStatus::Present);
                changed += 1;
            }
        }
        changed
    }

    pub fn set_status(&mut self, student_id: &str, status: AttendanceStatus) -> bool {
        match self.students.iter_mut().find(|s| s.id == student_id) {
            Some(student) => {
                student.status = Some(status);
                true
            }
            None => false,
        }
    }

    pub fn clear_statuses(&mut self) {
        for student in &mut self.students {
            student.status = None;
        }
    }

    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.students
            .iter()
            .filter(|s| s.status == Some(status))
            .count()
    }

    /// Case-insensitive match on name or roll number.
    pub fn search(&self, query: &str) -> Vec<&StudentRecord> {
        let query = query.to_lowercase();
        self.students
            .iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&query)
                    || s.roll_number.to_lowercase().contains(&query)
            })
            .collect()
    }
}
