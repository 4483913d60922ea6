use attendance_desk::api::{AttendanceApi, InMemoryAttendanceApi};
use attendance_desk::error::AppError;
use attendance_desk::models::{AcademicSession, Day, SlotType, TimeLabel};
use attendance_desk::services::{ClassDraft, SlotToggle, create_classes, is_slot_occupied};

fn draft(branches: &[&str], code: &str) -> ClassDraft {
    ClassDraft {
        branches: branches.iter().map(|b| b.to_string()).collect(),
        year: "2024".to_string(),
        course_name: "Digital Logic".to_string(),
        course_code: code.to_string(),
        credits: Some(4),
        semester: "3".to_string(),
        session: AcademicSession::Autumn,
    }
}

fn label(s: &str) -> TimeLabel {
    s.parse().unwrap()
}

#[tokio::test]
async fn test_two_branches_share_a_slot_with_distinct_join_codes() {
    let api = InMemoryAttendanceApi::new();
    let d = draft(&["CSE", "ECE"], "EC201");
    let nine = label("09:00 AM - 10:00 AM");

    let mut selection = d.start_selection().unwrap();
    assert_eq!(selection.toggle(&[], Day::Monday, nine).unwrap(), SlotToggle::Added);
    selection.set_mode(SlotType::Theory, "ECE");
    assert_eq!(selection.toggle(&[], Day::Monday, nine).unwrap(), SlotToggle::Added);

    let outcome = create_classes(&api, &d, &selection).await.unwrap();
    assert_eq!(outcome.created.len(), 2);
    assert_ne!(outcome.created[0].join_code, outcome.created[1].join_code);
    assert_eq!(api.create_calls(), 2);

    let courses = api.list_courses().await.unwrap();
    let names: Vec<&str> = courses.iter().map(|c| c.class_name.as_str()).collect();
    assert_eq!(names, vec!["CSE2024", "ECE2024"]);
    assert!(courses.iter().all(|c| c.credits == 4 && c.section == "A"));
    assert!(is_slot_occupied(&courses, Day::Monday, nine));
}

#[tokio::test]
async fn test_occupied_slot_is_reported_with_owning_course() {
    let api = InMemoryAttendanceApi::new();
    let ten = label("10:00 AM - 11:00 AM");

    let first = draft(&["CSE"], "MA101");
    let mut selection = first.start_selection().unwrap();
    selection.set_mode(SlotType::Lab, "CSE");
    selection.toggle(&[], Day::Tuesday, ten).unwrap();
    create_classes(&api, &first, &selection).await.unwrap();

    let existing = api.list_courses().await.unwrap();
    let second = draft(&["CSE"], "PH102");
    let mut selection = second.start_selection().unwrap();

    match selection.toggle(&existing, Day::Tuesday, ten) {
        Err(AppError::SlotConflict {
            course_code,
            slot_type,
        }) => {
            assert_eq!(course_code, "MA101");
            assert_eq!(slot_type, SlotType::Lab);
        }
        other => panic!("expected slot conflict, got {:?}", other),
    }
    assert!(selection.is_empty());

    // free slots on the same day are still selectable
    assert_eq!(
        selection
            .toggle(&existing, Day::Tuesday, label("11:00 AM - 12:00 PM"))
            .unwrap(),
        SlotToggle::Added
    );
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_backend() {
    let api = InMemoryAttendanceApi::new();
    let mut d = draft(&["CSE"], "CS301");
    d.course_name = String::new();

    assert!(matches!(d.start_selection(), Err(AppError::Validation(_))));
    assert_eq!(api.create_calls(), 0);
}
