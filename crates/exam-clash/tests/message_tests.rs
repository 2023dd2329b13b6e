//! Tests for clash message formatting.

use exam_clash::{
    describe_clash, parse_clock_time, rejection_message, CandidateExam, ClashRecord, ClashReport,
    ConflictingExam, UserRef,
};

fn conflicting(room_id: i64, class_code_id: i64) -> ConflictingExam {
    ConflictingExam {
        id: 5,
        title: Some("Midterm".to_string()),
        date: "2026-06-01".parse().unwrap(),
        start_time: parse_clock_time("09:00").unwrap(),
        end_time: parse_clock_time("10:00").unwrap(),
        room_id,
        room_name: "Hall A".to_string(),
        class_code_id,
        class_code: "CS101".to_string(),
    }
}

fn candidate(room_id: i64, class_code_id: i64) -> CandidateExam {
    CandidateExam {
        date: "2026-06-01".parse().unwrap(),
        start_time: parse_clock_time("09:30").unwrap(),
        end_time: parse_clock_time("10:30").unwrap(),
        room_id,
        class_code_id,
        exclude_exam_id: None,
    }
}

fn people(names: &[&str]) -> Vec<UserRef> {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| UserRef {
            id: i as i64 + 1,
            name: n.to_string(),
        })
        .collect()
}

#[test]
fn record_messages_per_kind() {
    let room = ClashRecord::Room {
        conflicting_exam: conflicting(1, 10),
    };
    let teacher = ClashRecord::Teacher {
        teacher: people(&["Turing"]).remove(0),
        conflicting_exam: conflicting(1, 10),
    };
    let student = ClashRecord::Student {
        students: people(&["Alice", "Bob"]),
        conflicting_exam: conflicting(1, 10),
    };

    assert_eq!(
        room.message(),
        "Room is already booked for another exam during this time"
    );
    assert_eq!(
        teacher.message(),
        "Teacher \"Turing\" is already assigned to another exam during this time"
    );
    assert_eq!(
        student.message(),
        "Student(s) \"Alice, Bob\" are enrolled in both courses and have overlapping exam times"
    );
}

#[test]
fn same_room_and_class_uses_combined_phrasing() {
    let record = ClashRecord::Room {
        conflicting_exam: conflicting(1, 10),
    };

    assert_eq!(
        describe_clash(&record, &candidate(1, 10)),
        "Room \"Hall A\" and class \"CS101\" already have an exam on 2026-06-01 from 09:00 to 10:00"
    );
}

#[test]
fn same_room_only_phrasing() {
    let record = ClashRecord::Room {
        conflicting_exam: conflicting(1, 10),
    };

    assert_eq!(
        describe_clash(&record, &candidate(1, 11)),
        "Room \"Hall A\" is already booked on 2026-06-01 from 09:00 to 10:00"
    );
}

#[test]
fn same_class_only_phrasing() {
    let record = ClashRecord::Teacher {
        teacher: people(&["Turing"]).remove(0),
        conflicting_exam: conflicting(1, 10),
    };

    assert_eq!(
        describe_clash(&record, &candidate(2, 10)),
        "Class \"CS101\" already has another exam on 2026-06-01 from 09:00 to 10:00"
    );
}

#[test]
fn teacher_and_student_phrasing_for_other_classes() {
    let teacher = ClashRecord::Teacher {
        teacher: people(&["Turing"]).remove(0),
        conflicting_exam: conflicting(1, 10),
    };
    let student = ClashRecord::Student {
        students: people(&["Bob"]),
        conflicting_exam: conflicting(1, 10),
    };

    assert_eq!(
        describe_clash(&teacher, &candidate(2, 12)),
        "Teacher \"Turing\" already supervises class \"CS101\" on 2026-06-01 from 09:00 to 10:00"
    );
    assert_eq!(
        describe_clash(&student, &candidate(2, 13)),
        "Student(s) \"Bob\" already sit class \"CS101\" on 2026-06-01 from 09:00 to 10:00"
    );
}

#[test]
fn rejection_joins_details_with_semicolons() {
    let report = ClashReport::new(vec![
        ClashRecord::Room {
            conflicting_exam: conflicting(1, 10),
        },
        ClashRecord::Student {
            students: people(&["Bob"]),
            conflicting_exam: conflicting(1, 10),
        },
    ]);

    let message = rejection_message(&report, &candidate(1, 13)).unwrap();

    assert_eq!(
        message,
        "Exam scheduling conflict detected: \
         Room \"Hall A\" is already booked on 2026-06-01 from 09:00 to 10:00; \
         Room \"Hall A\" is already booked on 2026-06-01 from 09:00 to 10:00"
    );
}

#[test]
fn no_rejection_without_clashes() {
    assert_eq!(rejection_message(&ClashReport::default(), &candidate(1, 10)), None);
    assert!(!ClashReport::new(vec![]).has_clash());
}
