//! One-line, human-readable descriptions of clashes.

use crate::detector::{ClashRecord, ClashReport};
use crate::model::{CandidateExam, UserRef};
use crate::time::format_clock_time;
use crate::timetable::ClashInfo;

const REJECTION_PREFIX: &str = "Exam scheduling conflict detected: ";
const UNKNOWN_COURSE: &str = "Unknown Course";

fn join_names(users: &[UserRef]) -> String {
    users
        .iter()
        .map(|u| u.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ClashRecord {
    /// Short description of the contended resource.
    pub fn message(&self) -> String {
        match self {
            ClashRecord::Room { .. } => {
                "Room is already booked for another exam during this time".to_string()
            }
            ClashRecord::Teacher { teacher, .. } => format!(
                "Teacher \"{}\" is already assigned to another exam during this time",
                teacher.name
            ),
            ClashRecord::Student { students, .. } => format!(
                "Student(s) \"{}\" are enrolled in both courses and have overlapping exam times",
                join_names(students)
            ),
        }
    }
}

/// Describe one record relative to the candidate it was detected for.
///
/// Room and class code both matching takes precedence, then room, then class
/// code; anything left is phrased after the teacher or students involved.
pub fn describe_clash(record: &ClashRecord, candidate: &CandidateExam) -> String {
    let exam = record.conflicting_exam();
    let when = format!(
        "on {} from {} to {}",
        exam.date,
        format_clock_time(exam.start_time),
        format_clock_time(exam.end_time)
    );
    let same_room = exam.room_id == candidate.room_id;
    let same_class = exam.class_code_id == candidate.class_code_id;

    match record {
        _ if same_room && same_class => format!(
            "Room \"{}\" and class \"{}\" already have an exam {when}",
            exam.room_name, exam.class_code
        ),
        _ if same_room => format!("Room \"{}\" is already booked {when}", exam.room_name),
        _ if same_class => format!(
            "Class \"{}\" already has another exam {when}",
            exam.class_code
        ),
        ClashRecord::Teacher { teacher, .. } => format!(
            "Teacher \"{}\" already supervises class \"{}\" {when}",
            teacher.name, exam.class_code
        ),
        ClashRecord::Student { students, .. } => format!(
            "Student(s) \"{}\" already sit class \"{}\" {when}",
            join_names(students),
            exam.class_code
        ),
        ClashRecord::Room { .. } => format!("Exam conflict {when}"),
    }
}

/// The combined rejection message for a report, or `None` if nothing clashes.
pub fn rejection_message(report: &ClashReport, candidate: &CandidateExam) -> Option<String> {
    if !report.has_clash() {
        return None;
    }
    let details: Vec<String> = report
        .clashes()
        .iter()
        .map(|c| describe_clash(c, candidate))
        .collect();
    Some(format!("{REJECTION_PREFIX}{}", details.join("; ")))
}

/// `"<new> (<start>-<end>) overlaps with <other> (<start>-<end>) on <date>."`
pub fn timetable_clash_message(clash: &ClashInfo) -> String {
    let new_course = clash
        .new_entry
        .course_code
        .as_deref()
        .unwrap_or(UNKNOWN_COURSE);
    let other_course = clash
        .conflicting_entry
        .course_code
        .as_deref()
        .unwrap_or(UNKNOWN_COURSE);
    let t = &clash.time_overlap;
    format!(
        "{new_course} ({}-{}) overlaps with {other_course} ({}-{}) on {}.",
        format_clock_time(t.new_start),
        format_clock_time(t.new_end),
        format_clock_time(t.conflicting_start),
        format_clock_time(t.conflicting_end),
        clash.date
    )
}
