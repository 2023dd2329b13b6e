//! Authoritative clash detection for a candidate exam.
//!
//! Scans every exam on the candidate's date and reports each overlapping exam
//! along three independent dimensions: room, teacher and shared students. One
//! conflicting exam can produce up to three records; they are not merged.
//! Adjacent exams (one ends exactly when the other starts) never clash.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{CandidateExam, DbId, ExamEntry, UserRef};
use crate::store::ExamStore;
use crate::time::clock;

/// Which shared resource two exams contend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClashKind {
    Room,
    Teacher,
    Student,
}

/// Denormalized view of the exam a candidate clashes with, enough to render
/// without another lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingExam {
    pub id: DbId,
    #[serde(default)]
    pub title: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    pub room_id: DbId,
    pub room_name: String,
    pub class_code_id: DbId,
    pub class_code: String,
}

impl From<&ExamEntry> for ConflictingExam {
    fn from(exam: &ExamEntry) -> Self {
        Self {
            id: exam.id,
            title: exam.title.clone(),
            date: exam.date,
            start_time: exam.start_time,
            end_time: exam.end_time,
            room_id: exam.room.id,
            room_name: exam.room.name.clone(),
            class_code_id: exam.class_code.id,
            class_code: exam.class_code.code.clone(),
        }
    }
}

/// One detected conflict between the candidate and an existing exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClashRecord {
    /// The room is already booked.
    Room { conflicting_exam: ConflictingExam },
    /// Both class codes are taught by `teacher`.
    Teacher {
        teacher: UserRef,
        conflicting_exam: ConflictingExam,
    },
    /// `students` are enrolled in both class codes.
    Student {
        students: Vec<UserRef>,
        conflicting_exam: ConflictingExam,
    },
}

impl ClashRecord {
    pub fn kind(&self) -> ClashKind {
        match self {
            ClashRecord::Room { .. } => ClashKind::Room,
            ClashRecord::Teacher { .. } => ClashKind::Teacher,
            ClashRecord::Student { .. } => ClashKind::Student,
        }
    }

    pub fn conflicting_exam(&self) -> &ConflictingExam {
        match self {
            ClashRecord::Room { conflicting_exam }
            | ClashRecord::Teacher {
                conflicting_exam, ..
            }
            | ClashRecord::Student {
                conflicting_exam, ..
            } => conflicting_exam,
        }
    }
}

/// Result of one detection call. `has_clash` is true iff `clashes` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClashReport {
    has_clash: bool,
    clashes: Vec<ClashRecord>,
}

impl ClashReport {
    pub fn new(clashes: Vec<ClashRecord>) -> Self {
        Self {
            has_clash: !clashes.is_empty(),
            clashes,
        }
    }

    pub fn has_clash(&self) -> bool {
        self.has_clash
    }

    pub fn clashes(&self) -> &[ClashRecord] {
        &self.clashes
    }

    pub fn into_clashes(self) -> Vec<ClashRecord> {
        self.clashes
    }

    /// Records of one kind, in report order.
    pub fn of_kind(&self, kind: ClashKind) -> impl Iterator<Item = &ClashRecord> {
        self.clashes.iter().filter(move |c| c.kind() == kind)
    }
}

/// Detect every clash between `candidate` and the exams already stored.
///
/// Only exams on the candidate's date are read, minus
/// `candidate.exclude_exam_id`. For each one whose time range overlaps the
/// candidate's, up to three records are emitted in this order:
///
/// - **room** when the rooms match;
/// - **teacher** when both class codes have a teacher and it is the same one;
/// - **student** when the enrolments intersect (all shared students in one record).
///
/// If the candidate's class code does not exist the report is empty, room
/// conflicts included.
///
/// # Errors
/// Storage errors are returned unchanged.
pub fn detect_clashes<S>(store: &S, candidate: &CandidateExam) -> Result<ClashReport, S::Error>
where
    S: ExamStore + ?Sized,
{
    let same_day = store.exams_on_date(candidate.date, candidate.exclude_exam_id)?;

    let Some(class_code) = store.class_code(candidate.class_code_id)? else {
        warn!(
            class_code_id = candidate.class_code_id,
            date = %candidate.date,
            "candidate references an unknown class code; skipping clash detection"
        );
        return Ok(ClashReport::default());
    };

    let range = candidate.time_range();
    let mut clashes = Vec::new();

    for existing in &same_day {
        if !range.overlaps(&existing.time_range()) {
            continue;
        }

        if existing.room.id == candidate.room_id {
            clashes.push(ClashRecord::Room {
                conflicting_exam: ConflictingExam::from(existing),
            });
        }

        if let (Some(teacher), Some(other)) = (&class_code.teacher, existing.class_code.teacher_id())
        {
            if teacher.id == other {
                clashes.push(ClashRecord::Teacher {
                    teacher: teacher.clone(),
                    conflicting_exam: ConflictingExam::from(existing),
                });
            }
        }

        let shared = class_code.shared_students(&existing.class_code);
        if !shared.is_empty() {
            clashes.push(ClashRecord::Student {
                students: shared,
                conflicting_exam: ConflictingExam::from(existing),
            });
        }
    }

    debug!(
        date = %candidate.date,
        room_id = candidate.room_id,
        class_code_id = candidate.class_code_id,
        scanned = same_day.len(),
        clashes = clashes.len(),
        "clash detection finished"
    );

    Ok(ClashReport::new(clashes))
}
