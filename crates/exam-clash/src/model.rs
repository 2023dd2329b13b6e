//! Exam, room and class-code records as the clash engine sees them.
//!
//! Associations are explicit: a [`ClassCode`] carries its teacher and its
//! enrolled students, and an [`ExamEntry`] carries its room and class code.
//! Whoever loads these (see [`crate::store`]) joins them eagerly.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::time::{clock, TimeRange};

/// Database identifier shared by every record type.
pub type DbId = i64;

/// A teacher or student, reduced to what clash messages need.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: DbId,
    pub name: String,
    pub capacity: u32,
}

/// A course offering: course code plus its teacher and enrolment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCode {
    pub id: DbId,
    pub code: String,
    #[serde(default)]
    pub teacher: Option<UserRef>,
    #[serde(default)]
    pub students: Vec<UserRef>,
}

impl ClassCode {
    pub fn teacher_id(&self) -> Option<DbId> {
        self.teacher.as_ref().map(|t| t.id)
    }

    pub fn student_ids(&self) -> BTreeSet<DbId> {
        self.students.iter().map(|s| s.id).collect()
    }

    /// Students of `self` also enrolled in `other`, in `self`'s enrolment order.
    pub fn shared_students(&self, other: &ClassCode) -> Vec<UserRef> {
        let theirs = other.student_ids();
        self.students
            .iter()
            .filter(|s| theirs.contains(&s.id))
            .cloned()
            .collect()
    }
}

/// A scheduled exam joined with its room and class code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamEntry {
    pub id: DbId,
    #[serde(default)]
    pub title: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    pub room: Room,
    pub class_code: ClassCode,
    #[serde(default)]
    pub user_id: Option<DbId>,
}

impl ExamEntry {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    /// Weekday name of the exam date, e.g. `"Monday"`.
    pub fn day(&self) -> &'static str {
        weekday_name(self.date.weekday())
    }
}

/// The exam being proposed for creation or update, not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateExam {
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    pub room_id: DbId,
    pub class_code_id: DbId,
    /// The exam being edited, so it never clashes with itself.
    #[serde(default)]
    pub exclude_exam_id: Option<DbId>,
}

impl CandidateExam {
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
