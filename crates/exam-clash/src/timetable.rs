//! Advisory overlap checks for a student's personal exam selection.
//!
//! Unlike [`crate::detector`], nothing here touches storage and there is no
//! room, teacher or student dimension: two entries clash when they fall on the
//! same date and their times overlap, because a student cannot sit both.

use std::collections::{BTreeSet, HashSet};

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::model::{weekday_name, DbId, ExamEntry};
use crate::time::{clock, TimeRange};

/// An exam as held in a student's in-progress selection.
///
/// Date and times are optional because selections can carry rows with
/// missing data; such rows never clash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub id: DbId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "clock::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
}

impl TimetableEntry {
    /// Date and time range, if all three are present.
    pub fn slot(&self) -> Option<(NaiveDate, TimeRange)> {
        Some((
            self.date?,
            TimeRange::new(self.start_time?, self.end_time?),
        ))
    }

    pub fn day(&self) -> Option<&'static str> {
        self.date.map(|d| weekday_name(d.weekday()))
    }
}

impl From<&ExamEntry> for TimetableEntry {
    fn from(exam: &ExamEntry) -> Self {
        Self {
            id: exam.id,
            title: exam.title.clone(),
            date: Some(exam.date),
            start_time: Some(exam.start_time),
            end_time: Some(exam.end_time),
            course_code: Some(exam.class_code.code.clone()),
            room_name: Some(exam.room.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOverlap {
    #[serde(with = "clock")]
    pub new_start: NaiveTime,
    #[serde(with = "clock")]
    pub new_end: NaiveTime,
    #[serde(with = "clock")]
    pub conflicting_start: NaiveTime,
    #[serde(with = "clock")]
    pub conflicting_end: NaiveTime,
    /// Minutes the two entries share.
    #[serde(default)]
    pub minutes: i64,
}

/// A same-date overlap between the entry being added and one already selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClashInfo {
    pub new_entry: TimetableEntry,
    pub conflicting_entry: TimetableEntry,
    pub date: NaiveDate,
    pub time_overlap: TimeOverlap,
}

impl ClashInfo {
    /// The entry ids as an unordered pair, smallest first.
    pub fn pair_key(&self) -> (DbId, DbId) {
        let (a, b) = (self.new_entry.id, self.conflicting_entry.id);
        (a.min(b), a.max(b))
    }
}

/// Every entry in `selection` that clashes with `candidate`.
///
/// Returns an empty list if the candidate has no date or times. Selected
/// entries missing any of those are skipped. All clashes are reported, not
/// just the first.
pub fn detect_timetable_clashes(
    candidate: &TimetableEntry,
    selection: &[TimetableEntry],
) -> Vec<ClashInfo> {
    let Some((date, range)) = candidate.slot() else {
        return Vec::new();
    };

    selection
        .iter()
        .filter_map(|existing| {
            let (other_date, other_range) = existing.slot()?;
            if other_date != date || !range.overlaps(&other_range) {
                return None;
            }
            Some(ClashInfo {
                new_entry: candidate.clone(),
                conflicting_entry: existing.clone(),
                date,
                time_overlap: TimeOverlap {
                    new_start: range.start,
                    new_end: range.end,
                    conflicting_start: other_range.start,
                    conflicting_end: other_range.end,
                    minutes: range.overlap_minutes(&other_range),
                },
            })
        })
        .collect()
}

/// Check every catalog session of `course_code` against the selection.
///
/// A course is all-or-nothing: any clash here means the whole course should
/// be refused (see [`can_add_course`]).
pub fn detect_course_clashes(
    course_code: &str,
    selection: &[TimetableEntry],
    catalog: &[TimetableEntry],
) -> Vec<ClashInfo> {
    catalog
        .iter()
        .filter(|entry| entry.course_code.as_deref() == Some(course_code))
        .flat_map(|entry| detect_timetable_clashes(entry, selection))
        .collect()
}

pub fn can_add_course(
    course_code: &str,
    selection: &[TimetableEntry],
    catalog: &[TimetableEntry],
) -> bool {
    detect_course_clashes(course_code, selection, catalog).is_empty()
}

/// Clashes already present inside a saved selection, each pair once.
pub fn find_selection_clashes(selection: &[TimetableEntry]) -> Vec<ClashInfo> {
    selection
        .iter()
        .enumerate()
        .flat_map(|(i, entry)| detect_timetable_clashes(entry, &selection[i + 1..]))
        .collect()
}

/// Collapse clashes describing the same unordered pair, keeping the first.
pub fn dedup_clash_pairs(clashes: &[ClashInfo]) -> Vec<ClashInfo> {
    let mut seen = HashSet::new();
    clashes
        .iter()
        .filter(|c| seen.insert(c.pair_key()))
        .cloned()
        .collect()
}

/// Ids of every entry involved in at least one clash.
pub fn conflicting_entry_ids(clashes: &[ClashInfo]) -> BTreeSet<DbId> {
    clashes
        .iter()
        .flat_map(|c| [c.new_entry.id, c.conflicting_entry.id])
        .collect()
}

/// A student's timetable: catalog exams for the chosen courses, sorted by
/// date then start time.
pub fn personal_timetable<S: AsRef<str>>(
    course_codes: &[S],
    catalog: &[ExamEntry],
) -> Vec<TimetableEntry> {
    let wanted: HashSet<&str> = course_codes.iter().map(AsRef::as_ref).collect();
    let mut exams: Vec<&ExamEntry> = catalog
        .iter()
        .filter(|exam| wanted.contains(exam.class_code.code.as_str()))
        .collect();
    exams.sort_by_key(|e| (e.date, e.start_time, e.id));
    exams.into_iter().map(TimetableEntry::from).collect()
}
