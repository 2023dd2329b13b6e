//! # exam-clash
//!
//! Clash detection for exam timetables.
//!
//! Two checkers share one half-open overlap rule (`start1 < end2 && start2 < end1`,
//! so back-to-back exams never clash):
//!
//! - the **authoritative detector** run before an exam is written, which
//!   reports room, teacher and shared-student conflicts against everything
//!   already scheduled that day;
//! - the **advisory timetable checker** run while a student assembles a
//!   personal selection, which only asks "are these two on the same date at
//!   overlapping times?".
//!
//! ## Modules
//!
//! - [`time`]: overlap primitive, strict `HH:MM` parsing, serde adapters
//! - [`model`]: exams, rooms, class codes, candidate exams
//! - [`store`]: repository traits and the in-memory store
//! - [`detector`]: authoritative room/teacher/student clash detection
//! - [`timetable`]: advisory checks over a student's selection
//! - [`message`]: human-readable clash descriptions
//! - [`scheduler`]: create/update/delete gated by detection, per-date locking
//! - [`error`]: Error types

pub mod detector;
pub mod error;
pub mod message;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod timetable;

pub use detector::{detect_clashes, ClashKind, ClashRecord, ClashReport, ConflictingExam};
pub use error::ClashError;
pub use message::{describe_clash, rejection_message, timetable_clash_message};
pub use model::{CandidateExam, ClassCode, DbId, ExamEntry, Room, UserRef};
pub use scheduler::{
    ExamChanges, ExamRequest, ExamScheduler, Rejection, ScheduleError, ScheduleOutcome,
};
pub use store::{
    Catalog, CourseCode, ExamDraft, ExamFilter, ExamRepository, ExamStore, InMemoryExamStore,
    StoreError,
};
pub use time::{parse_clock_time, ranges_overlap, TimeRange};
pub use timetable::{
    can_add_course, detect_course_clashes, detect_timetable_clashes, find_selection_clashes,
    personal_timetable, ClashInfo, TimetableEntry,
};
