//! Create, update and delete exams, gated by clash detection.
//!
//! Every write that can introduce a clash runs detect-then-write while holding
//! an in-process lock for the exam's date. All three clash dimensions are
//! intra-day, so two requests for the same date are serialized and can no
//! longer both pass detection before either commits. Requests for different
//! dates proceed in parallel.
//!
//! The lock only covers callers sharing one [`ExamScheduler`]; deployments
//! running several processes against one database need a storage-level
//! guarantee instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::detector::{detect_clashes, ClashRecord};
use crate::error::ClashError;
use crate::message::rejection_message;
use crate::model::{CandidateExam, DbId, ExamEntry};
use crate::store::{ExamDraft, ExamRepository};
use crate::time::{clock, TimeRange};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ClashError),

    #[error("Exam not found: {0}")]
    NotFound(DbId),

    #[error("Missing {0}: give an id or a name")]
    MissingField(&'static str),

    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ScheduleError {
    fn storage<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        ScheduleError::Storage(Box::new(err))
    }
}

/// Why a create or update was refused. Nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub message: String,
    pub clashes: Vec<ClashRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScheduleOutcome {
    Scheduled { exam: ExamEntry },
    Rejected(Rejection),
}

impl ScheduleOutcome {
    pub fn exam(&self) -> Option<&ExamEntry> {
        match self {
            ScheduleOutcome::Scheduled { exam } => Some(exam),
            ScheduleOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ScheduleOutcome::Scheduled { .. } => None,
            ScheduleOutcome::Rejected(r) => Some(r),
        }
    }
}

/// An exam to create, naming its room and class code by id or by name.
///
/// An id wins over a name. Names are trimmed and resolved before detection,
/// creating the room or class code if it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub room_id: Option<DbId>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub class_code_id: Option<DbId>,
    #[serde(default)]
    pub class_code: Option<String>,
    #[serde(default)]
    pub user_id: Option<DbId>,
}

impl From<ExamDraft> for ExamRequest {
    fn from(draft: ExamDraft) -> Self {
        Self {
            title: draft.title,
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            room_id: Some(draft.room_id),
            room_name: None,
            class_code_id: Some(draft.class_code_id),
            class_code: None,
            user_id: draft.user_id,
        }
    }
}

/// Partial update of an exam. `None` leaves the stored value unchanged.
///
/// `room_name` and `class_code` override the matching id and are resolved
/// the same way as in [`ExamRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default, with = "clock::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "clock::option")]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub room_id: Option<DbId>,
    #[serde(default)]
    pub class_code_id: Option<DbId>,
    #[serde(default)]
    pub class_code: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<DbId>,
}

impl ExamChanges {
    /// Whether these changes can create or remove a clash.
    pub fn affects_schedule(&self) -> bool {
        self.date.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
            || self.room_id.is_some()
            || self.room_name.is_some()
            || self.class_code_id.is_some()
            || self.class_code.is_some()
    }

    fn apply(&self, exam: &ExamEntry) -> ExamDraft {
        let mut draft = ExamDraft::from(exam);
        if let Some(title) = &self.title {
            draft.title = Some(title.clone());
        }
        draft.date = self.date.unwrap_or(draft.date);
        draft.start_time = self.start_time.unwrap_or(draft.start_time);
        draft.end_time = self.end_time.unwrap_or(draft.end_time);
        draft.room_id = self.room_id.unwrap_or(draft.room_id);
        draft.class_code_id = self.class_code_id.unwrap_or(draft.class_code_id);
        draft.user_id = self.user_id.or(draft.user_id);
        draft
    }
}

/// One mutex per exam date, created on first use and dropped once no caller
/// holds or waits on it.
#[derive(Debug, Default)]
pub struct DateLocks {
    slots: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl DateLocks {
    /// Run `f` while holding the lock for `date`.
    pub fn with<T>(&self, date: NaiveDate, f: impl FnOnce() -> T) -> T {
        let slot = self.slot(date);
        let result = {
            // The guarded data is `()`, so a poisoned lock carries no broken state.
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(date, slot);
        result
    }

    /// Number of dates with a live slot.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<NaiveDate, Arc<Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        Arc::clone(self.table().entry(date).or_default())
    }

    /// Clones are only made under the table lock, so a count of one here
    /// means nobody else can be holding or waiting on the slot.
    fn release(&self, date: NaiveDate, slot: Arc<Mutex<()>>) {
        let mut slots = self.table();
        drop(slot);
        if slots.get(&date).is_some_and(|s| Arc::strong_count(s) == 1) {
            slots.remove(&date);
        }
    }
}

fn candidate_for(draft: &ExamDraft, exclude_exam_id: Option<DbId>) -> CandidateExam {
    CandidateExam {
        date: draft.date,
        start_time: draft.start_time,
        end_time: draft.end_time,
        room_id: draft.room_id,
        class_code_id: draft.class_code_id,
        exclude_exam_id,
    }
}

fn validate(draft: &ExamDraft) -> Result<(), ScheduleError> {
    TimeRange::try_new(draft.start_time, draft.end_time)?;
    Ok(())
}

/// Exam write workflow over an [`ExamRepository`].
#[derive(Debug)]
pub struct ExamScheduler<R> {
    repo: R,
    locks: DateLocks,
}

impl<R: ExamRepository> ExamScheduler<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            locks: DateLocks::default(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn into_repository(self) -> R {
        self.repo
    }

    /// Run detection for `candidate`; `Some` if the write must be refused.
    fn check(&self, candidate: &CandidateExam) -> Result<Option<Rejection>, ScheduleError> {
        let report = detect_clashes(&self.repo, candidate).map_err(ScheduleError::storage)?;
        Ok(rejection_message(&report, candidate).map(|message| Rejection {
            message,
            clashes: report.into_clashes(),
        }))
    }

    /// Create an exam unless it clashes with one already scheduled.
    ///
    /// # Errors
    /// `ScheduleError::Validation` if start is not before end,
    /// `ScheduleError::Storage` if the repository fails.
    #[instrument(skip_all, fields(date = %draft.date, room_id = draft.room_id, class_code_id = draft.class_code_id))]
    pub fn create_exam(&self, draft: ExamDraft) -> Result<ScheduleOutcome, ScheduleError> {
        validate(&draft)?;

        self.locks.with(draft.date, || -> Result<_, ScheduleError> {
            if let Some(rejection) = self.check(&candidate_for(&draft, None))? {
                info!(clashes = rejection.clashes.len(), "exam creation rejected");
                return Ok(ScheduleOutcome::Rejected(rejection));
            }

            let exam = self
                .repo
                .insert_exam(draft)
                .map_err(ScheduleError::storage)?;
            info!(exam_id = exam.id, "exam created");
            Ok(ScheduleOutcome::Scheduled { exam })
        })
    }

    /// Create an exam from a request that may name its room and class code.
    ///
    /// Missing rooms and class codes are created before detection runs, so
    /// they stay even if the exam itself is rejected.
    ///
    /// # Errors
    /// `ScheduleError::MissingField` when neither an id nor a non-blank name
    /// is given, plus the errors of [`ExamScheduler::create_exam`].
    #[instrument(skip_all, fields(date = %request.date))]
    pub fn create_from_request(
        &self,
        request: ExamRequest,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        TimeRange::try_new(request.start_time, request.end_time)?;

        let room_id = self.resolve(
            request.room_id,
            request.room_name.as_deref(),
            "room",
            R::find_or_create_room,
        )?;
        let class_code_id = self.resolve(
            request.class_code_id,
            request.class_code.as_deref(),
            "class code",
            R::find_or_create_class_code,
        )?;

        self.create_exam(ExamDraft {
            title: request.title,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            room_id,
            class_code_id,
            user_id: request.user_id,
        })
    }

    /// Apply `changes` to exam `id`.
    ///
    /// Detection runs, excluding the exam itself, only when the changes touch
    /// date, time, room or class code.
    ///
    /// # Errors
    /// `ScheduleError::NotFound` for an unknown id, plus the errors of
    /// [`ExamScheduler::create_exam`].
    #[instrument(skip(self, changes))]
    pub fn update_exam(
        &self,
        id: DbId,
        changes: ExamChanges,
    ) -> Result<ScheduleOutcome, ScheduleError> {
        let changes = self.resolve_changes(changes)?;
        loop {
            let existing = self.fetch(id)?;
            let date = changes.apply(&existing).date;
            if let Some(outcome) = self.locks.with(date, || self.update_on(id, &changes, date))? {
                return Ok(outcome);
            }
        }
    }

    /// The update step run under the lock for `date`. `None` means the exam
    /// no longer lands on `date` and the caller must retry.
    fn update_on(
        &self,
        id: DbId,
        changes: &ExamChanges,
        date: NaiveDate,
    ) -> Result<Option<ScheduleOutcome>, ScheduleError> {
        // Re-read under the lock; a concurrent edit may have moved the exam.
        let current = self.fetch(id)?;
        let draft = changes.apply(&current);
        if draft.date != date {
            debug!(exam_id = id, "exam moved while waiting for its date lock");
            return Ok(None);
        }
        validate(&draft)?;

        if changes.affects_schedule() {
            if let Some(rejection) = self.check(&candidate_for(&draft, Some(id)))? {
                info!(clashes = rejection.clashes.len(), "exam update rejected");
                return Ok(Some(ScheduleOutcome::Rejected(rejection)));
            }
        }

        let exam = self
            .repo
            .update_exam(id, draft)
            .map_err(ScheduleError::storage)?
            .ok_or(ScheduleError::NotFound(id))?;
        info!("exam updated");
        Ok(Some(ScheduleOutcome::Scheduled { exam }))
    }

    /// # Errors
    /// `ScheduleError::NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub fn delete_exam(&self, id: DbId) -> Result<(), ScheduleError> {
        if !self.repo.delete_exam(id).map_err(ScheduleError::storage)? {
            return Err(ScheduleError::NotFound(id));
        }
        info!("exam deleted");
        Ok(())
    }

    /// Returns how many exams were removed.
    #[instrument(skip(self))]
    pub fn delete_all_exams(&self) -> Result<usize, ScheduleError> {
        let removed = self
            .repo
            .delete_all_exams()
            .map_err(ScheduleError::storage)?;
        info!(removed, "all exams deleted");
        Ok(removed)
    }

    fn resolve(
        &self,
        id: Option<DbId>,
        name: Option<&str>,
        what: &'static str,
        find_or_create: impl Fn(&R, &str) -> Result<DbId, R::Error>,
    ) -> Result<DbId, ScheduleError> {
        match (id, name.map(str::trim).filter(|n| !n.is_empty())) {
            (Some(id), _) => Ok(id),
            (None, Some(name)) => find_or_create(&self.repo, name).map_err(ScheduleError::storage),
            (None, None) => Err(ScheduleError::MissingField(what)),
        }
    }

    /// Turn room and class-code names into ids.
    fn resolve_changes(&self, mut changes: ExamChanges) -> Result<ExamChanges, ScheduleError> {
        if let Some(name) = changes.room_name.take() {
            changes.room_id =
                Some(self.resolve(None, Some(&name), "room", R::find_or_create_room)?);
        }
        if let Some(code) = changes.class_code.take() {
            changes.class_code_id = Some(self.resolve(
                None,
                Some(&code),
                "class code",
                R::find_or_create_class_code,
            )?);
        }
        Ok(changes)
    }

    fn fetch(&self, id: DbId) -> Result<ExamEntry, ScheduleError> {
        self.repo
            .exam(id)
            .map_err(ScheduleError::storage)?
            .ok_or(ScheduleError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::store::InMemoryExamStore;

    const CATALOG: &str = r#"{
      "rooms": [{"id": 1, "name": "Hall A", "capacity": 120}],
      "class_codes": [{"id": 10, "code": "CS101"}]
    }"#;

    fn scheduler() -> ExamScheduler<InMemoryExamStore> {
        ExamScheduler::new(InMemoryExamStore::from_json(CATALOG).unwrap())
    }

    fn draft(date: &str) -> ExamDraft {
        ExamDraft {
            title: None,
            date: date.parse().unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            room_id: 1,
            class_code_id: 10,
            user_id: None,
        }
    }

    #[test]
    fn date_slots_are_dropped_after_use() {
        let scheduler = scheduler();

        scheduler.create_exam(draft("2026-06-01")).unwrap();
        scheduler.create_exam(draft("2026-06-02")).unwrap();
        scheduler.create_exam(draft("2026-06-02")).unwrap();

        assert!(scheduler.locks.is_empty());
    }

    #[test]
    fn slot_survives_while_another_caller_holds_it() {
        let locks = DateLocks::default();
        let date: NaiveDate = "2026-06-01".parse().unwrap();
        let held = locks.slot(date);

        locks.with(date, || ());
        assert_eq!(locks.len(), 1);

        locks.release(date, held);
        assert!(locks.is_empty());
    }

    #[test]
    fn update_follows_exam_moved_while_waiting() {
        let scheduler = scheduler();
        let first: NaiveDate = "2026-06-01".parse().unwrap();
        let second: NaiveDate = "2026-06-02".parse().unwrap();
        let id = scheduler
            .create_exam(draft("2026-06-01"))
            .unwrap()
            .exam()
            .unwrap()
            .id;

        let held = scheduler.locks.slot(first);
        let guard = held.lock().unwrap();

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                scheduler.update_exam(
                    id,
                    ExamChanges {
                        title: Some("Moved".to_string()),
                        ..ExamChanges::default()
                    },
                )
            });

            // Table, `held` and the waiter's clone: the update is now blocked.
            while Arc::strong_count(&held) < 3 {
                thread::yield_now();
            }

            let mut moved = ExamDraft::from(&scheduler.repo.exam(id).unwrap().unwrap());
            moved.date = second;
            scheduler.repo.update_exam(id, moved).unwrap();
            drop(guard);

            let outcome = waiter.join().unwrap().unwrap();
            let exam = outcome.exam().unwrap();
            assert_eq!(exam.date, second);
            assert_eq!(exam.title.as_deref(), Some("Moved"));
        });
    }
}
