//! Storage seam for the clash engine.
//!
//! The detector only needs two reads ([`ExamStore`]); the scheduling workflow
//! also writes ([`ExamRepository`]). [`InMemoryExamStore`] implements both over
//! a normalized [`Catalog`] and joins associations on every read, the same
//! way a relational backend would.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::model::{ClassCode, DbId, ExamEntry, Room, UserRef};
use crate::time::clock;

/// Capacity given to rooms created on the fly from a bare name.
pub const DEFAULT_ROOM_CAPACITY: u32 = 50;

/// The reads the authoritative detector performs.
pub trait ExamStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every exam on `date`, joined with room and class code (teacher and
    /// students included), minus the exam `exclude` if given. Order is not
    /// significant.
    fn exams_on_date(
        &self,
        date: NaiveDate,
        exclude: Option<DbId>,
    ) -> Result<Vec<ExamEntry>, Self::Error>;

    /// The class code with its teacher and students, or `None` if unknown.
    fn class_code(&self, id: DbId) -> Result<Option<ClassCode>, Self::Error>;
}

/// Exam fields as written by the scheduling workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamDraft {
    #[serde(default)]
    pub title: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "clock")]
    pub start_time: NaiveTime,
    #[serde(with = "clock")]
    pub end_time: NaiveTime,
    pub room_id: DbId,
    pub class_code_id: DbId,
    #[serde(default)]
    pub user_id: Option<DbId>,
}

impl From<&ExamEntry> for ExamDraft {
    fn from(exam: &ExamEntry) -> Self {
        Self {
            title: exam.title.clone(),
            date: exam.date,
            start_time: exam.start_time,
            end_time: exam.end_time,
            room_id: exam.room.id,
            class_code_id: exam.class_code.id,
            user_id: exam.user_id,
        }
    }
}

/// Full read/write access used by [`crate::scheduler::ExamScheduler`].
pub trait ExamRepository: ExamStore {
    fn exam(&self, id: DbId) -> Result<Option<ExamEntry>, Self::Error>;

    fn insert_exam(&self, draft: ExamDraft) -> Result<ExamEntry, Self::Error>;

    /// Overwrite exam `id`. Returns `None` if it does not exist.
    fn update_exam(&self, id: DbId, draft: ExamDraft) -> Result<Option<ExamEntry>, Self::Error>;

    /// Returns whether an exam was removed.
    fn delete_exam(&self, id: DbId) -> Result<bool, Self::Error>;

    /// Returns the number of exams removed.
    fn delete_all_exams(&self) -> Result<usize, Self::Error>;

    /// Id of the room called `name` (trimmed), creating it with
    /// [`DEFAULT_ROOM_CAPACITY`] if there is none.
    fn find_or_create_room(&self, name: &str) -> Result<DbId, Self::Error>;

    /// Id of the class code `code` (trimmed), creating it with no teacher or
    /// students if there is none.
    fn find_or_create_class_code(&self, code: &str) -> Result<DbId, Self::Error>;
}

/// Criteria for [`InMemoryExamStore::list_exams`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamFilter {
    /// Case-insensitive substring of the class code or title.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub room_id: Option<DbId>,
}

impl ExamFilter {
    fn matches(&self, exam: &ExamEntry) -> bool {
        if self.date.is_some_and(|date| exam.date != date) {
            return false;
        }
        if self.room_id.is_some_and(|id| exam.room.id != id) {
            return false;
        }
        match self.search.as_deref().map(str::to_lowercase) {
            None => true,
            Some(needle) => {
                exam.class_code.code.to_lowercase().contains(&needle)
                    || exam
                        .title
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(&needle))
            }
        }
    }
}

/// A class code without its people, as listed for course pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseCode {
    pub id: DbId,
    pub code: String,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown room: {0}")]
    UnknownRoom(DbId),

    #[error("Unknown class code: {0}")]
    UnknownClassCode(DbId),

    #[error("Unknown user: {0}")]
    UnknownUser(DbId),

    #[error("Duplicate {entity} id: {id}")]
    DuplicateId { entity: &'static str, id: DbId },

    #[error("No {entity} ids left")]
    IdSpaceExhausted { entity: &'static str },

    #[error("{entity} name is required")]
    MissingName { entity: &'static str },

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Catalog: the normalized, serializable form of the store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCodeRecord {
    pub id: DbId,
    pub code: String,
    #[serde(default)]
    pub teacher_id: Option<DbId>,
    #[serde(default)]
    pub student_ids: Vec<DbId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub id: DbId,
    #[serde(flatten)]
    pub draft: ExamDraft,
}

/// A snapshot of rooms, users, class codes and exams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub users: Vec<UserRef>,
    #[serde(default)]
    pub class_codes: Vec<ClassCodeRecord>,
    #[serde(default)]
    pub exams: Vec<ExamRecord>,
}

#[derive(Debug, Default)]
struct Tables {
    rooms: BTreeMap<DbId, Room>,
    users: BTreeMap<DbId, UserRef>,
    class_codes: BTreeMap<DbId, ClassCodeRecord>,
    exams: BTreeMap<DbId, ExamDraft>,
    last_exam_id: DbId,
}

impl Tables {
    fn user(&self, id: DbId) -> Result<UserRef, StoreError> {
        self.users.get(&id).cloned().ok_or(StoreError::UnknownUser(id))
    }

    fn join_class_code(&self, record: &ClassCodeRecord) -> Result<ClassCode, StoreError> {
        let teacher = record.teacher_id.map(|id| self.user(id)).transpose()?;
        let students = record
            .student_ids
            .iter()
            .map(|&id| self.user(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClassCode {
            id: record.id,
            code: record.code.clone(),
            teacher,
            students,
        })
    }

    fn join_exam(&self, id: DbId, draft: &ExamDraft) -> Result<ExamEntry, StoreError> {
        let room = self
            .rooms
            .get(&draft.room_id)
            .cloned()
            .ok_or(StoreError::UnknownRoom(draft.room_id))?;
        let class_code = self
            .class_codes
            .get(&draft.class_code_id)
            .ok_or(StoreError::UnknownClassCode(draft.class_code_id))
            .and_then(|record| self.join_class_code(record))?;
        Ok(ExamEntry {
            id,
            title: draft.title.clone(),
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            room,
            class_code,
            user_id: draft.user_id,
        })
    }

    fn next_exam_id(&self) -> Result<DbId, StoreError> {
        self.last_exam_id
            .checked_add(1)
            .ok_or(StoreError::IdSpaceExhausted { entity: "exam" })
    }

    fn check_references(&self, draft: &ExamDraft) -> Result<(), StoreError> {
        if !self.rooms.contains_key(&draft.room_id) {
            return Err(StoreError::UnknownRoom(draft.room_id));
        }
        if !self.class_codes.contains_key(&draft.class_code_id) {
            return Err(StoreError::UnknownClassCode(draft.class_code_id));
        }
        Ok(())
    }
}

/// Thread-safe in-process store.
#[derive(Debug, Default)]
pub struct InMemoryExamStore {
    tables: RwLock<Tables>,
}

impl InMemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog, rejecting duplicate ids and dangling references.
    pub fn from_catalog(catalog: Catalog) -> Result<Self, StoreError> {
        let store = Self::new();
        for room in catalog.rooms {
            store.add_room(room)?;
        }
        for user in catalog.users {
            store.add_user(user)?;
        }
        for class_code in catalog.class_codes {
            store.add_class_code(class_code)?;
        }
        {
            let mut tables = store.write()?;
            for exam in catalog.exams {
                tables.check_references(&exam.draft)?;
                if tables.exams.contains_key(&exam.id) {
                    return Err(StoreError::DuplicateId {
                        entity: "exam",
                        id: exam.id,
                    });
                }
                tables.last_exam_id = tables.last_exam_id.max(exam.id);
                tables.exams.insert(exam.id, exam.draft);
            }
        }
        Ok(store)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Self::from_catalog(serde_json::from_str(json)?)
    }

    pub fn to_catalog(&self) -> Result<Catalog, StoreError> {
        let tables = self.read()?;
        Ok(Catalog {
            rooms: tables.rooms.values().cloned().collect(),
            users: tables.users.values().cloned().collect(),
            class_codes: tables.class_codes.values().cloned().collect(),
            exams: tables
                .exams
                .iter()
                .map(|(&id, draft)| ExamRecord {
                    id,
                    draft: draft.clone(),
                })
                .collect(),
        })
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.to_catalog()?)?)
    }

    pub fn add_room(&self, room: Room) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.rooms.contains_key(&room.id) {
            return Err(StoreError::DuplicateId {
                entity: "room",
                id: room.id,
            });
        }
        tables.rooms.insert(room.id, room);
        Ok(())
    }

    pub fn add_user(&self, user: UserRef) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateId {
                entity: "user",
                id: user.id,
            });
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    /// Add a class code. Its teacher and students must already exist.
    pub fn add_class_code(&self, record: ClassCodeRecord) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.class_codes.contains_key(&record.id) {
            return Err(StoreError::DuplicateId {
                entity: "class code",
                id: record.id,
            });
        }
        for id in record.teacher_id.iter().chain(&record.student_ids) {
            tables.user(*id)?;
        }
        tables.class_codes.insert(record.id, record);
        Ok(())
    }

    /// Every exam, sorted by date then start time.
    pub fn all_exams(&self) -> Result<Vec<ExamEntry>, StoreError> {
        let tables = self.read()?;
        let mut exams = tables
            .exams
            .iter()
            .map(|(&id, draft)| tables.join_exam(id, draft))
            .collect::<Result<Vec<_>, _>>()?;
        exams.sort_by_key(|e| (e.date, e.start_time, e.id));
        Ok(exams)
    }

    /// Exams matching every criterion in `filter`, sorted like [`Self::all_exams`].
    pub fn list_exams(&self, filter: &ExamFilter) -> Result<Vec<ExamEntry>, StoreError> {
        Ok(self
            .all_exams()?
            .into_iter()
            .filter(|exam| filter.matches(exam))
            .collect())
    }

    /// Exams whose class code or title contains `query`, ignoring case.
    pub fn search_exams(&self, query: &str) -> Result<Vec<ExamEntry>, StoreError> {
        self.list_exams(&ExamFilter {
            search: Some(query.to_string()),
            ..ExamFilter::default()
        })
    }

    /// Every class code, sorted by code.
    pub fn course_codes(&self) -> Result<Vec<CourseCode>, StoreError> {
        let tables = self.read()?;
        let mut codes: Vec<CourseCode> = tables
            .class_codes
            .values()
            .map(|record| CourseCode {
                id: record.id,
                code: record.code.clone(),
            })
            .collect();
        codes.sort_by(|a, b| a.code.cmp(&b.code).then(a.id.cmp(&b.id)));
        Ok(codes)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(|_| StoreError::Poisoned)
    }
}

impl ExamStore for InMemoryExamStore {
    type Error = StoreError;

    fn exams_on_date(
        &self,
        date: NaiveDate,
        exclude: Option<DbId>,
    ) -> Result<Vec<ExamEntry>, StoreError> {
        let tables = self.read()?;
        tables
            .exams
            .iter()
            .filter(|(id, draft)| draft.date == date && Some(**id) != exclude)
            .map(|(&id, draft)| tables.join_exam(id, draft))
            .collect()
    }

    fn class_code(&self, id: DbId) -> Result<Option<ClassCode>, StoreError> {
        let tables = self.read()?;
        tables
            .class_codes
            .get(&id)
            .map(|record| tables.join_class_code(record))
            .transpose()
    }
}

impl ExamRepository for InMemoryExamStore {
    fn exam(&self, id: DbId) -> Result<Option<ExamEntry>, StoreError> {
        let tables = self.read()?;
        tables
            .exams
            .get(&id)
            .map(|draft| tables.join_exam(id, draft))
            .transpose()
    }

    fn insert_exam(&self, draft: ExamDraft) -> Result<ExamEntry, StoreError> {
        let mut tables = self.write()?;
        tables.check_references(&draft)?;
        let id = tables.next_exam_id()?;
        let entry = tables.join_exam(id, &draft)?;
        tables.last_exam_id = id;
        tables.exams.insert(id, draft);
        Ok(entry)
    }

    fn update_exam(&self, id: DbId, draft: ExamDraft) -> Result<Option<ExamEntry>, StoreError> {
        let mut tables = self.write()?;
        if !tables.exams.contains_key(&id) {
            return Ok(None);
        }
        tables.check_references(&draft)?;
        let entry = tables.join_exam(id, &draft)?;
        tables.exams.insert(id, draft);
        Ok(Some(entry))
    }

    fn delete_exam(&self, id: DbId) -> Result<bool, StoreError> {
        Ok(self.write()?.exams.remove(&id).is_some())
    }

    fn delete_all_exams(&self) -> Result<usize, StoreError> {
        let mut tables = self.write()?;
        let count = tables.exams.len();
        tables.exams.clear();
        Ok(count)
    }

    fn find_or_create_room(&self, name: &str) -> Result<DbId, StoreError> {
        let name = required_name("room", name)?;
        let mut tables = self.write()?;
        if let Some(room) = tables.rooms.values().find(|r| r.name == name) {
            return Ok(room.id);
        }
        let id = next_key("room", &tables.rooms)?;
        tables.rooms.insert(
            id,
            Room {
                id,
                name: name.to_string(),
                capacity: DEFAULT_ROOM_CAPACITY,
            },
        );
        debug!(room_id = id, name, "room created");
        Ok(id)
    }

    fn find_or_create_class_code(&self, code: &str) -> Result<DbId, StoreError> {
        let code = required_name("class code", code)?;
        let mut tables = self.write()?;
        if let Some(record) = tables.class_codes.values().find(|c| c.code == code) {
            return Ok(record.id);
        }
        let id = next_key("class code", &tables.class_codes)?;
        tables.class_codes.insert(
            id,
            ClassCodeRecord {
                id,
                code: code.to_string(),
                teacher_id: None,
                student_ids: Vec::new(),
            },
        );
        debug!(class_code_id = id, code, "class code created");
        Ok(id)
    }
}

fn required_name<'a>(entity: &'static str, raw: &'a str) -> Result<&'a str, StoreError> {
    match raw.trim() {
        "" => Err(StoreError::MissingName { entity }),
        name => Ok(name),
    }
}

/// One past the largest id in `table`, starting at 1.
fn next_key<V>(entity: &'static str, table: &BTreeMap<DbId, V>) -> Result<DbId, StoreError> {
    table
        .last_key_value()
        .map_or(0, |(&id, _)| id)
        .checked_add(1)
        .ok_or(StoreError::IdSpaceExhausted { entity })
}
