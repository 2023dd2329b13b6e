//! WASM bindings for exam-clash.
//!
//! Exposes the advisory timetable checker to the student-facing browser UI via
//! `wasm-bindgen`. All complex types cross the boundary as JSON strings.
//! Entries use the [`TimetableEntry`] shape: `{id, title?, date?, start_time?,
//! end_time?, course_code?, room_name?}` with `YYYY-MM-DD` dates and `HH:MM`
//! times.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p exam-clash-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir web/pkg/ \
//!   target/wasm32-unknown-unknown/release/exam_clash_wasm.wasm
//! ```

use exam_clash::timetable::{self, ClashInfo, TimetableEntry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn from_json<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid {} JSON: {}", what, e))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

fn js_err(message: String) -> JsValue {
    JsValue::from_str(&message)
}

// ---------------------------------------------------------------------------
// Plain-Rust implementations (testable off wasm32)
// ---------------------------------------------------------------------------

fn timetable_clashes_json(candidate_json: &str, selection_json: &str) -> Result<String, String> {
    let candidate: TimetableEntry = from_json(candidate_json, "entry")?;
    let selection: Vec<TimetableEntry> = from_json(selection_json, "selection")?;
    to_json(&timetable::detect_timetable_clashes(&candidate, &selection))
}

fn course_clashes_json(
    course_code: &str,
    selection_json: &str,
    catalog_json: &str,
) -> Result<String, String> {
    let selection: Vec<TimetableEntry> = from_json(selection_json, "selection")?;
    let catalog: Vec<TimetableEntry> = from_json(catalog_json, "catalog")?;
    to_json(&timetable::detect_course_clashes(
        course_code,
        &selection,
        &catalog,
    ))
}

fn selection_clashes_json(selection_json: &str) -> Result<String, String> {
    let selection: Vec<TimetableEntry> = from_json(selection_json, "selection")?;
    to_json(&timetable::find_selection_clashes(&selection))
}

fn clash_messages_json(clashes_json: &str) -> Result<String, String> {
    let clashes: Vec<ClashInfo> = from_json(clashes_json, "clashes")?;
    let messages: Vec<String> = timetable::dedup_clash_pairs(&clashes)
        .iter()
        .map(exam_clash::timetable_clash_message)
        .collect();
    to_json(&messages)
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Half-open overlap test on `"HH:MM"` strings. Unparseable input gives `false`.
#[wasm_bindgen(js_name = "rangesOverlap")]
pub fn ranges_overlap(start1: &str, end1: &str, start2: &str, end2: &str) -> bool {
    exam_clash::ranges_overlap(start1, end1, start2, end2)
}

/// Clashes between one entry and the current selection.
///
/// Returns a JSON array of `ClashInfo` objects (`new_entry`,
/// `conflicting_entry`, `date`, `time_overlap`); empty means safe to add.
#[wasm_bindgen(js_name = "detectTimetableClashes")]
pub fn detect_timetable_clashes(
    candidate_json: &str,
    selection_json: &str,
) -> Result<String, JsValue> {
    timetable_clashes_json(candidate_json, selection_json).map_err(js_err)
}

/// Clashes between every catalog session of `course_code` and the selection.
///
/// Any result means the whole course should be refused.
#[wasm_bindgen(js_name = "detectCourseClashes")]
pub fn detect_course_clashes(
    course_code: &str,
    selection_json: &str,
    catalog_json: &str,
) -> Result<String, JsValue> {
    course_clashes_json(course_code, selection_json, catalog_json).map_err(js_err)
}

/// Clashes already present inside a saved selection, each pair once.
#[wasm_bindgen(js_name = "findSelectionClashes")]
pub fn find_selection_clashes(selection_json: &str) -> Result<String, JsValue> {
    selection_clashes_json(selection_json).map_err(js_err)
}

/// One display message per clashing pair, given a JSON array of `ClashInfo`.
#[wasm_bindgen(js_name = "timetableClashMessages")]
pub fn timetable_clash_messages(clashes_json: &str) -> Result<String, JsValue> {
    clash_messages_json(clashes_json).map_err(js_err)
}
