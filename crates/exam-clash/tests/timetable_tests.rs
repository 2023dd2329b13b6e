//! Tests for the advisory personal-timetable checker.

use chrono::NaiveDate;
use exam_clash::timetable::{conflicting_entry_ids, dedup_clash_pairs};
use exam_clash::{
    can_add_course, detect_course_clashes, detect_timetable_clashes, find_selection_clashes,
    parse_clock_time, personal_timetable, timetable_clash_message, ClassCode, DbId, ExamEntry,
    Room, TimetableEntry,
};

/// Helper to create a selection entry on a given date.
fn entry(id: DbId, code: &str, date: &str, start: &str, end: &str) -> TimetableEntry {
    TimetableEntry {
        id,
        title: None,
        date: Some(date.parse().unwrap()),
        start_time: Some(parse_clock_time(start).unwrap()),
        end_time: Some(parse_clock_time(end).unwrap()),
        course_code: Some(code.to_string()),
        room_name: None,
    }
}

fn exam(id: DbId, code: &str, date: &str, start: &str, end: &str) -> ExamEntry {
    ExamEntry {
        id,
        title: None,
        date: date.parse::<NaiveDate>().unwrap(),
        start_time: parse_clock_time(start).unwrap(),
        end_time: parse_clock_time(end).unwrap(),
        room: Room {
            id: 1,
            name: "Hall A".to_string(),
            capacity: 100,
        },
        class_code: ClassCode {
            id,
            code: code.to_string(),
            teacher: None,
            students: vec![],
        },
        user_id: None,
    }
}

#[test]
fn empty_selection_never_clashes() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    assert!(detect_timetable_clashes(&candidate, &[]).is_empty());
}

#[test]
fn overlap_on_same_date_is_reported() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    let selection = vec![entry(2, "MA201", "2026-06-01", "10:30", "12:00")];

    let clashes = detect_timetable_clashes(&candidate, &selection);

    assert_eq!(clashes.len(), 1);
    let clash = &clashes[0];
    assert_eq!(clash.new_entry.id, 1);
    assert_eq!(clash.conflicting_entry.id, 2);
    assert_eq!(clash.date, "2026-06-01".parse::<NaiveDate>().unwrap());
    assert_eq!(clash.time_overlap.new_start, parse_clock_time("09:00").unwrap());
    assert_eq!(clash.time_overlap.conflicting_end, parse_clock_time("12:00").unwrap());
    assert_eq!(clash.time_overlap.minutes, 30);
}

#[test]
fn overlap_minutes_cover_contained_entry() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "12:00");
    let selection = vec![entry(2, "MA201", "2026-06-01", "10:00", "10:45")];

    let clashes = detect_timetable_clashes(&candidate, &selection);

    assert_eq!(clashes[0].time_overlap.minutes, 45);
}

#[test]
fn one_malformed_row_rejects_the_whole_selection() {
    let json = r#"[
        {"id": 1, "date": "2026-06-01", "start_time": "09:00", "end_time": "11:00"},
        {"id": 2, "date": "2026-06-01", "start_time": "9:5", "end_time": "11:00"}
    ]"#;

    let err = serde_json::from_str::<Vec<TimetableEntry>>(json).unwrap_err();

    assert!(err.to_string().contains("Invalid time: 9:5"));
}

#[test]
fn different_date_is_ignored() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    let selection = vec![entry(2, "MA201", "2026-06-02", "09:00", "11:00")];

    assert!(detect_timetable_clashes(&candidate, &selection).is_empty());
}

#[test]
fn back_to_back_entries_do_not_clash() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "10:00");
    let selection = vec![entry(2, "MA201", "2026-06-01", "10:00", "11:00")];

    assert!(detect_timetable_clashes(&candidate, &selection).is_empty());
}

#[test]
fn all_conflicting_entries_are_reported() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "12:00");
    let selection = vec![
        entry(2, "MA201", "2026-06-01", "08:00", "09:30"),
        entry(3, "PH101", "2026-06-01", "13:00", "14:00"),
        entry(4, "CH110", "2026-06-01", "11:00", "11:30"),
    ];

    let ids: Vec<DbId> = detect_timetable_clashes(&candidate, &selection)
        .iter()
        .map(|c| c.conflicting_entry.id)
        .collect();

    assert_eq!(ids, vec![2, 4]);
}

#[test]
fn entries_with_missing_fields_are_skipped() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "12:00");
    let mut undated = entry(2, "MA201", "2026-06-01", "09:00", "12:00");
    undated.date = None;
    let mut untimed = entry(3, "PH101", "2026-06-01", "09:00", "12:00");
    untimed.end_time = None;

    assert!(detect_timetable_clashes(&candidate, &[undated.clone(), untimed]).is_empty());
    assert!(detect_timetable_clashes(&undated, &[candidate]).is_empty());
}

#[test]
fn clash_is_symmetric_between_pairs() {
    let a = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    let b = entry(2, "MA201", "2026-06-01", "10:00", "12:00");

    let ab = detect_timetable_clashes(&a, std::slice::from_ref(&b));
    let ba = detect_timetable_clashes(&b, std::slice::from_ref(&a));

    assert_eq!(ab.len(), 1);
    assert_eq!(ba.len(), 1);
    assert_eq!(ab[0].pair_key(), ba[0].pair_key());
}

#[test]
fn course_rejected_when_any_session_clashes() {
    let selection = vec![entry(1, "CS101", "2026-06-01", "09:00", "11:00")];
    let catalog = vec![
        entry(10, "MA201", "2026-06-03", "09:00", "11:00"),
        entry(11, "MA201", "2026-06-01", "10:00", "12:00"),
        entry(12, "PH101", "2026-06-01", "09:00", "11:00"),
    ];

    let clashes = detect_course_clashes("MA201", &selection, &catalog);

    assert_eq!(clashes.len(), 1);
    assert_eq!(clashes[0].new_entry.id, 11);
    assert!(!can_add_course("MA201", &selection, &catalog));
}

#[test]
fn course_accepted_when_no_session_clashes() {
    let selection = vec![entry(1, "CS101", "2026-06-01", "09:00", "11:00")];
    let catalog = vec![
        entry(10, "MA201", "2026-06-01", "11:00", "12:00"),
        entry(11, "MA201", "2026-06-02", "09:00", "11:00"),
    ];

    assert!(can_add_course("MA201", &selection, &catalog));
    assert!(can_add_course("UNKNOWN", &selection, &catalog));
}

#[test]
fn saved_selection_reports_each_pair_once() {
    let selection = vec![
        entry(1, "CS101", "2026-06-01", "09:00", "11:00"),
        entry(2, "MA201", "2026-06-01", "10:00", "12:00"),
        entry(3, "PH101", "2026-06-01", "10:30", "11:30"),
        entry(4, "CH110", "2026-06-02", "10:00", "11:00"),
    ];

    let clashes = find_selection_clashes(&selection);
    let pairs: Vec<(DbId, DbId)> = clashes.iter().map(|c| c.pair_key()).collect();

    assert_eq!(pairs, vec![(1, 2), (1, 3), (2, 3)]);
    assert_eq!(
        conflicting_entry_ids(&clashes).into_iter().collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn dedup_collapses_both_directions() {
    let a = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    let b = entry(2, "MA201", "2026-06-01", "10:00", "12:00");

    let mut clashes = detect_timetable_clashes(&a, std::slice::from_ref(&b));
    clashes.extend(detect_timetable_clashes(&b, std::slice::from_ref(&a)));
    assert_eq!(clashes.len(), 2);

    let unique = dedup_clash_pairs(&clashes);
    assert_eq!(unique.len(), 1);
    assert_eq!(unique[0].new_entry.id, 1);
}

#[test]
fn message_uses_course_codes_and_times() {
    let candidate = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    let selection = vec![entry(2, "MA201", "2026-06-01", "10:30", "12:00")];

    let clash = &detect_timetable_clashes(&candidate, &selection)[0];

    assert_eq!(
        timetable_clash_message(clash),
        "CS101 (09:00-11:00) overlaps with MA201 (10:30-12:00) on 2026-06-01."
    );
}

#[test]
fn message_falls_back_to_unknown_course() {
    let mut candidate = entry(1, "CS101", "2026-06-01", "09:00", "11:00");
    candidate.course_code = None;
    let selection = vec![entry(2, "MA201", "2026-06-01", "10:30", "12:00")];

    let clash = &detect_timetable_clashes(&candidate, &selection)[0];

    assert!(timetable_clash_message(clash).starts_with("Unknown Course (09:00-11:00)"));
}

#[test]
fn personal_timetable_is_filtered_and_sorted() {
    let catalog = vec![
        exam(1, "CS101", "2026-06-02", "09:00", "11:00"),
        exam(2, "MA201", "2026-06-01", "14:00", "16:00"),
        exam(3, "PH101", "2026-06-01", "09:00", "11:00"),
        exam(4, "CS101", "2026-06-01", "13:00", "14:00"),
    ];

    let timetable = personal_timetable(&["CS101", "MA201"], &catalog);
    let ids: Vec<DbId> = timetable.iter().map(|e| e.id).collect();

    assert_eq!(ids, vec![4, 2, 1]);
    assert_eq!(timetable[0].course_code.as_deref(), Some("CS101"));
    assert_eq!(timetable[0].room_name.as_deref(), Some("Hall A"));
}

#[test]
fn entry_deserializes_short_and_long_times() {
    let json = r#"{"id":7,"date":"2026-06-01","start_time":"09:00:00","end_time":"10:30","course_code":"CS101"}"#;
    let parsed: TimetableEntry = serde_json::from_str(json).unwrap();

    assert_eq!(parsed.start_time, Some(parse_clock_time("09:00").unwrap()));
    assert_eq!(parsed.end_time, Some(parse_clock_time("10:30").unwrap()));
    assert_eq!(parsed.title, None);
}

#[test]
fn entry_rejects_malformed_times() {
    let json = r#"{"id":7,"date":"2026-06-01","start_time":"9am","end_time":"10:30"}"#;
    assert!(serde_json::from_str::<TimetableEntry>(json).is_err());
}

#[test]
fn empty_time_strings_read_as_missing() {
    let json = r#"{"id":7,"date":"2026-06-01","start_time":"","end_time":null}"#;
    let parsed: TimetableEntry = serde_json::from_str(json).unwrap();

    assert_eq!(parsed.start_time, None);
    assert_eq!(parsed.end_time, None);
}
