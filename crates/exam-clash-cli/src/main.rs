//! `exam-clash` CLI: check exam timetables for clashes from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Would this exam clash with anything in the catalog? (candidate on stdin)
//! echo '{"date":"2026-06-01","start_time":"09:30","end_time":"10:30","room_id":1,"class_code_id":11}' \
//!   | exam-clash check --catalog catalog.json
//!
//! # Same, but exit with status 2 on a clash
//! exam-clash check --catalog catalog.json -i candidate.json --fail-on-clash
//!
//! # Schedule an exam into the catalog file unless it clashes; the exam may
//! # name its room and class code, which are created if missing
//! exam-clash add --catalog catalog.json -i draft.json
//!
//! # Can this entry join my personal selection?
//! exam-clash timetable --selection mine.json -i entry.json
//!
//! # Clashes already inside a saved selection
//! exam-clash timetable --selection mine.json --saved
//!
//! # Can I add every session of a course?
//! exam-clash course --catalog catalog.json --selection mine.json --code MA201
//!
//! # Exams in one room on one day, or every course code
//! exam-clash list --catalog catalog.json --date 2026-06-01 --room 1
//! exam-clash courses --catalog catalog.json
//!
//! # Personal timetable for a list of courses
//! exam-clash schedule --catalog catalog.json --courses CS101,MA201
//! ```
//!
//! The catalog path can also be set with `EXAM_CLASH_CATALOG`. Logs go to
//! stderr and are filtered with `RUST_LOG` (default `warn`).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use exam_clash::time::format_clock_time;
use exam_clash::timetable::{dedup_clash_pairs, TimetableEntry};
use exam_clash::{
    detect_clashes, rejection_message, timetable_clash_message, CandidateExam, ClashInfo,
    DbId, ExamFilter, ExamRequest, ExamScheduler, InMemoryExamStore, ScheduleOutcome,
};
use std::io::{self, Read};
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Exit status when a clash is found and the caller asked to fail on it.
const CLASH_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "exam-clash",
    version,
    about = "Exam timetable clash checker"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a candidate exam against every exam in the catalog
    Check {
        /// Catalog JSON file (rooms, users, class codes, exams)
        #[arg(long, env = "EXAM_CLASH_CATALOG")]
        catalog: String,
        /// Candidate exam JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Exit with status 2 when the candidate clashes
        #[arg(long)]
        fail_on_clash: bool,
    },
    /// Add an exam to the catalog file unless it clashes
    Add {
        /// Catalog JSON file, rewritten on success
        #[arg(long, env = "EXAM_CLASH_CATALOG")]
        catalog: String,
        /// Exam JSON file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Run detection but do not write the catalog
        #[arg(long)]
        dry_run: bool,
    },
    /// Check an entry against a personal selection
    Timetable {
        /// Selection JSON file (array of timetable entries)
        #[arg(long)]
        selection: String,
        /// Entry JSON file (reads from stdin if omitted)
        #[arg(short, long, conflicts_with = "saved")]
        input: Option<String>,
        /// Report clashes already inside the selection instead
        #[arg(long)]
        saved: bool,
    },
    /// Check whether every session of a course fits the selection
    Course {
        #[arg(long, env = "EXAM_CLASH_CATALOG")]
        catalog: String,
        #[arg(long)]
        selection: String,
        /// Course code to add, e.g. MA201
        #[arg(long)]
        code: String,
    },
    /// List catalog exams, optionally filtered
    List {
        #[arg(long, env = "EXAM_CLASH_CATALOG")]
        catalog: String,
        /// Only exams on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only exams in this room id
        #[arg(long)]
        room: Option<DbId>,
        /// Case-insensitive match on class code or title
        #[arg(long)]
        search: Option<String>,
    },
    /// List every course code in the catalog
    Courses {
        #[arg(long, env = "EXAM_CLASH_CATALOG")]
        catalog: String,
    },
    /// Print the personal timetable for a list of courses
    Schedule {
        #[arg(long, env = "EXAM_CLASH_CATALOG")]
        catalog: String,
        /// Comma-separated course codes
        #[arg(long)]
        courses: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            catalog,
            input,
            fail_on_clash,
        } => {
            let store = load_catalog(&catalog)?;
            let candidate: CandidateExam = serde_json::from_str(&read_input(input.as_deref())?)
                .context("Failed to parse candidate exam JSON")?;

            let report = detect_clashes(&store, &candidate).context("Clash detection failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if let Some(message) = rejection_message(&report, &candidate) {
                eprintln!("{}", message);
                if fail_on_clash {
                    process::exit(CLASH_EXIT_CODE);
                }
            }
        }
        Commands::Add {
            catalog,
            input,
            dry_run,
        } => {
            let store = load_catalog(&catalog)?;
            let request: ExamRequest = serde_json::from_str(&read_input(input.as_deref())?)
                .context("Failed to parse exam JSON")?;

            let scheduler = ExamScheduler::new(store);
            match scheduler.create_from_request(request)? {
                ScheduleOutcome::Scheduled { exam } => {
                    if dry_run {
                        println!("No clashes; exam not written (dry run).");
                    } else {
                        let json = scheduler.repository().to_json()?;
                        std::fs::write(&catalog, json)
                            .with_context(|| format!("Failed to write file: {}", catalog))?;
                        println!("Scheduled exam {} on {} ({})", exam.id, exam.date, exam.day());
                    }
                }
                ScheduleOutcome::Rejected(rejection) => {
                    eprintln!("{}", rejection.message);
                    process::exit(CLASH_EXIT_CODE);
                }
            }
        }
        Commands::Timetable {
            selection,
            input,
            saved,
        } => {
            let selection = load_entries(&selection)?;
            let clashes = if saved {
                exam_clash::find_selection_clashes(&selection)
            } else {
                let candidate: TimetableEntry =
                    serde_json::from_str(&read_input(input.as_deref())?)
                        .context("Failed to parse timetable entry JSON")?;
                exam_clash::detect_timetable_clashes(&candidate, &selection)
            };
            print_clashes(&clashes);
        }
        Commands::Course {
            catalog,
            selection,
            code,
        } => {
            let store = load_catalog(&catalog)?;
            let selection = load_entries(&selection)?;
            let entries: Vec<TimetableEntry> = store
                .all_exams()?
                .iter()
                .map(TimetableEntry::from)
                .collect();

            let clashes = exam_clash::detect_course_clashes(&code, &selection, &entries);
            if clashes.is_empty() {
                println!("{} can be added.", code);
            } else {
                println!("{} cannot be added:", code);
                print_clashes(&clashes);
            }
        }
        Commands::List {
            catalog,
            date,
            room,
            search,
        } => {
            let store = load_catalog(&catalog)?;
            let filter = ExamFilter {
                search,
                date,
                room_id: room,
            };
            let exams = store.list_exams(&filter)?;
            if exams.is_empty() {
                println!("No exams found.");
            }
            for exam in &exams {
                println!("{}", format_row(&TimetableEntry::from(exam)));
            }
        }
        Commands::Courses { catalog } => {
            let store = load_catalog(&catalog)?;
            for course in store.course_codes()? {
                println!("{}", course.code);
            }
        }
        Commands::Schedule { catalog, courses } => {
            let store = load_catalog(&catalog)?;
            let codes = split_codes(&courses);
            let exams = store.all_exams()?;
            debug!(courses = codes.len(), exams = exams.len(), "building personal timetable");

            let timetable = exam_clash::personal_timetable(&codes, &exams);
            if timetable.is_empty() {
                println!("No exams found.");
            }
            for entry in &timetable {
                println!("{}", format_row(entry));
            }
        }
    }

    Ok(())
}

/// One timetable line: date, weekday, time window, course, room.
fn format_row(entry: &TimetableEntry) -> String {
    let date = entry.date.map(|d| d.to_string()).unwrap_or_default();
    let time = match (entry.start_time, entry.end_time) {
        (Some(start), Some(end)) => format!("{}-{}", format_clock_time(start), format_clock_time(end)),
        _ => String::new(),
    };
    format!(
        "{:<10}  {:<9}  {:<11}  {:<10}  {}",
        date,
        entry.day().unwrap_or_default(),
        time,
        entry.course_code.as_deref().unwrap_or_default(),
        entry.room_name.as_deref().unwrap_or_default(),
    )
    .trim_end()
    .to_string()
}

/// Split `"CS101, MA201"` into trimmed, non-empty codes.
fn split_codes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_clashes(clashes: &[ClashInfo]) {
    let unique = dedup_clash_pairs(clashes);
    if unique.is_empty() {
        println!("No clashes.");
    }
    for clash in &unique {
        println!("{}", timetable_clash_message(clash));
    }
}

fn load_catalog(path: &str) -> Result<InMemoryExamStore> {
    let json = read_input(Some(path))?;
    InMemoryExamStore::from_json(&json).with_context(|| format!("Invalid catalog: {}", path))
}

fn load_entries(path: &str) -> Result<Vec<TimetableEntry>> {
    let json = read_input(Some(path))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid selection: {}", path))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}
