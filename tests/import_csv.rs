use college_sync::{
    count_applications, count_colleges, count_students, get_events_for_entity, get_import_runs,
    import_applications_from_csv, setup_database, ImportError, ImportOptions, RunSummary,
};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const HEADER: &str =
    "student_number,ceeb_code,college_name,application_result,application_type,attending";

struct Fixture {
    dir: TempDir,
    conn: Connection,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().expect("temporary directory");
        let conn = Connection::open(dir.path().join("applications.db")).expect("database opened");
        setup_database(&conn).expect("schema created");
        Fixture { dir, conn }
    }

    fn write_csv(&self, filename: &str, rows: &[&str]) -> PathBuf {
        self.write_raw(filename, &format!("{}\n{}\n", HEADER, rows.join("\n")))
    }

    fn write_raw(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(filename);
        fs::write(&path, content).expect("CSV written");
        path
    }

    fn import(&mut self, path: &Path) -> Result<RunSummary, ImportError> {
        import_applications_from_csv(&mut self.conn, path, &ImportOptions::for_tenant("SchooLinks"))
    }
}

#[derive(Debug)]
struct StoredApplication {
    id: i64,
    application_result: Option<String>,
    attending: Option<bool>,
    is_archived: bool,
    archived_at: Option<String>,
}

fn application_for(conn: &Connection, student_number: &str) -> StoredApplication {
    conn.query_row(
        "SELECT a.id, a.application_result, a.attending, a.is_archived, a.archived_at
         FROM college_applications a
         JOIN students s ON s.id = a.student_id
         WHERE s.student_number = ?1",
        params![student_number],
        |row| {
            Ok(StoredApplication {
                id: row.get(0)?,
                application_result: row.get(1)?,
                attending: row.get(2)?,
                is_archived: row.get(3)?,
                archived_at: row.get(4)?,
            })
        },
    )
    .expect("application exists")
}

#[test]
fn import_creates_new_applications() {
    let mut fx = Fixture::new();
    let csv = fx.write_csv(
        "applications.csv",
        &[
            "974228,2295,Stonehill College,accepted,Early Action,1",
            "996713,,Lasell University,,Rolling Decision,0",
            "974424,3771,Suffolk University,accepted,Rolling,unknown",
        ],
    );

    let summary = fx.import(&csv).expect("import succeeds");

    assert_eq!(summary.total_processed, 3);
    assert_eq!(summary.created, 3);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.archived, 0);
    assert_eq!(summary.students_created, 3);
    assert_eq!(summary.colleges_created, 3);

    assert_eq!(count_students(&fx.conn).unwrap(), 3);
    assert_eq!(count_applications(&fx.conn).unwrap(), (3, 0));

    assert_eq!(application_for(&fx.conn, "974228").attending, Some(true));
    let lasell = application_for(&fx.conn, "996713");
    assert_eq!(lasell.attending, Some(false));
    assert_eq!(lasell.application_result, None);
    assert_eq!(application_for(&fx.conn, "974424").attending, None);
}

#[test]
fn import_keeps_last_occurrence_of_duplicates() {
    let mut fx = Fixture::new();
    let csv = fx.write_csv(
        "applications_duplicates.csv",
        &[
            "974472,3771,Suffolk University,denied,Early Action,0",
            "974472,3771,Suffolk University,accepted,Early Action,1",
            "974195,,Quinnipiac University,,Rolling Decision,unknown",
            "974195,,quinnipiac university,accepted,Rolling Decision,1",
        ],
    );

    let summary = fx.import(&csv).expect("import succeeds");

    assert_eq!(summary.rows_read, 4);
    assert_eq!(summary.duplicates_collapsed, 2);
    assert_eq!(summary.total_processed, 2);
    assert_eq!(count_applications(&fx.conn).unwrap(), (2, 0));

    let suffolk = application_for(&fx.conn, "974472");
    assert_eq!(suffolk.application_result.as_deref(), Some("accepted"));
    assert_eq!(suffolk.attending, Some(true));

    let quinnipiac = application_for(&fx.conn, "974195");
    assert_eq!(quinnipiac.application_result.as_deref(), Some("accepted"));
    assert_eq!(quinnipiac.attending, Some(true));
}

#[test]
fn last_row_wins_even_when_it_is_a_downgrade() {
    let mut fx = Fixture::new();
    let csv = fx.write_csv(
        "applications.csv",
        &["S1,C1,College One,accepted,Regular,1", "S1,C1,College One,denied,Regular,0"],
    );

    fx.import(&csv).expect("import succeeds");

    assert_eq!(application_for(&fx.conn, "S1").application_result.as_deref(), Some("denied"));
}

#[test]
fn name_fallback_matches_case_insensitively_across_runs() {
    let mut fx = Fixture::new();
    let first = fx.write_csv("day1.csv", &["S1,,Acme U,accepted,Regular,1"]);
    let second = fx.write_csv("day2.csv", &["S1,,ACME U,accepted,Regular,1", "S2,,acme u,denied,Regular,0"]);

    fx.import(&first).expect("first import");
    let summary = fx.import(&second).expect("second import");

    assert_eq!(summary.colleges_created, 0);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(count_colleges(&fx.conn).unwrap(), 1);
}

#[test]
fn import_updates_existing_record() {
    let mut fx = Fixture::new();
    let initial = fx.write_csv(
        "application_initial.csv",
        &["974228,3780,Sacred Heart University,unknown,Early Action,unknown"],
    );
    let update = fx.write_csv(
        "application_update.csv",
        &["974228,3780,Sacred Heart University,accepted,Early Action,1"],
    );

    let summary1 = fx.import(&initial).expect("first import");
    assert_eq!(summary1.created, 1);
    assert_eq!(summary1.updated, 0);

    let summary2 = fx.import(&update).expect("second import");
    assert_eq!(summary2.created, 0);
    assert_eq!(summary2.updated, 1);
    assert_eq!(count_applications(&fx.conn).unwrap(), (1, 0));

    let app = application_for(&fx.conn, "974228");
    assert_eq!(app.application_result.as_deref(), Some("accepted"));
    assert_eq!(app.attending, Some(true));
    assert!(!app.is_archived);

    let events = get_events_for_entity(&fx.conn, "college_application", &app.id.to_string()).unwrap();
    assert_eq!(events.len(), 2);
}

#[test]
fn archive_round_trip() {
    let mut fx = Fixture::new();
    let full = fx.write_csv(
        "application_full.csv",
        &[
            "974150,3369,Endicott College,accepted,Rolling Decision,0",
            "975900,2400,Marist College,accepted,Early Action,1",
        ],
    );
    let partial = fx.write_csv(
        "application_partial.csv",
        &["974150,3369,Endicott College,accepted,Rolling Decision,0"],
    );
    let returning = fx.write_csv(
        "application_returning.csv",
        &[
            "974150,3369,Endicott College,accepted,Rolling Decision,0",
            "975900,2400,Marist College,denied,Early Action,0",
        ],
    );

    fx.import(&full).expect("full import");
    assert_eq!(count_applications(&fx.conn).unwrap(), (2, 0));

    let summary = fx.import(&partial).expect("partial import");
    assert_eq!(summary.archived, 1);
    assert_eq!(count_applications(&fx.conn).unwrap(), (1, 1));

    let archived = application_for(&fx.conn, "975900");
    assert!(archived.is_archived);
    assert!(archived.archived_at.is_some());

    let summary = fx.import(&returning).expect("returning import");
    assert_eq!(summary.reactivated, 1);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.archived, 0);

    let back = application_for(&fx.conn, "975900");
    assert_eq!(back.id, archived.id);
    assert!(!back.is_archived);
    assert_eq!(back.archived_at, None);
    assert_eq!(back.application_result.as_deref(), Some("denied"));
    assert_eq!(back.attending, Some(false));
}

#[test]
fn second_identical_import_changes_nothing() {
    let mut fx = Fixture::new();
    let csv = fx.write_csv(
        "applications.csv",
        &[
            "974228,2295,Stonehill College,accepted,Early Action,1",
            "996713,,Lasell University,,Rolling Decision,0",
        ],
    );

    fx.import(&csv).expect("first import");
    let before = application_for(&fx.conn, "974228");

    let summary = fx.import(&csv).expect("second import");

    assert_eq!(summary.created, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.reactivated, 0);
    assert_eq!(summary.archived, 0);
    assert_eq!(summary.unchanged, 2);
    assert_eq!(count_applications(&fx.conn).unwrap(), (2, 0));

    let after = application_for(&fx.conn, "974228");
    assert_eq!(before.id, after.id);
    assert_eq!(before.application_result, after.application_result);
    assert_eq!(before.attending, after.attending);

    let runs = get_import_runs(&fx.conn, 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].file_sha256, runs[1].file_sha256);
}

#[test]
fn missing_columns_fail_before_any_mutation() {
    let mut fx = Fixture::new();
    let csv = fx.write_raw(
        "bad.csv",
        "student_number,ceeb_code,college_name,application_result,application_type\n\
         1,2295,Test College,accepted,Rolling\n",
    );

    let err = fx.import(&csv).expect_err("import must fail");

    assert!(err.to_string().contains("attending"));
    assert_eq!(err.missing_columns(), Some(&["attending".to_string()][..]));

    let summary = RunSummary::failed("SchooLinks", "bad.csv", &err);
    assert_eq!(summary.created + summary.updated + summary.archived, 0);

    assert_eq!(count_students(&fx.conn).unwrap(), 0);
    assert_eq!(count_colleges(&fx.conn).unwrap(), 0);
    assert_eq!(count_applications(&fx.conn).unwrap(), (0, 0));
}

#[test]
fn messy_headers_are_accepted() {
    let mut fx = Fixture::new();
    let csv = fx.write_raw(
        "messy.csv",
        " Student_Number ,CEEB_Code, College_Name,APPLICATION_RESULT,Application_Type,Attending,Counselor\n\
         974228,2295,Stonehill College,ACCEPTED,Early Action,Yes,Ms. Smith\n",
    );

    let summary = fx.import(&csv).expect("import succeeds");

    assert_eq!(summary.created, 1);
    let app = application_for(&fx.conn, "974228");
    assert_eq!(app.application_result.as_deref(), Some("accepted"));
    assert_eq!(app.attending, Some(true));
}

#[test]
fn anomalies_are_counted_not_fatal() {
    let mut fx = Fixture::new();
    let csv = fx.write_csv(
        "applications.csv",
        &[
            "S1,C1,College One,accepted,Regular,1",
            "S2,C2,College Two,accepted,Regular,0",
            "S3,C3,College Three,accepted,Regular,unknown",
            "S4,C4,College Four,accepted,Regular,",
            "S5,C5,College Five,accepted,Regular,maybe",
            ",C6,College Six,accepted,Regular,1",
            "S7,,,accepted,Regular,1",
        ],
    );

    let summary = fx.import(&csv).expect("import succeeds");

    assert_eq!(summary.rows_read, 7);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.anomaly_count(), 3);
    assert_eq!(summary.created, 5);

    assert_eq!(application_for(&fx.conn, "S1").attending, Some(true));
    assert_eq!(application_for(&fx.conn, "S2").attending, Some(false));
    assert_eq!(application_for(&fx.conn, "S3").attending, None);
    assert_eq!(application_for(&fx.conn, "S4").attending, None);
    assert_eq!(application_for(&fx.conn, "S5").attending, None);
}

#[test]
fn ceeb_codes_are_opaque_strings() {
    let mut fx = Fixture::new();
    let csv = fx.write_csv(
        "applications.csv",
        &["S1,00123,Leading Zero College,accepted,Regular,1", "S2,123,Other College,accepted,Regular,1", "S3,A1B2,Letters College,accepted,Regular,1"],
    );

    let summary = fx.import(&csv).expect("import succeeds");

    assert_eq!(summary.colleges_created, 3);
    assert_eq!(count_colleges(&fx.conn).unwrap(), 3);
}

#[test]
fn unreadable_file_names_the_path() {
    let mut fx = Fixture::new();
    let missing = fx.dir.path().join("nope.csv");

    let err = fx.import(&missing).expect_err("import must fail");

    assert!(matches!(err, ImportError::UnreadableFile { .. }));
    assert!(err.to_string().contains("nope.csv"));
}

#[test]
fn rows_of_empty_cells_are_reported() {
    let mut fx = Fixture::new();
    let csv = fx.write_raw(
        "applications.csv",
        &format!("{}\nS1,C1,College One,accepted,Regular,1\n,,,,,\n", HEADER),
    );

    let summary = fx.import(&csv).expect("import succeeds");

    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.anomaly_count(), 1);
    assert_eq!(summary.anomalies[0].line, 3);
    assert_eq!(summary.created, 1);
}

#[test]
fn storage_failure_rolls_back_the_whole_run() {
    let mut fx = Fixture::new();
    let full = fx.write_csv(
        "day1.csv",
        &["S1,C1,College One,accepted,Regular,1", "S2,C2,College Two,accepted,Regular,0"],
    );
    // S1 changes, S2 disappears, S3 is new: the run must write before it archives
    let partial = fx.write_csv(
        "day2.csv",
        &["S1,C1,College One,denied,Regular,0", "S3,C3,College Three,accepted,Regular,1"],
    );

    fx.import(&full).expect("first import");
    let events_before: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
        .unwrap();

    fx.conn
        .execute_batch(
            "CREATE TRIGGER refuse_archive
             BEFORE UPDATE OF is_archived ON college_applications
             WHEN NEW.is_archived = 1
             BEGIN
                 SELECT RAISE(ABORT, 'archiving disabled');
             END;",
        )
        .unwrap();

    let err = fx.import(&partial).expect_err("archive step fails");
    assert!(matches!(err, ImportError::Storage(_)));

    let s1 = application_for(&fx.conn, "S1");
    assert_eq!(s1.application_result.as_deref(), Some("accepted"));
    assert_eq!(s1.attending, Some(true));
    assert!(!application_for(&fx.conn, "S2").is_archived);

    assert_eq!(count_students(&fx.conn).unwrap(), 2);
    assert_eq!(count_colleges(&fx.conn).unwrap(), 2);
    assert_eq!(count_applications(&fx.conn).unwrap(), (2, 0));
    assert_eq!(get_import_runs(&fx.conn, 10).unwrap().len(), 1);

    let events_after: i64 = fx
        .conn
        .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(events_after, events_before);
}
