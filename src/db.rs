// 🗄️ SQLite persistence - schema, audit trail, import history, SqliteStore
//
// Uniqueness lives in the schema:
// - one student per (tenant, student_number)
// - one college per non-empty ceeb_code, one per name_key among code-less colleges
// - one application per (student, college)

use crate::entities::{ApplicationAttributes, College, CollegeApplication, Student, Tenant};
use crate::error::{ImportError, Result};
use crate::normalizer::Attending;
use crate::resolver::CollegeLookup;
use crate::store::{ApplicationStore, Resolved};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases answer "memory")
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(journal_mode = %mode, "database opened");
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tenants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id INTEGER NOT NULL REFERENCES tenants(id),
            student_number TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, student_number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS colleges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            ceeb_code TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // College Applications (soft-archived, never deleted)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS college_applications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL REFERENCES students(id),
            college_id INTEGER NOT NULL REFERENCES colleges(id),
            application_result TEXT,
            application_type TEXT,
            attending INTEGER,
            is_archived INTEGER NOT NULL DEFAULT 0,
            archived_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (student_id, college_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            tenant TEXT NOT NULL,
            source_file TEXT NOT NULL,
            file_sha256 TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            summary TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_colleges_ceeb_code
         ON colleges(ceeb_code) WHERE ceeb_code <> ''",
        [],
    )?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_colleges_name_key
         ON colleges(name_key) WHERE ceeb_code = ''",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_applications_student_archived
         ON college_applications(student_id, is_archived)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(idx, &raw)
}

fn optional_timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_timestamp(idx, &s)).transpose()
}

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

/// Every change to an application is an event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }

    /// Pin the event to the run's clock
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp_column(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

// ============================================================================
// IMPORT HISTORY
// ============================================================================

/// One committed reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: String,
    pub tenant: String,
    pub source_file: String,
    pub file_sha256: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: serde_json::Value,
}

pub fn insert_import_run(conn: &Connection, run: &ImportRun) -> Result<()> {
    let summary_json = serde_json::to_string(&run.summary)?;

    conn.execute(
        "INSERT INTO import_runs (
            run_id, tenant, source_file, file_sha256, started_at, finished_at, summary
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.run_id,
            run.tenant,
            run.source_file,
            run.file_sha256,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
            summary_json,
        ],
    )?;

    Ok(())
}

/// Most recent runs first
pub fn get_import_runs(conn: &Connection, limit: usize) -> Result<Vec<ImportRun>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, tenant, source_file, file_sha256, started_at, finished_at, summary
         FROM import_runs
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let runs = stmt
        .query_map(params![limit as i64], |row| {
            let summary_json: String = row.get(6)?;

            Ok(ImportRun {
                run_id: row.get(0)?,
                tenant: row.get(1)?,
                source_file: row.get(2)?,
                file_sha256: row.get(3)?,
                started_at: timestamp_column(row, 4)?,
                finished_at: timestamp_column(row, 5)?,
                summary: serde_json::from_str(&summary_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e))
                })?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(runs)
}

// ============================================================================
// COUNTS
// ============================================================================

pub fn count_students(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?)
}

pub fn count_colleges(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM colleges", [], |row| row.get(0))?)
}

/// (active, archived)
pub fn count_applications(conn: &Connection) -> Result<(i64, i64)> {
    Ok(conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN is_archived = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_archived = 1 THEN 1 ELSE 0 END), 0)
         FROM college_applications",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

const APPLICATION_COLUMNS: &str = "a.id, a.student_id, a.college_id, a.application_result,
    a.application_type, a.attending, a.is_archived, a.archived_at, a.created_at, a.updated_at";

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<CollegeApplication> {
    let attending: Option<bool> = row.get(5)?;

    Ok(CollegeApplication {
        id: row.get(0)?,
        student_id: row.get(1)?,
        college_id: row.get(2)?,
        attributes: ApplicationAttributes {
            application_result: row.get(3)?,
            application_type: row.get(4)?,
            attending: Attending::from_bool(attending),
        },
        is_archived: row.get(6)?,
        archived_at: optional_timestamp_column(row, 7)?,
        created_at: timestamp_column(row, 8)?,
        updated_at: timestamp_column(row, 9)?,
    })
}

fn college_from_row(row: &Row<'_>) -> rusqlite::Result<College> {
    Ok(College {
        id: row.get(0)?,
        name: row.get(1)?,
        ceeb_code: row.get(2)?,
    })
}

/// `ApplicationStore` over a rusqlite connection.
///
/// Pass a `rusqlite::Transaction` (it derefs to `Connection`) to get an
/// all-or-nothing run.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteStore { conn }
    }

    fn insert_college(&self, name: &str, ceeb_code: &str) -> Result<College> {
        self.conn.execute(
            "INSERT INTO colleges (name, name_key, ceeb_code, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![name, College::name_key(name), ceeb_code, Utc::now().to_rfc3339()],
        )?;

        Ok(College {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            ceeb_code: ceeb_code.to_string(),
        })
    }
}

impl ApplicationStore for SqliteStore<'_> {
    fn find_or_create_tenant(&self, name: &str) -> Result<Resolved<Tenant>> {
        let existing = self
            .conn
            .query_row("SELECT id FROM tenants WHERE name = ?1", params![name], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?;

        if let Some(id) = existing {
            return Ok(Resolved::found(Tenant { id, name: name.to_string() }));
        }

        self.conn.execute(
            "INSERT INTO tenants (name, created_at) VALUES (?1, ?2)",
            params![name, Utc::now().to_rfc3339()],
        )?;
        tracing::info!(tenant = name, "created tenant");

        Ok(Resolved::created(Tenant {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
        }))
    }

    fn find_or_create_student(&self, student_number: &str, tenant: &Tenant) -> Result<Resolved<Student>> {
        let existing = self
            .conn
            .query_row(
                "SELECT id FROM students WHERE tenant_id = ?1 AND student_number = ?2",
                params![tenant.id, student_number],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        let student = |id| Student {
            id,
            tenant_id: tenant.id,
            student_number: student_number.to_string(),
        };

        if let Some(id) = existing {
            return Ok(Resolved::found(student(id)));
        }

        self.conn.execute(
            "INSERT INTO students (tenant_id, student_number, created_at) VALUES (?1, ?2, ?3)",
            params![tenant.id, student_number, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!(student_number, "created student");

        Ok(Resolved::created(student(self.conn.last_insert_rowid())))
    }

    fn find_or_create_college(&self, lookup: &CollegeLookup) -> Result<Resolved<College>> {
        let existing = match lookup {
            CollegeLookup::ByCode { ceeb_code, .. } => self
                .conn
                .query_row(
                    "SELECT id, name, ceeb_code FROM colleges WHERE ceeb_code = ?1",
                    params![ceeb_code],
                    college_from_row,
                )
                .optional()?,
            CollegeLookup::ByName { name } => self
                .conn
                .query_row(
                    "SELECT id, name, ceeb_code FROM colleges WHERE ceeb_code = '' AND name_key = ?1",
                    params![College::name_key(name)],
                    college_from_row,
                )
                .optional()?,
        };

        if let Some(college) = existing {
            return Ok(Resolved::found(college));
        }

        let college = match lookup {
            CollegeLookup::ByCode { ceeb_code, name } => self.insert_college(name, ceeb_code)?,
            CollegeLookup::ByName { name } => self.insert_college(name, "")?,
        };
        tracing::debug!(college = %college.name, ceeb_code = %college.ceeb_code, "created college");

        Ok(Resolved::created(college))
    }

    fn find_application(&self, student: &Student, college: &College) -> Result<Option<CollegeApplication>> {
        let sql = format!(
            "SELECT {} FROM college_applications a WHERE a.student_id = ?1 AND a.college_id = ?2",
            APPLICATION_COLUMNS
        );

        Ok(self
            .conn
            .query_row(&sql, params![student.id, college.id], application_from_row)
            .optional()?)
    }

    fn upsert_application(
        &self,
        student: &Student,
        college: &College,
        attrs: &ApplicationAttributes,
        at: DateTime<Utc>,
    ) -> Result<CollegeApplication> {
        let now = at.to_rfc3339();

        self.conn.execute(
            "INSERT INTO college_applications (
                student_id, college_id, application_result, application_type, attending,
                is_archived, archived_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL, ?6, ?6)
            ON CONFLICT (student_id, college_id) DO UPDATE SET
                application_result = excluded.application_result,
                application_type = excluded.application_type,
                attending = excluded.attending,
                is_archived = 0,
                archived_at = NULL,
                updated_at = excluded.updated_at",
            params![
                student.id,
                college.id,
                attrs.application_result,
                attrs.application_type,
                attrs.attending.as_bool(),
                now,
            ],
        )?;

        self.find_application(student, college)?
            .ok_or(ImportError::Storage(rusqlite::Error::QueryReturnedNoRows))
    }

    fn list_active_applications(&self, tenant: &Tenant) -> Result<Vec<CollegeApplication>> {
        let sql = format!(
            "SELECT {} FROM college_applications a
             JOIN students s ON s.id = a.student_id
             WHERE s.tenant_id = ?1 AND a.is_archived = 0
             ORDER BY a.id",
            APPLICATION_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let applications = stmt
            .query_map(params![tenant.id], application_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(applications)
    }

    fn archive_application(&self, application: &CollegeApplication, at: DateTime<Utc>) -> Result<()> {
        let now = at.to_rfc3339();

        self.conn.execute(
            "UPDATE college_applications
             SET is_archived = 1, archived_at = ?1, updated_at = ?1
             WHERE id = ?2",
            params![now, application.id],
        )?;

        Ok(())
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        insert_event(self.conn, event)
    }
}

// ============================================================================
// TESTS
// ============================================================================
