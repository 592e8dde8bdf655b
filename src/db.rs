use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "hostel.sqlite3";

pub fn open_db(workspace: &Path, busy_timeout: Duration) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace directory {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.busy_timeout(busy_timeout)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            block TEXT,
            room_id TEXT,
            course TEXT,
            year TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(display_name)",
        [],
    )?;

    // Scope columns hold '' / the nil uuid instead of NULL so that the UNIQUE
    // constraint sees two unscoped sessions as equal.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_sessions(
            id TEXT PRIMARY KEY,
            session_date TEXT NOT NULL,
            session_type TEXT NOT NULL,
            block TEXT NOT NULL DEFAULT '',
            room_id TEXT NOT NULL DEFAULT '00000000-0000-0000-0000-000000000000',
            course TEXT NOT NULL DEFAULT '',
            year TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            UNIQUE(session_date, session_type, block, room_id, course, year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_sessions_date ON attendance_sessions(session_date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            session_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            note TEXT,
            late_minutes INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            PRIMARY KEY(session_id, student_id),
            FOREIGN KEY(session_id) REFERENCES attendance_sessions(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    ensure_records_late_minutes(conn)?;
    ensure_records_updated_at(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_student ON attendance_records(student_id)",
        [],
    )?;

    Ok(())
}

// Workspaces created before late tracking only stored status and note.
fn ensure_records_late_minutes(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance_records", "late_minutes")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE attendance_records ADD COLUMN late_minutes INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn ensure_records_updated_at(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance_records", "updated_at")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE attendance_records ADD COLUMN updated_at TEXT", [])?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
