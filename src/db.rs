use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("lessonledger.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK(length(name) > 0),
            grade TEXT NOT NULL,
            type TEXT NOT NULL,
            lesson_fee REAL NOT NULL,
            date_added TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            student_name TEXT NOT NULL,
            grade TEXT NOT NULL,
            type TEXT NOT NULL,
            payment_date TEXT NOT NULL,
            amount REAL NOT NULL,
            receiver TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_date ON payments(payment_date)",
        [],
    )?;

    // Workspaces created before payments carried the snapshot columns
    // need them added and backfilled from the referenced student row.
    ensure_payments_snapshot_columns(&conn)?;

    Ok(conn)
}

fn ensure_payments_snapshot_columns(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "payments", "student_name")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE payments ADD COLUMN student_name TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    conn.execute(
        "ALTER TABLE payments ADD COLUMN grade TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    conn.execute(
        "ALTER TABLE payments ADD COLUMN type TEXT NOT NULL DEFAULT ''",
        [],
    )?;
    conn.execute(
        "UPDATE payments SET
            student_name = COALESCE((SELECT s.name FROM students s WHERE s.id = payments.student_id), ''),
            grade = COALESCE((SELECT s.grade FROM students s WHERE s.id = payments.student_id), ''),
            type = COALESCE((SELECT s.type FROM students s WHERE s.id = payments.student_id), '')
         WHERE student_name = ''",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
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
