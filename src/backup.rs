use anyhow::Context;
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const BACKUP_VERSION: &str = "2.0";

/// Backup rows mirror the storage schema verbatim, including ids and
/// creation timestamps, so a restore reproduces the workspace exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRow {
    pub id: i64,
    pub name: String,
    pub grade: String,
    #[serde(rename = "type")]
    pub track: String,
    pub lesson_fee: f64,
    pub date_added: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRow {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub grade: String,
    #[serde(rename = "type")]
    pub track: String,
    pub payment_date: String,
    pub amount: f64,
    pub receiver: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub students: Vec<StudentRow>,
    pub payments: Vec<PaymentRow>,
    #[serde(rename = "exportDate")]
    pub export_date: String,
    pub version: String,
}

pub fn export_backup(conn: &Connection) -> anyhow::Result<BackupDocument> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, grade, type, lesson_fee, date_added, created_at
             FROM students ORDER BY id",
        )
        .context("preparing students backup query")?;
    let students = stmt
        .query_map([], |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                grade: r.get(2)?,
                track: r.get(3)?,
                lesson_fee: r.get(4)?,
                date_added: r.get(5)?,
                created_at: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .context("reading students for backup")?;

    let mut stmt = conn
        .prepare(
            "SELECT id, student_id, student_name, grade, type, payment_date, amount, receiver, created_at
             FROM payments ORDER BY id",
        )
        .context("preparing payments backup query")?;
    let payments = stmt
        .query_map([], |r| {
            Ok(PaymentRow {
                id: r.get(0)?,
                student_id: r.get(1)?,
                student_name: r.get(2)?,
                grade: r.get(3)?,
                track: r.get(4)?,
                payment_date: r.get(5)?,
                amount: r.get(6)?,
                receiver: r.get(7)?,
                created_at: r.get(8)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .context("reading payments for backup")?;

    Ok(BackupDocument {
        students,
        payments,
        export_date: Utc::now().to_rfc3339(),
        version: BACKUP_VERSION.to_string(),
    })
}

/// Replaces the workspace contents with the backup, keeping the
/// original row ids. All-or-nothing: a failure mid-restore rolls the
/// whole transaction back and leaves the current data untouched.
pub fn import_backup(conn: &mut Connection, doc: &BackupDocument) -> anyhow::Result<(usize, usize)> {
    let tx = conn.transaction().context("opening restore transaction")?;

    tx.execute("DELETE FROM payments", [])
        .context("clearing payments before restore")?;
    tx.execute("DELETE FROM students", [])
        .context("clearing students before restore")?;

    for s in &doc.students {
        tx.execute(
            "INSERT INTO students(id, name, grade, type, lesson_fee, date_added, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                s.id,
                &s.name,
                &s.grade,
                &s.track,
                s.lesson_fee,
                &s.date_added,
                &s.created_at,
            ),
        )
        .with_context(|| format!("restoring student {}", s.id))?;
    }
    for p in &doc.payments {
        tx.execute(
            "INSERT INTO payments(id, student_id, student_name, grade, type, payment_date, amount, receiver, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                p.id,
                p.student_id,
                &p.student_name,
                &p.grade,
                &p.track,
                &p.payment_date,
                p.amount,
                &p.receiver,
                &p.created_at,
            ),
        )
        .with_context(|| format!("restoring payment {}", p.id))?;
    }

    tx.commit().context("committing restore transaction")?;
    Ok((doc.students.len(), doc.payments.len()))
}

/// Empties the workspace: payments first, then students, in one
/// transaction. Returns how many rows of each went away.
pub fn delete_all(conn: &mut Connection) -> anyhow::Result<(usize, usize)> {
    let tx = conn.transaction().context("opening wipe transaction")?;
    let payments = tx
        .execute("DELETE FROM payments", [])
        .context("deleting payments")?;
    let students = tx
        .execute("DELETE FROM students", [])
        .context("deleting students")?;
    tx.commit().context("committing wipe transaction")?;
    Ok((students, payments))
}
