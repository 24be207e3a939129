use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Closed enumerations used throughout filtering and validation.
/// Values are kept in the app's source locale.
pub const GRADES: [&str; 3] = ["الأول", "الثاني", "الثالث"];
pub const TRACKS: [&str; 3] = ["جدارات عام", "تعليم مزدوج", "معهد فني صناعي"];
pub const RECIPIENTS: [&str; 2] = ["أ.علاء", "أ.إبراهيم"];

#[derive(Debug, Clone, Serialize)]
pub struct DataAccessError {
    pub code: String,
    pub message: String,
}

impl DataAccessError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

fn db_err(e: rusqlite::Error) -> DataAccessError {
    DataAccessError::new("db_query_failed", e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade: String,
    #[serde(rename = "type")]
    pub track: String,
    pub lesson_fee: f64,
    pub date_added: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub grade: String,
    #[serde(rename = "type")]
    pub track: String,
    pub amount: f64,
    pub date: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub grade: String,
    pub track: String,
    pub lesson_fee: f64,
    pub date_added: String,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub student_id: String,
    pub amount: f64,
    pub date: String,
    pub recipient: String,
}

fn parse_id(id: &str) -> Result<i64, DataAccessError> {
    id.parse::<i64>()
        .map_err(|_| DataAccessError::new("bad_params", format!("invalid id: {}", id)))
}

fn require_iso_date(value: &str, field: &str) -> Result<(), DataAccessError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        DataAccessError::new(
            "bad_params",
            format!("{} must be an ISO date (YYYY-MM-DD)", field),
        )
    })?;
    Ok(())
}

pub fn list_students(conn: &Connection) -> Result<Vec<Student>, DataAccessError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, grade, type, lesson_fee, date_added
             FROM students
             ORDER BY name",
        )
        .map_err(db_err)?;
    stmt.query_map([], |r| {
        Ok(Student {
            id: r.get::<_, i64>(0)?.to_string(),
            name: r.get(1)?,
            grade: r.get(2)?,
            track: r.get(3)?,
            lesson_fee: r.get(4)?,
            date_added: r.get(5)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

pub fn create_student(conn: &Connection, fields: &NewStudent) -> Result<Student, DataAccessError> {
    if fields.name.trim().is_empty() {
        return Err(DataAccessError::new("bad_params", "name must not be empty"));
    }
    if !GRADES.contains(&fields.grade.as_str()) {
        return Err(DataAccessError::new(
            "bad_params",
            format!("unknown grade: {}", fields.grade),
        ));
    }
    if !TRACKS.contains(&fields.track.as_str()) {
        return Err(DataAccessError::new(
            "bad_params",
            format!("unknown type: {}", fields.track),
        ));
    }
    if !fields.lesson_fee.is_finite() || fields.lesson_fee < 0.0 {
        return Err(DataAccessError::new(
            "bad_params",
            "lessonFee must be a non-negative number",
        ));
    }
    require_iso_date(&fields.date_added, "dateAdded")?;

    conn.execute(
        "INSERT INTO students(name, grade, type, lesson_fee, date_added, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        (
            &fields.name,
            &fields.grade,
            &fields.track,
            fields.lesson_fee,
            &fields.date_added,
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(db_err)?;

    Ok(Student {
        id: conn.last_insert_rowid().to_string(),
        name: fields.name.clone(),
        grade: fields.grade.clone(),
        track: fields.track.clone(),
        lesson_fee: fields.lesson_fee,
        date_added: fields.date_added.clone(),
    })
}

pub fn delete_student(conn: &Connection, id: &str) -> Result<(), DataAccessError> {
    let id = parse_id(id)?;
    conn.execute("DELETE FROM students WHERE id = ?", [id])
        .map_err(db_err)?;
    Ok(())
}

pub fn list_payments(conn: &Connection) -> Result<Vec<Payment>, DataAccessError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, student_id, student_name, grade, type, amount, payment_date, receiver
             FROM payments
             ORDER BY payment_date DESC, id DESC",
        )
        .map_err(db_err)?;
    stmt.query_map([], |r| {
        Ok(Payment {
            id: r.get::<_, i64>(0)?.to_string(),
            student_id: r.get::<_, i64>(1)?.to_string(),
            student_name: r.get(2)?,
            grade: r.get(3)?,
            track: r.get(4)?,
            amount: r.get(5)?,
            date: r.get(6)?,
            recipient: r.get(7)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_err)
}

/// Inserts a payment after resolving its student reference. Name,
/// grade and type are copied onto the row at insert time and never
/// re-derived afterwards.
pub fn create_payment(conn: &Connection, fields: &NewPayment) -> Result<Payment, DataAccessError> {
    if !fields.amount.is_finite() || fields.amount <= 0.0 {
        return Err(DataAccessError::new(
            "bad_params",
            "amount must be a positive number",
        ));
    }
    if !RECIPIENTS.contains(&fields.recipient.as_str()) {
        return Err(DataAccessError::new(
            "bad_params",
            format!("unknown recipient: {}", fields.recipient),
        ));
    }
    require_iso_date(&fields.date, "date")?;
    let student_id = parse_id(&fields.student_id)?;

    let student: Option<(String, String, String)> = conn
        .query_row(
            "SELECT name, grade, type FROM students WHERE id = ?",
            [student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(db_err)?;
    let Some((student_name, grade, track)) = student else {
        return Err(DataAccessError::new("not_found", "student not found"));
    };

    conn.execute(
        "INSERT INTO payments(student_id, student_name, grade, type, payment_date, amount, receiver, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        (
            student_id,
            &student_name,
            &grade,
            &track,
            &fields.date,
            fields.amount,
            &fields.recipient,
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(db_err)?;

    Ok(Payment {
        id: conn.last_insert_rowid().to_string(),
        student_id: student_id.to_string(),
        student_name,
        grade,
        track,
        amount: fields.amount,
        date: fields.date.clone(),
        recipient: fields.recipient.clone(),
    })
}

pub fn delete_payment(conn: &Connection, id: &str) -> Result<(), DataAccessError> {
    let id = parse_id(id)?;
    conn.execute("DELETE FROM payments WHERE id = ?", [id])
        .map_err(db_err)?;
    Ok(())
}
