use crate::data::{self, DataAccessError, NewPayment, NewStudent, Payment, Student};
use rusqlite::Connection;
use serde::Serialize;

// User-facing messages, in the app locale. The backend detail rides
// along separately so the UI can stay localized.
const MSG_STUDENTS_FETCH: &str = "حدث خطأ في تحميل الطلاب";
const MSG_STUDENT_ADD: &str = "حدث خطأ في إضافة الطالب";
const MSG_STUDENT_DELETE: &str = "حدث خطأ في حذف الطالب";
const MSG_PAYMENTS_FETCH: &str = "حدث خطأ في تحميل المدفوعات";
const MSG_PAYMENT_ADD: &str = "حدث خطأ في إضافة المدفوعة";
const MSG_PAYMENT_DELETE: &str = "حدث خطأ في حذف المدفوعة";

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    Ready,
    Errored(String),
}

impl LoadState {
    pub fn name(&self) -> &'static str {
        match self {
            LoadState::Uninitialized => "uninitialized",
            LoadState::Loading => "loading",
            LoadState::Ready => "ready",
            LoadState::Errored(_) => "errored",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreError {
    pub code: String,
    pub message: String,
    pub detail: String,
}

fn wrap(e: DataAccessError, localized: &str) -> StoreError {
    StoreError {
        code: e.code,
        message: localized.to_string(),
        detail: e.message,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAddPolicy {
    AbortOnError,
    ContinueOnError,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAddFailure {
    pub name: String,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAddOutcome {
    pub added: Vec<Student>,
    pub failures: Vec<BulkAddFailure>,
    pub aborted: bool,
}

/// Owns the canonical in-memory student list. The list only changes
/// after the backend has acknowledged the corresponding operation.
pub struct StudentStore {
    items: Vec<Student>,
    state: LoadState,
}

impl StudentStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            state: LoadState::Uninitialized,
        }
    }

    pub fn items(&self) -> &[Student] {
        &self.items
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn ensure_loaded(&mut self, conn: &Connection) -> Result<(), StoreError> {
        if self.state == LoadState::Ready {
            return Ok(());
        }
        self.refetch(conn)
    }

    pub fn refetch(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.state = LoadState::Loading;
        match data::list_students(conn) {
            Ok(items) => {
                self.items = items;
                self.state = LoadState::Ready;
                Ok(())
            }
            Err(e) => {
                let err = wrap(e, MSG_STUDENTS_FETCH);
                self.state = LoadState::Errored(err.message.clone());
                Err(err)
            }
        }
    }

    pub fn add(&mut self, conn: &Connection, fields: &NewStudent) -> Result<Student, StoreError> {
        match data::create_student(conn, fields) {
            Ok(student) => {
                self.items.push(student.clone());
                Ok(student)
            }
            Err(e) => Err(wrap(e, MSG_STUDENT_ADD)),
        }
    }

    /// Creates students one at a time, strictly in order. A failure
    /// either stops the batch or is recorded and skipped, depending on
    /// the policy; already-created students are never rolled back.
    pub fn add_bulk(
        &mut self,
        conn: &Connection,
        names: &[String],
        grade: &str,
        track: &str,
        lesson_fee: f64,
        date_added: &str,
        policy: BulkAddPolicy,
    ) -> BulkAddOutcome {
        let mut outcome = BulkAddOutcome {
            added: Vec::new(),
            failures: Vec::new(),
            aborted: false,
        };
        for name in names {
            let fields = NewStudent {
                name: name.trim().to_string(),
                grade: grade.to_string(),
                track: track.to_string(),
                lesson_fee,
                date_added: date_added.to_string(),
            };
            match self.add(conn, &fields) {
                Ok(student) => outcome.added.push(student),
                Err(e) => {
                    outcome.failures.push(BulkAddFailure {
                        name: name.clone(),
                        code: e.code,
                        message: e.detail,
                    });
                    if policy == BulkAddPolicy::AbortOnError {
                        outcome.aborted = true;
                        break;
                    }
                }
            }
        }
        outcome
    }

    pub fn remove(&mut self, conn: &Connection, id: &str) -> Result<(), StoreError> {
        match data::delete_student(conn, id) {
            Ok(()) => {
                self.items.retain(|s| s.id != id);
                Ok(())
            }
            Err(e) => Err(wrap(e, MSG_STUDENT_DELETE)),
        }
    }
}

/// Owns the canonical in-memory payment list. New payments go to the
/// front of the list (most recent first, like the fetch order).
pub struct PaymentStore {
    items: Vec<Payment>,
    state: LoadState,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            state: LoadState::Uninitialized,
        }
    }

    pub fn items(&self) -> &[Payment] {
        &self.items
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// The initial payments load waits for the student list: payments
    /// are meaningless without at least one known student. Until then
    /// the store stays uninitialized and empty.
    pub fn ensure_loaded(
        &mut self,
        conn: &Connection,
        students: &StudentStore,
    ) -> Result<(), StoreError> {
        if self.state == LoadState::Ready {
            return Ok(());
        }
        if students.state() != &LoadState::Ready || students.items().is_empty() {
            return Ok(());
        }
        self.refetch(conn)
    }

    pub fn refetch(&mut self, conn: &Connection) -> Result<(), StoreError> {
        self.state = LoadState::Loading;
        match data::list_payments(conn) {
            Ok(items) => {
                self.items = items;
                self.state = LoadState::Ready;
                Ok(())
            }
            Err(e) => {
                let err = wrap(e, MSG_PAYMENTS_FETCH);
                self.state = LoadState::Errored(err.message.clone());
                Err(err)
            }
        }
    }

    pub fn add(&mut self, conn: &Connection, fields: &NewPayment) -> Result<Payment, StoreError> {
        match data::create_payment(conn, fields) {
            Ok(payment) => {
                self.items.insert(0, payment.clone());
                Ok(payment)
            }
            Err(e) => Err(wrap(e, MSG_PAYMENT_ADD)),
        }
    }

    pub fn remove(&mut self, conn: &Connection, id: &str) -> Result<(), StoreError> {
        match data::delete_payment(conn, id) {
            Ok(()) => {
                self.items.retain(|p| p.id != id);
                Ok(())
            }
            Err(e) => Err(wrap(e, MSG_PAYMENT_DELETE)),
        }
    }
}
