pub mod backup;
pub mod core;
pub mod payments;
pub mod reports;
pub mod students;

use rusqlite::Connection;
use serde_json::json;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::{PaymentStore, StoreError, StudentStore};

pub(super) fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub(super) fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Splits the open workspace out of the app state so a handler can
/// hold the connection and both stores at once.
pub(super) fn stores<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<(&'a Connection, &'a mut StudentStore, &'a mut PaymentStore), serde_json::Value> {
    let AppState {
        db,
        students,
        payments,
        ..
    } = state;
    match db.as_ref() {
        Some(conn) => Ok((conn, students, payments)),
        None => Err(err(&req.id, "no_workspace", "select a workspace first", None)),
    }
}

pub(super) fn store_err(id: &str, e: StoreError) -> serde_json::Value {
    err(id, &e.code, e.message, Some(json!({ "detail": e.detail })))
}

pub(super) fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}
