use crate::data::RECIPIENTS;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::store::{PaymentStore, StudentStore};
use serde_json::json;
use std::path::PathBuf;

use super::{store_err, stores};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            // Any cached lists belong to the previous workspace.
            state.students = StudentStore::new();
            state.payments = PaymentStore::new();
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

/// Dashboard counters: totals across the whole workspace, plus the
/// per-recipient split.
fn handle_overview_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, students, payments) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = students.ensure_loaded(conn) {
        return store_err(&req.id, e);
    }
    if let Err(e) = payments.ensure_loaded(conn, students) {
        return store_err(&req.id, e);
    }
    let per_recipient: Vec<serde_json::Value> = RECIPIENTS
        .iter()
        .map(|r| {
            json!({
                "recipient": r,
                "totalAmount": report::recipient_total(payments.items(), r),
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "totalStudents": students.items().len(),
            "totalPayments": payments.items().len(),
            "totalAmount": report::total_amount(payments.items()),
            "perRecipient": per_recipient,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "overview.stats" => Some(handle_overview_stats(state, req)),
        _ => None,
    }
}
