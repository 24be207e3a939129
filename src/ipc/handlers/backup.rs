use crate::backup::{self, BackupDocument};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

use super::store_err;

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match backup::export_backup(conn) {
        Ok(doc) => ok(&req.id, json!(doc)),
        Err(e) => err(&req.id, "backup_failed", format!("{e:?}"), None),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState {
        db,
        students,
        payments,
        ..
    } = state;
    let Some(conn) = db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("backup") else {
        return err(&req.id, "bad_params", "missing params.backup", None);
    };
    let doc: BackupDocument = match serde_json::from_value(raw.clone()) {
        Ok(d) => d,
        Err(e) => return err(&req.id, "bad_params", format!("invalid backup: {}", e), None),
    };
    match backup::import_backup(conn, &doc) {
        Ok((student_count, payment_count)) => {
            // The restore replaced everything the stores had cached.
            if let Err(e) = students.refetch(conn) {
                return store_err(&req.id, e);
            }
            if let Err(e) = payments.refetch(conn) {
                return store_err(&req.id, e);
            }
            ok(
                &req.id,
                json!({ "students": student_count, "payments": payment_count }),
            )
        }
        Err(e) => err(&req.id, "restore_failed", format!("{e:?}"), None),
    }
}

fn handle_delete_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState {
        db,
        students,
        payments,
        ..
    } = state;
    let Some(conn) = db.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match backup::delete_all(conn) {
        Ok((student_count, payment_count)) => {
            if let Err(e) = students.refetch(conn) {
                return store_err(&req.id, e);
            }
            if let Err(e) = payments.refetch(conn) {
                return store_err(&req.id, e);
            }
            ok(
                &req.id,
                json!({ "students": student_count, "payments": payment_count }),
            )
        }
        Err(e) => err(&req.id, "wipe_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        "data.deleteAll" => Some(handle_delete_all(state, req)),
        _ => None,
    }
}
