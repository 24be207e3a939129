use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;

use super::{store_err, stores, today};

/// Every report method starts the same way: load both lists, resolve
/// the selection, compose. An unpopulated selection composes the empty
/// model rather than erroring.
fn build_model(state: &mut AppState, req: &Request) -> Result<report::ReportModel, serde_json::Value> {
    let (conn, students, payments) = stores(state, req)?;
    students
        .ensure_loaded(conn)
        .map_err(|e| store_err(&req.id, e))?;
    payments
        .ensure_loaded(conn, students)
        .map_err(|e| store_err(&req.id, e))?;
    let selection = report::parse_selection(&req.params)
        .map_err(|e| err(&req.id, &e.code, e.message, None))?;
    Ok(match selection {
        Some(sel) => report::compose_report(students.items(), payments.items(), &sel),
        None => report::ReportModel::empty(),
    })
}

fn handle_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_model(state, req) {
        Ok(model) => ok(&req.id, json!({ "report": model })),
        Err(resp) => resp,
    }
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_model(state, req) {
        Ok(model) => {
            let csv = report::report_csv(&model, &today());
            ok(&req.id, json!({ "csv": csv, "title": model.title }))
        }
        Err(resp) => resp,
    }
}

fn handle_print(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_model(state, req) {
        Ok(model) => {
            let html = report::report_print_document(&model, &today());
            ok(&req.id, json!({ "html": html, "title": model.title }))
        }
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.model" => Some(handle_model(state, req)),
        "reports.exportCsv" => Some(handle_export_csv(state, req)),
        "reports.print" => Some(handle_print(state, req)),
        _ => None,
    }
}
