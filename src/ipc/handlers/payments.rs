use crate::data::{NewPayment, RECIPIENTS};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use serde_json::json;

use super::{required_f64, required_str, store_err, stores, today};

fn parse_filter(req: &Request) -> Result<report::PaymentFilter, serde_json::Value> {
    report::parse_payment_filter(req.params.get("filters"))
        .map_err(|e| err(&req.id, &e.code, e.message, None))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let filter = match parse_filter(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let listed = report::filter_payments(payments.items(), &filter);
    ok(
        &req.id,
        json!({ "payments": listed, "state": payments.state().name() }),
    )
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let fields = NewPayment {
        student_id: match required_str(req, "studentId") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        amount: match required_f64(req, "amount") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        date: match required_str(req, "date") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        recipient: match required_str(req, "recipient") {
            Ok(v) => v,
            Err(resp) => return resp,
        },
    };
    let (conn, _, payments) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match payments.add(conn, &fields) {
        Ok(payment) => ok(&req.id, json!({ "payment": payment })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (conn, _, payments) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match payments.remove(conn, &id) {
        Ok(()) => ok(&req.id, json!({ "id": id })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let filter = match parse_filter(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let listed = report::filter_payments(payments.items(), &filter);
    let per_recipient: Vec<serde_json::Value> = RECIPIENTS
        .iter()
        .map(|r| {
            json!({
                "recipient": r,
                "totalAmount": report::recipient_total(&listed, r),
            })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "totalPayments": listed.len(),
            "totalAmount": report::total_amount(&listed),
            "uniqueStudents": report::unique_students(&listed),
            "perRecipient": per_recipient,
        }),
    )
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let filter = match parse_filter(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let listed = report::filter_payments(payments.items(), &filter);
    ok(
        &req.id,
        json!({
            "csv": report::payments_list_csv(&listed),
            "count": listed.len(),
        }),
    )
}

/// Printable document for the current (possibly filtered) payments
/// list, with the per-recipient split up top.
fn handle_print(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let filter = match parse_filter(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let listed = report::filter_payments(payments.items(), &filter);
    // The headline tile is the amount sum, not the row count.
    let mut lines = vec![(
        "إجمالي المدفوعات".to_string(),
        format!("{} ج.م", report::total_amount(&listed)),
    )];
    for r in RECIPIENTS {
        lines.push((
            format!("مدفوعات {}", r),
            format!("{} ج.م", report::recipient_total(&listed, r)),
        ));
    }
    let html = report::print_document("تقرير المدفوعات", &today(), &lines, &listed);
    ok(&req.id, json!({ "html": html }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.list" => Some(handle_list(state, req)),
        "payments.create" => Some(handle_create(state, req)),
        "payments.delete" => Some(handle_delete(state, req)),
        "payments.stats" => Some(handle_stats(state, req)),
        "payments.exportCsv" => Some(handle_export_csv(state, req)),
        "payments.print" => Some(handle_print(state, req)),
        _ => None,
    }
}
