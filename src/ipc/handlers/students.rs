use crate::data::{NewStudent, GRADES, TRACKS};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report;
use crate::store::BulkAddPolicy;
use serde_json::json;

use super::{required_f64, required_str, store_err, stores, today};

fn parse_list_args(
    req: &Request,
) -> Result<(report::StudentFilter, report::StudentSort), serde_json::Value> {
    let filter = report::parse_student_filter(req.params.get("filters"))
        .map_err(|e| err(&req.id, &e.code, e.message, None))?;
    let sort = report::parse_student_sort(req.params.get("sortBy"))
        .map_err(|e| err(&req.id, &e.code, e.message, None))?;
    Ok((filter, sort))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, students, _) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = students.ensure_loaded(conn) {
        return store_err(&req.id, e);
    }
    let (filter, sort) = match parse_list_args(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let listed = report::filter_students(students.items(), &filter, sort);
    ok(
        &req.id,
        json!({ "students": listed, "state": students.state().name() }),
    )
}

fn parse_new_student(req: &Request) -> Result<NewStudent, serde_json::Value> {
    Ok(NewStudent {
        name: required_str(req, "name")?,
        grade: required_str(req, "grade")?,
        track: required_str(req, "type")?,
        lesson_fee: required_f64(req, "lessonFee")?,
        date_added: req
            .params
            .get("dateAdded")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(today),
    })
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let fields = match parse_new_student(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (conn, students, _) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = students.ensure_loaded(conn) {
        return store_err(&req.id, e);
    }
    match students.add(conn, &fields) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_create_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw_names) = req.params.get("names").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing names", None);
    };
    let mut names = Vec::with_capacity(raw_names.len());
    for v in raw_names {
        let Some(s) = v.as_str() else {
            return err(&req.id, "bad_params", "names must be strings", None);
        };
        names.push(s.to_string());
    }
    let policy = match req.params.get("onError").and_then(|v| v.as_str()) {
        None | Some("abort") => BulkAddPolicy::AbortOnError,
        Some("continue") => BulkAddPolicy::ContinueOnError,
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                format!("onError must be abort or continue (got {})", other),
                None,
            )
        }
    };
    let grade = match required_str(req, "grade") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let track = match required_str(req, "type") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let lesson_fee = match required_f64(req, "lessonFee") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date_added = req
        .params
        .get("dateAdded")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(today);

    let (conn, students, _) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = students.ensure_loaded(conn) {
        return store_err(&req.id, e);
    }
    let outcome = students.add_bulk(conn, &names, &grade, &track, lesson_fee, &date_added, policy);
    ok(&req.id, json!(outcome))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (conn, students, _) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match students.remove(conn, &id) {
        Ok(()) => ok(&req.id, json!({ "id": id })),
        Err(e) => store_err(&req.id, e),
    }
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, students, _) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = students.ensure_loaded(conn) {
        return store_err(&req.id, e);
    }
    let (filter, sort) = match parse_list_args(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let listed = report::filter_students(students.items(), &filter, sort);
    ok(
        &req.id,
        json!({
            "csv": report::students_csv(&listed),
            "count": listed.len(),
        }),
    )
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (conn, students, _) = match stores(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = students.ensure_loaded(conn) {
        return store_err(&req.id, e);
    }
    let mut by_grade = serde_json::Map::new();
    for g in GRADES {
        let n = students.items().iter().filter(|s| s.grade == g).count();
        by_grade.insert(g.to_string(), json!(n));
    }
    let mut by_track = serde_json::Map::new();
    for t in TRACKS {
        let n = students.items().iter().filter(|s| s.track == t).count();
        by_track.insert(t.to_string(), json!(n));
    }
    ok(
        &req.id,
        json!({
            "total": students.items().len(),
            "byGrade": by_grade,
            "byType": by_track,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.create" => Some(handle_create(state, req)),
        "students.createBulk" => Some(handle_create_bulk(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        "students.exportCsv" => Some(handle_export_csv(state, req)),
        "students.stats" => Some(handle_stats(state, req)),
        _ => None,
    }
}
