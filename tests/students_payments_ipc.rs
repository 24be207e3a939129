use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_lessonledgerd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lessonledgerd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

#[test]
fn students_and_payments_full_flow() {
    let workspace = temp_dir("lessonledger-flow");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Fresh workspace: students list is ready and empty, payments stay
    // uninitialized until a student exists.
    let res = request_ok(&mut stdin, &mut reader, "2", "students.list", json!({}));
    assert_eq!(res["students"].as_array().expect("students").len(), 0);
    assert_eq!(res["state"].as_str(), Some("ready"));

    let res = request_ok(&mut stdin, &mut reader, "3", "payments.list", json!({}));
    assert_eq!(res["payments"].as_array().expect("payments").len(), 0);
    assert_eq!(res["state"].as_str(), Some("uninitialized"));

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({
            "name": "علي حسن",
            "grade": "الأول",
            "type": "جدارات عام",
            "lessonFee": 100,
            "dateAdded": "2025-01-10",
        }),
    );
    let student = &res["student"];
    let student_id = student["id"].as_str().expect("student id").to_string();
    assert_eq!(student["name"].as_str(), Some("علي حسن"));
    assert_eq!(student["type"].as_str(), Some("جدارات عام"));
    assert_eq!(student["lessonFee"].as_f64(), Some(100.0));

    // Validation failures leave the list alone.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({
            "name": "  ",
            "grade": "الأول",
            "type": "جدارات عام",
            "lessonFee": 100,
        }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "students.create",
        json!({
            "name": "بدر",
            "grade": "الرابع",
            "type": "جدارات عام",
            "lessonFee": 100,
        }),
    );
    assert_eq!(code, "bad_params");
    let res = request_ok(&mut stdin, &mut reader, "7", "students.list", json!({}));
    assert_eq!(res["students"].as_array().expect("students").len(), 1);

    // Payment snapshots the student fields at creation time.
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "payments.create",
        json!({
            "studentId": student_id,
            "amount": 150,
            "date": "2025-02-01",
            "recipient": "أ.علاء",
        }),
    );
    let payment = &res["payment"];
    let payment_id = payment["id"].as_str().expect("payment id").to_string();
    assert_eq!(payment["studentId"].as_str(), Some(student_id.as_str()));
    assert_eq!(payment["studentName"].as_str(), Some("علي حسن"));
    assert_eq!(payment["grade"].as_str(), Some("الأول"));
    assert_eq!(payment["type"].as_str(), Some("جدارات عام"));
    assert_eq!(payment["recipient"].as_str(), Some("أ.علاء"));

    let res = request_ok(&mut stdin, &mut reader, "9", "payments.list", json!({}));
    assert_eq!(res["payments"].as_array().expect("payments").len(), 1);
    assert_eq!(res["state"].as_str(), Some("ready"));

    // Unknown student or bad fields are rejected.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "payments.create",
        json!({
            "studentId": "9999",
            "amount": 50,
            "date": "2025-02-01",
            "recipient": "أ.علاء",
        }),
    );
    assert_eq!(code, "not_found");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "payments.create",
        json!({
            "studentId": student_id,
            "amount": 0,
            "date": "2025-02-01",
            "recipient": "أ.علاء",
        }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "12",
        "payments.create",
        json!({
            "studentId": student_id,
            "amount": 50,
            "date": "2025-02-01",
            "recipient": "أ.سمير",
        }),
    );
    assert_eq!(code, "bad_params");

    // A student with payments cannot be deleted; drop the payment first.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "13",
        "students.delete",
        json!({ "id": student_id }),
    );
    assert_eq!(code, "db_query_failed");
    request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "payments.delete",
        json!({ "id": payment_id }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "students.delete",
        json!({ "id": student_id }),
    );
    let res = request_ok(&mut stdin, &mut reader, "16", "students.list", json!({}));
    assert_eq!(res["students"].as_array().expect("students").len(), 0);
}

#[test]
fn payment_filters_and_stats() {
    let workspace = temp_dir("lessonledger-filters");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let mut ids = Vec::new();
    for (i, (name, grade)) in [("علي", "الأول"), ("سعيد", "الثاني")].into_iter().enumerate() {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({
                "name": name,
                "grade": grade,
                "type": "جدارات عام",
                "lessonFee": 50,
                "dateAdded": "2025-01-01",
            }),
        );
        ids.push(res["student"]["id"].as_str().expect("id").to_string());
    }

    let seed = [
        (&ids[0], 100.0, "2025-01-10", "أ.علاء"),
        (&ids[0], 50.0, "2025-01-20", "أ.إبراهيم"),
        (&ids[1], 200.0, "2025-02-05", "أ.علاء"),
    ];
    for (i, (sid, amount, date, recipient)) in seed.into_iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("p{}", i),
            "payments.create",
            json!({
                "studentId": sid,
                "amount": amount,
                "date": date,
                "recipient": recipient,
            }),
        );
    }

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "f1",
        "payments.list",
        json!({ "filters": { "recipient": "أ.علاء" } }),
    );
    assert_eq!(res["payments"].as_array().expect("payments").len(), 2);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "f2",
        "payments.list",
        json!({ "filters": { "from": "2025-01-01", "to": "2025-01-31" } }),
    );
    assert_eq!(res["payments"].as_array().expect("payments").len(), 2);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "f3",
        "payments.list",
        json!({ "filters": { "query": "سعيد" } }),
    );
    let listed = res["payments"].as_array().expect("payments");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["amount"].as_f64(), Some(200.0));

    let res = request_ok(&mut stdin, &mut reader, "f4", "payments.stats", json!({}));
    assert_eq!(res["totalPayments"].as_u64(), Some(3));
    assert_eq!(res["totalAmount"].as_f64(), Some(350.0));
    assert_eq!(res["uniqueStudents"].as_u64(), Some(2));
    let per = res["perRecipient"].as_array().expect("perRecipient");
    let split: f64 = per.iter().map(|r| r["totalAmount"].as_f64().unwrap()).sum();
    assert_eq!(split, 350.0);

    let res = request_ok(&mut stdin, &mut reader, "f5", "overview.stats", json!({}));
    assert_eq!(res["totalStudents"].as_u64(), Some(2));
    assert_eq!(res["totalPayments"].as_u64(), Some(3));
    assert_eq!(res["totalAmount"].as_f64(), Some(350.0));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "f6",
        "payments.list",
        json!({ "filters": { "date": "10/01/2025" } }),
    );
    assert_eq!(code, "bad_params");

    let res = request_ok(&mut stdin, &mut reader, "f7", "payments.print", json!({}));
    let html = res["html"].as_str().expect("html");
    assert!(html.contains("تقرير المدفوعات"));
    // The headline tile is the amount sum in currency, not a count.
    assert!(html.contains("<strong>إجمالي المدفوعات:</strong> 350 ج.م"));
    assert!(html.contains("مدفوعات أ.علاء"));
    assert!(html.contains("سعيد"));

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "f8",
        "payments.exportCsv",
        json!({ "filters": { "recipient": "أ.علاء" } }),
    );
    assert_eq!(res["count"].as_u64(), Some(2));
    let csv = res["csv"].as_str().expect("csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "اسم الطالب,الصف,النوعية,المبلغ,التاريخ,المستلم");
    assert!(lines[1].ends_with(",أ.علاء"));
}

#[test]
fn student_listing_export_and_stats() {
    let workspace = temp_dir("lessonledger-students-export");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let seed = [
        ("يوسف", "الثالث", "معهد فني صناعي", "2025-02-01"),
        ("أحمد", "الأول", "جدارات عام", "2025-01-01"),
        ("سعيد", "الأول", "تعليم مزدوج", "2025-03-01"),
    ];
    for (i, (name, grade, track, date)) in seed.into_iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({
                "name": name,
                "grade": grade,
                "type": track,
                "lessonFee": 60,
                "dateAdded": date,
            }),
        );
    }

    // Default listing is sorted by name, ascending.
    let res = request_ok(&mut stdin, &mut reader, "l1", "students.list", json!({}));
    let names: Vec<&str> = res["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["أحمد", "سعيد", "يوسف"]);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "l2",
        "students.list",
        json!({ "sortBy": "dateAdded" }),
    );
    let names: Vec<&str> = res["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["أحمد", "يوسف", "سعيد"]);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "l3",
        "students.list",
        json!({ "filters": { "grade": "الأول" } }),
    );
    assert_eq!(res["students"].as_array().expect("students").len(), 2);

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "students.exportCsv",
        json!({ "filters": { "grade": "الأول" } }),
    );
    assert_eq!(res["count"].as_u64(), Some(2));
    let csv = res["csv"].as_str().expect("csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "الاسم,الصف,النوعية,قيمة الدرس,تاريخ الإضافة");
    assert!(lines[1].starts_with("أحمد,الأول,"));

    let res = request_ok(&mut stdin, &mut reader, "t1", "students.stats", json!({}));
    assert_eq!(res["total"].as_u64(), Some(3));
    assert_eq!(res["byGrade"]["الأول"].as_u64(), Some(2));
    assert_eq!(res["byGrade"]["الثالث"].as_u64(), Some(1));
    assert_eq!(res["byType"]["تعليم مزدوج"].as_u64(), Some(1));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "l4",
        "students.list",
        json!({ "sortBy": "fee" }),
    );
    assert_eq!(code, "bad_params");
}
