use crate::data::{Payment, Student, RECIPIENTS};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const PAYMENT_CSV_HEADER: &str = "اسم الطالب,الصف,النوعية,المبلغ,تاريخ الدفع,المستلم";
pub const PAYMENT_LIST_CSV_HEADER: &str = "اسم الطالب,الصف,النوعية,المبلغ,التاريخ,المستلم";
pub const STUDENT_CSV_HEADER: &str = "الاسم,الصف,النوعية,قيمة الدرس,تاريخ الإضافة";

const APP_BANNER: &str = "نظام إدارة الدروس - أ.علاء وأ.إبراهيم";

#[derive(Debug, Clone, Serialize)]
pub struct ReportError {
    pub code: String,
    pub message: String,
}

impl ReportError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// A payment matches iff every populated criterion matches. Dates are
/// validated ISO strings, so plain string comparison is chronological.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    pub query: Option<String>,
    pub grade: Option<String>,
    #[serde(rename = "type")]
    pub track: Option<String>,
    pub recipient: Option<String>,
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl PaymentFilter {
    pub fn matches(&self, p: &Payment) -> bool {
        let query_ok = self
            .query
            .as_ref()
            .map(|q| p.student_name.to_lowercase().contains(&q.to_lowercase()))
            .unwrap_or(true);
        let grade_ok = self.grade.as_ref().map(|g| p.grade == *g).unwrap_or(true);
        let track_ok = self.track.as_ref().map(|t| p.track == *t).unwrap_or(true);
        let recipient_ok = self
            .recipient
            .as_ref()
            .map(|r| p.recipient == *r)
            .unwrap_or(true);
        let date_ok = self.date.as_ref().map(|d| p.date == *d).unwrap_or(true);
        let from_ok = self.from.as_ref().map(|d| p.date >= *d).unwrap_or(true);
        let to_ok = self.to.as_ref().map(|d| p.date <= *d).unwrap_or(true);
        query_ok && grade_ok && track_ok && recipient_ok && date_ok && from_ok && to_ok
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    pub query: Option<String>,
    pub grade: Option<String>,
    #[serde(rename = "type")]
    pub track: Option<String>,
}

impl StudentFilter {
    pub fn matches(&self, s: &Student) -> bool {
        let query_ok = self
            .query
            .as_ref()
            .map(|q| s.name.to_lowercase().contains(&q.to_lowercase()))
            .unwrap_or(true);
        let grade_ok = self.grade.as_ref().map(|g| s.grade == *g).unwrap_or(true);
        let track_ok = self.track.as_ref().map(|t| s.track == *t).unwrap_or(true);
        query_ok && grade_ok && track_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudentSort {
    #[default]
    Name,
    DateAdded,
    Grade,
    Track,
}

/// Filtering preserves source order; only an explicit sort reorders.
pub fn filter_payments(payments: &[Payment], filter: &PaymentFilter) -> Vec<Payment> {
    payments
        .iter()
        .filter(|p| filter.matches(p))
        .cloned()
        .collect()
}

pub fn filter_students(
    students: &[Student],
    filter: &StudentFilter,
    sort: StudentSort,
) -> Vec<Student> {
    let mut out: Vec<Student> = students
        .iter()
        .filter(|s| filter.matches(s))
        .cloned()
        .collect();
    match sort {
        StudentSort::Name => out.sort_by(|a, b| a.name.cmp(&b.name)),
        StudentSort::DateAdded => out.sort_by(|a, b| a.date_added.cmp(&b.date_added)),
        StudentSort::Grade => out.sort_by(|a, b| a.grade.cmp(&b.grade)),
        StudentSort::Track => out.sort_by(|a, b| a.track.cmp(&b.track)),
    }
    out
}

pub fn total_amount(payments: &[Payment]) -> f64 {
    payments.iter().map(|p| p.amount).sum()
}

pub fn unique_students(payments: &[Payment]) -> usize {
    payments
        .iter()
        .map(|p| p.student_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

pub fn average_amount(payments: &[Payment]) -> f64 {
    if payments.is_empty() {
        return 0.0;
    }
    total_amount(payments) / (payments.len() as f64)
}

pub fn recipient_total(payments: &[Payment], recipient: &str) -> f64 {
    payments
        .iter()
        .filter(|p| p.recipient == recipient)
        .map(|p| p.amount)
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportSelection {
    Student { student_id: String },
    Grade { grade: String },
    Track { track: String },
    Recipient { recipient: String },
    DateRange { start: String, end: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecipientTotal {
    pub recipient: String,
    pub total_amount: f64,
}

/// One variant per report mode, each with its own fixed summary shape.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ReportSummary {
    #[serde(rename = "student", rename_all = "camelCase")]
    Student {
        total_payments: usize,
        total_amount: f64,
        average_payment: f64,
    },
    #[serde(rename = "grade", rename_all = "camelCase")]
    Grade {
        total_students: usize,
        students_with_payments: usize,
        total_payments: usize,
        total_amount: f64,
    },
    #[serde(rename = "type", rename_all = "camelCase")]
    Track {
        total_students: usize,
        students_with_payments: usize,
        total_payments: usize,
        total_amount: f64,
    },
    #[serde(rename = "recipient", rename_all = "camelCase")]
    Recipient {
        total_payments: usize,
        total_amount: f64,
        unique_students: usize,
    },
    #[serde(rename = "date", rename_all = "camelCase")]
    DateRange {
        total_payments: usize,
        total_amount: f64,
        unique_students: usize,
        per_recipient: Vec<RecipientTotal>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportModel {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ReportSummary>,
    pub dataset: Vec<Payment>,
}

impl ReportModel {
    /// The "nothing selected yet" state.
    pub fn empty() -> Self {
        Self {
            title: String::new(),
            summary: None,
            dataset: Vec::new(),
        }
    }
}

pub fn compose_report(
    students: &[Student],
    payments: &[Payment],
    selection: &ReportSelection,
) -> ReportModel {
    match selection {
        ReportSelection::Student { student_id } => {
            let dataset: Vec<Payment> = payments
                .iter()
                .filter(|p| p.student_id == *student_id)
                .cloned()
                .collect();
            let name = students
                .iter()
                .find(|s| s.id == *student_id)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            let summary = ReportSummary::Student {
                total_payments: dataset.len(),
                total_amount: total_amount(&dataset),
                average_payment: average_amount(&dataset),
            };
            ReportModel {
                title: format!("تقرير الطالب: {}", name),
                summary: Some(summary),
                dataset,
            }
        }
        ReportSelection::Grade { grade } => {
            let dataset = filter_payments(
                payments,
                &PaymentFilter {
                    grade: Some(grade.clone()),
                    ..Default::default()
                },
            );
            let summary = ReportSummary::Grade {
                total_students: students.iter().filter(|s| s.grade == *grade).count(),
                students_with_payments: unique_students(&dataset),
                total_payments: dataset.len(),
                total_amount: total_amount(&dataset),
            };
            ReportModel {
                title: format!("تقرير الصف {}", grade),
                summary: Some(summary),
                dataset,
            }
        }
        ReportSelection::Track { track } => {
            let dataset = filter_payments(
                payments,
                &PaymentFilter {
                    track: Some(track.clone()),
                    ..Default::default()
                },
            );
            let summary = ReportSummary::Track {
                total_students: students.iter().filter(|s| s.track == *track).count(),
                students_with_payments: unique_students(&dataset),
                total_payments: dataset.len(),
                total_amount: total_amount(&dataset),
            };
            ReportModel {
                title: format!("تقرير {}", track),
                summary: Some(summary),
                dataset,
            }
        }
        ReportSelection::Recipient { recipient } => {
            let dataset = filter_payments(
                payments,
                &PaymentFilter {
                    recipient: Some(recipient.clone()),
                    ..Default::default()
                },
            );
            let summary = ReportSummary::Recipient {
                total_payments: dataset.len(),
                total_amount: total_amount(&dataset),
                unique_students: unique_students(&dataset),
            };
            ReportModel {
                title: format!("تقرير {}", recipient),
                summary: Some(summary),
                dataset,
            }
        }
        ReportSelection::DateRange { start, end } => {
            let dataset = filter_payments(
                payments,
                &PaymentFilter {
                    from: Some(start.clone()),
                    to: Some(end.clone()),
                    ..Default::default()
                },
            );
            let per_recipient = RECIPIENTS
                .iter()
                .map(|r| RecipientTotal {
                    recipient: r.to_string(),
                    total_amount: recipient_total(&dataset, r),
                })
                .collect();
            let summary = ReportSummary::DateRange {
                total_payments: dataset.len(),
                total_amount: total_amount(&dataset),
                unique_students: unique_students(&dataset),
                per_recipient,
            };
            ReportModel {
                title: format!("تقرير الفترة من {} إلى {}", start, end),
                summary: Some(summary),
                dataset,
            }
        }
    }
}

fn fmt_number(v: f64) -> String {
    format!("{}", v)
}

fn payment_csv_row(p: &Payment) -> String {
    format!(
        "{},{},{},{},{},{}",
        p.student_name,
        p.grade,
        p.track,
        fmt_number(p.amount),
        p.date,
        p.recipient
    )
}

/// Raw comma-joined fields, no quoting: embedded commas would corrupt
/// a row. Kept for parity with the app's existing exports.
pub fn payments_csv(payments: &[Payment]) -> String {
    let mut out = String::from(PAYMENT_CSV_HEADER);
    for p in payments {
        out.push('\n');
        out.push_str(&payment_csv_row(p));
    }
    out
}

/// The payments-page export; same rows, but the date column is headed
/// "التاريخ" there rather than "تاريخ الدفع".
pub fn payments_list_csv(payments: &[Payment]) -> String {
    let mut out = String::from(PAYMENT_LIST_CSV_HEADER);
    for p in payments {
        out.push('\n');
        out.push_str(&payment_csv_row(p));
    }
    out
}

pub fn students_csv(students: &[Student]) -> String {
    let mut out = String::from(STUDENT_CSV_HEADER);
    for s in students {
        out.push('\n');
        out.push_str(&format!(
            "{},{},{},{},{}",
            s.name,
            s.grade,
            s.track,
            fmt_number(s.lesson_fee),
            s.date_added
        ));
    }
    out
}

/// The downloadable report document: title and report-date lines above
/// the plain payments table.
pub fn report_csv(report: &ReportModel, report_date: &str) -> String {
    format!(
        "{}\nتاريخ التقرير,{}\n\n{}",
        report.title,
        report_date,
        payments_csv(&report.dataset)
    )
}

/// Labeled summary tiles in display order, with the currency suffix
/// where the app shows one.
pub fn summary_lines(summary: &ReportSummary) -> Vec<(String, String)> {
    match summary {
        ReportSummary::Student {
            total_payments,
            total_amount,
            average_payment,
        } => vec![
            ("إجمالي المدفوعات".to_string(), total_payments.to_string()),
            ("إجمالي المبلغ".to_string(), format!("{} ج.م", fmt_number(*total_amount))),
            ("متوسط الدفعة".to_string(), fmt_number(*average_payment)),
        ],
        ReportSummary::Grade {
            total_students,
            students_with_payments,
            total_payments,
            total_amount,
        }
        | ReportSummary::Track {
            total_students,
            students_with_payments,
            total_payments,
            total_amount,
        } => vec![
            ("إجمالي الطلاب".to_string(), total_students.to_string()),
            ("الطلاب الذين دفعوا".to_string(), students_with_payments.to_string()),
            ("إجمالي المدفوعات".to_string(), total_payments.to_string()),
            ("إجمالي المبلغ".to_string(), format!("{} ج.م", fmt_number(*total_amount))),
        ],
        ReportSummary::Recipient {
            total_payments,
            total_amount,
            unique_students,
        } => vec![
            ("إجمالي المدفوعات".to_string(), total_payments.to_string()),
            ("إجمالي المبلغ".to_string(), format!("{} ج.م", fmt_number(*total_amount))),
            ("عدد الطلاب".to_string(), unique_students.to_string()),
        ],
        ReportSummary::DateRange {
            total_payments,
            total_amount,
            unique_students,
            per_recipient,
        } => {
            let mut lines = vec![
                ("إجمالي المدفوعات".to_string(), total_payments.to_string()),
                ("إجمالي المبلغ".to_string(), format!("{} ج.م", fmt_number(*total_amount))),
                ("عدد الطلاب".to_string(), unique_students.to_string()),
            ];
            for rt in per_recipient {
                lines.push((
                    format!("مدفوعات {}", rt.recipient),
                    format!("{} ج.م", fmt_number(rt.total_amount)),
                ));
            }
            lines
        }
    }
}

/// RTL print document handed to the shell for browser printing.
pub fn print_document(
    title: &str,
    report_date: &str,
    summary: &[(String, String)],
    payments: &[Payment],
) -> String {
    let mut out = String::new();
    out.push_str("<html dir=\"rtl\">\n<head>\n");
    out.push_str(&format!("<title>{}</title>\n", title));
    out.push_str("<style>body { font-family: Arial, sans-serif; margin: 20px; } table { width: 100%; border-collapse: collapse; margin-top: 20px; } th, td { border: 1px solid #ddd; padding: 8px; text-align: right; } th { background-color: #f2f2f2; }</style>\n");
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!(
        "<div class=\"header\"><h1>{}</h1><p>{}</p><p>تاريخ التقرير: {}</p></div>\n",
        title, APP_BANNER, report_date
    ));
    out.push_str("<div class=\"summary\">\n<h3>ملخص التقرير</h3>\n");
    for (label, value) in summary {
        out.push_str(&format!(
            "<div class=\"summary-item\"><strong>{}:</strong> {}</div>\n",
            label, value
        ));
    }
    out.push_str("</div>\n<table>\n<thead><tr><th>اسم الطالب</th><th>الصف</th><th>النوعية</th><th>المبلغ</th><th>تاريخ الدفع</th><th>المستلم</th></tr></thead>\n<tbody>\n");
    for p in payments {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{} ج.م</td><td>{}</td><td>{}</td></tr>\n",
            p.student_name,
            p.grade,
            p.track,
            fmt_number(p.amount),
            p.date,
            p.recipient
        ));
    }
    out.push_str("</tbody>\n</table>\n");
    out.push_str("<div class=\"footer\"><p>هذا التقرير تم إنشاؤه تلقائياً من نظام إدارة الدروس</p></div>\n");
    out.push_str("</body>\n</html>\n");
    out
}

pub fn report_print_document(report: &ReportModel, report_date: &str) -> String {
    let lines = report
        .summary
        .as_ref()
        .map(|s| summary_lines(s))
        .unwrap_or_default();
    print_document(&report.title, report_date, &lines, &report.dataset)
}

fn opt_str(raw: Option<&serde_json::Value>, key: &str) -> Result<Option<String>, ReportError> {
    match raw.and_then(|v| v.get(key)) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(ReportError::new(
                    "bad_params",
                    format!("filters.{} must be a string or null", key),
                ));
            };
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
    }
}

fn opt_date(raw: Option<&serde_json::Value>, key: &str) -> Result<Option<String>, ReportError> {
    let Some(s) = opt_str(raw, key)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
        ReportError::new(
            "bad_params",
            format!("filters.{} must be an ISO date (YYYY-MM-DD)", key),
        )
    })?;
    Ok(Some(s))
}

pub fn parse_payment_filter(
    raw: Option<&serde_json::Value>,
) -> Result<PaymentFilter, ReportError> {
    let Some(raw) = raw else {
        return Ok(PaymentFilter::default());
    };
    if !raw.is_object() {
        return Err(ReportError::new("bad_params", "filters must be an object"));
    }
    Ok(PaymentFilter {
        query: opt_str(Some(raw), "query")?,
        grade: opt_str(Some(raw), "grade")?,
        track: opt_str(Some(raw), "type")?,
        recipient: opt_str(Some(raw), "recipient")?,
        date: opt_date(Some(raw), "date")?,
        from: opt_date(Some(raw), "from")?,
        to: opt_date(Some(raw), "to")?,
    })
}

pub fn parse_student_filter(
    raw: Option<&serde_json::Value>,
) -> Result<StudentFilter, ReportError> {
    let Some(raw) = raw else {
        return Ok(StudentFilter::default());
    };
    if !raw.is_object() {
        return Err(ReportError::new("bad_params", "filters must be an object"));
    }
    Ok(StudentFilter {
        query: opt_str(Some(raw), "query")?,
        grade: opt_str(Some(raw), "grade")?,
        track: opt_str(Some(raw), "type")?,
    })
}

pub fn parse_student_sort(raw: Option<&serde_json::Value>) -> Result<StudentSort, ReportError> {
    let Some(v) = raw else {
        return Ok(StudentSort::Name);
    };
    if v.is_null() {
        return Ok(StudentSort::Name);
    }
    let Some(s) = v.as_str() else {
        return Err(ReportError::new("bad_params", "sortBy must be a string"));
    };
    match s {
        "name" => Ok(StudentSort::Name),
        "dateAdded" => Ok(StudentSort::DateAdded),
        "grade" => Ok(StudentSort::Grade),
        "type" => Ok(StudentSort::Track),
        other => Err(ReportError::new(
            "bad_params",
            format!("sortBy must be one of: name, dateAdded, grade, type (got {})", other),
        )),
    }
}

/// Resolves the report mode and its selectors. A recognized mode with
/// an unpopulated selector is the "nothing selected yet" state and
/// yields `None`.
pub fn parse_selection(
    params: &serde_json::Value,
) -> Result<Option<ReportSelection>, ReportError> {
    let Some(mode) = params.get("mode").and_then(|v| v.as_str()) else {
        return Err(ReportError::new("bad_params", "missing mode"));
    };
    match mode {
        "student" => Ok(opt_str(Some(params), "studentId")?
            .map(|student_id| ReportSelection::Student { student_id })),
        "grade" => Ok(opt_str(Some(params), "grade")?.map(|grade| ReportSelection::Grade { grade })),
        "type" => Ok(opt_str(Some(params), "type")?.map(|track| ReportSelection::Track { track })),
        "recipient" => Ok(opt_str(Some(params), "recipient")?
            .map(|recipient| ReportSelection::Recipient { recipient })),
        "date" => {
            let start = opt_date(Some(params), "startDate")?;
            let end = opt_date(Some(params), "endDate")?;
            match (start, end) {
                (Some(start), Some(end)) => Ok(Some(ReportSelection::DateRange { start, end })),
                _ => Ok(None),
            }
        }
        other => Err(ReportError::new(
            "bad_params",
            format!("mode must be one of: student, grade, type, recipient, date (got {})", other),
        )),
    }
}
