mod backup;
mod data;
mod db;
mod ipc;
mod report;
mod store;

use std::io::{self, BufRead, Write};

fn main() {
    let mut state = ipc::AppState::new();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<ipc::Request>(trimmed) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // A line that never parsed has no id to echo back.
            Err(e) => serde_json::json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() },
            }),
        };

        let encoded = serde_json::to_string(&reply)
            .unwrap_or_else(|_| "{\"ok\":false}".to_string());
        if writeln!(out, "{}", encoded).is_err() {
            break;
        }
        let _ = out.flush();
    }
}
