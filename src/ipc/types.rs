use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::store::{PaymentStore, StudentStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub students: StudentStore,
    pub payments: PaymentStore,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            students: StudentStore::new(),
            payments: PaymentStore::new(),
        }
    }
}
