use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

/// How much of each exchange the traffic log keeps.
pub enum TrafficLogMode {
    /// Request and response bodies included.
    Full,
    /// Method, path and status only, for requests, commands and responses alike.
    Summary,
}

/// NDJSON record of portal traffic, one object per line.
pub(crate) struct TrafficLog {
    mode: TrafficLogMode,
    file: File,
}

impl TrafficLog {
    pub fn new(mode: TrafficLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self { mode, file })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Map<String, Value>>) {
        let body = match self.mode {
            TrafficLogMode::Full => body,
            TrafficLogMode::Summary => None,
        };
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    /// Marks a control submission; the changeset itself is the body of the following request.
    pub fn log_command(&mut self, device_id: u64) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "device": device_id,
        });
        self.write_line(&entry);
    }

    pub fn log_response(&mut self, status: u16, url: &str, body: &str) {
        let entry = match self.mode {
            TrafficLogMode::Full => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "status": status,
                "url": url,
                "body": body,
            }),
            TrafficLogMode::Summary => json!({
                "ts": Utc::now().to_rfc3339(),
                "dir": "resp",
                "status": status,
                "url": url,
            }),
        };
        self.write_line(&entry);
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write traffic log entry: {e}");
        }
    }
}

/// Runs `f` against the log when one is configured.
pub(crate) fn record(traffic: Option<&Mutex<TrafficLog>>, f: impl FnOnce(&mut TrafficLog)) {
    if let Some(log) = traffic {
        let mut guard = log.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
