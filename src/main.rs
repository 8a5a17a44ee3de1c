mod accounts;
mod courses;
mod db;
mod duplicates;
mod error;
mod grades;
mod history;
mod ipc;
mod store;
mod students;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const LOG_ENV: &str = "RECORDSD_LOG";
const WORKSPACE_ENV: &str = "RECORDSD_WORKSPACE";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    // stdout carries IPC responses; logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    let mut state = ipc::AppState::default();

    if let Some(path) = std::env::var_os(WORKSPACE_ENV).map(PathBuf::from) {
        if let Err(e) = ipc::select_workspace(&mut state, &path) {
            tracing::error!(workspace = %path.display(), error = ?e, "startup workspace failed to open");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request");
                // Can't reply without id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
