use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Open (creating if needed) the workspace database and make it current.
pub fn select_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    let conn = db::open_db(path)?;
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    tracing::info!(workspace = %path.display(), "workspace opened");
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match select_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => {
            tracing::error!(workspace = %path.display(), error = ?e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
