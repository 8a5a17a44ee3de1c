use crate::duplicates::{self, IdentityGroup};
use crate::ipc::helpers::{dispatch, required_ids, required_str, HandlerErr, HandlerFn};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn parse_group(params: &serde_json::Value) -> Result<IdentityGroup, HandlerErr> {
    let raw = required_str(params, "group")?;
    IdentityGroup::parse(raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: "group must be one of: courses, grades".to_string(),
        details: Some(json!({ "group": raw })),
    })
}

fn handle_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let group = parse_group(params)?;
    let rows = duplicates::list_duplicate_groups(conn, group)?;
    let redundant = rows.iter().filter(|r| !r.is_canonical()).count();
    Ok(json!({
        "group": group.as_str(),
        "rows": rows,
        "redundantCount": redundant,
    }))
}

fn handle_resolve(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let group = parse_group(params)?;
    let removed = duplicates::resolve_duplicates(conn, group)?;
    Ok(json!({ "group": group.as_str(), "removed": removed }))
}

fn handle_delete_selected(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let group = parse_group(params)?;
    let ids = required_ids(params, "ids")?;
    let removed = duplicates::delete_selected(conn, group, &ids)?;
    Ok(json!({ "group": group.as_str(), "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: HandlerFn = match req.method.as_str() {
        "duplicates.list" => handle_list,
        "duplicates.resolve" => handle_resolve,
        "duplicates.deleteSelected" => handle_delete_selected,
        _ => return None,
    };
    Some(dispatch(state, req, handler))
}
