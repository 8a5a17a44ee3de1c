use crate::accounts::{self, Role};
use crate::ipc::helpers::{dispatch, optional_str, required_i64, required_str, HandlerErr, HandlerFn};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn parse_role(raw: &str) -> Result<Role, HandlerErr> {
    Role::parse(raw).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: "role must be one of: teacher, admin".to_string(),
        details: Some(json!({ "role": raw })),
    })
}

fn handle_register(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role = parse_role(required_str(params, "role")?)?;
    let username = required_str(params, "username")?;
    let password = required_str(params, "password")?;
    let account_id = accounts::register_account(conn, role, username, password)?;
    Ok(json!({ "accountId": account_id }))
}

fn handle_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let role = optional_str(params, "role").map(parse_role).transpose()?;
    Ok(json!({ "accounts": accounts::list_accounts(conn, role)? }))
}

fn handle_update(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let account_id = required_i64(params, "accountId")?;
    let username = required_str(params, "username")?;
    let password = optional_str(params, "password");
    accounts::update_account(conn, account_id, username, password)?;
    Ok(json!({ "accountId": account_id }))
}

fn handle_change_password(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let account_id = required_i64(params, "accountId")?;
    let current = required_str(params, "currentPassword")?;
    let new_password = required_str(params, "newPassword")?;
    accounts::change_password(conn, account_id, current, new_password)?;
    Ok(json!({ "accountId": account_id }))
}

fn handle_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let account_id = required_i64(params, "accountId")?;
    accounts::delete_account(conn, account_id)?;
    Ok(json!({ "accountId": account_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: HandlerFn = match req.method.as_str() {
        "accounts.register" => handle_register,
        "accounts.list" => handle_list,
        "accounts.update" => handle_update,
        "accounts.changePassword" => handle_change_password,
        "accounts.delete" => handle_delete,
        _ => return None,
    };
    Some(dispatch(state, req, handler))
}
