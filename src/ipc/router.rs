use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::accounts::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::courses::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::grades::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::duplicates::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
