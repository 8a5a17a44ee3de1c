use crate::error::StorageError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StorageError> for HandlerErr {
    fn from(e: StorageError) -> Self {
        if matches!(e, StorageError::Sqlite(_) | StorageError::Column { .. }) {
            tracing::error!(error = %e, "storage failure");
        }
        Self {
            code: e.code(),
            message: e.to_string(),
            details: None,
        }
    }
}

pub type HandlerFn = fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>;

/// Run a handler against the open workspace and wrap its result.
pub fn dispatch(state: &mut AppState, req: &Request, handler: HandlerFn) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match handler(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn required_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn optional_str<'a>(params: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Integer param; numeric strings are accepted since form posts send text.
pub fn optional_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Some)
            .ok_or_else(|| HandlerErr {
                code: "bad_params",
                message: format!("{key} must be an integer"),
                details: Some(json!({ "param": key, "value": v })),
            }),
    }
}

pub fn required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    optional_i64(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {key}")))
}

pub fn required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    let Some(v) = params.get(key).filter(|v| !v.is_null()) else {
        return Err(HandlerErr::bad_params(format!("missing {key}")));
    };
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("{key} must be a number"),
            details: Some(json!({ "param": key, "value": v })),
        })
}

pub fn required_ids(params: &serde_json::Value, key: &str) -> Result<Vec<i64>, HandlerErr> {
    let Some(arr) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params(format!("missing {key}")));
    };
    arr.iter()
        .map(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| HandlerErr::bad_params(format!("{key} must contain integer ids")))
        })
        .collect()
}
