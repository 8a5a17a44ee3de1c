//! Staff accounts (teachers and administrators). Only registration and
//! maintenance live here; sessions are the front end's concern.

use crate::error::StorageError;
use crate::store::{text, Record, RowStore};
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

const HASH_SCHEME: &str = "sha256";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Teacher,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "teacher" => Some(Role::Teacher),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub role: Role,
    pub username: String,
    pub created_at: Option<String>,
}

impl Account {
    fn from_record(row: &Record) -> Result<Self, StorageError> {
        let raw_role = row.text("role")?;
        let role = Role::parse(&raw_role).ok_or_else(|| StorageError::Column {
            column: "role".to_string(),
            message: format!("unknown role {raw_role:?}"),
        })?;
        Ok(Self {
            id: row.i64("id")?,
            role,
            username: row.text("username")?,
            created_at: row.opt_text("created_at")?,
        })
    }
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// `sha256$<salt>$<hex digest of salt || password>`
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{HASH_SCHEME}${salt}${}", digest_hex(&salt, password))
}

pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(hex)) => digest_hex(salt, password) == hex,
        _ => false,
    }
}

fn require_credentials(username: &str, password: &str) -> Result<(), StorageError> {
    if username.is_empty() || password.is_empty() {
        return Err(StorageError::InvalidInput(
            "username and password are required".to_string(),
        ));
    }
    Ok(())
}

fn username_taken<S: RowStore>(
    store: &S,
    role: Role,
    username: &str,
    except_id: Option<i64>,
) -> Result<bool, StorageError> {
    Ok(store
        .fetch_one(
            "SELECT id FROM accounts WHERE role = ? AND username = ? AND id != ?",
            &[
                text(role.as_str()),
                text(username),
                Value::Integer(except_id.unwrap_or(-1)),
            ],
        )?
        .is_some())
}

pub fn register_account(
    conn: &Connection,
    role: Role,
    username: &str,
    password: &str,
) -> Result<i64, StorageError> {
    let username = username.trim();
    require_credentials(username, password)?;
    if username_taken(conn, role, username, None)? {
        return Err(StorageError::Conflict(format!(
            "{} {username} already exists",
            role.as_str()
        )));
    }

    conn.execute_sql(
        "INSERT INTO accounts(role, username, password_hash, created_at) VALUES(?, ?, ?, ?)",
        &[
            text(role.as_str()),
            text(username),
            text(&hash_password(password)),
            text(&chrono::Utc::now().to_rfc3339()),
        ],
    )?;
    let id = conn.last_insert_id();
    tracing::info!(account_id = id, role = role.as_str(), username, "account registered");
    Ok(id)
}

pub fn list_accounts<S: RowStore>(
    store: &S,
    role: Option<Role>,
) -> Result<Vec<Account>, StorageError> {
    let rows = match role {
        Some(r) => store.fetch_all(
            "SELECT id, role, username, created_at FROM accounts
             WHERE role = ? ORDER BY username, id",
            &[text(r.as_str())],
        )?,
        None => store.fetch_all(
            "SELECT id, role, username, created_at FROM accounts
             ORDER BY role, username, id",
            &[],
        )?,
    };
    rows.iter().map(Account::from_record).collect()
}

fn load_account<S: RowStore>(store: &S, id: i64) -> Result<(Account, String), StorageError> {
    let row = store
        .fetch_one(
            "SELECT id, role, username, created_at, password_hash FROM accounts WHERE id = ?",
            &[Value::Integer(id)],
        )?
        .ok_or_else(|| StorageError::NotFound(format!("account {id}")))?;
    Ok((Account::from_record(&row)?, row.text("password_hash")?))
}

/// Rename an account and, when `password` is given, reset its password.
pub fn update_account(
    conn: &Connection,
    id: i64,
    username: &str,
    password: Option<&str>,
) -> Result<(), StorageError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(StorageError::InvalidInput("username is required".to_string()));
    }
    let (account, _) = load_account(conn, id)?;
    if username_taken(conn, account.role, username, Some(id))? {
        return Err(StorageError::Conflict(format!(
            "{} {username} already exists",
            account.role.as_str()
        )));
    }

    match password.filter(|p| !p.is_empty()) {
        Some(p) => conn.execute_sql(
            "UPDATE accounts SET username = ?, password_hash = ? WHERE id = ?",
            &[text(username), text(&hash_password(p)), Value::Integer(id)],
        )?,
        None => conn.execute_sql(
            "UPDATE accounts SET username = ? WHERE id = ?",
            &[text(username), Value::Integer(id)],
        )?,
    };
    tracing::info!(account_id = id, username, "account updated");
    Ok(())
}

pub fn change_password(
    conn: &Connection,
    id: i64,
    current: &str,
    new_password: &str,
) -> Result<(), StorageError> {
    if new_password.is_empty() {
        return Err(StorageError::InvalidInput("new password is required".to_string()));
    }
    let (_, stored) = load_account(conn, id)?;
    if !verify_password(&stored, current) {
        tracing::warn!(account_id = id, "password change rejected");
        return Err(StorageError::InvalidInput(
            "current password does not match".to_string(),
        ));
    }
    conn.execute_sql(
        "UPDATE accounts SET password_hash = ? WHERE id = ?",
        &[text(&hash_password(new_password)), Value::Integer(id)],
    )?;
    Ok(())
}

pub fn delete_account(conn: &Connection, id: i64) -> Result<(), StorageError> {
    let removed = conn.execute_sql("DELETE FROM accounts WHERE id = ?", &[Value::Integer(id)])?;
    if removed == 0 {
        return Err(StorageError::NotFound(format!("account {id}")));
    }
    tracing::info!(account_id = id, "account deleted");
    Ok(())
}
