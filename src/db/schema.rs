use serde::{Deserialize, Serialize};

use crate::store::{UserAuth, UserRecord};
use crate::types::{AuthModule, AuthSubject, UserId};

/// Persisted representation of a user in SurrealDB (table: `user`).
///
/// The record id is `user:<uid>`; rows are read back by their `uid` field so
/// the record id itself never needs decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub uid: UserId,
    pub login: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub is_admin: bool,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.uid,
            login: row.login,
            name: row.name,
            email: row.email,
            email_verified: row.email_verified,
            is_disabled: row.is_disabled,
            is_admin: row.is_admin,
        }
    }
}

/// Persisted auth association (table: `user_auth`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuthRow {
    pub auth_module: String,
    pub auth_id: String,
    pub user_id: UserId,
}

impl From<UserAuthRow> for UserAuth {
    fn from(row: UserAuthRow) -> Self {
        Self {
            auth_module: AuthModule::new(row.auth_module),
            auth_id: AuthSubject::new(row.auth_id),
            user_id: row.user_id,
        }
    }
}

/// Single aggregate row of a `count()` query.
#[derive(Debug, Clone, Deserialize)]
pub struct CountRow {
    pub total: u64,
}
