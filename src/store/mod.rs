//! Collaborator interfaces consumed by the sync hooks.
//!
//! The user store, the auth association store, the quota gate and the user
//! protection policy are all owned elsewhere. The sync core only sees these
//! traits, so any backend (the SurrealDB adapters in [`crate::db`], a test
//! fake, a remote service client) can be plugged in.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::types::{AuthModule, AuthSubject, UserId};

mod protection;

pub use protection::{AllowAllProtection, StaticUserProtection};

/// Boxed future returned by every store call.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a collaborator store.
///
/// A lookup that finds nothing is not an error; it returns `Ok(None)`.
#[derive(Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    Conflict(String),
    /// A write targeted a record that does not exist.
    NotFound(String),
    /// Any other backend failure.
    Backend(anyhow::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(msg) => write!(f, "Conflicting record: {}", msg),
            Self::NotFound(what) => write!(f, "Record not found: {}", what),
            Self::Backend(err) => write!(f, "Store error: {}", err),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Backend(err)
    }
}

/// Persisted user as seen by the sync core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub login: String,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub is_disabled: bool,
    pub is_admin: bool,
}

/// Fields for a user about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub login: String,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    pub is_disabled: bool,
    pub is_admin: bool,
}

/// Minimal diff to apply to a stored user. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge this diff into `user`.
    pub fn apply(&self, user: &mut UserRecord) {
        if let Some(login) = &self.login {
            user.login = login.clone();
        }
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(verified) = self.email_verified {
            user.email_verified = verified;
        }
        if let Some(disabled) = self.is_disabled {
            user.is_disabled = disabled;
        }
        if let Some(admin) = self.is_admin {
            user.is_admin = admin;
        }
    }
}

/// Link between an external subject and an internal user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuth {
    pub auth_module: AuthModule,
    pub auth_id: AuthSubject,
    pub user_id: UserId,
}

/// Persistent user records keyed by numeric id.
pub trait UserService: Send + Sync {
    fn get_by_id(&self, id: UserId) -> StoreFuture<'_, Option<UserRecord>>;

    fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<UserRecord>>;

    fn get_by_login<'a>(&'a self, login: &'a str) -> StoreFuture<'a, Option<UserRecord>>;

    /// Create a user. Fails with [`StoreError::Conflict`] when the login or
    /// email is already taken.
    fn create<'a>(&'a self, user: &'a NewUser) -> StoreFuture<'a, UserRecord>;

    fn update<'a>(&'a self, id: UserId, update: &'a UserUpdate) -> StoreFuture<'a, ()>;

    /// Overwrite the disabled flag. Setting the current value again succeeds.
    fn set_disabled(&self, id: UserId, disabled: bool) -> StoreFuture<'_, ()>;

    /// Look a user up by email, then by login. Empty keys are skipped.
    fn find_by_email_or_login<'a>(
        &'a self,
        email: Option<&'a str>,
        login: Option<&'a str>,
    ) -> StoreFuture<'a, Option<UserRecord>> {
        Box::pin(async move {
            if let Some(email) = email.filter(|e| !e.is_empty())
                && let Some(user) = self.get_by_email(email).await?
            {
                return Ok(Some(user));
            }
            if let Some(login) = login.filter(|l| !l.is_empty()) {
                return self.get_by_login(login).await;
            }
            Ok(None)
        })
    }
}

/// Associations between (auth module, external subject) and user ids.
pub trait AuthInfoService: Send + Sync {
    fn get_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
    ) -> StoreFuture<'a, Option<UserAuth>>;

    /// Create an association. Fails with [`StoreError::Conflict`] when one
    /// already exists for the pair.
    fn set_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
        user_id: UserId,
    ) -> StoreFuture<'a, ()>;

    /// Re-point an existing association at `user_id`.
    fn update_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
        user_id: UserId,
    ) -> StoreFuture<'a, ()>;
}

/// Gate consulted before a user is created.
pub trait QuotaService: Send + Sync {
    /// `true` when one more user may be created.
    fn check_create_user_quota(&self) -> StoreFuture<'_, bool>;
}

/// Decides whether an external auth module may overwrite a stored user.
pub trait UserProtection: Send + Sync {
    fn allow_user_mapping(&self, user: &UserRecord, auth_module: &AuthModule) -> bool;
}
