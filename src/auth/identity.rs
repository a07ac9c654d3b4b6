//! Request-scoped identity handed to the sync hooks.

use serde::{Deserialize, Serialize};

use crate::store::UserRecord;
use crate::types::{AuthModule, AuthSubject, NamespacedId};

/// Fallback keys used to find an existing user when no auth association matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LookupParams {
    pub email: Option<String>,
    pub login: Option<String>,
}

/// Per-request switches chosen by the auth client that produced the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientParams {
    /// Resolve the identity against the user store, creating or updating as needed.
    pub sync_user: bool,
    /// Create a user when none exists.
    pub allow_sign_up: bool,
    /// Re-enable a disabled user on successful authentication.
    pub enable_user: bool,
    /// Overwrite identity fields from the stored user record.
    pub fetch_synced_user: bool,
    pub lookup_params: LookupParams,
}

/// The authenticating principal for the current request.
///
/// Auth clients fill in the candidate fields; the sync hooks resolve `id`
/// and replace the candidates with the authoritative stored values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Identity {
    /// Resolved namespaced id; `None` until a hook resolves it.
    pub id: Option<NamespacedId>,
    pub authenticated_by: Option<AuthModule>,
    pub auth_id: Option<AuthSubject>,
    pub login: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub is_disabled: bool,
    /// `None` leaves the stored admin flag untouched; `Some(false)` demotes.
    pub is_grafana_admin: Option<bool>,
    pub client_params: ClientParams,
}

impl Identity {
    /// The (auth module, subject) pair when both are present and non-empty.
    pub fn auth_key(&self) -> Option<(&AuthModule, &AuthSubject)> {
        match (&self.authenticated_by, &self.auth_id) {
            (Some(module), Some(subject)) if !module.is_empty() && !subject.is_empty() => {
                Some((module, subject))
            }
            _ => None,
        }
    }

    /// Numeric user id when the identity is resolved into the user namespace.
    pub fn user_id(&self) -> Option<i64> {
        self.id.and_then(|id| id.user_id())
    }

    /// Copy the authoritative state of `user` onto this identity.
    pub fn apply_user(&mut self, user: &UserRecord) {
        self.id = Some(NamespacedId::user(user.id));
        self.login = Some(user.login.clone());
        self.name = Some(user.name.clone());
        self.email = Some(user.email.clone());
        self.email_verified = user.email_verified;
        self.is_disabled = user.is_disabled;
        self.is_grafana_admin = Some(user.is_admin);
    }
}

/// Optional transport metadata for the request being authenticated.
///
/// Only used to enrich log events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Request {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Treat `Some("")` as "not supplied".
pub(crate) fn supplied(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
