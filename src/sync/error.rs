//! Error types for the sync hooks.

use std::fmt;

use crate::store::StoreError;
use crate::types::{AuthModule, NamespacedId};

/// Failures that abort a sync hook and, with it, the authentication.
#[derive(Debug)]
pub enum SyncError {
    /// No user exists and the auth client does not allow sign-up.
    SignupNotAllowed,

    /// The user quota forbids creating another user.
    QuotaExceeded,

    /// The user behind a resolved identity no longer exists.
    IdentityNotFound(NamespacedId),

    /// The user may not be taken over by this auth module.
    ProtectedUser {
        login: String,
        auth_module: AuthModule,
    },

    /// The request was cancelled before the hook finished.
    Cancelled,

    /// The request deadline elapsed before the hook finished.
    DeadlineExceeded,

    /// A collaborator store failed.
    Store(StoreError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignupNotAllowed => write!(f, "User sign up is not allowed"),
            Self::QuotaExceeded => write!(f, "User quota reached"),
            Self::IdentityNotFound(id) => write!(f, "Identity not found: {}", id),
            Self::ProtectedUser { login, auth_module } => write!(
                f,
                "User {} is protected from updates by {}",
                login, auth_module
            ),
            Self::Cancelled => write!(f, "Request cancelled"),
            Self::DeadlineExceeded => write!(f, "Request deadline exceeded"),
            Self::Store(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(StoreError::Backend(err))
    }
}

impl SyncError {
    /// Stable label for logs and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SignupNotAllowed => "signup_not_allowed",
            Self::QuotaExceeded => "quota_exceeded",
            Self::IdentityNotFound(_) => "identity_not_found",
            Self::ProtectedUser { .. } => "protected_user",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Store(_) => "store_failure",
        }
    }
}

/// Result type for sync hooks.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            SyncError::SignupNotAllowed,
            SyncError::QuotaExceeded,
            SyncError::IdentityNotFound(NamespacedId::user(1)),
            SyncError::ProtectedUser {
                login: "admin".to_string(),
                auth_module: AuthModule::new("ldap"),
            },
            SyncError::Cancelled,
            SyncError::DeadlineExceeded,
            SyncError::Store(StoreError::NotFound("user:1".to_string())),
        ];
        let mut codes: Vec<_> = errors.iter().map(SyncError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_store_error_is_source() {
        let err = SyncError::from(StoreError::Conflict("login".to_string()));
        assert_eq!(err.to_string(), "Conflicting record: login");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_identity_not_found_display() {
        let err = SyncError::IdentityNotFound(NamespacedId::user(9));
        assert_eq!(err.to_string(), "Identity not found: user:9");
    }
}
