//! Field reconciliation between an incoming identity and a stored user.
//!
//! Only fields the auth method actually supplied take part. An email change
//! always clears `email_verified`: the new address has not been proven to
//! belong to the user, whatever the provider claims.

use crate::auth::{Identity, supplied};
use crate::store::{UserRecord, UserUpdate};

/// Compute the minimal update that brings `stored` in line with `identity`.
///
/// Returns `None` when every eligible field already matches.
pub fn reconcile(identity: &Identity, stored: &UserRecord) -> Option<UserUpdate> {
    let mut update = UserUpdate::default();

    if let Some(login) = supplied(&identity.login)
        && login != stored.login
    {
        update.login = Some(login.to_string());
    }

    if let Some(name) = supplied(&identity.name)
        && name != stored.name
    {
        update.name = Some(name.to_string());
    }

    if let Some(email) = supplied(&identity.email)
        && email != stored.email
    {
        update.email = Some(email.to_string());
        update.email_verified = Some(false);
    }

    // Re-enabling needs the client's explicit consent; disabling does not.
    if identity.is_disabled && !stored.is_disabled {
        update.is_disabled = Some(true);
    } else if !identity.is_disabled && stored.is_disabled && identity.client_params.enable_user {
        update.is_disabled = Some(false);
    }

    if let Some(admin) = identity.is_grafana_admin
        && admin != stored.is_admin
    {
        update.is_admin = Some(admin);
    }

    (!update.is_empty()).then_some(update)
}
