//! Authenticated identity and request scope.
//!
//! An upstream authentication pipeline verifies credentials and builds an
//! [`Identity`] from whatever the auth method returned:
//!
//! - **Password / LDAP**: login, name and email from the directory
//! - **OAuth / OIDC**: provider subject plus the normalized claims
//! - **API keys and service accounts**: already-namespaced ids that are not users
//!
//! The identity is then handed, together with a [`SyncContext`], to the
//! hooks in [`crate::sync`].
//!
//! ## Usage
//!
//! ```ignore
//! let ctx = SyncContext::background().with_timeout(Duration::from_secs(2));
//! user_sync.sync_user_hook(&ctx, &mut identity, Some(&request)).await?;
//! user_sync.enable_user_hook(&ctx, &mut identity, Some(&request)).await?;
//! ```

mod context;
mod identity;

pub use context::SyncContext;
pub use identity::{ClientParams, Identity, LookupParams, Request};
pub(crate) use identity::supplied;
