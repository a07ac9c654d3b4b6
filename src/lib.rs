// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod store;
pub mod sync;
pub mod types;

// Re-export key types and functions
pub use auth::{ClientParams, Identity, LookupParams, Request, SyncContext};
pub use config::{SyncConfig, load_config};
pub use db::{DatabaseConfig, Db, UserQuota, UserStore, create_connection, ensure_schema};
pub use store::{StoreError, UserRecord};
pub use sync::{SyncError, SyncResult, UserSync};
pub use types::{AuthModule, AuthSubject, Namespace, NamespacedId, UserId};

use std::sync::Arc;
use anyhow::Result;
use tracing::info;

/// Convenience function to build fully wired sync hooks.
///
/// Connects to the configured database, applies the schema and plugs the
/// SurrealDB user store, quota gate and configured protection policy into a
/// [`UserSync`].
pub async fn create_user_sync(config: &SyncConfig) -> Result<(UserSync, Arc<UserStore>)> {
    let db = create_connection(config.database.clone()).await?;
    ensure_schema(&db).await?;

    let store = Arc::new(UserStore::new(db.clone()));
    let quota = Arc::new(UserQuota::new(db, config.user_quota));
    let sync = UserSync::new(store.clone(), store.clone(), quota)
        .with_protection(config.user_protection());

    info!(
        url = %config.database.url,
        user_quota = ?config.user_quota,
        protected_logins = config.protected_logins.len(),
        "User sync ready"
    );
    Ok((sync, store))
}
