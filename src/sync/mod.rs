//! User sync hooks.
//!
//! Three independent hooks reconcile an authenticated [`Identity`] with the
//! persistent user store:
//!
//! - [`UserSync::sync_user_hook`]: resolve the identity to a user, creating
//!   or updating it as the client params allow
//! - [`UserSync::fetch_synced_user_hook`]: refresh identity fields from the store
//! - [`UserSync::enable_user_hook`]: re-enable a disabled user
//!
//! Hooks keep no state between calls. Concurrent first logins for the same
//! subject are serialized by the store's uniqueness constraints: the loser of
//! a creation race resolves to the winner's record instead of failing.

mod error;
mod lookup;
mod reconcile;

#[cfg(test)]
mod testing;

pub use error::{SyncError, SyncResult};
pub use lookup::{
    ByAuthInfo, ByEmail, ByLogin, LookupChain, LookupHit, LookupSources, UserLookup,
};
pub use reconcile::reconcile;

use std::sync::Arc;

use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::auth::{Identity, Request, SyncContext, supplied};
use crate::store::{
    AllowAllProtection, AuthInfoService, NewUser, QuotaService, StoreError, UserAuth,
    UserProtection, UserRecord, UserService,
};
use crate::types::NamespacedId;

/// Orchestrates the sync hooks over the collaborator stores.
pub struct UserSync {
    users: Arc<dyn UserService>,
    auth_info: Arc<dyn AuthInfoService>,
    quota: Arc<dyn QuotaService>,
    protection: Arc<dyn UserProtection>,
    lookups: LookupChain,
}

impl UserSync {
    /// Create hooks over the given stores, with no user protection and the
    /// default lookup chain.
    pub fn new(
        users: Arc<dyn UserService>,
        auth_info: Arc<dyn AuthInfoService>,
        quota: Arc<dyn QuotaService>,
    ) -> Self {
        Self {
            users,
            auth_info,
            quota,
            protection: Arc::new(AllowAllProtection),
            lookups: LookupChain::default(),
        }
    }

    pub fn with_protection(mut self, protection: Arc<dyn UserProtection>) -> Self {
        self.protection = protection;
        self
    }

    pub fn with_lookup_chain(mut self, lookups: LookupChain) -> Self {
        self.lookups = lookups;
        self
    }

    fn sources(&self) -> LookupSources<'_> {
        LookupSources {
            users: self.users.as_ref(),
            auth_info: self.auth_info.as_ref(),
        }
    }

    /// Resolve the identity to a stored user, creating or updating it.
    ///
    /// No-op unless `client_params.sync_user` is set. On success the identity
    /// carries `user:<id>` and the merged stored fields; on failure it is left
    /// unresolved.
    pub async fn sync_user_hook(
        &self,
        ctx: &SyncContext,
        identity: &mut Identity,
        req: Option<&Request>,
    ) -> SyncResult<()> {
        if !identity.client_params.sync_user {
            return Ok(());
        }

        let span = hook_span("sync_user", identity, req);
        let user = self
            .resolve_user(ctx, identity)
            .instrument(span.clone())
            .await
            .inspect_err(|e| {
                span.in_scope(|| warn!(error = e.code(), "Failed to sync user: {}", e))
            })?;

        identity.apply_user(&user);
        Ok(())
    }

    /// Overwrite the identity's fields with the stored user.
    ///
    /// No-op unless `client_params.fetch_synced_user` is set and the identity
    /// is user-namespaced. A user that vanished since resolution is an error.
    pub async fn fetch_synced_user_hook(
        &self,
        ctx: &SyncContext,
        identity: &mut Identity,
        req: Option<&Request>,
    ) -> SyncResult<()> {
        if !identity.client_params.fetch_synced_user {
            return Ok(());
        }
        let Some(user_id) = identity.user_id() else {
            return Ok(());
        };

        let span = hook_span("fetch_synced_user", identity, req);
        let user = ctx
            .run(self.users.get_by_id(user_id))
            .instrument(span.clone())
            .await?;

        match user {
            Some(user) => {
                identity.apply_user(&user);
                Ok(())
            }
            None => {
                span.in_scope(|| warn!(user_id, "Synced user no longer exists"));
                Err(SyncError::IdentityNotFound(NamespacedId::user(user_id)))
            }
        }
    }

    /// Re-enable a disabled user.
    ///
    /// Only acts when `client_params.enable_user` is set, the identity is
    /// user-namespaced and it is marked disabled.
    pub async fn enable_user_hook(
        &self,
        ctx: &SyncContext,
        identity: &mut Identity,
        req: Option<&Request>,
    ) -> SyncResult<()> {
        if !identity.client_params.enable_user || !identity.is_disabled {
            return Ok(());
        }
        let Some(user_id) = identity.user_id() else {
            return Ok(());
        };

        let span = hook_span("enable_user", identity, req);
        ctx.run(self.users.set_disabled(user_id, false))
            .instrument(span.clone())
            .await?;

        identity.is_disabled = false;
        span.in_scope(|| info!(user_id, "Re-enabled user"));
        Ok(())
    }

    async fn resolve_user(&self, ctx: &SyncContext, identity: &Identity) -> SyncResult<UserRecord> {
        match self.lookups.find(ctx, self.sources(), identity).await? {
            Some(hit) => self.sync_existing(ctx, identity, hit).await,
            None => self.create_user(ctx, identity).await,
        }
    }

    async fn sync_existing(
        &self,
        ctx: &SyncContext,
        identity: &Identity,
        hit: LookupHit,
    ) -> SyncResult<UserRecord> {
        let LookupHit {
            mut user,
            auth_info,
            strategy,
        } = hit;

        if let Some(module) = identity.authenticated_by.as_ref().filter(|m| !m.is_empty())
            && !self.protection.allow_user_mapping(&user, module)
        {
            return Err(SyncError::ProtectedUser {
                login: user.login,
                auth_module: module.clone(),
            });
        }

        if let Some(update) = reconcile(identity, &user) {
            ctx.run(self.users.update(user.id, &update)).await?;
            update.apply(&mut user);
            info!(user_id = user.id, strategy, ?update, "Updated user from identity");
        } else {
            debug!(user_id = user.id, strategy, "User already in sync");
        }

        self.link_auth_info(ctx, identity, &user, auth_info.as_ref())
            .await?;
        Ok(user)
    }

    async fn create_user(&self, ctx: &SyncContext, identity: &Identity) -> SyncResult<UserRecord> {
        if !identity.client_params.allow_sign_up {
            return Err(SyncError::SignupNotAllowed);
        }
        if !ctx.run(self.quota.check_create_user_quota()).await? {
            return Err(SyncError::QuotaExceeded);
        }

        let new_user = new_user_from(identity);
        let user = match ctx.run(self.users.create(&new_user)).await {
            Ok(user) => user,
            Err(SyncError::Store(StoreError::Conflict(reason))) => {
                // Another login for the same person created the user first.
                info!(
                    login = %new_user.login,
                    reason = %reason,
                    "User creation conflicted, resolving existing user"
                );
                return match self.lookups.find(ctx, self.sources(), identity).await? {
                    Some(hit) => self.sync_existing(ctx, identity, hit).await,
                    None => Err(SyncError::Store(StoreError::Conflict(reason))),
                };
            }
            Err(err) => return Err(err),
        };

        info!(user_id = user.id, login = %user.login, "Created user");
        self.link_auth_info(ctx, identity, &user, None).await?;
        Ok(user)
    }

    /// Make sure the identity's (auth module, subject) points at `user`.
    async fn link_auth_info(
        &self,
        ctx: &SyncContext,
        identity: &Identity,
        user: &UserRecord,
        existing: Option<&UserAuth>,
    ) -> SyncResult<()> {
        let Some((module, subject)) = identity.auth_key() else {
            return Ok(());
        };

        match existing {
            Some(link) if link.user_id == user.id => return Ok(()),
            Some(_) => {
                ctx.run(self.auth_info.update_auth_info(module, subject, user.id))
                    .await?;
            }
            None => match ctx
                .run(self.auth_info.set_auth_info(module, subject, user.id))
                .await
            {
                Ok(()) => {}
                Err(SyncError::Store(StoreError::Conflict(_))) => {
                    ctx.run(self.auth_info.update_auth_info(module, subject, user.id))
                        .await?;
                }
                Err(err) => return Err(err),
            },
        }

        info!(user_id = user.id, auth_module = %module, "Linked auth association");
        Ok(())
    }
}

/// Fields for a brand new user. A missing login falls back to the email and
/// vice versa, so neither unique column is left blank.
fn new_user_from(identity: &Identity) -> NewUser {
    let login = supplied(&identity.login);
    let email = supplied(&identity.email);

    NewUser {
        login: login.or(email).unwrap_or_default().to_string(),
        name: supplied(&identity.name).unwrap_or_default().to_string(),
        email: email.or(login).unwrap_or_default().to_string(),
        email_verified: identity.email_verified,
        is_disabled: identity.is_disabled,
        is_admin: identity.is_grafana_admin.unwrap_or(false),
    }
}

fn hook_span(hook: &'static str, identity: &Identity, req: Option<&Request>) -> Span {
    info_span!(
        "identity_sync",
        hook,
        auth_module = identity.authenticated_by.as_ref().map(|m| m.as_str()),
        ip_address = req.and_then(|r| r.ip_address.as_deref()),
        user_agent = req.and_then(|r| r.user_agent.as_deref()),
    )
}
