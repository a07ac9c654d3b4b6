//! Ordered user lookup strategies.
//!
//! Strategies are tried in order and evaluation stops at the first hit, so
//! an identity found through its auth association never falls back to an
//! email or login lookup.

use tracing::debug;

use crate::auth::{Identity, SyncContext, supplied};
use crate::store::{AuthInfoService, StoreFuture, UserAuth, UserRecord, UserService};
use crate::sync::SyncResult;

/// Stores a strategy may read from.
#[derive(Clone, Copy)]
pub struct LookupSources<'a> {
    pub users: &'a dyn UserService,
    pub auth_info: &'a dyn AuthInfoService,
}

/// A user found by one of the strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupHit {
    pub user: UserRecord,
    /// The association that led to the user, if any.
    pub auth_info: Option<UserAuth>,
    /// Name of the strategy that produced the hit.
    pub strategy: &'static str,
}

impl LookupHit {
    fn new(user: UserRecord, strategy: &'static str) -> Self {
        Self {
            user,
            auth_info: None,
            strategy,
        }
    }
}

/// One way of finding the stored user behind an identity.
pub trait UserLookup: Send + Sync {
    fn name(&self) -> &'static str;

    fn lookup<'a>(
        &'a self,
        sources: LookupSources<'a>,
        identity: &'a Identity,
    ) -> StoreFuture<'a, Option<LookupHit>>;
}

/// Follows the (auth module, subject) association to its user.
///
/// An association whose user has vanished counts as a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByAuthInfo;

impl UserLookup for ByAuthInfo {
    fn name(&self) -> &'static str {
        "auth_info"
    }

    fn lookup<'a>(
        &'a self,
        sources: LookupSources<'a>,
        identity: &'a Identity,
    ) -> StoreFuture<'a, Option<LookupHit>> {
        Box::pin(async move {
            let Some((module, subject)) = identity.auth_key() else {
                return Ok(None);
            };
            let Some(auth_info) = sources.auth_info.get_auth_info(module, subject).await? else {
                return Ok(None);
            };
            match sources.users.get_by_id(auth_info.user_id).await? {
                Some(user) => Ok(Some(LookupHit {
                    user,
                    auth_info: Some(auth_info),
                    strategy: self.name(),
                })),
                None => {
                    debug!(
                        auth_module = %module,
                        user_id = auth_info.user_id,
                        "Auth association points at a missing user"
                    );
                    Ok(None)
                }
            }
        })
    }
}

/// Looks the user up by `lookup_params.email`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByEmail;

impl UserLookup for ByEmail {
    fn name(&self) -> &'static str {
        "email"
    }

    fn lookup<'a>(
        &'a self,
        sources: LookupSources<'a>,
        identity: &'a Identity,
    ) -> StoreFuture<'a, Option<LookupHit>> {
        Box::pin(async move {
            let Some(email) = supplied(&identity.client_params.lookup_params.email) else {
                return Ok(None);
            };
            let user = sources.users.get_by_email(email).await?;
            Ok(user.map(|u| LookupHit::new(u, self.name())))
        })
    }
}

/// Looks the user up by `lookup_params.login`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByLogin;

impl UserLookup for ByLogin {
    fn name(&self) -> &'static str {
        "login"
    }

    fn lookup<'a>(
        &'a self,
        sources: LookupSources<'a>,
        identity: &'a Identity,
    ) -> StoreFuture<'a, Option<LookupHit>> {
        Box::pin(async move {
            let Some(login) = supplied(&identity.client_params.lookup_params.login) else {
                return Ok(None);
            };
            let user = sources.users.get_by_login(login).await?;
            Ok(user.map(|u| LookupHit::new(u, self.name())))
        })
    }
}

/// Ordered list of lookup strategies.
pub struct LookupChain {
    strategies: Vec<Box<dyn UserLookup>>,
}

impl Default for LookupChain {
    /// Association, then email, then login.
    fn default() -> Self {
        Self::empty()
            .with_strategy(ByAuthInfo)
            .with_strategy(ByEmail)
            .with_strategy(ByLogin)
    }
}

impl LookupChain {
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Append a strategy; it runs after the ones already registered.
    pub fn with_strategy<L: UserLookup + 'static>(mut self, strategy: L) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the strategies in order, stopping at the first hit.
    pub async fn find(
        &self,
        ctx: &SyncContext,
        sources: LookupSources<'_>,
        identity: &Identity,
    ) -> SyncResult<Option<LookupHit>> {
        for strategy in &self.strategies {
            if let Some(hit) = ctx.run(strategy.lookup(sources, identity)).await? {
                debug!(strategy = hit.strategy, user_id = hit.user.id, "User found");
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}
