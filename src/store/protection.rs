//! User protection policies.

use std::collections::HashSet;

use super::{UserProtection, UserRecord};
use crate::types::AuthModule;

/// Lets every auth module overwrite every user.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllProtection;

impl UserProtection for AllowAllProtection {
    fn allow_user_mapping(&self, _user: &UserRecord, _auth_module: &AuthModule) -> bool {
        true
    }
}

/// Shields a fixed set of logins (typically local break-glass admins) from
/// being taken over or rewritten by external auth modules.
#[derive(Debug, Clone, Default)]
pub struct StaticUserProtection {
    protected_logins: HashSet<String>,
}

impl StaticUserProtection {
    pub fn new<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected_logins: logins
                .into_iter()
                .map(|l| l.into().to_lowercase())
                .collect(),
        }
    }

    pub fn is_protected(&self, login: &str) -> bool {
        self.protected_logins.contains(&login.to_lowercase())
    }
}

impl UserProtection for StaticUserProtection {
    fn allow_user_mapping(&self, user: &UserRecord, _auth_module: &AuthModule) -> bool {
        !self.is_protected(&user.login)
    }
}
