//! In-memory collaborator fakes for hook tests.

use std::collections::BTreeMap;
use std::future::ready;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::store::{
    AuthInfoService, NewUser, QuotaService, StoreError, StoreFuture, StoreResult, UserAuth, UserRecord,
    UserService, UserUpdate,
};
use crate::types::{AuthModule, AuthSubject, UserId};

fn done<'a, T: Send + 'a>(result: StoreResult<T>) -> StoreFuture<'a, T> {
    Box::pin(ready(result))
}

pub fn user(id: UserId, login: &str, email: &str) -> UserRecord {
    UserRecord {
        id,
        login: login.to_string(),
        name: login.to_string(),
        email: email.to_string(),
        email_verified: false,
        is_disabled: false,
        is_admin: false,
    }
}

/// User store fake that records every call it receives.
#[derive(Default)]
pub struct FakeUsers {
    users: Mutex<BTreeMap<UserId, UserRecord>>,
    calls: Mutex<Vec<String>>,
    lookup_error: Mutex<Option<String>>,
    race_winner: Mutex<Option<UserRecord>>,
}

impl FakeUsers {
    pub fn with_user(user: UserRecord) -> Self {
        let fake = Self::default();
        fake.insert(user);
        fake
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn get(&self, id: UserId) -> Option<UserRecord> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Make every read fail with a backend error.
    pub fn fail_lookups(&self, message: &str) {
        *self.lookup_error.lock().unwrap() = Some(message.to_string());
    }

    /// Simulate a concurrent sign-up: the next `create` stores `winner`
    /// and reports a conflict.
    pub fn lose_create_race_to(&self, winner: UserRecord) {
        *self.race_winner.lock().unwrap() = Some(winner);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn read<F>(&self, call: String, find: F) -> StoreFuture<'_, Option<UserRecord>>
    where
        F: Fn(&UserRecord) -> bool,
    {
        self.record(call);
        if let Some(message) = self.lookup_error.lock().unwrap().clone() {
            return done(Err(StoreError::Backend(anyhow::anyhow!(message))));
        }
        let found = self.users.lock().unwrap().values().find(|u| find(u)).cloned();
        done(Ok(found))
    }
}

impl UserService for FakeUsers {
    fn get_by_id(&self, id: UserId) -> StoreFuture<'_, Option<UserRecord>> {
        self.read(format!("get_by_id:{}", id), |u| u.id == id)
    }

    fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<UserRecord>> {
        self.read(format!("get_by_email:{}", email), |u| u.email == email)
    }

    fn get_by_login<'a>(&'a self, login: &'a str) -> StoreFuture<'a, Option<UserRecord>> {
        self.read(format!("get_by_login:{}", login), |u| u.login == login)
    }

    fn create<'a>(&'a self, new: &'a NewUser) -> StoreFuture<'a, UserRecord> {
        self.record(format!("create:{}", new.login));

        if let Some(winner) = self.race_winner.lock().unwrap().take() {
            self.insert(winner);
            return done(Err(StoreError::Conflict(format!(
                "login {} already exists",
                new.login
            ))));
        }

        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| u.login == new.login || (!new.email.is_empty() && u.email == new.email))
        {
            return done(Err(StoreError::Conflict(new.login.clone())));
        }
        let id = users.keys().next_back().copied().unwrap_or(0) + 1;
        let created = UserRecord {
            id,
            login: new.login.clone(),
            name: new.name.clone(),
            email: new.email.clone(),
            email_verified: new.email_verified,
            is_disabled: new.is_disabled,
            is_admin: new.is_admin,
        };
        users.insert(id, created.clone());
        done(Ok(created))
    }

    fn update<'a>(&'a self, id: UserId, update: &'a UserUpdate) -> StoreFuture<'a, ()> {
        self.record(format!("update:{}", id));
        let result = match self.users.lock().unwrap().get_mut(&id) {
            Some(user) => {
                update.apply(user);
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user:{}", id))),
        };
        done(result)
    }

    fn set_disabled(&self, id: UserId, disabled: bool) -> StoreFuture<'_, ()> {
        self.record(format!("set_disabled:{}:{}", id, disabled));
        let result = match self.users.lock().unwrap().get_mut(&id) {
            Some(user) => {
                user.is_disabled = disabled;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user:{}", id))),
        };
        done(result)
    }
}

/// Association store fake.
#[derive(Default)]
pub struct FakeAuthInfo {
    links: Mutex<BTreeMap<(String, String), UserId>>,
    calls: Mutex<Vec<String>>,
    racing_link: Mutex<Option<UserId>>,
}

impl FakeAuthInfo {
    pub fn with_association(module: &str, subject: &str, user_id: UserId) -> Self {
        let fake = Self::default();
        fake.links
            .lock()
            .unwrap()
            .insert((module.to_string(), subject.to_string()), user_id);
        fake
    }

    pub fn linked_user(&self, module: &str, subject: &str) -> Option<UserId> {
        self.links
            .lock()
            .unwrap()
            .get(&(module.to_string(), subject.to_string()))
            .copied()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Simulate a concurrent login for the same subject: the next
    /// `set_auth_info` finds a link to `user_id` already stored.
    pub fn link_concurrently_on_next_set(&self, user_id: UserId) {
        *self.racing_link.lock().unwrap() = Some(user_id);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl AuthInfoService for FakeAuthInfo {
    fn get_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
    ) -> StoreFuture<'a, Option<UserAuth>> {
        self.record(format!("get_auth_info:{}:{}", module, subject));
        let found = self.linked_user(module.as_str(), subject.as_str()).map(|user_id| UserAuth {
            auth_module: module.clone(),
            auth_id: subject.clone(),
            user_id,
        });
        done(Ok(found))
    }

    fn set_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
        user_id: UserId,
    ) -> StoreFuture<'a, ()> {
        self.record(format!("set_auth_info:{}:{}:{}", module, subject, user_id));
        let mut links = self.links.lock().unwrap();
        let key = (module.to_string(), subject.to_string());
        if let Some(other) = self.racing_link.lock().unwrap().take() {
            links.insert(key.clone(), other);
        }
        let result = if links.contains_key(&key) {
            Err(StoreError::Conflict(format!("{}:{}", module, subject)))
        } else {
            links.insert(key, user_id);
            Ok(())
        };
        done(result)
    }

    fn update_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
        user_id: UserId,
    ) -> StoreFuture<'a, ()> {
        self.record(format!("update_auth_info:{}:{}:{}", module, subject, user_id));
        let mut links = self.links.lock().unwrap();
        let result = match links.get_mut(&(module.to_string(), subject.to_string())) {
            Some(linked) => {
                *linked = user_id;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("{}:{}", module, subject))),
        };
        done(result)
    }
}

/// Quota gate fake with a fixed answer.
pub struct FakeQuota {
    allowed: bool,
    checks: AtomicUsize,
}

impl FakeQuota {
    pub fn allowing() -> Self {
        Self {
            allowed: true,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn denying() -> Self {
        Self {
            allowed: false,
            checks: AtomicUsize::new(0),
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl QuotaService for FakeQuota {
    fn check_create_user_quota(&self) -> StoreFuture<'_, bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        done(Ok(self.allowed))
    }
}
