//! SurrealDB-backed user and auth association storage.
//!
//! Every statement runs through [`with_retry`], so concurrent writers that
//! collide inside the storage engine settle into either success or a
//! uniqueness conflict.

use tracing::debug;

use crate::db::Db;
use crate::db::schema::{UserAuthRow, UserRow};
use crate::db::tx::with_retry;
use crate::store::{
    AuthInfoService, NewUser, StoreError, StoreFuture, StoreResult, UserAuth, UserRecord,
    UserService, UserUpdate,
};
use crate::types::{AuthModule, AuthSubject, UserId};

/// User store for database operations.
#[derive(Clone)]
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Reserve the next numeric user id.
    async fn next_user_id(&self) -> StoreResult<UserId> {
        let ids: Vec<UserId> = with_retry(&self.db, "next_user_id", |db| async move {
            let query = "UPSERT sequence:user SET last_id = (last_id OR 0) + 1 RETURN VALUE last_id";
            db.query(query).await?.take(0)
        })
        .await?;

        ids.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("User id sequence returned nothing")))
    }

    async fn select_user(&self, field: &'static str, value: String) -> StoreResult<Option<UserRecord>> {
        let query = format!("SELECT * FROM user WHERE {} = $value LIMIT 1", field);

        let users: Vec<UserRow> = with_retry(&self.db, "select_user", |db| {
            let query = query.clone();
            let value = value.clone();
            async move { db.query(query).bind(("value", value)).await?.take(0) }
        })
        .await?;

        Ok(users.into_iter().next().map(UserRecord::from))
    }

    async fn create_user(&self, new: &NewUser) -> StoreResult<UserRecord> {
        let uid = self.next_user_id().await?;
        // Blank emails would all collide on the unique email index.
        let email = if new.email.is_empty() {
            new.login.clone()
        } else {
            new.email.clone()
        };

        let users: Vec<UserRow> = with_retry(&self.db, "create_user", |db| {
            let query = r#"
                CREATE type::thing('user', $uid) CONTENT {
                    uid: $uid,
                    login: $login,
                    name: $name,
                    email: $email,
                    email_verified: $email_verified,
                    is_disabled: $is_disabled,
                    is_admin: $is_admin
                }
            "#;
            let login = new.login.clone();
            let name = new.name.clone();
            let email = email.clone();
            let (email_verified, is_disabled, is_admin) =
                (new.email_verified, new.is_disabled, new.is_admin);

            async move {
                db.query(query)
                    .bind(("uid", uid))
                    .bind(("login", login))
                    .bind(("name", name))
                    .bind(("email", email))
                    .bind(("email_verified", email_verified))
                    .bind(("is_disabled", is_disabled))
                    .bind(("is_admin", is_admin))
                    .await?
                    .take(0)
            }
        })
        .await?;

        let user = users
            .into_iter()
            .next()
            .map(UserRecord::from)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("Failed to create user")))?;

        debug!(user_id = user.id, login = %user.login, "Inserted user");
        Ok(user)
    }

    async fn update_user(&self, id: UserId, update: &UserUpdate) -> StoreResult<()> {
        let updated: Vec<UserRow> = with_retry(&self.db, "update_user", |db| {
            let patch = update.clone();
            async move {
                db.query("UPDATE type::thing('user', $uid) MERGE $patch")
                    .bind(("uid", id))
                    .bind(("patch", patch))
                    .await?
                    .take(0)
            }
        })
        .await?;

        if updated.is_empty() {
            return Err(StoreError::NotFound(format!("user:{}", id)));
        }
        Ok(())
    }

    async fn set_user_disabled(&self, id: UserId, disabled: bool) -> StoreResult<()> {
        let updated: Vec<UserRow> = with_retry(&self.db, "set_user_disabled", |db| async move {
            db.query("UPDATE type::thing('user', $uid) SET is_disabled = $disabled")
                .bind(("uid", id))
                .bind(("disabled", disabled))
                .await?
                .take(0)
        })
        .await?;

        if updated.is_empty() {
            return Err(StoreError::NotFound(format!("user:{}", id)));
        }
        Ok(())
    }

    async fn select_auth_info(
        &self,
        module: &AuthModule,
        subject: &AuthSubject,
    ) -> StoreResult<Option<UserAuth>> {
        let links: Vec<UserAuthRow> = with_retry(&self.db, "select_auth_info", |db| {
            let query = r#"
                SELECT * FROM user_auth
                WHERE auth_module = $auth_module
                  AND auth_id = $auth_id
                LIMIT 1
            "#;
            let (module, subject) = (module.to_string(), subject.to_string());

            async move {
                db.query(query)
                    .bind(("auth_module", module))
                    .bind(("auth_id", subject))
                    .await?
                    .take(0)
            }
        })
        .await?;

        Ok(links.into_iter().next().map(UserAuth::from))
    }

    async fn insert_auth_info(
        &self,
        module: &AuthModule,
        subject: &AuthSubject,
        user_id: UserId,
    ) -> StoreResult<()> {
        with_retry(&self.db, "insert_auth_info", |db| {
            let query = r#"
                CREATE user_auth CONTENT {
                    auth_module: $auth_module,
                    auth_id: $auth_id,
                    user_id: $user_id
                }
            "#;
            let (module, subject) = (module.to_string(), subject.to_string());

            async move {
                db.query(query)
                    .bind(("auth_module", module))
                    .bind(("auth_id", subject))
                    .bind(("user_id", user_id))
                    .await?
                    .check()?;
                Ok::<(), surrealdb::Error>(())
            }
        })
        .await
    }

    async fn repoint_auth_info(
        &self,
        module: &AuthModule,
        subject: &AuthSubject,
        user_id: UserId,
    ) -> StoreResult<()> {
        let updated: Vec<UserAuthRow> = with_retry(&self.db, "repoint_auth_info", |db| {
            let query = r#"
                UPDATE user_auth SET user_id = $user_id
                WHERE auth_module = $auth_module
                  AND auth_id = $auth_id
            "#;
            let (module, subject) = (module.to_string(), subject.to_string());

            async move {
                db.query(query)
                    .bind(("auth_module", module))
                    .bind(("auth_id", subject))
                    .bind(("user_id", user_id))
                    .await?
                    .take(0)
            }
        })
        .await?;

        if updated.is_empty() {
            return Err(StoreError::NotFound(format!("user_auth {}:{}", module, subject)));
        }
        Ok(())
    }
}

impl UserService for UserStore {
    fn get_by_id(&self, id: UserId) -> StoreFuture<'_, Option<UserRecord>> {
        Box::pin(async move {
            let users: Vec<UserRow> = with_retry(&self.db, "get_by_id", |db| async move {
                db.query("SELECT * FROM user WHERE uid = $uid LIMIT 1")
                    .bind(("uid", id))
                    .await?
                    .take(0)
            })
            .await?;

            Ok(users.into_iter().next().map(UserRecord::from))
        })
    }

    fn get_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<UserRecord>> {
        Box::pin(self.select_user("email", email.to_string()))
    }

    fn get_by_login<'a>(&'a self, login: &'a str) -> StoreFuture<'a, Option<UserRecord>> {
        Box::pin(self.select_user("login", login.to_string()))
    }

    fn create<'a>(&'a self, user: &'a NewUser) -> StoreFuture<'a, UserRecord> {
        Box::pin(self.create_user(user))
    }

    fn update<'a>(&'a self, id: UserId, update: &'a UserUpdate) -> StoreFuture<'a, ()> {
        Box::pin(self.update_user(id, update))
    }

    fn set_disabled(&self, id: UserId, disabled: bool) -> StoreFuture<'_, ()> {
        Box::pin(self.set_user_disabled(id, disabled))
    }
}

impl AuthInfoService for UserStore {
    fn get_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
    ) -> StoreFuture<'a, Option<UserAuth>> {
        Box::pin(self.select_auth_info(module, subject))
    }

    fn set_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
        user_id: UserId,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.insert_auth_info(module, subject, user_id))
    }

    fn update_auth_info<'a>(
        &'a self,
        module: &'a AuthModule,
        subject: &'a AuthSubject,
        user_id: UserId,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.repoint_auth_info(module, subject, user_id))
    }
}
