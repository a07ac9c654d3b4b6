use tracing::debug;

use crate::db::Db;
use crate::db::schema::CountRow;
use crate::db::tx::with_retry;
use crate::store::{QuotaService, StoreFuture, StoreResult};

/// Caps the number of user records. No limit means unlimited sign-ups.
#[derive(Clone)]
pub struct UserQuota {
    db: Db,
    limit: Option<u64>,
}

impl UserQuota {
    pub fn new(db: Db, limit: Option<u64>) -> Self {
        Self { db, limit }
    }

    pub async fn count_users(&self) -> StoreResult<u64> {
        let rows: Vec<CountRow> = with_retry(&self.db, "count_users", |db| async move {
            db.query("SELECT count() AS total FROM user GROUP ALL")
                .await?
                .take(0)
        })
        .await?;
        // An empty table yields no group at all.
        Ok(rows.first().map_or(0, |row| row.total))
    }
}

impl QuotaService for UserQuota {
    fn check_create_user_quota(&self) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let Some(limit) = self.limit else {
                return Ok(true);
            };
            let total = self.count_users().await?;
            debug!(total, limit, "Checked user quota");
            Ok(total < limit)
        })
    }
}
