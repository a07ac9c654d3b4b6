//! Query execution with SurrealDB error classification.

use std::future::Future;
use std::time::Duration;

use surrealdb::error::Db as DbError;
use tracing::debug;

use crate::db::Db;
use crate::store::{StoreError, StoreResult};

/// Attempts made for a statement whose transaction keeps hitting
/// read/write conflicts.
const MAX_TX_ATTEMPTS: u32 = 10;

/// Backoff unit; the n-th retry waits n times this.
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// Run `query` against `db`, re-running it while SurrealDB reports a
/// retryable transaction conflict.
///
/// A retryable failure means the transaction did not commit, so re-running
/// a write never applies it twice. Once the competing transaction has
/// committed, a losing write sees the winner's data and fails with a
/// uniqueness [`StoreError::Conflict`] instead.
pub(crate) async fn with_retry<T, F, Fut>(db: &Db, what: &'static str, mut query: F) -> StoreResult<T>
where
    F: FnMut(Db) -> Fut,
    Fut: Future<Output = Result<T, surrealdb::Error>>,
{
    let mut attempt = 1;
    loop {
        match query(db.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && attempt < MAX_TX_ATTEMPTS => {
                debug!(what, attempt, "Transaction conflict, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(store_error(err)),
        }
    }
}

fn is_retryable(err: &surrealdb::Error) -> bool {
    matches!(err, surrealdb::Error::Db(DbError::TxRetryable))
}

/// Map a SurrealDB failure onto the store error taxonomy.
///
/// Unique index violations and duplicate keys become conflicts; everything
/// else, including conflicts that outlived the retries, is a backend failure.
fn store_error(err: surrealdb::Error) -> StoreError {
    match &err {
        surrealdb::Error::Db(
            DbError::IndexExists { .. } | DbError::RecordExists { .. } | DbError::TxKeyAlreadyExists,
        ) => StoreError::Conflict(err.to_string()),
        _ => StoreError::Backend(err.into()),
    }
}
