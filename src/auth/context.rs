//! Cancellation and deadline scope for a single authentication request.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::store::StoreError;
use crate::sync::SyncError;

/// Context passed through every sync hook.
///
/// Store calls are raced against the cancellation token and the optional
/// deadline, so an abandoned request never issues further writes.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl SyncContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Attach an existing cancellation token (e.g. the request's).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Abort store calls once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fail fast if the context is already done.
    pub fn check(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(SyncError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Run one store call under this context.
    pub async fn run<T, F>(&self, call: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        self.check()?;

        let guarded = async {
            match self.deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                    Ok(result) => result.map_err(SyncError::from),
                    Err(_) => Err(SyncError::DeadlineExceeded),
                },
                None => call.await.map_err(SyncError::from),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            result = guarded => result,
        }
    }
}
