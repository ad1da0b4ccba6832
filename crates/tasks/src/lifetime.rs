use std::{future::Future, time::Duration};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture, WaitForCancellationFutureOwned};

/// Returned by waits that were interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("lifetime cancelled")]
pub struct Cancelled;

/// A cancelable scope.
///
/// Cloning yields another handle to the same scope. Use [`child`](Self::child)
/// for a nested scope that can be canceled on its own.
#[derive(Debug, Clone, Default)]
pub struct LifetimeContext {
    token: CancellationToken,
}

impl LifetimeContext {
    /// Create a new root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a nested scope, canceled together with this one.
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token() }
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the scope is canceled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Owned variant of [`cancelled`](Self::cancelled), for moving into tasks.
    pub fn cancelled_owned(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }

    /// Drive `fut` to completion unless the scope is canceled first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Cancelled),
            output = fut => Ok(output),
        }
    }

    /// Sleep for `duration`, returning early with [`Cancelled`].
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.run(tokio::time::sleep(duration)).await
    }
}
