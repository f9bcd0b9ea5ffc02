//! Cancellable operation context
//!
//! Every repository, service and store call takes an [`OpContext`]. The core
//! never inspects it beyond forwarding it; stores run their I/O under
//! [`OpContext::run`] so a caller's cancellation or deadline stops the work.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::repository::{RepositoryError, RepositoryOperation, RepositoryResult};

/// Cancellation signal plus optional deadline for one logical operation
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use crudbase::context::OpContext;
///
/// let ctx = OpContext::new().with_timeout(Duration::from_secs(5));
/// let child = ctx.child();
/// ctx.cancel();
/// assert!(child.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token (e.g. a request or shutdown token)
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline relative to now; an earlier existing deadline wins
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline; an earlier existing deadline wins
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Derive a context cancelled together with this one
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already cancelled or past its deadline
    pub fn check(&self, operation: RepositoryOperation) -> RepositoryResult<()> {
        if self.token.is_cancelled() {
            return Err(RepositoryError::cancelled(operation));
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(RepositoryError::timeout(
                operation,
                "Operation deadline exceeded",
            )),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the context is cancelled, or the deadline passes
    ///
    /// A future dropped by cancellation may already have committed work on the
    /// store side; nothing here compensates for that.
    pub async fn run<F, T>(&self, operation: RepositoryOperation, fut: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        self.check(operation)?;
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(RepositoryError::cancelled(operation)),
                _ = tokio::time::sleep_until(deadline) => Err(RepositoryError::timeout(
                    operation,
                    "Operation deadline exceeded",
                )),
                result = fut => result,
            },
            None => tokio::select! {
                biased;
                _ = self.token.cancelled() => Err(RepositoryError::cancelled(operation)),
                result = fut => result,
            },
        }
    }
}
