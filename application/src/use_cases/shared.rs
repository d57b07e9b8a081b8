//! Shared helpers for use cases: cancellation and wall-clock budgets.

use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a guarded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interruption {
    BudgetExceeded,
    Cancelled,
}

impl Interruption {
    pub(crate) fn reason(&self) -> &'static str {
        match self {
            Interruption::BudgetExceeded => "turn budget exceeded",
            Interruption::Cancelled => "turn cancelled",
        }
    }
}

/// Resolves when the token is cancelled; never resolves without a token.
pub(crate) async fn cancelled(token: &Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Check if cancellation has been requested.
pub(crate) fn check_cancelled(token: &Option<CancellationToken>) -> Result<(), Interruption> {
    if let Some(token) = token
        && token.is_cancelled()
    {
        return Err(Interruption::Cancelled);
    }
    Ok(())
}

/// Run `fut` until it completes, the deadline passes, or the token fires.
///
/// On interruption the future is dropped, which cancels it at its next
/// suspension point.
pub(crate) async fn guarded<F: Future>(
    fut: F,
    deadline: Instant,
    token: &Option<CancellationToken>,
) -> Result<F::Output, Interruption> {
    check_cancelled(token)?;
    tokio::select! {
        out = fut => Ok(out),
        _ = tokio::time::sleep_until(deadline) => Err(Interruption::BudgetExceeded),
        _ = cancelled(token) => Err(Interruption::Cancelled),
    }
}
