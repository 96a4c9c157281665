//! Cancellation helpers shared by the pipelines.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{RagError, Result};

/// Race `future` against `cancel`, surfacing [`RagError::Cancelled`] if the
/// token fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        result = future => result,
    }
}

/// Fail fast when the token has already fired.
pub(crate) fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() { Err(RagError::Cancelled) } else { Ok(()) }
}
