use crate::{Error, Result};
use core::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs `op` until it finishes or `cancel` fires, whichever comes first.
///
/// On cancellation `op` is dropped. Any transaction it holds is dropped with
/// it and therefore rolled back, so nothing becomes visible.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        res = op => res,
    }
}
