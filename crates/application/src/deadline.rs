use std::future::Future;

use leasehold_core::{AppError, AppResult, RequestContext};

/// Bounds one persistence round trip by the caller's deadline.
pub(crate) async fn within_deadline<T>(
    context: &RequestContext,
    operation: &str,
    future: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    match context.deadline() {
        Some(deadline) => tokio::time::timeout(deadline, future)
            .await
            .map_err(|_| {
                AppError::DeadlineExceeded(format!(
                    "{operation} did not complete within {}ms",
                    deadline.as_millis()
                ))
            })?,
        None => future.await,
    }
}
