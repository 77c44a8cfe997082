use std::future::Future;

use crate::errors::AppError;

/// Runs `task` to completion independently of the request that triggered it.
/// The task gets its own lifetime (not the request's deadline); failures are
/// logged and dropped, never retried, never surfaced to the caller.
pub fn spawn_detached<F>(label: &'static str, task: F)
where
    F: Future<Output = Result<(), AppError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(err) = task.await {
            log::warn!("detached task '{}' failed: {}", label, err);
        }
    });
}
