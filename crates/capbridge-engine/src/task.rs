//! Task helpers shared by the event-driven paths

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::error::{BridgeError, Result};
use crate::stats::StatsRecorder;

/// Await `fut` for at most `duration`
pub(crate) async fn bounded<T, F>(operation: &'static str, duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Timeout {
            operation,
            duration_ms: duration.as_millis() as u64,
        }),
    }
}

/// Run one event-path unit of work, logging its error or panic
pub(crate) async fn isolated<F>(what: &'static str, device_id: &str, stats: &StatsRecorder, fut: F)
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(
                device_id = %device_id,
                error = %e,
                code = e.error_code(),
                "{} failed", what
            );
        }
        Err(_) => {
            stats.record(|s| s.panics_isolated += 1);
            error!(device_id = %device_id, "{} panicked", what);
        }
    }
}

/// Spawn [`isolated`] on the current runtime
pub(crate) fn spawn_isolated<F>(
    what: &'static str,
    device_id: String,
    stats: Arc<StatsRecorder>,
    fut: F,
) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move { isolated(what, &device_id, &stats, fut).await })
}
