use async_trait::async_trait;

use crate::types::DownloadResult;

/// Consumer side of a download request.
///
/// The pipeline only ever holds a `Weak` reference to a sink, so whoever
/// owns the `Arc` (the host) decides how long it lives. Once the host drops
/// it, any pending delivery is discarded.
///
/// Lifecycle per request:
/// - `on_start` is awaited on the submitting task before any work is
///   scheduled.
/// - `on_complete` is called exactly once with the terminal result, unless
///   the host is gone by then.
#[async_trait]
pub trait CompletionSink: Send + Sync + 'static {
    /// Called before the fetch is scheduled.
    async fn on_start(&self) {}

    /// Called with the terminal result.
    async fn on_complete(&self, result: DownloadResult);
}
