//! Concurrent execution of one batch of tool requests.

use futures::future::join_all;
use tracing::debug;

use crate::invoker::ToolInvoker;
use crate::model::{ToolCallRequest, ToolCallResult};

/// Run every request in the batch concurrently and wait for all of them.
///
/// Result `i` answers request `i`. A failing call never cancels its siblings.
pub async fn execute_batch(
    invoker: &ToolInvoker<'_>,
    requests: Vec<ToolCallRequest>,
) -> Vec<ToolCallResult> {
    if requests.is_empty() {
        return Vec::new();
    }

    let size = requests.len();
    let results = join_all(requests.into_iter().map(|request| invoker.invoke(request))).await;

    let failed = results.iter().filter(|r| r.outcome.is_error()).count();
    debug!(size, failed, "tool batch finished");
    results
}
