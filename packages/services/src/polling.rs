use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, info, warn};

use crate::Runner;

/// Runs `runner` every `polling_interval` until `cancel_token` fires.
///
/// A cycle that already started always runs to completion; cancellation only
/// cuts the sleep between cycles short. Errors never leave the loop.
pub fn schedule_polling(
    polling_interval: Duration,
    mut runner: impl Runner + 'static,
    name: String,
    span: Span,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            loop {
                if let Err(e) = runner.run().await {
                    if e.is_retryable() {
                        warn!(kind = e.kind(), "{name} skipped a cycle: {e}");
                    } else {
                        error!(kind = e.kind(), "{name} encountered an error: {e}");
                    }
                }

                tokio::select! {
                    _ = cancel_token.cancelled() => break,
                    _ = tokio::time::sleep(polling_interval) => {}
                }
            }

            info!("{name} stopped");
        }
        .instrument(span),
    )
}
