//! Scoped liveness ticks for long provider calls.
//!
//! A [`Heartbeat`] republishes a template event at a fixed interval until it
//! is stopped. [`Heartbeat::stop`] waits for the ticking task to exit, so no
//! tick is observed after it returns. [`with_heartbeat`] stops the guard on
//! every path, panics included.
//!
//! Dropping the guard without stopping it only cancels and aborts the task
//! and cannot wait for it. A tick already publishing on another worker may
//! still land after the drop.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::{ProgressEvent, ProgressSink};

pub struct Heartbeat {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Start ticking. The first tick fires one `period` after the start.
    pub fn start(sink: Arc<dyn ProgressSink>, template: ProgressEvent, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        tracing::debug!(
                            generation_id = %template.generation_id,
                            "Heartbeat tick",
                        );
                        sink.publish(template.restamped());
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel and wait for the ticking task to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Run `fut` with a heartbeat for its whole duration.
///
/// The heartbeat is stopped before this returns or resumes a panic raised by
/// `fut`.
pub async fn with_heartbeat<F>(
    sink: Arc<dyn ProgressSink>,
    template: ProgressEvent,
    period: Duration,
    fut: F,
) -> F::Output
where
    F: Future,
{
    let heartbeat = Heartbeat::start(sink, template, period);
    let output = AssertUnwindSafe(fut).catch_unwind().await;
    heartbeat.stop().await;
    match output {
        Ok(output) => output,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
