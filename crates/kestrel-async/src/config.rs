//! Scheduler-side configuration.

use kestrel_common::limits;

/// Knobs for the async layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AsyncConfig {
    /// Buffered stream events delivered per microtask when a subscription
    /// resumes. Zero is treated as one.
    pub stream_flush_batch: usize,
    /// Surface futures that complete with an error nobody listens to as
    /// uncaught errors of their zone.
    pub report_unhandled_errors: bool,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            stream_flush_batch: limits::DEFAULT_STREAM_FLUSH_BATCH,
            report_unhandled_errors: true,
        }
    }
}

impl AsyncConfig {
    pub(crate) fn flush_batch(&self) -> usize {
        self.stream_flush_batch.max(1)
    }
}
