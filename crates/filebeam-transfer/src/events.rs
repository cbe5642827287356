/// Callback seam between the protocol core and its front ends.
///
/// Callbacks are invoked synchronously, in order, from whichever thread
/// runs the transfer. A front end that needs thread-affine updates (a
/// GUI event loop) marshals them itself; the core never spawns.

use std::sync::Arc;

/// Progress and status reporting for one transfer endpoint.
pub trait TransferObserver: Send + Sync {
    /// Invoked after every chunk is fully sent or received.
    fn on_progress(&self, percentage: f64, message: &str);

    /// Invoked for connection lifecycle events, errors, warnings, and
    /// completion summaries.
    fn on_status(&self, message: &str);
}

/// Optional shared observer, injected through the config structs.
pub type ObserverHandle = Option<Arc<dyn TransferObserver>>;

/// Observer that routes callbacks to the `tracing` crate.
///
/// Per-chunk progress goes to `debug` to keep default output readable;
/// lifecycle status goes to `info`.
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_progress(&self, percentage: f64, message: &str) {
        tracing::debug!(percentage, "{}", message);
    }

    fn on_status(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Observer that discards all callbacks.
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_progress(&self, _percentage: f64, _message: &str) {}
    fn on_status(&self, _message: &str) {}
}

pub(crate) fn emit_progress(observer: &ObserverHandle, percentage: f64, message: &str) {
    if let Some(observer) = observer {
        observer.on_progress(percentage, message);
    }
}

pub(crate) fn emit_status(observer: &ObserverHandle, message: &str) {
    if let Some(observer) = observer {
        observer.on_status(message);
    }
}
