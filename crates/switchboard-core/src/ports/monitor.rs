//! CallMonitor port - an instrumentation scope around each dispatched call.
//!
//! The router opens a scope before invoking the handler and drops it when the
//! call returns. Dispatch never depends on what the scope contains.

use std::any::Any;
use std::time::Instant;

use ulid::Ulid;

/// Opaque guard held for the duration of one call.
pub struct CallScope(Option<Box<dyn Any + Send>>);

impl CallScope {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn new(guard: impl Any + Send) -> Self {
        Self(Some(Box::new(guard)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

pub trait CallMonitor: Send + Sync {
    fn on_call(&self, endpoint: &str) -> CallScope;
}

/// Monitor that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl CallMonitor for NoopMonitor {
    fn on_call(&self, _endpoint: &str) -> CallScope {
        CallScope::empty()
    }
}

/// Monitor that logs call start/finish through `tracing`, tagging each call
/// with a ULID so interleaved log lines can be told apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

struct TracingGuard {
    call_id: Ulid,
    endpoint: String,
    started: Instant,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        tracing::debug!(
            call_id = %self.call_id,
            endpoint = %self.endpoint,
            elapsed_us = self.started.elapsed().as_micros() as u64,
            "call finished"
        );
    }
}

impl CallMonitor for TracingMonitor {
    fn on_call(&self, endpoint: &str) -> CallScope {
        let call_id = Ulid::new();
        tracing::debug!(call_id = %call_id, endpoint, "call started");
        CallScope::new(TracingGuard {
            call_id,
            endpoint: endpoint.to_string(),
            started: Instant::now(),
        })
    }
}
