//! Router - endpoint name -> handler registry.
//!
//! # Example
//! ```ignore
//! let router = Arc::new(Router::new());
//! router.bind_script(&runtime, source, "model")?;
//! router.forward("predict", "model_v2")?;
//! let result = router.dispatch("predict", args).await?;
//! ```
//!
//! # Locking
//! - dispatch lookups share a read lock; bind/unbind take the write lock
//! - the lock is released before the handler runs, so a handler removed by
//!   `unbind` finishes the calls that already hold it

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{CallArguments, CallResult, Status};
use crate::handlers::{ForwardHandler, LuaCallHandler};
use crate::ports::{CallMonitor, Handler, NoopMonitor};
use crate::runtime::HostedRuntime;

/// Endpoint name that receives every dispatch without an exact binding.
pub const CATCH_ALL: &str = "*";

pub struct Router {
    endpoints: RwLock<HashMap<String, Arc<dyn Handler>>>,
    monitor: Arc<dyn CallMonitor>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_monitor(Arc::new(NoopMonitor))
    }

    pub fn with_monitor(monitor: Arc<dyn CallMonitor>) -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            monitor,
        }
    }

    /// Binds `handler` under `name`. An existing binding is never replaced.
    pub fn bind(&self, name: &str, handler: Arc<dyn Handler>) -> Result<(), Status> {
        if name.is_empty() {
            return Err(Status::invalid_argument("endpoint name must not be empty"));
        }
        match self.endpoints.write().entry(name.to_string()) {
            Entry::Occupied(_) => {
                return Err(Status::already_exists(format!(
                    "endpoint {name} is already bound"
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(handler);
            }
        }
        debug!(endpoint = name, "endpoint bound");
        Ok(())
    }

    pub fn unbind(&self, name: &str) -> Result<(), Status> {
        let removed = self.endpoints.write().remove(name);
        match removed {
            Some(_) => {
                debug!(endpoint = name, "endpoint unbound");
                Ok(())
            }
            None => Err(Status::not_found(format!("endpoint {name} not found"))),
        }
    }

    /// Currently bound names, sorted. Advisory only: bindings may change
    /// right after this returns.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.endpoints.read().contains_key(name)
    }

    /// Binds `name` to a handler forwarding to `target` on this router.
    pub fn forward(self: &Arc<Self>, name: &str, target: &str) -> Result<(), Status> {
        let handler = ForwardHandler::new(Arc::downgrade(self), target);
        self.bind(name, Arc::new(handler))
    }

    /// Loads a script and binds one endpoint per function it returns.
    /// Stops at the first name that is already bound; endpoints bound before
    /// it stay bound.
    pub fn bind_script(
        &self,
        runtime: &Arc<HostedRuntime>,
        source: &str,
        chunk_name: &str,
    ) -> Result<Vec<String>, Status> {
        let handlers = LuaCallHandler::from_script(runtime, source, chunk_name)?;
        let mut bound = Vec::with_capacity(handlers.len());
        for (name, handler) in handlers {
            self.bind(&name, Arc::new(handler))?;
            bound.push(name);
        }
        Ok(bound)
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn Handler>> {
        let endpoints = self.endpoints.read();
        endpoints
            .get(name)
            .or_else(|| endpoints.get(CATCH_ALL))
            .cloned()
    }

    /// Routes one call. The handler's outcome is returned unchanged.
    #[tracing::instrument(skip_all, fields(endpoint = name))]
    pub async fn dispatch(&self, name: &str, args: CallArguments) -> Result<CallResult, Status> {
        let handler = self.lookup(name).ok_or_else(|| {
            debug!("no handler bound");
            Status::not_found(format!("endpoint {name} not found"))
        })?;

        let _scope = self.monitor.on_call(name);
        let outcome = handler.call(name, args).await;
        debug!(ok = outcome.is_ok(), "dispatch finished");
        outcome
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
