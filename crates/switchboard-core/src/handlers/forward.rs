//! ForwardHandler - re-dispatches a call to another endpoint.
//!
//! Every forward records the endpoint it left in a task-local chain. A
//! target already on the chain is a cycle and fails instead of recursing.

use std::sync::Weak;

use async_trait::async_trait;

use crate::domain::{CallArguments, CallResult, Status};
use crate::ports::Handler;
use crate::router::Router;

tokio::task_local! {
    static FORWARD_CHAIN: Vec<String>;
}

/// Sends every call, unchanged, to `target` on a router it does not own.
pub struct ForwardHandler {
    router: Weak<Router>,
    target: String,
}

impl ForwardHandler {
    pub fn new(router: Weak<Router>, target: impl Into<String>) -> Self {
        Self {
            router,
            target: target.into(),
        }
    }
}

#[async_trait]
impl Handler for ForwardHandler {
    async fn call(&self, endpoint: &str, args: CallArguments) -> Result<CallResult, Status> {
        let mut chain = FORWARD_CHAIN
            .try_with(Clone::clone)
            .unwrap_or_default();
        chain.push(endpoint.to_string());
        if chain.contains(&self.target) {
            return Err(Status::invalid_argument(format!(
                "forwarding cycle: {} -> {}",
                chain.join(" -> "),
                self.target
            )));
        }

        let router = self.router.upgrade().ok_or_else(|| {
            Status::internal(format!(
                "router is gone, cannot forward to '{}'",
                self.target
            ))
        })?;
        FORWARD_CHAIN
            .scope(chain, router.dispatch(&self.target, args))
            .await
    }
}
