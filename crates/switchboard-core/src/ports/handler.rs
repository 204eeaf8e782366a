//! Handler port - the capability that executes one call for a bound endpoint.

use async_trait::async_trait;

use crate::domain::{CallArguments, CallResult, Status};

/// Handler executes a call and produces either a result or a status.
///
/// # Example
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl Handler for Echo {
///     async fn call(&self, _endpoint: &str, args: CallArguments) -> Result<CallResult, Status> {
///         let first = args.args.into_iter().next()
///             .ok_or_else(|| Status::invalid_argument("echo needs one argument"))?;
///         Ok(CallResult::new(first))
///     }
/// }
/// ```
///
/// # Contract
/// - Called concurrently from many tasks; implementations must be `Send + Sync`.
/// - `endpoint` is the name the caller dispatched to. For a catch-all binding
///   it differs from the name the handler was bound under.
/// - The router keeps no state about the variant it holds, so every handler
///   (Lua callable, forwarder, native closure) is interchangeable.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, endpoint: &str, args: CallArguments) -> Result<CallResult, Status>;
}
