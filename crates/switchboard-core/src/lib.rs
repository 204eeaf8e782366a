//! switchboard-core
//!
//! Routes wire-serialized calls to named endpoints and runs them against an
//! embedded Lua runtime.
//!
//! # Modules
//! - **domain**: wire messages, payloads, tensors, statuses
//! - **ports**: seams (Handler, TensorDecoder, CallMonitor)
//! - **codec**: payload encode/decode and the per-call tensor lookup
//! - **runtime**: the hosted VM, its exclusive section and callables
//! - **error_map**: runtime failure -> status code
//! - **handlers**: Lua, forwarding and native handlers
//! - **router**: endpoint registry and dispatch
//! - **app**: RouterBuilder
//! - **config**: RuntimeConfig loading

pub mod app;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error_map;
pub mod handlers;
pub mod ports;
pub mod router;
pub mod runtime;

pub use crate::app::{BuildError, RouterBuilder};
pub use crate::config::{ConfigError, RuntimeConfig};
pub use crate::domain::{CallArguments, CallResult, Payload, SerializedObject, Status, StatusCode};
pub use crate::handlers::{FnHandler, ForwardHandler, LuaCallHandler};
pub use crate::ports::{CallMonitor, Handler, TracingMonitor};
pub use crate::router::{CATCH_ALL, Router};
pub use crate::runtime::{HostedRuntime, RuntimeError};
