//! Ports - the seams between the router and its collaborators.
//!
//! - **Handler**: what the router dispatches to
//! - **TensorDecoder**: raw tensor bytes to typed tensors
//! - **CallMonitor**: instrumentation scope around each call

pub mod handler;
pub mod monitor;
pub mod tensor_decoder;

pub use self::handler::Handler;
pub use self::monitor::{CallMonitor, CallScope, NoopMonitor, TracingMonitor};
pub use self::tensor_decoder::{LittleEndianDecoder, TensorDecoder};
