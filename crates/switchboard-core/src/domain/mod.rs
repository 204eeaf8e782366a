//! Domain model: wire messages, payloads, tensors, statuses.
//!
//! Nothing in here touches the hosted runtime or the router; these are the
//! values that flow between them.

pub mod call;
pub mod errors;
pub mod payload;
pub mod status;
pub mod tensor;

pub use self::call::{CallArguments, CallResult};
pub use self::errors::CodecError;
pub use self::payload::{DType, Payload, SerializedObject, TensorPayload};
pub use self::status::{Status, StatusCode};
pub use self::tensor::{Tensor, TensorData, TensorElement};
