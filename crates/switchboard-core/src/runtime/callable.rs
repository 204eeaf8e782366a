//! Callable - an owned reference to a function living in the hosted runtime.

use std::fmt;
use std::sync::Arc;

use mlua::{Function, Lua, MultiValue, RegistryKey, Value};
use tracing::warn;

use super::HostedRuntime;
use super::convert::{ArgumentDecoder, ReturnValue};
use crate::codec::TensorLookup;
use crate::domain::{CallArguments, Status};

/// Owns a registry reference to one VM function. Dropping never blocks: the
/// reference is removed now if the VM is free, otherwise on the next section.
pub struct Callable {
    runtime: Arc<HostedRuntime>,
    key: Option<RegistryKey>,
}

impl Callable {
    pub(crate) fn from_key(runtime: Arc<HostedRuntime>, key: RegistryKey) -> Self {
        Self {
            runtime,
            key: Some(key),
        }
    }

    /// Runs the function with `args`. Blocks on the exclusive section, so
    /// callers on an async runtime go through the blocking pool.
    ///
    /// Tensors come from `lookup`, which must have been built from the same
    /// arguments.
    pub fn invoke(&self, args: &CallArguments, lookup: &TensorLookup) -> Result<ReturnValue, Status> {
        let section = self.runtime.enter();
        let outcome = self.invoke_in(&section, args, lookup);
        drop(section);
        outcome
    }

    fn invoke_in(
        &self,
        lua: &Lua,
        args: &CallArguments,
        lookup: &TensorLookup,
    ) -> Result<ReturnValue, Status> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| Status::internal("callable reference already released"))?;
        let function: Function = lua
            .registry_value(key)
            .map_err(|err| Status::internal(format!("callable reference is invalid: {err}")))?;

        let mut decoder = ArgumentDecoder::new(lua, lookup);
        let mut values = Vec::with_capacity(args.args.len() + 1);
        for (position, payload) in args.args.iter().enumerate() {
            values.push(decoder.decode_payload(position, payload)?);
        }
        if !args.kwargs.is_empty() {
            let kwargs = lua.create_table_with_capacity(0, args.kwargs.len())?;
            for (offset, (name, payload)) in args.kwargs.iter().enumerate() {
                let value = decoder.decode_kwarg(args.args.len() + offset, payload)?;
                kwargs.raw_set(name.as_str(), value)?;
            }
            values.push(Value::Table(kwargs));
        }

        match function.call::<MultiValue>(MultiValue::from_vec(values)) {
            Ok(returned) => Ok(ReturnValue::from_returns(returned.into_iter().collect())?),
            Err(err) => {
                let status = Status::from(err);
                warn!(code = %status.code, message = %status.message, "callable failed");
                Err(status)
            }
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("released", &self.key.is_none())
            .finish()
    }
}

impl Drop for Callable {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.runtime.release(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Payload, SerializedObject, StatusCode};

    fn int(value: i64) -> Payload {
        Payload::from_object(&SerializedObject::Int(value)).unwrap()
    }

    fn run(callable: &Callable, args: &CallArguments) -> Result<SerializedObject, Status> {
        let lookup = TensorLookup::default();
        let payload = callable.invoke(args, &lookup)?.into_payload()?;
        Ok(payload.to_object()?)
    }

    #[test]
    fn positionals_then_kwargs_table() {
        let runtime = HostedRuntime::new().unwrap();
        let callable = runtime
            .compile("return function(a, kw) return a * kw.scale end")
            .unwrap();
        let args = CallArguments::new()
            .with_arg(int(6))
            .with_kwarg("scale", int(7));
        assert_eq!(run(&callable, &args).unwrap(), SerializedObject::Int(42));
    }

    #[test]
    fn no_kwargs_means_no_trailing_table() {
        let runtime = HostedRuntime::new().unwrap();
        let callable = runtime
            .compile("return function(...) return select('#', ...) end")
            .unwrap();
        let args = CallArguments::new().with_arg(int(1));
        assert_eq!(run(&callable, &args).unwrap(), SerializedObject::Int(1));
    }

    #[test]
    fn failure_releases_the_section() {
        let runtime = HostedRuntime::new().unwrap();
        let callable = runtime.compile("return function() error('nope') end").unwrap();
        let status = run(&callable, &CallArguments::new()).unwrap_err();
        assert_eq!(status.code, StatusCode::Unknown);
        assert!(status.message.contains("nope"));

        // The section is free again.
        drop(runtime.enter());
    }

    #[test]
    fn dropping_releases_the_registry_reference() {
        let runtime = HostedRuntime::new().unwrap();
        let callable = runtime.compile("return function() end").unwrap();
        drop(callable);
        drop(runtime.enter());
    }
}
