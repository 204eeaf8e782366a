//! The `rpc` global installed into every hosted runtime.
//!
//! - `rpc.raise(kind_or_kinds, message)` raises a categorized failure
//! - `rpc.tensor(dtype, shape, values)` builds a tensor
//! - `rpc.bytes(s)` wraps a string as raw bytes
//! - `rpc.none` stands for a none value stored in a table
//!
//! Tensors are userdata wrapping an `Arc<Tensor>`, so a tensor passed in by
//! the caller and returned unchanged is never copied inside the VM.

use std::sync::Arc;

use mlua::{Lua, MetaMethod, Table, UserData, UserDataMethods, Value};

use super::failure::{FailureCategory, RaisedFailure};
use crate::domain::{DType, Tensor, TensorData, TensorElement};

/// Tensor as seen by scripts.
#[derive(Debug, Clone)]
pub struct LuaTensor(pub Arc<Tensor>);

fn element_value(element: TensorElement) -> Value {
    match element {
        TensorElement::Float(x) => Value::Number(x),
        TensorElement::Int(i) => Value::Integer(i),
        TensorElement::Bool(b) => Value::Boolean(b),
    }
}

impl UserData for LuaTensor {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("dtype", |_, this, ()| Ok(this.0.dtype().name()));

        methods.add_method("shape", |lua, this, ()| {
            lua.create_sequence_from(this.0.shape().iter().map(|&dim| dim as i64))
        });

        // t:get(i) -> element at flat, 1-based index i
        methods.add_method("get", |_, this, index: i64| {
            let element = usize::try_from(index)
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| this.0.get(i))
                .ok_or_else(|| {
                    RaisedFailure::new(
                        FailureCategory::Index,
                        format!(
                            "tensor index {index} out of range for {} elements",
                            this.0.len()
                        ),
                    )
                    .into_lua()
                })?;
            Ok(element_value(element))
        });

        methods.add_method("to_table", |lua, this, ()| {
            lua.create_sequence_from((0..this.0.len()).filter_map(|i| this.0.get(i)).map(element_value))
        });

        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.0.len()));

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("tensor<{}>{:?}", this.0.dtype(), this.0.shape()))
        });
    }
}

/// Placeholder for none inside tables, where nil would leave a hole.
#[derive(Debug, Clone, Copy)]
pub struct LuaNone;

impl UserData for LuaNone {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, _, ()| Ok("none"));
    }
}

const NONE_KEY: &str = "switchboard.none";

/// The single `rpc.none` value of this VM.
pub fn none_value(lua: &Lua) -> mlua::Result<Value> {
    lua.named_registry_value(NONE_KEY)
}

/// Bytes as seen by scripts, kept apart from strings.
#[derive(Debug, Clone)]
pub struct LuaBytes(pub Vec<u8>);

impl UserData for LuaBytes {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("raw", |lua, this, ()| lua.create_string(&this.0));
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.0.len()));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
            Ok(format!("bytes<{}>", this.0.len()))
        });
    }
}

fn bytes(_: &Lua, raw: mlua::String) -> mlua::Result<LuaBytes> {
    Ok(LuaBytes(raw.as_bytes().to_vec()))
}

fn value_failure(message: impl Into<String>) -> mlua::Error {
    RaisedFailure::new(FailureCategory::Value, message).into_lua()
}

fn raise(_: &Lua, (kinds, message): (Value, String)) -> mlua::Result<()> {
    let categories = match kinds {
        Value::String(kind) => vec![FailureCategory::parse(&kind.to_str()?)],
        Value::Table(kinds) => kinds
            .sequence_values::<String>()
            .map(|kind| kind.map(|kind| FailureCategory::parse(&kind)))
            .collect::<mlua::Result<Vec<_>>>()?,
        other => {
            return Err(RaisedFailure::new(
                FailureCategory::Type,
                format!(
                    "rpc.raise expects a kind name or a list of kind names, got {}",
                    other.type_name()
                ),
            )
            .into_lua());
        }
    };
    Err(RaisedFailure {
        categories,
        message,
    }
    .into_lua())
}

fn collect<T: mlua::FromLua>(values: &Table) -> mlua::Result<Vec<T>> {
    values.sequence_values::<T>().collect()
}

fn tensor(_: &Lua, (dtype, shape, values): (String, Vec<i64>, Table)) -> mlua::Result<LuaTensor> {
    let dtype = DType::parse(&dtype).ok_or_else(|| value_failure(format!("unknown dtype '{dtype}'")))?;
    let shape = shape
        .into_iter()
        .map(usize::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| value_failure("tensor shape must not contain negative dimensions"))?;

    let data = match dtype {
        DType::Float32 => TensorData::Float32(collect(&values)?),
        DType::Float64 => TensorData::Float64(collect(&values)?),
        DType::Int32 => TensorData::Int32(collect(&values)?),
        DType::Int64 => TensorData::Int64(collect(&values)?),
        DType::Uint8 => TensorData::Uint8(collect(&values)?),
        DType::Bool => TensorData::Bool(collect(&values)?),
    };
    let tensor = Tensor::new(shape, data).map_err(|err| value_failure(err.to_string()))?;
    Ok(LuaTensor(Arc::new(tensor)))
}

/// Installs the `rpc` global.
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let rpc = lua.create_table()?;
    rpc.set("raise", lua.create_function(raise)?)?;
    rpc.set("tensor", lua.create_function(tensor)?)?;
    rpc.set("bytes", lua.create_function(bytes)?)?;

    let none = lua.create_userdata(LuaNone)?;
    lua.set_named_registry_value(NONE_KEY, none.clone())?;
    rpc.set("none", none)?;
    lua.globals().set("rpc", rpc)?;
    Ok(())
}
