//! Conversion between payloads and VM values.
//!
//! Everything here runs inside the exclusive section: it creates or reads
//! VM values.
//!
//! None is nil as a positional argument or a return value. Inside a table
//! (list item, dict value, keyword argument) it is `rpc.none`. Bytes become
//! `rpc.bytes` userdata so they do not come back as strings.

use std::collections::HashMap;
use std::sync::Arc;

use mlua::{AnyUserData, Lua, Table, Value};

use super::prelude::{LuaBytes, LuaNone, LuaTensor, none_value};
use crate::codec::{TensorLookup, decode_object, decode_tensor, encode_tensor};
use crate::domain::{CodecError, Payload, SerializedObject, Status, Tensor};

/// Deepest table nesting accepted when encoding a returned value. Also
/// stops self-referencing tables.
pub const MAX_DEPTH: usize = 64;

/// Decodes the payloads of one call into VM values.
///
/// Payloads sharing a reference index decode to the same userdata, so
/// `rawequal(a, b)` holds for them inside the callable.
pub struct ArgumentDecoder<'a> {
    lua: &'a Lua,
    lookup: &'a TensorLookup,
    shared: HashMap<u32, AnyUserData>,
}

impl<'a> ArgumentDecoder<'a> {
    pub fn new(lua: &'a Lua, lookup: &'a TensorLookup) -> Self {
        Self {
            lua,
            lookup,
            shared: HashMap::new(),
        }
    }

    /// Decodes the payload found at `position` in decode order.
    pub fn decode_payload(&mut self, position: usize, payload: &Payload) -> Result<Value, Status> {
        match payload {
            Payload::Tensor(tensor) => {
                let seen = tensor.reference.and_then(|r| self.shared.get(&r));
                if let Some(userdata) = seen {
                    return Ok(Value::UserData(userdata.clone()));
                }
                let decoded = self.lookup.resolve(position, tensor)?;
                let userdata = self.lua.create_userdata(LuaTensor(decoded))?;
                if let Some(reference) = tensor.reference {
                    self.shared.insert(reference, userdata.clone());
                }
                Ok(Value::UserData(userdata))
            }
            Payload::Object { data } => {
                let object = decode_object(data)?;
                self.object_value(&object)
            }
        }
    }

    /// Like `decode_payload`, for a value stored in the keyword table.
    pub fn decode_kwarg(&mut self, position: usize, payload: &Payload) -> Result<Value, Status> {
        match self.decode_payload(position, payload)? {
            Value::Nil => Ok(none_value(self.lua)?),
            value => Ok(value),
        }
    }

    fn object_value(&self, object: &SerializedObject) -> Result<Value, Status> {
        let value = match object {
            SerializedObject::None => Value::Nil,
            SerializedObject::Bool(b) => Value::Boolean(*b),
            SerializedObject::Int(i) => Value::Integer(*i),
            SerializedObject::Double(x) => Value::Number(*x),
            SerializedObject::Bytes(bytes) => {
                Value::UserData(self.lua.create_userdata(LuaBytes(bytes.clone()))?)
            }
            SerializedObject::String(text) => Value::String(self.lua.create_string(text)?),
            SerializedObject::List(items) => {
                let table = self.lua.create_table_with_capacity(items.len(), 0)?;
                for (i, item) in items.iter().enumerate() {
                    table.raw_set(i + 1, self.item_value(item)?)?;
                }
                Value::Table(table)
            }
            SerializedObject::Dict { keys, values } => {
                let table = self.lua.create_table_with_capacity(0, keys.len())?;
                for (key, value) in keys.iter().zip(values) {
                    if matches!(key, SerializedObject::None) {
                        return Err(Status::invalid_argument("dict key must not be none"));
                    }
                    table.raw_set(self.object_value(key)?, self.item_value(value)?)?;
                }
                Value::Table(table)
            }
            SerializedObject::Tensor(payload) => {
                let tensor = decode_tensor(payload)?;
                Value::UserData(self.lua.create_userdata(LuaTensor(Arc::new(tensor)))?)
            }
        };
        Ok(value)
    }

    fn item_value(&self, object: &SerializedObject) -> Result<Value, Status> {
        match object {
            SerializedObject::None => Ok(none_value(self.lua)?),
            other => self.object_value(other),
        }
    }
}

/// A callable's result, encoded as far as possible inside the section.
#[derive(Debug)]
pub enum ReturnValue {
    Tensor(Arc<Tensor>),
    Object(SerializedObject),
}

impl ReturnValue {
    /// Encodes values returned by a callable: none for no values, the value
    /// itself for one, a list for several.
    pub fn from_returns(mut values: Vec<Value>) -> Result<Self, CodecError> {
        match values.len() {
            0 => Ok(ReturnValue::Object(SerializedObject::None)),
            1 => {
                let value = values.remove(0);
                if let Some(tensor) = tensor_of(&value) {
                    return Ok(ReturnValue::Tensor(tensor));
                }
                encode_value(&value, 0).map(ReturnValue::Object)
            }
            _ => values
                .iter()
                .map(|value| encode_value(value, 0))
                .collect::<Result<Vec<_>, _>>()
                .map(|items| ReturnValue::Object(SerializedObject::List(items))),
        }
    }

    /// Final wire encoding; needs no VM access.
    pub fn into_payload(self) -> Result<Payload, CodecError> {
        match self {
            ReturnValue::Tensor(tensor) => Ok(Payload::Tensor(encode_tensor(&tensor, None))),
            ReturnValue::Object(object) => Payload::from_object(&object),
        }
    }
}

fn tensor_of(value: &Value) -> Option<Arc<Tensor>> {
    match value {
        Value::UserData(userdata) => userdata
            .borrow::<LuaTensor>()
            .ok()
            .map(|tensor| Arc::clone(&tensor.0)),
        _ => None,
    }
}

/// Encodes a VM value as an object tree.
pub fn encode_value(value: &Value, depth: usize) -> Result<SerializedObject, CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep(MAX_DEPTH));
    }
    let object = match value {
        Value::Nil => SerializedObject::None,
        Value::Boolean(b) => SerializedObject::Bool(*b),
        Value::Integer(i) => SerializedObject::Int(*i),
        Value::Number(x) if !x.is_finite() => return Err(CodecError::NonFinite(*x)),
        Value::Number(x) => SerializedObject::Double(*x),
        Value::String(s) => match s.to_str() {
            Ok(text) => SerializedObject::String((*text).to_owned()),
            Err(_) => SerializedObject::Bytes(s.as_bytes().to_vec()),
        },
        Value::Table(table) => encode_table(table, depth)?,
        Value::UserData(userdata) if userdata.is::<LuaNone>() => SerializedObject::None,
        Value::UserData(userdata) => {
            if let Ok(bytes) = userdata.borrow::<LuaBytes>() {
                SerializedObject::Bytes(bytes.0.clone())
            } else if let Some(tensor) = tensor_of(value) {
                SerializedObject::Tensor(encode_tensor(&tensor, None))
            } else {
                return Err(CodecError::Unserializable("userdata".into()));
            }
        }
        other => return Err(CodecError::Unserializable(other.type_name().into())),
    };
    Ok(object)
}

/// A table is a list when its keys are exactly `1..=n`; the empty table is
/// an empty list. Anything else is a dict.
fn encode_table(table: &Table, depth: usize) -> Result<SerializedObject, CodecError> {
    let mut entries = Vec::new();
    for pair in table.pairs::<Value, Value>() {
        let pair = pair.map_err(|err| CodecError::Unserializable(err.to_string()))?;
        entries.push(pair);
    }

    let n = entries.len() as i64;
    let is_list = entries
        .iter()
        .all(|(key, _)| matches!(key, Value::Integer(i) if (1..=n).contains(i)));

    if is_list {
        entries.sort_by_key(|(key, _)| match key {
            Value::Integer(i) => *i,
            _ => 0,
        });
        let items = entries
            .iter()
            .map(|(_, value)| encode_value(value, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(SerializedObject::List(items));
    }

    let mut keys = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    for (key, value) in &entries {
        keys.push(encode_value(key, depth + 1)?);
        values.push(encode_value(value, depth + 1)?);
    }
    Ok(SerializedObject::Dict { keys, values })
}
