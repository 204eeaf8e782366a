//! JSON <-> payload bridge for the command line.
//!
//! Arguments are plain JSON values. A top-level argument of the form
//! `{"$tensor": {"dtype": "float32", "shape": [2], "values": [1, 2]}}` is
//! sent as a tensor payload; everything else becomes an object payload.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Map, Number, Value};
use switchboard_core::codec::{decode_tensor, encode_tensor};
use switchboard_core::domain::{
    CallArguments, DType, Payload, SerializedObject, Tensor, TensorData, TensorElement,
    TensorPayload,
};

const TENSOR_KEY: &str = "$tensor";

/// Parses the positional (JSON array) and keyword (JSON object) arguments.
pub fn call_arguments(args: &str, kwargs: &str) -> Result<CallArguments> {
    let args: Value = serde_json::from_str(args).context("positional arguments are not valid JSON")?;
    let kwargs: Value =
        serde_json::from_str(kwargs).context("keyword arguments are not valid JSON")?;

    let Value::Array(args) = args else {
        bail!("positional arguments must be a JSON array");
    };
    let Value::Object(kwargs) = kwargs else {
        bail!("keyword arguments must be a JSON object");
    };

    let mut call = CallArguments::new();
    for arg in &args {
        call = call.with_arg(payload_from_json(arg)?);
    }
    for (name, value) in &kwargs {
        call = call.with_kwarg(name.clone(), payload_from_json(value)?);
    }
    Ok(call)
}

fn payload_from_json(value: &Value) -> Result<Payload> {
    if let Some(fields) = value.as_object().and_then(|map| map.get(TENSOR_KEY)) {
        return Ok(Payload::Tensor(tensor_from_json(fields)?));
    }
    Ok(Payload::from_object(&object_from_json(value))?)
}

fn object_from_json(value: &Value) -> SerializedObject {
    match value {
        Value::Null => SerializedObject::None,
        Value::Bool(b) => SerializedObject::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SerializedObject::Int(i),
            None => SerializedObject::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SerializedObject::String(s.clone()),
        Value::Array(items) => SerializedObject::List(items.iter().map(object_from_json).collect()),
        Value::Object(map) => SerializedObject::dict(
            map.iter()
                .map(|(k, v)| (SerializedObject::String(k.clone()), object_from_json(v))),
        ),
    }
}

fn tensor_from_json(fields: &Value) -> Result<TensorPayload> {
    let dtype_name = fields
        .get("dtype")
        .and_then(Value::as_str)
        .context("tensor needs a string 'dtype'")?;
    let dtype = DType::parse(dtype_name).ok_or_else(|| anyhow!("unknown dtype '{dtype_name}'"))?;
    let shape: Vec<usize> = serde_json::from_value(fields.get("shape").cloned().unwrap_or_default())
        .context("tensor 'shape' must be a list of non-negative integers")?;
    let values = fields
        .get("values")
        .and_then(Value::as_array)
        .context("tensor needs a 'values' list")?;

    let data = match dtype {
        DType::Float32 => TensorData::Float32(numbers(values, |v| v.as_f64().map(|x| x as f32))?),
        DType::Float64 => TensorData::Float64(numbers(values, Value::as_f64)?),
        DType::Int32 => TensorData::Int32(numbers(values, |v| {
            v.as_i64().and_then(|i| i32::try_from(i).ok())
        })?),
        DType::Int64 => TensorData::Int64(numbers(values, Value::as_i64)?),
        DType::Uint8 => TensorData::Uint8(numbers(values, |v| {
            v.as_u64().and_then(|i| u8::try_from(i).ok())
        })?),
        DType::Bool => TensorData::Bool(numbers(values, Value::as_bool)?),
    };
    let tensor = Tensor::new(shape, data)?;
    Ok(encode_tensor(&tensor, None))
}

fn numbers<T>(values: &[Value], read: impl Fn(&Value) -> Option<T>) -> Result<Vec<T>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| read(v).ok_or_else(|| anyhow!("tensor value {i} ({v}) does not fit the dtype")))
        .collect()
}

/// Renders a result payload as JSON.
pub fn payload_to_json(payload: &Payload) -> Result<Value> {
    object_to_json(&payload.to_object()?)
}

fn object_to_json(object: &SerializedObject) -> Result<Value> {
    let value = match object {
        SerializedObject::None => Value::Null,
        SerializedObject::Bool(b) => Value::Bool(*b),
        SerializedObject::Int(i) => Value::from(*i),
        SerializedObject::Double(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
        SerializedObject::Bytes(bytes) => Value::from(bytes.clone()),
        SerializedObject::String(s) => Value::String(s.clone()),
        SerializedObject::List(items) => Value::Array(
            items
                .iter()
                .map(object_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        SerializedObject::Dict { keys, values } => {
            let string_keys: Option<Vec<&str>> = keys
                .iter()
                .map(|key| match key {
                    SerializedObject::String(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect();
            match string_keys {
                Some(names) => {
                    let mut map = Map::new();
                    for (name, value) in names.into_iter().zip(values) {
                        map.insert(name.to_string(), object_to_json(value)?);
                    }
                    Value::Object(map)
                }
                // Non-string keys: a list of [key, value] pairs.
                None => Value::Array(
                    keys.iter()
                        .zip(values)
                        .map(|(k, v)| -> Result<Value> {
                            Ok(Value::Array(vec![object_to_json(k)?, object_to_json(v)?]))
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
            }
        }
        SerializedObject::Tensor(payload) => tensor_to_json(payload)?,
    };
    Ok(value)
}

fn tensor_to_json(payload: &TensorPayload) -> Result<Value> {
    let tensor = decode_tensor(payload)?;
    let values: Vec<Value> = (0..tensor.len())
        .filter_map(|i| tensor.get(i))
        .map(|element| match element {
            TensorElement::Float(x) => Number::from_f64(x).map_or(Value::Null, Value::Number),
            TensorElement::Int(i) => Value::from(i),
            TensorElement::Bool(b) => Value::Bool(b),
        })
        .collect();
    let mut fields = Map::new();
    fields.insert("dtype".into(), Value::from(tensor.dtype().name()));
    fields.insert("shape".into(), Value::from(tensor.shape().to_vec()));
    fields.insert("values".into(), Value::Array(values));
    let mut wrapper = Map::new();
    wrapper.insert(TENSOR_KEY.into(), Value::Object(fields));
    Ok(Value::Object(wrapper))
}
