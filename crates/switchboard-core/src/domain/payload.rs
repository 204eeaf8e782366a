//! Payload model: the wire shape of a single value.
//!
//! A payload is either a numeric tensor carried as raw little-endian bytes,
//! or an opaque object blob. The blob holds a JSON-encoded
//! [`SerializedObject`] tree; transports never look inside it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Float32,
    Float64,
    Int32,
    Int64,
    Uint8,
    Bool,
}

impl DType {
    /// Size of one element in the raw byte layout.
    pub fn element_size(self) -> usize {
        match self {
            DType::Float32 | DType::Int32 => 4,
            DType::Float64 | DType::Int64 => 8,
            DType::Uint8 | DType::Bool => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::Uint8 => "uint8",
            DType::Bool => "bool",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "float32" => Some(DType::Float32),
            "float64" => Some(DType::Float64),
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            "uint8" => Some(DType::Uint8),
            "bool" => Some(DType::Bool),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw tensor as it travels on the wire.
///
/// `data` is row-major, little-endian, `product(shape) * element_size` bytes.
/// Payloads in the same call that carry the same `reference` denote one
/// shared value and are decoded once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorPayload {
    pub dtype: DType,
    pub shape: Vec<u64>,
    pub data: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<u32>,
}

/// A wire-serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Tensor(TensorPayload),
    Object { data: Vec<u8> },
}

/// Generic value tree stored inside `Payload::Object`.
///
/// Tensors nested inside an object are carried inline and never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SerializedObject {
    None,
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<SerializedObject>),
    Dict {
        keys: Vec<SerializedObject>,
        values: Vec<SerializedObject>,
    },
    Tensor(TensorPayload),
}

impl SerializedObject {
    /// Builds a dict from key/value pairs, keeping their order.
    pub fn dict(pairs: impl IntoIterator<Item = (SerializedObject, SerializedObject)>) -> Self {
        let (keys, values) = pairs.into_iter().unzip();
        SerializedObject::Dict { keys, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_by_kind() {
        let p = Payload::Object { data: vec![1, 2] };
        let v: serde_json::Value = serde_json::to_value(&p).unwrap();
        assert_eq!(v["kind"], "object");

        let t = Payload::Tensor(TensorPayload {
            dtype: DType::Int32,
            shape: vec![1],
            data: vec![7, 0, 0, 0],
            reference: Some(3),
        });
        let v: serde_json::Value = serde_json::to_value(&t).unwrap();
        assert_eq!(v["kind"], "tensor");
        assert_eq!(v["dtype"], "int32");
        assert_eq!(v["reference"], 3);
    }

    #[test]
    fn reference_is_omitted_when_absent() {
        let t = Payload::Tensor(TensorPayload {
            dtype: DType::Uint8,
            shape: vec![],
            data: vec![1],
            reference: None,
        });
        let s = serde_json::to_string(&t).unwrap();
        assert!(!s.contains("reference"));
    }

    #[test]
    fn dtype_names_parse_back() {
        for dtype in [
            DType::Float32,
            DType::Float64,
            DType::Int32,
            DType::Int64,
            DType::Uint8,
            DType::Bool,
        ] {
            assert_eq!(DType::parse(dtype.name()), Some(dtype));
        }
        assert_eq!(DType::parse("complex64"), None);
    }

    #[test]
    fn dict_helper_keeps_pair_order() {
        let d = SerializedObject::dict([
            (SerializedObject::String("b".into()), SerializedObject::Int(2)),
            (SerializedObject::String("a".into()), SerializedObject::Int(1)),
        ]);
        let SerializedObject::Dict { keys, values } = d else {
            panic!("expected dict");
        };
        assert_eq!(keys[0], SerializedObject::String("b".into()));
        assert_eq!(values[1], SerializedObject::Int(1));
    }
}
