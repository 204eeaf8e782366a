//! Tensor - decoded, typed tensor values.

use super::errors::CodecError;
use super::payload::DType;

/// Flat element storage, one variant per dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Uint8(Vec<u8>),
    Bool(Vec<bool>),
}

/// A single element read out of a tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TensorElement {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl TensorData {
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Float32(_) => DType::Float32,
            TensorData::Float64(_) => DType::Float64,
            TensorData::Int32(_) => DType::Int32,
            TensorData::Int64(_) => DType::Int64,
            TensorData::Uint8(_) => DType::Uint8,
            TensorData::Bool(_) => DType::Bool,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::Float32(v) => v.len(),
            TensorData::Float64(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::Uint8(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a flat, zero-based index.
    pub fn get(&self, index: usize) -> Option<TensorElement> {
        match self {
            TensorData::Float32(v) => v.get(index).map(|&x| TensorElement::Float(f64::from(x))),
            TensorData::Float64(v) => v.get(index).map(|&x| TensorElement::Float(x)),
            TensorData::Int32(v) => v.get(index).map(|&x| TensorElement::Int(i64::from(x))),
            TensorData::Int64(v) => v.get(index).map(|&x| TensorElement::Int(x)),
            TensorData::Uint8(v) => v.get(index).map(|&x| TensorElement::Int(i64::from(x))),
            TensorData::Bool(v) => v.get(index).map(|&x| TensorElement::Bool(x)),
        }
    }
}

/// Number of elements a shape holds; `None` on overflow. A scalar (empty
/// shape) holds one element.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
}

/// A decoded tensor. The element count always matches the shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self, CodecError> {
        let expected = element_count(&shape).ok_or_else(|| CodecError::ShapeOverflow {
            shape: shape.iter().map(|&d| d as u64).collect(),
        })?;
        if expected != data.len() {
            return Err(CodecError::ElementCount {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TensorElement> {
        self.data.get(index)
    }
}
