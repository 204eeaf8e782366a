//! Tensor path of the payload codec: raw little-endian bytes <-> `Tensor`.

use crate::domain::{CodecError, DType, Tensor, TensorData, TensorPayload};

fn read_le<const N: usize, T>(bytes: &[u8], from_le: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(chunk);
            from_le(buf)
        })
        .collect()
}

fn shape_to_usize(shape: &[u64]) -> Result<Vec<usize>, CodecError> {
    shape
        .iter()
        .map(|&dim| usize::try_from(dim))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| CodecError::ShapeOverflow {
            shape: shape.to_vec(),
        })
}

/// Decodes a wire tensor, checking the byte length against dtype and shape.
pub fn decode_tensor(payload: &TensorPayload) -> Result<Tensor, CodecError> {
    let shape = shape_to_usize(&payload.shape)?;
    let expected = crate::domain::tensor::element_count(&shape)
        .and_then(|n| n.checked_mul(payload.dtype.element_size()))
        .ok_or_else(|| CodecError::ShapeOverflow {
            shape: payload.shape.clone(),
        })?;
    if payload.data.len() != expected {
        return Err(CodecError::TensorSize {
            dtype: payload.dtype,
            shape: payload.shape.clone(),
            expected,
            actual: payload.data.len(),
        });
    }

    let bytes = payload.data.as_slice();
    let data = match payload.dtype {
        DType::Float32 => TensorData::Float32(read_le(bytes, f32::from_le_bytes)),
        DType::Float64 => TensorData::Float64(read_le(bytes, f64::from_le_bytes)),
        DType::Int32 => TensorData::Int32(read_le(bytes, i32::from_le_bytes)),
        DType::Int64 => TensorData::Int64(read_le(bytes, i64::from_le_bytes)),
        DType::Uint8 => TensorData::Uint8(bytes.to_vec()),
        DType::Bool => TensorData::Bool(bytes.iter().map(|&b| b != 0).collect()),
    };
    Tensor::new(shape, data)
}

/// Encodes a tensor into its wire form.
pub fn encode_tensor(tensor: &Tensor, reference: Option<u32>) -> TensorPayload {
    let data = match tensor.data() {
        TensorData::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::Float64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::Int32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::Int64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TensorData::Uint8(v) => v.clone(),
        TensorData::Bool(v) => v.iter().map(|&b| u8::from(b)).collect(),
    };
    TensorPayload {
        dtype: tensor.dtype(),
        shape: tensor.shape().iter().map(|&d| d as u64).collect(),
        data,
        reference,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TensorElement;

    #[test]
    fn decodes_little_endian_floats() {
        let payload = TensorPayload {
            dtype: DType::Float32,
            shape: vec![2],
            data: [1.5f32, -2.0f32]
                .iter()
                .flat_map(|x| x.to_le_bytes())
                .collect(),
            reference: None,
        };
        let tensor = decode_tensor(&payload).unwrap();
        assert_eq!(tensor.shape(), &[2]);
        assert_eq!(tensor.get(1), Some(TensorElement::Float(-2.0)));
    }

    #[test]
    fn wrong_byte_length_is_rejected() {
        let payload = TensorPayload {
            dtype: DType::Int64,
            shape: vec![2, 2],
            data: vec![0; 24],
            reference: None,
        };
        let err = decode_tensor(&payload).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TensorSize {
                expected: 32,
                actual: 24,
                ..
            }
        ));
    }

    #[test]
    fn bools_accept_any_nonzero_byte() {
        let payload = TensorPayload {
            dtype: DType::Bool,
            shape: vec![3],
            data: vec![0, 1, 7],
            reference: None,
        };
        let tensor = decode_tensor(&payload).unwrap();
        assert_eq!(tensor.data(), &TensorData::Bool(vec![false, true, true]));
    }

    #[test]
    fn encode_then_decode_preserves_tensor() {
        let tensor = Tensor::new(vec![2, 3], TensorData::Int32(vec![1, -2, 3, -4, 5, -6])).unwrap();
        let payload = encode_tensor(&tensor, Some(9));
        assert_eq!(payload.reference, Some(9));
        assert_eq!(payload.data.len(), 24);
        assert_eq!(decode_tensor(&payload).unwrap(), tensor);
    }
}
