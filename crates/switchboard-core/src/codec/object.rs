//! Object path of the payload codec: `SerializedObject` <-> opaque bytes.

use crate::domain::{CodecError, SerializedObject};

/// Encodes an object tree into the opaque bytes carried by `Payload::Object`.
///
/// Non-finite doubles have no representation in the object format and are
/// rejected rather than silently turned into `null`.
pub fn encode_object(object: &SerializedObject) -> Result<Vec<u8>, CodecError> {
    check_finite(object)?;
    // Serializing a tree of plain enums and vectors cannot fail.
    serde_json::to_vec(object).map_err(CodecError::CorruptObject)
}

/// Decodes opaque object bytes, validating dict structure.
pub fn decode_object(bytes: &[u8]) -> Result<SerializedObject, CodecError> {
    let object: SerializedObject =
        serde_json::from_slice(bytes).map_err(CodecError::CorruptObject)?;
    check_dicts(&object)?;
    Ok(object)
}

fn check_finite(object: &SerializedObject) -> Result<(), CodecError> {
    match object {
        SerializedObject::Double(x) if !x.is_finite() => Err(CodecError::NonFinite(*x)),
        SerializedObject::List(items) => items.iter().try_for_each(check_finite),
        SerializedObject::Dict { keys, values } => {
            keys.iter().chain(values.iter()).try_for_each(check_finite)
        }
        _ => Ok(()),
    }
}

fn check_dicts(object: &SerializedObject) -> Result<(), CodecError> {
    match object {
        SerializedObject::List(items) => items.iter().try_for_each(check_dicts),
        SerializedObject::Dict { keys, values } => {
            if keys.len() != values.len() {
                return Err(CodecError::DictMismatch {
                    keys: keys.len(),
                    values: values.len(),
                });
            }
            keys.iter().chain(values.iter()).try_for_each(check_dicts)
        }
        _ => Ok(()),
    }
}
