//! TensorLookup - every top-level tensor of a call, decoded once.
//!
//! Built before the exclusive section is entered, so tensor decoding never
//! holds up other callers of the hosted runtime.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::domain::{CallArguments, CodecError, Tensor, TensorPayload};
use crate::ports::TensorDecoder;

#[derive(Debug, Default)]
pub struct TensorLookup {
    shared: HashMap<u32, Arc<Tensor>>,
    inline: HashMap<usize, Arc<Tensor>>,
}

impl TensorLookup {
    /// Decodes each referenced tensor exactly once, and every unreferenced
    /// top-level tensor keyed by its decode position.
    ///
    /// Payloads sharing a reference must agree on dtype and shape.
    pub fn build(args: &CallArguments, decoder: &dyn TensorDecoder) -> Result<Self, CodecError> {
        let mut lookup = Self::default();
        let mut first_seen: HashMap<u32, &TensorPayload> = HashMap::new();

        for (position, payload) in args.tensors() {
            let Some(reference) = payload.reference else {
                let tensor = decoder.decode(payload)?;
                lookup.inline.insert(position, Arc::new(tensor));
                continue;
            };
            match first_seen.entry(reference) {
                Entry::Occupied(seen) => {
                    let seen = seen.get();
                    if seen.dtype != payload.dtype || seen.shape != payload.shape {
                        return Err(CodecError::ConflictingReference(reference));
                    }
                }
                Entry::Vacant(slot) => {
                    let tensor = decoder.decode(payload)?;
                    lookup.shared.insert(reference, Arc::new(tensor));
                    slot.insert(payload);
                }
            }
        }

        Ok(lookup)
    }

    /// Tensor for the payload found at `position` in decode order.
    pub fn resolve(
        &self,
        position: usize,
        payload: &TensorPayload,
    ) -> Result<Arc<Tensor>, CodecError> {
        let found = match payload.reference {
            Some(reference) => self.shared.get(&reference),
            None => self.inline.get(&position),
        };
        found.cloned().ok_or(CodecError::MissingTensor(position))
    }

    /// Number of distinct decoded tensors.
    pub fn len(&self) -> usize {
        self.shared.len() + self.inline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
