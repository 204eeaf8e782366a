//! Call messages: what a dispatch receives and what it returns on success.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::payload::{Payload, TensorPayload};
use super::status::Status;

/// Arguments of one call.
///
/// Keyword arguments keep the order they were received in; decoding follows
/// that order, so user deserialization hooks observe a deterministic sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArguments {
    #[serde(default)]
    pub args: Vec<Payload>,

    #[serde(default)]
    pub kwargs: Vec<(String, Payload)>,
}

impl CallArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, payload: Payload) -> Self {
        self.args.push(payload);
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, payload: Payload) -> Self {
        self.kwargs.push((name.into(), payload));
        self
    }

    /// Rejects a keyword argument that appears more than once.
    pub fn check_unique_kwargs(&self) -> Result<(), Status> {
        let mut seen = HashSet::with_capacity(self.kwargs.len());
        for (name, _) in &self.kwargs {
            if !seen.insert(name.as_str()) {
                return Err(Status::invalid_argument(format!(
                    "keyword argument '{name}' given more than once"
                )));
            }
        }
        Ok(())
    }

    /// Every top-level payload in decode order: positionals, then keywords.
    pub fn payloads(&self) -> impl Iterator<Item = &Payload> {
        self.args
            .iter()
            .chain(self.kwargs.iter().map(|(_, payload)| payload))
    }

    /// Top-level tensor payloads with their decode position.
    pub fn tensors(&self) -> impl Iterator<Item = (usize, &TensorPayload)> {
        self.payloads()
            .enumerate()
            .filter_map(|(position, payload)| match payload {
                Payload::Tensor(tensor) => Some((position, tensor)),
                Payload::Object { .. } => None,
            })
    }
}

/// Successful outcome of one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub result: Payload,
}

impl CallResult {
    pub fn new(result: Payload) -> Self {
        Self { result }
    }
}
