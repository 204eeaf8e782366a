//! Runtime failures: what a callable raised, classified into categories.
//!
//! A failure may match several categories at once (`rpc.raise({"key",
//! "value"}, ...)`); the error map decides which one wins.

use std::fmt;

use thiserror::Error;

/// Category of a runtime failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    Value,
    Type,
    Exhausted,
    Memory,
    Unimplemented,
    Interrupted,
    Internal,
    Syntax,
    Key,
    Index,
    Attribute,
    Lookup,
    /// Any name the runtime does not classify.
    Custom(String),
}

impl FailureCategory {
    pub fn parse(name: &str) -> Self {
        match name {
            "value" => Self::Value,
            "type" => Self::Type,
            "exhausted" => Self::Exhausted,
            "memory" => Self::Memory,
            "unimplemented" => Self::Unimplemented,
            "interrupted" => Self::Interrupted,
            "internal" => Self::Internal,
            "syntax" => Self::Syntax,
            "key" => Self::Key,
            "index" => Self::Index,
            "attribute" => Self::Attribute,
            "lookup" => Self::Lookup,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Value => "value",
            Self::Type => "type",
            Self::Exhausted => "exhausted",
            Self::Memory => "memory",
            Self::Unimplemented => "unimplemented",
            Self::Interrupted => "interrupted",
            Self::Internal => "internal",
            Self::Syntax => "syntax",
            Self::Key => "key",
            Self::Index => "index",
            Self::Attribute => "attribute",
            Self::Lookup => "lookup",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Categorized failure raised from Rust code running inside the VM
/// (`rpc.raise`, the interrupt hook, tensor methods).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RaisedFailure {
    pub categories: Vec<FailureCategory>,
    pub message: String,
}

impl RaisedFailure {
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            categories: vec![category],
            message: message.into(),
        }
    }

    pub fn into_lua(self) -> mlua::Error {
        mlua::Error::external(self)
    }
}

/// The failure pending after a callable returned with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFailure {
    pub categories: Vec<FailureCategory>,
    text: Option<String>,
}

impl PendingFailure {
    pub fn new(categories: Vec<FailureCategory>, text: impl Into<String>) -> Self {
        Self {
            categories,
            text: Some(text.into()),
        }
    }

    pub fn without_text(categories: Vec<FailureCategory>) -> Self {
        Self {
            categories,
            text: None,
        }
    }

    /// Failure text, if any could be retrieved. Empty text counts as none.
    pub fn message(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    pub fn is(&self, category: &FailureCategory) -> bool {
        self.categories.contains(category)
    }

    /// Classifies an error returned by the VM.
    pub fn from_lua_error(err: &mlua::Error) -> Self {
        match err {
            mlua::Error::CallbackError { cause, .. } => Self::from_lua_error(cause),
            mlua::Error::WithContext { cause, .. } => Self::from_lua_error(cause),
            mlua::Error::ExternalError(inner) => match inner.downcast_ref::<RaisedFailure>() {
                Some(raised) => Self::new(raised.categories.clone(), raised.message.clone()),
                None => Self::new(Vec::new(), inner.to_string()),
            },
            mlua::Error::MemoryError(text) => Self::new(vec![FailureCategory::Memory], text),
            mlua::Error::SyntaxError { message, .. } => {
                Self::new(vec![FailureCategory::Syntax], message)
            }
            mlua::Error::RuntimeError(text) => {
                let text = strip_traceback(text);
                // `error()` and `error(nil)` carry no message at all.
                if text == "nil" {
                    return Self::without_text(Vec::new());
                }
                Self::new(classify_runtime_text(text), text)
            }
            mlua::Error::BadArgument { .. }
            | mlua::Error::FromLuaConversionError { .. }
            | mlua::Error::ToLuaConversionError { .. }
            | mlua::Error::UserDataTypeMismatch => {
                Self::new(vec![FailureCategory::Type], err.to_string())
            }
            mlua::Error::SafetyError(text) => Self::new(vec![FailureCategory::Internal], text),
            other => Self::new(Vec::new(), other.to_string()),
        }
    }
}

const TRACEBACK_MARKER: &str = "\nstack traceback:";

fn strip_traceback(text: &str) -> &str {
    text.find(TRACEBACK_MARKER).map_or(text, |end| &text[..end])
}

fn classify_runtime_text(text: &str) -> Vec<FailureCategory> {
    if text.contains("attempt to ") {
        vec![FailureCategory::Type]
    } else if text.contains("bad argument") || text.contains("number has no integer representation")
    {
        vec![FailureCategory::Value]
    } else {
        Vec::new()
    }
}
