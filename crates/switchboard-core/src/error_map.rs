//! Error map: runtime failure -> status.
//!
//! An ordered rule table, evaluated top to bottom; the first rule matching
//! any of the failure's categories decides the code.

use crate::domain::{Status, StatusCode};
use crate::runtime::failure::{FailureCategory, PendingFailure};

pub const FAILURE_PREFIX: &str = "callable raised an error on the server:\n";
pub const MISSING_TEXT_MESSAGE: &str =
    "callable raised an error on the server but its message could not be retrieved";
pub const LOAD_FAILURE_PREFIX: &str = "script failed to load:\n";

struct Rule {
    matches: fn(&FailureCategory) -> bool,
    code: StatusCode,
}

static RULES: &[Rule] = &[
    Rule {
        matches: |c| matches!(c, FailureCategory::Value | FailureCategory::Type),
        code: StatusCode::InvalidArgument,
    },
    Rule {
        matches: |c| matches!(c, FailureCategory::Exhausted),
        code: StatusCode::OutOfRange,
    },
    Rule {
        matches: |c| matches!(c, FailureCategory::Memory),
        code: StatusCode::ResourceExhausted,
    },
    Rule {
        matches: |c| matches!(c, FailureCategory::Unimplemented),
        code: StatusCode::Unimplemented,
    },
    Rule {
        matches: |c| matches!(c, FailureCategory::Interrupted),
        code: StatusCode::Aborted,
    },
    Rule {
        matches: |c| matches!(c, FailureCategory::Internal | FailureCategory::Syntax),
        code: StatusCode::Internal,
    },
    Rule {
        matches: |c| {
            matches!(
                c,
                FailureCategory::Key
                    | FailureCategory::Index
                    | FailureCategory::Attribute
                    | FailureCategory::Lookup
            )
        },
        code: StatusCode::NotFound,
    },
];

/// Status code for a pending failure. Total: no failure, or a failure with
/// no known category, is `Unknown`.
pub fn map_failure(failure: Option<&PendingFailure>) -> StatusCode {
    let Some(failure) = failure else {
        return StatusCode::Unknown;
    };
    RULES
        .iter()
        .find(|rule| failure.categories.iter().any(rule.matches))
        .map_or(StatusCode::Unknown, |rule| rule.code)
}

/// Full status for a pending failure, including its text.
pub fn status_for(failure: Option<&PendingFailure>) -> Status {
    let code = map_failure(failure);
    match failure.and_then(PendingFailure::message) {
        Some(text) => Status::new(code, format!("{FAILURE_PREFIX}{text}")),
        None => Status::internal(MISSING_TEXT_MESSAGE),
    }
}

/// Status for a chunk that failed while being loaded, before any callable
/// existed. Same code table, its own message.
pub fn load_status(err: &mlua::Error) -> Status {
    let failure = PendingFailure::from_lua_error(err);
    let text = failure.message().unwrap_or("no message");
    Status::new(
        map_failure(Some(&failure)),
        format!("{LOAD_FAILURE_PREFIX}{text}"),
    )
}

impl From<mlua::Error> for Status {
    fn from(err: mlua::Error) -> Self {
        status_for(Some(&PendingFailure::from_lua_error(&err)))
    }
}
