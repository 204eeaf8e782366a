//! App - wiring a router together.
//!
//! # Components
//! - **RouterBuilder**: binds endpoints, scripts and forwards, then checks
//!   the expected endpoint set

pub mod builder;

pub use self::builder::{BuildError, RouterBuilder};
