//! Tracing setup shared by the workspace binaries.

mod tracing;

pub use crate::tracing::{init, init_with_level, try_init, LogFormat};
