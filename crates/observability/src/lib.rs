//! Process-wide tracing setup shared by binaries and tests.

pub mod subscriber;

pub use subscriber::{DEFAULT_FILTER, init, init_with_default};
