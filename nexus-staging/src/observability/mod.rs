//! Logging set-up.

mod logging;

pub use logging::{init_tracing, LogFormat, DEFAULT_FILTER, LOG_FORMAT_ENV};
