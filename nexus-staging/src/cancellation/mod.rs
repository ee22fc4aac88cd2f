//! Cooperative cancellation for long-running waits.

mod token;

pub use token::CancellationToken;
