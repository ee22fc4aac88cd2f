//! # nexus-staging
//!
//! A client for the staging repository workflow of a Nexus repository
//! manager.
//!
//! Artifacts for a release are first deployed into a temporary staging
//! repository. This crate finds the open staging repository holding a given
//! group/artifact/version and moves it through its lifecycle:
//!
//! - **Capability detection**: verifies the user's permissions and learns
//!   whether the server runs actions asynchronously
//! - **Discovery**: lists open staging repositories and probes their contents
//! - **Transitions**: close, drop and release, waiting for asynchronous
//!   actions and decoding close failures from the activity log
//! - **Cancellation**: waits observe a shared cancellation token
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use nexus_staging::prelude::*;
//!
//! let config = ClientConfig::new("https://oss.example.org/nexus")
//!     .with_credentials("deployer", "secret");
//! let client = StageClient::from_config(&config)?;
//!
//! client.check_authentication().await?;
//! if let Some(stage) = client.find_open_stage("org.example", "app", Some("1.0")).await? {
//!     client.close_stage(&stage, "Closing 1.0").await?;
//!     client.release_stage(&stage, "Releasing 1.0").await?;
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod observability;
pub mod xml;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::client::{
        CloseFailure, CloseOutcome, HttpResponse, ReqwestTransport, StageActivity, StageClient,
        Transport,
    };
    pub use crate::config::{ClientConfig, PollConfig};
    pub use crate::core::{ServerCapability, Stage, StageAction};
    pub use crate::errors::{ErrorOrigin, StageError};
    pub use crate::observability::{init_tracing, LogFormat};
}
