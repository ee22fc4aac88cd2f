//! Testing utilities for code that drives a staging client.
//!
//! This module provides:
//! - A scripted transport that records requests
//! - Response documents shaped like the staging API's

mod fixtures;
mod transport;

pub use fixtures::{
    profile_repositories_document, repository_document, status_document,
    status_document_with_staging_permissions, ActivityLog, RepositoryEntry,
};
pub use transport::{Method, RecordedRequest, ScriptedTransport};
