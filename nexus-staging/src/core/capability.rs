//! Server capability detection.
//!
//! Nexus 2.4 moved staging actions to a background task: the POST returns as
//! soon as the request is queued and the repository reports `transitioning`
//! until the work is done. Older servers complete the action before
//! answering. The distinction is made once per client from the reported
//! version and carried around as a [`ServerCapability`].

use serde::Serialize;

use crate::errors::StageError;

/// What the connected server is able to do, derived from its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerCapability {
    version: String,
    async_actions: bool,
}

impl ServerCapability {
    /// Derives the capability from a reported version string.
    pub fn from_version(version: impl Into<String>) -> Result<Self, StageError> {
        let version = version.into();
        let async_actions = is_async_version(&version)?;
        Ok(Self {
            version,
            async_actions,
        })
    }

    /// The version string reported by the server.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether close and release complete asynchronously and must be polled.
    #[must_use]
    pub fn async_actions(&self) -> bool {
        self.async_actions
    }
}

/// Returns true if a server reporting `version` performs staging actions
/// asynchronously, i.e. the version is 2.4 or later.
///
/// The major component must be numeric; a missing or non-numeric minor
/// component counts as `0`.
pub fn is_async_version(version: &str) -> Result<bool, StageError> {
    let mut parts = version.trim().split('.');
    let major = parts
        .next()
        .and_then(leading_number)
        .ok_or_else(|| StageError::UnrecognisedVersion {
            version: version.to_string(),
        })?;
    let minor = parts.next().and_then(leading_number).unwrap_or(0);
    Ok(major > 2 || (major == 2 && minor >= 4))
}

/// Parses the run of ASCII digits at the start of `part`.
fn leading_number(part: &str) -> Option<u64> {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().ok()
}
