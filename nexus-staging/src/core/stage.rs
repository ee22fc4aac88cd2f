//! Staging repository identity.

use serde::Serialize;
use std::fmt;

/// Identity of one staging repository.
///
/// The server recycles repository ids, so a `Stage` is only meaningful for
/// the staging cycle it was discovered in. It is never persisted by this
/// crate and should not be cached past a single release operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Stage {
    profile_id: String,
    stage_id: String,
}

impl Stage {
    /// Creates a stage from its staging profile id and repository id.
    #[must_use]
    pub fn new(profile_id: impl Into<String>, stage_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            stage_id: stage_id.into(),
        }
    }

    /// Returns the staging profile id.
    #[must_use]
    pub fn profile_id(&self) -> &str {
        &self.profile_id
    }

    /// Returns the staging repository id.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (profile {})", self.stage_id, self.profile_id)
    }
}
