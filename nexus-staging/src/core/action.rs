//! Staging repository transitions and their endpoints.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Stage;
use crate::errors::StageError;

/// A transition that can be requested on a staging repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// Lock the repository and run the server-side validation rules.
    Close,
    /// Discard the repository.
    Drop,
    /// Promote a closed repository's contents into its release repository.
    Release,
}

impl StageAction {
    /// All supported actions.
    pub const ALL: [Self; 3] = [Self::Close, Self::Drop, Self::Release];

    /// The URL path template, relative to the server base URL.
    #[must_use]
    pub fn template(&self) -> &'static str {
        match self {
            Self::Close => "service/local/staging/profiles/{profileID}/finish",
            Self::Drop => "service/local/staging/profiles/{profileID}/drop",
            Self::Release => "service/local/staging/profiles/{profileID}/promote",
        }
    }

    /// Resolves the action endpoint for `stage` against `base`.
    pub fn resolve(&self, base: &Url, stage: &Stage) -> Result<Url, StageError> {
        let segments: Vec<&str> = self
            .template()
            .split('/')
            .map(|segment| match segment {
                "{profileID}" => stage.profile_id(),
                "{stageID}" => stage.stage_id(),
                fixed => fixed,
            })
            .collect();
        append_segments(base, &segments, false)
    }
}

/// Appends `segments` below `base`, percent-encoding each one.
///
/// Every segment stays a single path segment: `/`, `?` and `#` are encoded,
/// and empty, `.` and `..` segments are rejected.
pub(crate) fn append_segments(
    base: &Url,
    segments: &[&str],
    trailing_slash: bool,
) -> Result<Url, StageError> {
    if let Some(segment) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
        return Err(StageError::InvalidSegment {
            segment: (*segment).to_string(),
        });
    }

    let mut endpoint = base.clone();
    {
        let mut path = endpoint
            .path_segments_mut()
            .map_err(|()| StageError::MalformedEndpoint {
                endpoint: format!("{base}{}", segments.join("/")),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?;
        path.pop_if_empty().extend(segments);
        if trailing_slash {
            path.push("");
        }
    }
    Ok(endpoint)
}

impl fmt::Display for StageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Close => write!(f, "close"),
            Self::Drop => write!(f, "drop"),
            Self::Release => write!(f, "release"),
        }
    }
}
