//! Error types for the staging client.
//!
//! Every public operation fails with [`StageError`]. Transport and XML errors
//! raised internally are wrapped before they cross the public boundary, and
//! [`StageError::origin`] tells callers which failure family an error
//! belongs to.

use thiserror::Error;

use crate::core::{Stage, StageAction};

/// The broad family a [`StageError`] belongs to.
///
/// Callers use this to decide whether an operation is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorOrigin {
    /// The request never completed or the server answered with an unexpected status.
    Transport,
    /// The response could not be parsed or lacked a required node.
    Parse,
    /// The server understood the request but reported a failure.
    Protocol,
    /// The calling task was cancelled while waiting.
    Interrupted,
}

/// The main error type for staging operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// An endpoint could not be turned into a valid URL.
    #[error("Malformed endpoint '{endpoint}': {source}")]
    MalformedEndpoint {
        /// The endpoint that failed to resolve.
        endpoint: String,
        /// The URL parse failure.
        #[source]
        source: url::ParseError,
    },

    /// An identifier cannot be used as a single URL path segment.
    #[error("'{segment}' cannot be used as a URL path segment")]
    InvalidSegment {
        /// The rejected identifier.
        segment: String,
    },

    /// The base URL given to the client is unusable.
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP request failed before a response was received.
    #[error("{method} {url} failed: {source}")]
    Transport {
        /// HTTP method.
        method: &'static str,
        /// Requested URL.
        url: String,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status the operation does not accept.
    #[error("{method} {url} returned unexpected status {status}")]
    UnexpectedStatus {
        /// HTTP method.
        method: &'static str,
        /// Requested URL.
        url: String,
        /// Returned status code.
        status: u16,
    },

    /// A stage action was not accepted by the server.
    #[error("Failed to {action} stage {stage}: server returned status {status}")]
    ActionRejected {
        /// The attempted action.
        action: StageAction,
        /// The targeted stage.
        stage: Stage,
        /// Returned status code.
        status: u16,
    },

    /// The response body was not well-formed XML.
    #[error("Failed to parse response from {url}: {source}")]
    Parse {
        /// URL the document was fetched from.
        url: String,
        /// Underlying XML error.
        #[source]
        source: roxmltree::Error,
    },

    /// A path-query expression could not be compiled.
    #[error("Invalid path query '{expression}': {reason}")]
    InvalidQuery {
        /// The offending expression.
        expression: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A node required by the operation is absent from the response.
    #[error("Response from {url} has no node matching '{path}'")]
    MissingNode {
        /// URL the document was fetched from.
        url: String,
        /// The path query that matched nothing.
        path: String,
    },

    /// A node was present but its text could not be interpreted.
    #[error("Response from {url} has invalid value '{value}' at '{path}'")]
    InvalidValue {
        /// URL the document was fetched from.
        url: String,
        /// The path query that was evaluated.
        path: String,
        /// The text that was found.
        value: String,
    },

    /// The server reported a version string that is not dotted-numeric.
    #[error("Unrecognised server version '{version}'")]
    UnrecognisedVersion {
        /// The version string as reported.
        version: String,
    },

    /// The status document does not look like a compatible repository manager.
    #[error("Invalid response from {url}: permission '{permission}' is not reported, is this a Nexus server?")]
    InvalidResponse {
        /// URL of the status endpoint.
        url: String,
        /// Permission that was looked up.
        permission: String,
    },

    /// The configured user lacks a permission required for staging.
    #[error("User has insufficient privileges: missing permission '{permission}'")]
    InsufficientPrivileges {
        /// The first permission found to be missing.
        permission: String,
    },

    /// The server recorded the action as failed.
    #[error("{message}")]
    ActionFailed {
        /// Multi-line description built from the activity log.
        message: String,
    },

    /// The action finished but the activity log records neither success nor failure.
    #[error("Stage {stage} {action} completed but was not recorded as failed or succeeded")]
    UnrecordedOutcome {
        /// The action that was performed.
        action: StageAction,
        /// The targeted stage.
        stage: Stage,
    },

    /// Waiting for an action was cancelled.
    #[error("Interrupted while waiting for stage {stage}: {reason}")]
    Interrupted {
        /// The stage being waited on.
        stage: Stage,
        /// Reason given when cancelling.
        reason: String,
    },

    /// A bounded wait ran out of attempts.
    #[error("Stage {stage} still transitioning after {attempts} polls")]
    PollLimitReached {
        /// The stage being waited on.
        stage: Stage,
        /// Number of polls performed.
        attempts: u32,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StageError {
    /// Classifies the error into its failure family.
    #[must_use]
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            Self::MalformedEndpoint { .. }
            | Self::InvalidSegment { .. }
            | Self::InvalidBaseUrl { .. }
            | Self::Transport { .. }
            | Self::UnexpectedStatus { .. }
            | Self::ActionRejected { .. }
            | Self::Config(_) => ErrorOrigin::Transport,
            Self::Parse { .. }
            | Self::InvalidQuery { .. }
            | Self::MissingNode { .. }
            | Self::InvalidValue { .. }
            | Self::UnrecognisedVersion { .. } => ErrorOrigin::Parse,
            Self::InvalidResponse { .. }
            | Self::InsufficientPrivileges { .. }
            | Self::ActionFailed { .. }
            | Self::UnrecordedOutcome { .. }
            | Self::PollLimitReached { .. } => ErrorOrigin::Protocol,
            Self::Interrupted { .. } => ErrorOrigin::Interrupted,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } | Self::ActionRejected { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
