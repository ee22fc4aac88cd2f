//! The staging repository client.
//!
//! [`StageClient`] discovers open staging repositories, matches them to a
//! build's coordinates and drives them through close, drop and release.
//! Each public operation performs its HTTP round-trips one after another
//! and returns once they are done.

mod activity;
#[cfg(test)]
mod client_tests;
mod transport;

use reqwest::Url;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::{ClientConfig, PollConfig};
use crate::core::{append_segments, ServerCapability, Stage, StageAction};
use crate::errors::StageError;
use crate::xml::{promote_request_payload, XmlDocument};

pub use activity::{
    close_outcome, parse_activity, ActivityEvent, CloseFailure, CloseOutcome, StageActivity,
    REPOSITORY_CLOSED, REPOSITORY_CLOSE_FAILED, RULE_FAILED,
};
pub use transport::{basic_auth_header, HttpResponse, ReqwestTransport, Transport, XML_CONTENT_TYPE};

#[cfg(test)]
pub(crate) use transport::MockTransport;

/// Permissions a user needs for the full staging workflow.
pub const REQUIRED_PERMISSIONS: [&str; 5] = [
    "nexus:stagingprofiles",
    "nexus:stagingfinish",
    "nexus:stagingprofilerepos",
    "nexus:stagingpromote",
    "nexus:stagingdrop",
];

const STATUS_PATH: &str = "service/local/status";
const PROFILE_REPOSITORIES_PATH: &str = "service/local/staging/profile_repositories";

/// Client for the staging REST API of one repository manager.
///
/// A `StageClient` is not meant to run concurrent transitions against the
/// same staging repository; callers serialize those.
pub struct StageClient<T = ReqwestTransport> {
    base_url: Url,
    transport: T,
    poll: PollConfig,
    cancellation: Arc<CancellationToken>,
    capability: OnceCell<ServerCapability>,
}

impl StageClient<ReqwestTransport> {
    /// Creates a client talking HTTP to the server described by `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, StageError> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(&config.base_url, transport)?.with_poll_config(config.poll.clone()))
    }
}

impl<T: Transport> StageClient<T> {
    /// Creates a client for `base_url` using `transport` for HTTP.
    pub fn with_transport(base_url: &str, transport: T) -> Result<Self, StageError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            transport,
            poll: PollConfig::default(),
            cancellation: Arc::new(CancellationToken::new()),
            capability: OnceCell::new(),
        })
    }

    /// Sets the polling behaviour used while waiting for actions.
    #[must_use]
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Shares a cancellation token with the caller.
    ///
    /// Cancelling it interrupts [`StageClient::wait_for_action_to_complete`].
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// The normalized base URL (always ends with `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The transport used for HTTP.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The cancellation token observed by waits.
    #[must_use]
    pub fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    fn endpoint(&self, path: &str) -> Result<Url, StageError> {
        self.base_url
            .join(path)
            .map_err(|source| StageError::MalformedEndpoint {
                endpoint: format!("{}{path}", self.base_url),
                source,
            })
    }

    fn repository_endpoint(&self, stage: &Stage, child: Option<&str>) -> Result<Url, StageError> {
        let mut segments = vec!["service", "local", "staging", "repository", stage.stage_id()];
        segments.extend(child);
        append_segments(&self.base_url, &segments, false)
    }

    /// GETs `url` and returns the body, which must come with status 200.
    async fn get_xml(&self, url: &Url) -> Result<String, StageError> {
        let response = self.transport.get(url).await?;
        if response.status != 200 {
            return Err(StageError::UnexpectedStatus {
                method: "GET",
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    }

    /// Verifies the credentials carry every permission in [`REQUIRED_PERMISSIONS`].
    pub async fn check_authentication(&self) -> Result<(), StageError> {
        let url = self.endpoint(STATUS_PATH)?;
        let body = self.get_xml(&url).await?;
        let doc = XmlDocument::parse(url.as_str(), &body)?;

        for permission in REQUIRED_PERMISSIONS {
            let path = format!(
                "/status/data/clientPermissions/permissions/permission[id='{permission}']/value"
            );
            let value = doc.text(&path)?.ok_or_else(|| StageError::InvalidResponse {
                url: url.to_string(),
                permission: permission.to_string(),
            })?;
            let granted: i64 = value.parse().map_err(|_| doc.invalid(&path, value.as_str()))?;
            if granted == 0 {
                warn!(permission, "Missing staging permission");
                return Err(StageError::InsufficientPrivileges {
                    permission: permission.to_string(),
                });
            }
        }
        debug!(url = %url, "Staging permissions verified");
        Ok(())
    }

    /// Returns the server capability, fetching it on first use.
    pub async fn capability(&self) -> Result<&ServerCapability, StageError> {
        self.capability
            .get_or_try_init(|| async {
                let url = self.endpoint(STATUS_PATH)?;
                let body = self.get_xml(&url).await?;
                let doc = XmlDocument::parse(url.as_str(), &body)?;
                let version = doc.required_text("/status/data/version")?;
                let capability = ServerCapability::from_version(version)?;
                info!(
                    version = capability.version(),
                    async_actions = capability.async_actions(),
                    "Detected server capability"
                );
                Ok::<_, StageError>(capability)
            })
            .await
    }

    /// The version reported by the server.
    pub async fn server_version(&self) -> Result<String, StageError> {
        Ok(self.capability().await?.version().to_string())
    }

    /// Whether close and release complete asynchronously (server 2.4 or later).
    pub async fn is_async_close(&self) -> Result<bool, StageError> {
        Ok(self.capability().await?.async_actions())
    }

    /// Lists every staging repository that is currently open, in server order.
    pub async fn open_stages(&self) -> Result<Vec<Stage>, StageError> {
        let url = self.endpoint(PROFILE_REPOSITORIES_PATH)?;
        let body = self.get_xml(&url).await?;
        let doc = XmlDocument::parse(url.as_str(), &body)?;

        let mut stages = Vec::new();
        for repository in doc.select("//stagingProfileRepository[type='open']")? {
            stages.push(Stage::new(
                doc.required_text_from(repository, "profileId")?,
                doc.required_text_from(repository, "repositoryId")?,
            ));
        }
        debug!(count = stages.len(), "Listed open stages");
        Ok(stages)
    }

    /// Checks whether `stage` holds artifacts for the given coordinates.
    ///
    /// Without a version any version of `group:artifact` matches.
    pub async fn check_stage_for_gav(
        &self,
        stage: &Stage,
        group: &str,
        artifact: &str,
        version: Option<&str>,
    ) -> Result<bool, StageError> {
        let mut segments = vec!["service", "local", "repositories", stage.stage_id(), "content"];
        segments.extend(group.split('.'));
        segments.push(artifact);
        segments.extend(version);
        let url = append_segments(&self.base_url, &segments, true)?;

        match self.transport.head(&url).await? {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                warn!(stage = %stage, url = %url, status, "Unexpected status probing stage contents");
                Ok(false)
            }
        }
    }

    /// Finds the open stage holding artifacts for the given coordinates.
    ///
    /// When several stages match, the first in listing order is returned.
    pub async fn find_open_stage(
        &self,
        group: &str,
        artifact: &str,
        version: Option<&str>,
    ) -> Result<Option<Stage>, StageError> {
        let mut matches = Vec::new();
        for stage in self.open_stages().await? {
            if self.check_stage_for_gav(&stage, group, artifact, version).await? {
                matches.push(stage);
            }
        }

        let mut matches = matches.into_iter();
        let found = matches.next();
        let others: Vec<String> = matches.map(|s| s.to_string()).collect();
        if let Some(stage) = &found {
            if !others.is_empty() {
                warn!(
                    stage = %stage,
                    ?others,
                    group,
                    artifact,
                    version,
                    "Multiple open stages match, using the first"
                );
            }
        }
        Ok(found)
    }

    /// Closes `stage` and, on asynchronous servers, confirms the outcome
    /// from the activity log.
    pub async fn close_stage(&self, stage: &Stage, description: &str) -> Result<(), StageError> {
        let async_actions = self.is_async_close().await?;
        info!(stage = %stage, "Closing stage");
        self.perform_stage_action(StageAction::Close, stage, Some(description))
            .await?;
        if !async_actions {
            return Ok(());
        }

        self.wait_for_action_to_complete(stage).await?;
        match close_outcome(&self.activity(stage).await?) {
            CloseOutcome::Closed => {
                info!(stage = %stage, "Stage closed");
                Ok(())
            }
            CloseOutcome::Failed(failure) => Err(StageError::ActionFailed {
                message: failure.message(stage),
            }),
            CloseOutcome::Unrecorded => Err(StageError::UnrecordedOutcome {
                action: StageAction::Close,
                stage: stage.clone(),
            }),
        }
    }

    /// Requests that `stage` be dropped.
    ///
    /// Returns once the request is accepted; the drop itself may still be
    /// running on the server.
    pub async fn drop_stage(&self, stage: &Stage) -> Result<(), StageError> {
        info!(stage = %stage, "Dropping stage");
        self.perform_stage_action(StageAction::Drop, stage, None).await
    }

    /// Releases `stage`, waiting for completion on asynchronous servers.
    pub async fn release_stage(&self, stage: &Stage, description: &str) -> Result<(), StageError> {
        let async_actions = self.is_async_close().await?;
        info!(stage = %stage, "Releasing stage");
        self.perform_stage_action(StageAction::Release, stage, Some(description))
            .await?;
        if async_actions {
            self.wait_for_action_to_complete(stage).await?;
        }
        info!(stage = %stage, "Stage released");
        Ok(())
    }

    /// Polls `stage` until the server no longer reports it as transitioning.
    pub async fn wait_for_action_to_complete(&self, stage: &Stage) -> Result<(), StageError> {
        let url = self.repository_endpoint(stage, None)?;

        let mut attempts: u32 = 0;
        loop {
            if self.cancellation.is_cancelled() {
                return Err(self.interrupted(stage));
            }

            attempts += 1;
            let body = self.get_xml(&url).await?;
            let transitioning = XmlDocument::parse(url.as_str(), &body)?
                .required_bool("/stagingProfileRepository/transitioning")?;
            if !transitioning {
                debug!(stage = %stage, attempts, "Stage finished transitioning");
                return Ok(());
            }

            if self.poll.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(StageError::PollLimitReached {
                    stage: stage.clone(),
                    attempts,
                });
            }

            debug!(stage = %stage, attempts, "Stage still transitioning");
            tokio::select! {
                () = self.cancellation.cancelled() => return Err(self.interrupted(stage)),
                () = tokio::time::sleep(self.poll.interval()) => {}
            }
        }
    }

    fn interrupted(&self, stage: &Stage) -> StageError {
        StageError::Interrupted {
            stage: stage.clone(),
            reason: self
                .cancellation
                .reason()
                .unwrap_or_else(|| "cancelled".to_string()),
        }
    }

    /// Fetches the activity log of `stage`.
    pub async fn activity(&self, stage: &Stage) -> Result<Vec<StageActivity>, StageError> {
        let url = self.repository_endpoint(stage, Some("activity"))?;
        let body = self.get_xml(&url).await?;
        let doc = XmlDocument::parse(url.as_str(), &body)?;
        parse_activity(&doc)
    }

    /// POSTs `action` for `stage`; only `201 Created` counts as accepted.
    pub(crate) async fn perform_stage_action(
        &self,
        action: StageAction,
        stage: &Stage,
        description: Option<&str>,
    ) -> Result<(), StageError> {
        let url = action.resolve(&self.base_url, stage)?;
        let payload = promote_request_payload(stage.stage_id(), description);
        let response = self.transport.post_xml(&url, payload).await?;
        if response.status != 201 {
            debug!(action = %action, stage = %stage, body = %response.body, "Action rejected");
            return Err(StageError::ActionRejected {
                action,
                stage: stage.clone(),
                status: response.status,
            });
        }
        debug!(action = %action, stage = %stage, "Action accepted");
        Ok(())
    }
}

impl<T> std::fmt::Debug for StageClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageClient")
            .field("base_url", &self.base_url.as_str())
            .field("poll", &self.poll)
            .field("capability", &self.capability.get())
            .finish_non_exhaustive()
    }
}

/// Parses `base_url` and makes sure relative endpoints join below it.
fn normalize_base_url(base_url: &str) -> Result<Url, StageError> {
    let invalid = |reason: String| StageError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };

    let mut url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}
