//! Canned response documents shaped like the staging API's.

use crate::client::REQUIRED_PERMISSIONS;

/// A `service/local/status` document reporting `version` and `permissions`.
#[must_use]
pub fn status_document(version: &str, permissions: &[(&str, u32)]) -> String {
    let permissions: String = permissions
        .iter()
        .map(|(id, value)| format!("<permission><id>{id}</id><value>{value}</value></permission>"))
        .collect();
    format!(
        "<status><data>\
         <appName>Nexus Repository Manager</appName>\
         <version>{version}</version>\
         <clientPermissions><loggedIn>true</loggedIn><permissions>{permissions}</permissions></clientPermissions>\
         </data></status>"
    )
}

/// A status document granting every permission the staging workflow needs.
#[must_use]
pub fn status_document_with_staging_permissions(version: &str) -> String {
    let permissions: Vec<(&str, u32)> = REQUIRED_PERMISSIONS.iter().map(|p| (*p, 15)).collect();
    status_document(version, &permissions)
}

/// A staging repository entry for [`profile_repositories_document`].
#[derive(Debug, Clone)]
pub struct RepositoryEntry {
    /// Staging profile id.
    pub profile_id: String,
    /// Repository id.
    pub repository_id: String,
    /// Repository state, e.g. `open`, `closed` or `released`.
    pub state: String,
}

impl RepositoryEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(
        profile_id: impl Into<String>,
        repository_id: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            repository_id: repository_id.into(),
            state: state.into(),
        }
    }
}

/// A `service/local/staging/profile_repositories` document.
#[must_use]
pub fn profile_repositories_document(entries: &[RepositoryEntry]) -> String {
    let repositories: String = entries
        .iter()
        .map(|e| {
            format!(
                "<stagingProfileRepository>\
                 <profileId>{}</profileId>\
                 <profileName>release</profileName>\
                 <repositoryId>{}</repositoryId>\
                 <type>{}</type>\
                 </stagingProfileRepository>",
                e.profile_id, e.repository_id, e.state
            )
        })
        .collect();
    format!("<stagingRepositories><data>{repositories}</data></stagingRepositories>")
}

/// A `service/local/staging/repository/{id}` document.
#[must_use]
pub fn repository_document(repository_id: &str, transitioning: bool) -> String {
    format!(
        "<stagingProfileRepository>\
         <repositoryId>{repository_id}</repositoryId>\
         <type>open</type>\
         <transitioning>{transitioning}</transitioning>\
         </stagingProfileRepository>"
    )
}

/// Builds `service/local/staging/repository/{id}/activity` documents.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    activities: Vec<(String, Vec<String>)>,
}

impl ActivityLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new activity called `name`.
    #[must_use]
    pub fn activity(mut self, name: impl Into<String>) -> Self {
        self.activities.push((name.into(), Vec::new()));
        self
    }

    /// Adds an event to the most recent activity.
    #[must_use]
    pub fn event(mut self, name: &str, properties: &[(&str, &str)]) -> Self {
        let props: String = properties
            .iter()
            .map(|(key, value)| {
                format!("<stagingProperty><name>{key}</name><value>{value}</value></stagingProperty>")
            })
            .collect();
        let event = format!(
            "<stagingActivityEvent>\
             <timestamp>2013-02-13T13:30:50.134Z</timestamp>\
             <name>{name}</name>\
             <severity>0</severity>\
             <properties>{props}</properties>\
             </stagingActivityEvent>"
        );
        if let Some((_, events)) = self.activities.last_mut() {
            events.push(event);
        }
        self
    }

    /// Renders the document.
    #[must_use]
    pub fn build(&self) -> String {
        let activities: String = self
            .activities
            .iter()
            .map(|(name, events)| {
                format!(
                    "<stagingActivity><name>{name}</name><events>{}</events>\
                     <started>2013-02-13T13:30:49.725Z</started></stagingActivity>",
                    events.concat()
                )
            })
            .collect();
        format!("<list>{activities}</list>")
    }
}
