//! Tests for the staging client against a mocked transport.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::client::{HttpResponse, MockTransport, StageClient, REQUIRED_PERMISSIONS};
    use crate::config::PollConfig;
    use crate::core::{Stage, StageAction};
    use crate::errors::{ErrorOrigin, StageError};
    use crate::testing::{
        profile_repositories_document, repository_document, status_document,
        status_document_with_staging_permissions, ActivityLog, RepositoryEntry,
    };
    use pretty_assertions::assert_eq;
    use std::error::Error as _;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const BASE: &str = "http://nexus.test/nexus/";

    fn on_get(mock: &mut MockTransport, path: &str, status: u16, body: String) {
        let expected = format!("{BASE}{path}");
        mock.expect_get()
            .withf(move |url| url.as_str() == expected)
            .returning(move |_| Ok(HttpResponse::new(status, body.clone())));
    }

    fn on_status(mock: &mut MockTransport, version: &str) {
        on_get(
            mock,
            "service/local/status",
            200,
            status_document_with_staging_permissions(version),
        );
    }

    fn on_head(mock: &mut MockTransport, path: &str, status: u16) {
        let expected = format!("{BASE}{path}");
        mock.expect_head()
            .withf(move |url| url.as_str() == expected)
            .returning(move |_| Ok(status));
    }

    fn on_post(mock: &mut MockTransport, path: &str, status: u16) {
        let expected = format!("{BASE}{path}");
        mock.expect_post_xml()
            .withf(move |url, _| url.as_str() == expected)
            .times(1)
            .returning(move |_, _| Ok(HttpResponse::new(status, "")));
    }

    /// Serves `transitioning=true` for the first `busy` polls, then `false`.
    fn on_repository_polls(mock: &mut MockTransport, stage_id: &str, busy: usize) -> Arc<AtomicUsize> {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let expected = format!("{BASE}service/local/staging/repository/{stage_id}");
        let stage_id = stage_id.to_string();
        mock.expect_get()
            .withf(move |url| url.as_str() == expected)
            .returning(move |_| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::new(200, repository_document(&stage_id, n < busy)))
            });
        polls
    }

    fn client(mock: MockTransport) -> StageClient<MockTransport> {
        StageClient::with_transport("http://nexus.test/nexus", mock)
            .unwrap()
            .with_poll_config(PollConfig::default().with_interval(Duration::from_millis(1)))
    }

    fn stage() -> Stage {
        Stage::new("12a4b", "test-001")
    }

    // ----- capability detection -----

    #[tokio::test]
    async fn test_check_authentication_ok() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.6.0-02");
        client(mock).check_authentication().await.unwrap();
    }

    #[tokio::test]
    async fn test_check_authentication_reports_first_missing_permission() {
        let permissions: Vec<(&str, u32)> = REQUIRED_PERMISSIONS
            .iter()
            .map(|p| (*p, if *p == "nexus:stagingfinish" || *p == "nexus:stagingdrop" { 0 } else { 1 }))
            .collect();
        let mut mock = MockTransport::new();
        on_get(&mut mock, "service/local/status", 200, status_document("2.6.0", &permissions));

        let err = client(mock).check_authentication().await.unwrap_err();
        match err {
            StageError::InsufficientPrivileges { ref permission } => {
                assert_eq!(permission, "nexus:stagingfinish");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("insufficient privileges"));
    }

    #[tokio::test]
    async fn test_check_authentication_invalid_response() {
        let mut mock = MockTransport::new();
        on_get(
            &mut mock,
            "service/local/status",
            200,
            "<html><body>Not Nexus</body></html>".to_string(),
        );

        let err = client(mock).check_authentication().await.unwrap_err();
        assert!(matches!(err, StageError::InvalidResponse { ref permission, .. } if permission == "nexus:stagingprofiles"));
        assert_eq!(err.origin(), ErrorOrigin::Protocol);
    }

    #[tokio::test]
    async fn test_check_authentication_unauthorized() {
        let mut mock = MockTransport::new();
        on_get(&mut mock, "service/local/status", 401, String::new());

        let err = client(mock).check_authentication().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.origin(), ErrorOrigin::Transport);
    }

    #[tokio::test]
    async fn test_server_version_is_memoized() {
        let mut mock = MockTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, status_document("2.3.1-01", &[]))));

        let client = client(mock);
        assert_eq!(client.server_version().await.unwrap(), "2.3.1-01");
        assert_eq!(client.server_version().await.unwrap(), "2.3.1-01");
        assert!(!client.is_async_close().await.unwrap());
    }

    #[tokio::test]
    async fn test_is_async_close_by_version() {
        for (version, expected) in [
            ("2.3.23-02", false),
            ("2.4.0-03", true),
            ("2.5.0-04", true),
            ("3.1.0-07", true),
        ] {
            let mut mock = MockTransport::new();
            on_status(&mut mock, version);
            assert_eq!(client(mock).is_async_close().await.unwrap(), expected, "{version}");
        }
    }

    #[tokio::test]
    async fn test_missing_version_node() {
        let mut mock = MockTransport::new();
        on_get(&mut mock, "service/local/status", 200, "<status><data/></status>".to_string());
        let err = client(mock).server_version().await.unwrap_err();
        assert!(matches!(err, StageError::MissingNode { .. }));
    }

    #[tokio::test]
    async fn test_unrecognised_version_is_fatal() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "unknown");
        let err = client(mock).is_async_close().await.unwrap_err();
        assert!(matches!(err, StageError::UnrecognisedVersion { .. }));
    }

    #[tokio::test]
    async fn test_malformed_status_document() {
        let mut mock = MockTransport::new();
        on_get(&mut mock, "service/local/status", 200, "<status><data>".to_string());
        let err = client(mock).server_version().await.unwrap_err();
        assert!(matches!(err, StageError::Parse { .. }));
        assert!(err.source().is_some());
    }

    // ----- discovery and matching -----

    #[tokio::test]
    async fn test_open_stages_filters_and_keeps_order() {
        let mut mock = MockTransport::new();
        on_get(
            &mut mock,
            "service/local/staging/profile_repositories",
            200,
            profile_repositories_document(&[
                RepositoryEntry::new("12a4b", "test-001", "open"),
                RepositoryEntry::new("12a4b", "test-003", "closed"),
                RepositoryEntry::new("99ff0", "test-005", "open"),
            ]),
        );

        let stages = client(mock).open_stages().await.unwrap();
        assert_eq!(
            stages,
            vec![Stage::new("12a4b", "test-001"), Stage::new("99ff0", "test-005")]
        );
    }

    #[tokio::test]
    async fn test_open_stages_missing_repository_id() {
        let mut mock = MockTransport::new();
        on_get(
            &mut mock,
            "service/local/staging/profile_repositories",
            200,
            "<stagingRepositories><data><stagingProfileRepository><profileId>p</profileId><type>open</type></stagingProfileRepository></data></stagingRepositories>".to_string(),
        );

        let err = client(mock).open_stages().await.unwrap_err();
        assert!(matches!(err, StageError::MissingNode { ref path, .. } if path == "repositoryId"));
    }

    #[tokio::test]
    async fn test_check_stage_for_gav_statuses() {
        let mut mock = MockTransport::new();
        on_head(
            &mut mock,
            "service/local/repositories/test-001/content/org/example/app/1.0/",
            200,
        );
        on_head(
            &mut mock,
            "service/local/repositories/test-001/content/org/example/app/2.0/",
            404,
        );
        on_head(
            &mut mock,
            "service/local/repositories/test-001/content/org/example/app/3.0/",
            503,
        );
        on_head(
            &mut mock,
            "service/local/repositories/test-001/content/org/example/app/",
            200,
        );

        let client = client(mock);
        let stage = stage();
        assert!(client.check_stage_for_gav(&stage, "org.example", "app", Some("1.0")).await.unwrap());
        assert!(!client.check_stage_for_gav(&stage, "org.example", "app", Some("2.0")).await.unwrap());
        assert!(!client.check_stage_for_gav(&stage, "org.example", "app", Some("3.0")).await.unwrap());
        assert!(client.check_stage_for_gav(&stage, "org.example", "app", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_gav_values_are_encoded_per_segment() {
        let mut mock = MockTransport::new();
        on_head(
            &mut mock,
            "service/local/repositories/test-001/content/org/example/app/1.0%23rc/",
            404,
        );
        on_head(
            &mut mock,
            "service/local/repositories/test-001/content/org/example/a%2Fb%3Fc/",
            404,
        );

        let client = client(mock);
        let stage = stage();
        assert!(!client.check_stage_for_gav(&stage, "org.example", "app", Some("1.0#rc")).await.unwrap());
        assert!(!client.check_stage_for_gav(&stage, "org.example", "a/b?c", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_gav_dot_segments_are_rejected() {
        let mut mock = MockTransport::new();
        mock.expect_head().times(0);

        let client = client(mock);
        let stage = stage();
        for (group, version) in [("org..example", None), ("org.example", Some("..")), (".", None)] {
            let err = client
                .check_stage_for_gav(&stage, group, "app", version)
                .await
                .unwrap_err();
            assert!(matches!(err, StageError::InvalidSegment { .. }), "{group} {version:?}");
        }
    }

    #[tokio::test]
    async fn test_stage_id_is_encoded_when_polling() {
        let mut mock = MockTransport::new();
        on_repository_polls(&mut mock, "odd%23id", 0);

        client(mock)
            .wait_for_action_to_complete(&Stage::new("p", "odd#id"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_open_stage_first_match_wins() {
        let mut mock = MockTransport::new();
        on_get(
            &mut mock,
            "service/local/staging/profile_repositories",
            200,
            profile_repositories_document(&[
                RepositoryEntry::new("p", "test-001", "open"),
                RepositoryEntry::new("p", "test-002", "open"),
                RepositoryEntry::new("p", "test-003", "open"),
            ]),
        );
        on_head(&mut mock, "service/local/repositories/test-001/content/com/acme/lib/", 404);
        on_head(&mut mock, "service/local/repositories/test-002/content/com/acme/lib/", 200);
        on_head(&mut mock, "service/local/repositories/test-003/content/com/acme/lib/", 200);

        let found = client(mock).find_open_stage("com.acme", "lib", None).await.unwrap();
        assert_eq!(found, Some(Stage::new("p", "test-002")));
    }

    #[tokio::test]
    async fn test_find_open_stage_none() {
        let mut mock = MockTransport::new();
        on_get(
            &mut mock,
            "service/local/staging/profile_repositories",
            200,
            profile_repositories_document(&[RepositoryEntry::new("p", "test-001", "open")]),
        );
        on_head(&mut mock, "service/local/repositories/test-001/content/com/acme/lib/1.2/", 404);

        let found = client(mock)
            .find_open_stage("com.acme", "lib", Some("1.2"))
            .await
            .unwrap();
        assert_eq!(found, None);
    }

    // ----- waiting -----

    #[tokio::test]
    async fn test_wait_polls_until_not_transitioning() {
        let mut mock = MockTransport::new();
        let polls = on_repository_polls(&mut mock, "test-001", 2);

        client(mock).wait_for_action_to_complete(&stage()).await.unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_respects_max_attempts() {
        let mut mock = MockTransport::new();
        let polls = on_repository_polls(&mut mock, "test-001", usize::MAX);

        let client = client(mock).with_poll_config(
            PollConfig::default()
                .with_interval(Duration::from_millis(1))
                .with_max_attempts(4),
        );
        let err = client.wait_for_action_to_complete(&stage()).await.unwrap_err();
        assert!(matches!(err, StageError::PollLimitReached { attempts: 4, .. }));
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_wait_interrupted_during_sleep() {
        let mut mock = MockTransport::new();
        on_repository_polls(&mut mock, "test-001", usize::MAX);

        let token = Arc::new(CancellationToken::new());
        let client = client(mock)
            .with_poll_config(PollConfig::default().with_interval(Duration::from_secs(3600)))
            .with_cancellation(Arc::clone(&token));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel("build aborted");
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            client.wait_for_action_to_complete(&stage()),
        )
        .await
        .unwrap()
        .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, StageError::Interrupted { ref reason, .. } if reason == "build aborted"));
        assert_eq!(err.origin(), ErrorOrigin::Interrupted);
    }

    #[tokio::test]
    async fn test_wait_already_cancelled_does_not_poll() {
        let mut mock = MockTransport::new();
        mock.expect_get().times(0);

        let client = client(mock);
        client.cancellation().cancel("shutdown");
        let err = client.wait_for_action_to_complete(&stage()).await.unwrap_err();
        assert!(matches!(err, StageError::Interrupted { .. }));
    }

    #[tokio::test]
    async fn test_wait_rejects_non_boolean_flag() {
        let mut mock = MockTransport::new();
        on_get(
            &mut mock,
            "service/local/staging/repository/test-001",
            200,
            "<stagingProfileRepository><transitioning>maybe</transitioning></stagingProfileRepository>".to_string(),
        );
        let err = client(mock).wait_for_action_to_complete(&stage()).await.unwrap_err();
        assert!(matches!(err, StageError::InvalidValue { .. }));
    }

    // ----- transitions -----

    #[tokio::test]
    async fn test_close_on_sync_server_does_not_poll() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.3.1-01");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/finish", 201);

        client(mock).close_stage(&stage(), "Closing").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_sends_payload() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.3.1-01");
        mock.expect_post_xml()
            .withf(|url, body| {
                url.as_str().ends_with("/profiles/12a4b/finish")
                    && body.contains("<stagedRepositoryId><![CDATA[test-001]]></stagedRepositoryId>")
                    && body.contains("<![CDATA[Release ]]]]><![CDATA[> 1.0]]>")
            })
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(201, "")));

        client(mock).close_stage(&stage(), "Release ]]> 1.0").await.unwrap();
    }

    #[tokio::test]
    async fn test_close_on_async_server_succeeds() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.6.0-02");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/finish", 201);
        let polls = on_repository_polls(&mut mock, "test-001", 1);
        on_get(
            &mut mock,
            "service/local/staging/repository/test-001/activity",
            200,
            ActivityLog::new()
                .activity("open")
                .event("repositoryCreated", &[("id", "test-001")])
                .activity("close")
                .event("repositoryClosed", &[("id", "test-001")])
                .build(),
        );

        client(mock).close_stage(&stage(), "Closing").await.unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_failure_is_decoded() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.6.0-02");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/finish", 201);
        on_repository_polls(&mut mock, "test-001", 0);
        on_get(
            &mut mock,
            "service/local/staging/repository/test-001/activity",
            200,
            ActivityLog::new()
                .activity("close")
                .event("ruleFailed", &[("typeId", "javadoc-staging"), ("failureMessage", "A")])
                .event("ruleFailed", &[("failureMessage", "B")])
                .event("repositoryCloseFailed", &[("id", "test-001"), ("cause", "X")])
                .build(),
        );

        let err = client(mock).close_stage(&stage(), "Closing").await.unwrap_err();
        let msg = err.to_string();
        let x = msg.find('X').unwrap();
        let a = msg.find("\tA").unwrap();
        let b = msg.find("\tB").unwrap();
        assert!(x < a && a < b, "{msg}");
        assert_eq!(msg, "Closing stage test-001 failed.\n\tX\n\tA\n\tB");
        assert!(err.source().is_none());
        assert_eq!(err.origin(), ErrorOrigin::Protocol);
    }

    #[tokio::test]
    async fn test_close_unrecorded_outcome() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.4.0-03");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/finish", 201);
        on_repository_polls(&mut mock, "test-001", 0);
        on_get(
            &mut mock,
            "service/local/staging/repository/test-001/activity",
            200,
            ActivityLog::new().activity("close").event("ruleEvaluate", &[]).build(),
        );

        let err = client(mock).close_stage(&stage(), "Closing").await.unwrap_err();
        assert!(matches!(
            err,
            StageError::UnrecordedOutcome { action: StageAction::Close, .. }
        ));
        assert!(err.to_string().contains("not recorded as failed or succeeded"));
    }

    #[tokio::test]
    async fn test_close_rejected() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.6.0-02");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/finish", 400);

        let err = client(mock).close_stage(&stage(), "Closing").await.unwrap_err();
        match err {
            StageError::ActionRejected { action, ref stage, status } => {
                assert_eq!(action, StageAction::Close);
                assert_eq!(stage.stage_id(), "test-001");
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_drop_does_not_wait_or_describe() {
        let mut mock = MockTransport::new();
        mock.expect_get().times(0);
        mock.expect_post_xml()
            .withf(|url, body| {
                url.as_str() == format!("{BASE}service/local/staging/profiles/12a4b/drop")
                    && !body.contains("<description>")
            })
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(201, "")));

        client(mock).drop_stage(&stage()).await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_rejected() {
        let mut mock = MockTransport::new();
        on_post(&mut mock, "service/local/staging/profiles/12a4b/drop", 200);

        let err = client(mock).drop_stage(&stage()).await.unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[tokio::test]
    async fn test_release_on_async_server_waits() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.5.0-04");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/promote", 201);
        let polls = on_repository_polls(&mut mock, "test-001", 2);

        client(mock).release_stage(&stage(), "Release 1.0").await.unwrap();
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_release_on_sync_server_does_not_wait() {
        let mut mock = MockTransport::new();
        on_status(&mut mock, "2.2.1");
        on_post(&mut mock, "service/local/staging/profiles/12a4b/promote", 201);

        client(mock).release_stage(&stage(), "Release 1.0").await.unwrap();
    }

    // ----- construction -----

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = StageClient::with_transport("https://repo.example.com/nexus", MockTransport::new()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://repo.example.com/nexus/");

        let client = StageClient::with_transport("https://repo.example.com", MockTransport::new()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://repo.example.com/");
    }

    #[test]
    fn test_invalid_base_urls() {
        for base in ["not a url", "ftp://repo.example.com/", "mailto:ops@example.com"] {
            let err = StageClient::with_transport(base, MockTransport::new()).unwrap_err();
            assert!(matches!(err, StageError::InvalidBaseUrl { .. }), "{base}");
        }
    }
}
