// Simulates an OData service whose CSRF token expires:
//  - POST without the accepted token -> 403 + X-CSRF-Token: Required
//  - HEAD with X-CSRF-Token: Fetch -> new token
// The create must be replayed exactly once with the refreshed token.

#[cfg(test)]
mod tests {

    use std::sync::atomic::Ordering;

    use httpmock::prelude::*;
    use httpmock::Method;

    use crate::config::service::ServiceConfig;
    use crate::error::{DataAccessError, RefreshFailure};
    use crate::model::orchestrator::RequestOrchestrator;
    use crate::sources::token_refresher::TokenState;
    use crate::tests::common::{json, spawn_backend};

    #[tokio::test]
    async fn expired_token_is_refreshed_and_create_replayed() {
        let (handle, backend, model) = spawn_backend().await;

        let created = model
            .create("/EMPLOYEES", &json!({"ID": "1", "AGE": 52}))
            .await
            .unwrap();

        assert_eq!(created["ID"], "1");
        assert_eq!(created["@odata.etag"], "W/\"1\"");
        assert_eq!(backend.heads.load(Ordering::SeqCst), 1);
        assert_eq!(backend.post_tokens(), vec!["Fetch", "token-1"]);
        assert_eq!(model.token_store().current_token().await, "token-1");

        handle.abort();
    }

    #[tokio::test]
    async fn known_token_is_sent_without_refresh() {
        let (handle, backend, model) = spawn_backend().await;
        backend.accept_token("known");
        model.token_store().set_token("known").await;

        model.create("/EMPLOYEES", &json!({"ID": "2"})).await.unwrap();

        assert_eq!(backend.heads.load(Ordering::SeqCst), 0);
        assert_eq!(backend.post_tokens(), vec!["known"]);

        handle.abort();
    }

    #[tokio::test]
    async fn token_required_twice_fails_after_one_retry() {
        let (handle, backend, model) = spawn_backend().await;
        backend.reject_all_posts.store(true, Ordering::SeqCst);

        let err = model
            .create("/EMPLOYEES", &json!({"ID": "3"}))
            .await
            .unwrap_err();

        let backend_error = err.backend().expect("backend error");
        assert_eq!(backend_error.status, 403);
        assert_eq!(backend_error.body, "CSRF token validation failed");
        assert_eq!(backend.posts.load(Ordering::SeqCst), 2);
        assert_eq!(backend.heads.load(Ordering::SeqCst), 1);
        assert_eq!(backend.post_tokens(), vec!["Fetch", "token-1"]);

        handle.abort();
    }

    #[tokio::test]
    async fn failed_refresh_fails_the_create() {
        let (handle, backend, model) = spawn_backend().await;
        backend.fail_heads.store(true, Ordering::SeqCst);

        let err = model
            .create("/EMPLOYEES", &json!({"ID": "4"}))
            .await
            .unwrap_err();

        match err {
            DataAccessError::TokenRefreshFailed(RefreshFailure::Status { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(backend.posts.load(Ordering::SeqCst), 1);
        assert_eq!(model.token_state().await, TokenState::Absent);

        handle.abort();
    }

    #[tokio::test]
    async fn relative_path_is_rejected_before_any_request() {
        let (handle, backend, model) = spawn_backend().await;

        let err = model.create("EMPLOYEES", &json!({})).await.unwrap_err();
        assert!(matches!(err, DataAccessError::InvalidPath(ref p) if p == "EMPLOYEES"));
        assert_eq!(err.to_string(), "Not an absolute data binding path: EMPLOYEES");

        let err = model.read("TEAMS('1')/Name", false).await.unwrap_err();
        assert!(matches!(err, DataAccessError::InvalidPath(_)));

        assert_eq!(backend.requests(), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let server = MockServer::start_async().await;
        let post = server
            .mock_async(|when, then| {
                when.method(POST).path("/service/EMPLOYEES");
                then.status(400).body("invalid AGE");
            })
            .await;
        let token_fetch = server
            .mock_async(|when, then| {
                when.method(Method::HEAD).path("/service/");
                then.status(200).header("x-csrf-token", "unused");
            })
            .await;

        let config = ServiceConfig::new(server.url("/service/")).unwrap();
        let model = RequestOrchestrator::new(config).unwrap();

        let err = model
            .create("/EMPLOYEES", &json!({"AGE": "old"}))
            .await
            .unwrap_err();

        let backend_error = err.backend().expect("backend error");
        assert_eq!(backend_error.status, 400);
        assert_eq!(backend_error.status_text, "Bad Request");
        assert_eq!(backend_error.body, "invalid AGE");
        assert_eq!(
            err.to_string(),
            "HTTP request failed - 400 Bad Request: invalid AGE"
        );

        post.assert_async().await;
        token_fetch.assert_calls_async(0).await;
    }
}
