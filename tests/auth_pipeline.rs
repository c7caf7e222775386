//! End-to-end tests of the authenticated request pipeline against a mock
//! server: bearer injection, the one-shot refresh-and-retry on 401, and the
//! session lifecycle around login and logout.

use std::sync::Arc;

use serde_json::json;
use url::Url;
use wiremock::{
    matchers::{header, method, path},
    Match, Mock, MockServer, Request, ResponseTemplate,
};

use remdash::{
    auth::Pipeline,
    config::Config,
    error::ErrorKind,
    session::{MemoryStore, SessionStore},
};

/// Matches requests that carry no `Authorization` header at all.
struct NoAuthorization;

impl Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}

fn pipeline_for(server: &MockServer, store: Arc<dyn SessionStore>) -> Pipeline {
    let base_url = Url::parse(&format!("{}/api/", server.uri())).expect("valid base url");
    Pipeline::new(&Config::new(base_url), store).expect("pipeline")
}

fn ping(server: &MockServer, pipeline: &Pipeline) -> reqwest::Request {
    let url = Url::parse(&format!("{}/api/ping", server.uri())).expect("valid url");
    pipeline.http_client().get(url, "")
}

fn user_json(id: u64, username: &str) -> serde_json::Value {
    json!({"id": id, "username": username, "full_name": "John Doe"})
}

#[tokio::test]
async fn stored_access_token_is_sent_as_bearer() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("access-1", "refresh-1");
    let pipeline = pipeline_for(&server, store);

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = pipeline.send(ping(&server, &pipeline)).await.expect("response");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn no_token_means_no_authorization_header() {
    let server = MockServer::start().await;
    let pipeline = pipeline_for(&server, Arc::new(MemoryStore::new()));

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(NoAuthorization)
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = pipeline.send(ping(&server, &pipeline)).await.expect("response");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn first_401_triggers_one_refresh_and_one_retry() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("stale", "refresh-1");
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("authorization", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"access_token": "fresh", "token_type": "Bearer", "expires_in": 3600}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let response = pipeline.send(ping(&server, &pipeline)).await.expect("retried response");
    assert_eq!(response.status(), 200);

    // The new token is stored; the refresh token is reused, not rotated.
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn concurrent_401s_coalesce_into_one_refresh() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("stale", "refresh-1");
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    // Both in-flight requests carry the same stale token and both get a 401.
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    // Exactly one of them may hit the refresh endpoint; the other adopts the
    // replacement token it finds once the lock is released.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("authorization", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"access_token": "fresh", "token_type": "Bearer"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let (first, second) = tokio::join!(
        pipeline.send(ping(&server, &pipeline)),
        pipeline.send(ping(&server, &pipeline)),
    );

    assert_eq!(first.expect("first retried").status(), 200);
    assert_eq!(second.expect("second retried").status(), 200);
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn refresh_failure_propagates_without_retry() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("stale", "refresh-bad");
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    // Exactly one send: the original. No retry may follow a failed refresh.
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "refresh token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = pipeline
        .send(ping(&server, &pipeline))
        .await
        .expect_err("refresh error");
    assert_eq!(err.kind, ErrorKind::Unauthenticated);
    assert!(err.to_string().contains("refresh token expired"));

    // Stored state is untouched by the failed refresh.
    assert_eq!(store.access_token().as_deref(), Some("stale"));
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-bad"));
}

#[tokio::test]
async fn second_401_is_returned_without_another_refresh() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("stale", "refresh-1");
    let pipeline = pipeline_for(&server, store);

    // Both the original send and the retry come back 401.
    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    // Only one refresh happens regardless.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"access_token": "fresh", "token_type": "Bearer"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = pipeline.send(ping(&server, &pipeline)).await.expect("response");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn refresh_without_token_fails_fast() {
    let server = MockServer::start().await;
    let pipeline = pipeline_for(&server, Arc::new(MemoryStore::new()));

    // No network call may be issued.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = pipeline.refresh().await.expect_err("fail fast");
    assert_eq!(err.kind, ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn login_stores_tokens_and_user() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "user": user_json(1, "jdoe")
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = pipeline.login("jdoe", "hunter22").await.expect("login");
    assert_eq!(user.username, "jdoe");

    assert_eq!(store.access_token().as_deref(), Some("access-1"));
    assert_eq!(store.refresh_token().as_deref(), Some("refresh-1"));
    assert_eq!(store.user().map(|u| u.id), Some(1));
}

#[tokio::test]
async fn rejected_login_surfaces_server_message() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": "Invalid username or password",
            "code": "INVALID_CREDENTIALS"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = pipeline.login("jdoe", "wrong").await.expect_err("rejected");
    assert_eq!(err.kind, ErrorKind::Unauthenticated);
    assert!(err.to_string().contains("Invalid username or password"));

    // A failed login leaves no session behind.
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
}

#[tokio::test]
async fn rejected_login_without_message_uses_fallback() {
    let server = MockServer::start().await;
    let pipeline = pipeline_for(&server, Arc::new(MemoryStore::new()));

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
        .expect(1)
        .mount(&server)
        .await;

    let err = pipeline.login("jdoe", "pw").await.expect_err("rejected");
    assert!(err.to_string().contains("login failed"));
}

#[tokio::test]
async fn logout_clears_session_and_is_idempotent() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("access-1", "refresh-1");
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    pipeline.logout();
    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert!(store.user().is_none());

    // Logging out of an empty session is fine too.
    pipeline.logout();
    assert_eq!(store.access_token(), None);
}

#[tokio::test]
async fn current_user_overwrites_cached_snapshot() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("access-1", "refresh-1");
    let pipeline = pipeline_for(&server, Arc::clone(&store) as Arc<dyn SessionStore>);

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": user_json(7, "renamed")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = pipeline.current_user().await.expect("user");
    assert_eq!(user.id, 7);
    assert_eq!(store.user().map(|u| u.username), Some("renamed".to_owned()));
}

#[tokio::test]
async fn non_auth_errors_pass_through_untouched() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    store.set_tokens("access-1", "refresh-1");
    let pipeline = pipeline_for(&server, store);

    Mock::given(method("GET"))
        .and(path("/api/ping"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    // No refresh may happen for a non-401 failure.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = pipeline.send(ping(&server, &pipeline)).await.expect("response");
    assert_eq!(response.status(), 503);
}
