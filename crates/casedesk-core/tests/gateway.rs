use std::time::Duration;

use casedesk_core::api::{ApiError, AuthGateway, ErrorKind, HttpAuthGateway};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer) -> HttpAuthGateway {
    HttpAuthGateway::new(&format!("{}/api", server.uri()), Duration::from_secs(5))
        .unwrap()
        .with_rate_limit_backoff(Duration::from_millis(10))
}

fn login_body() -> serde_json::Value {
    json!({
        "access": "A",
        "refresh": "R",
        "user": {"id": 1, "email": "a@b.com", "full_name": "Ana"},
        "memberships": [{"id": 3, "organization": 1, "role": "lawyer"}]
    })
}

/// A local port with nothing listening on it
fn dead_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}

#[tokio::test]
async fn test_login_posts_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({"email": "a@b.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .expect(1)
        .mount(&server)
        .await;

    let response = gateway_for(&server).login("a@b.com", "pw").await.unwrap();

    assert_eq!(response.access, "A");
    assert_eq!(response.refresh, "R");
    assert_eq!(response.user.display_name(), "Ana");
    assert_eq!(response.memberships.len(), 1);
}

#[tokio::test]
async fn test_login_rejected_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Credenciais inválidas."})),
        )
        .mount(&server)
        .await;

    let err = gateway_for(&server).login("a@b.com", "bad").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.detail().as_deref(), Some("Credenciais inválidas."));
}

#[tokio::test]
async fn test_me_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", "Bearer A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": 9},
            "memberships": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = gateway_for(&server).fetch_current_identity("A").await.unwrap();

    assert_eq!(identity.user.id, 9);
    assert!(identity.memberships.is_empty());
}

#[tokio::test]
async fn test_logout_posts_refresh_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(header("authorization", "Bearer A"))
        .and(body_json(json!({"refresh": "R"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"detail": "Logout realizado com sucesso."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    gateway_for(&server).logout("A", "R").await.unwrap();
}

#[tokio::test]
async fn test_refresh_posts_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({"refresh": "R"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": "A2", "refresh": "R2"})),
        )
        .mount(&server)
        .await;

    let response = gateway_for(&server).refresh_access_token("R").await.unwrap();

    assert_eq!(response.access, "A2");
    assert_eq!(response.refresh.as_deref(), Some("R2"));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 1}})))
        .mount(&server)
        .await;

    let identity = gateway_for(&server).fetch_current_identity("A").await.unwrap();

    assert_eq!(identity.user.id, 1);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let err = gateway_for(&server).refresh_access_token("R").await.unwrap_err();

    assert!(matches!(err, ApiError::RateLimited));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = gateway_for(&server).fetch_current_identity("A").await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidResponse(_)));
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let gateway = HttpAuthGateway::new(&dead_port_url(), Duration::from_secs(2)).unwrap();

    let err = gateway.fetch_current_identity("A").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"user": {"id": 1}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let gateway =
        HttpAuthGateway::new(&format!("{}/api", server.uri()), Duration::from_millis(200)).unwrap();

    let err = gateway.fetch_current_identity("A").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
}
