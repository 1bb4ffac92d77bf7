//! Sign-in flow against a mock backend.

use std::time::Duration;

use canary_session::{
    AccessToken, ApiClient, CallbackOutcome, CallbackParams, ClientConfig, DashboardClient,
    Error, FileStorage, MemoryStorage, SessionStore,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri().parse().unwrap())
}

fn dashboard(server: &MockServer) -> DashboardClient {
    let session = SessionStore::new(MemoryStorage::new(), "canary_token");
    DashboardClient::with_session(config(server), session).unwrap()
}

async fn mount_exchange(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/auth/callback"))
        .and(query_param("code", "abc"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn successful_exchange_saves_token_and_opens_dashboard() {
    let server = MockServer::start().await;
    mount_exchange(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "tok123", "token_type": "bearer"})),
        1,
    )
    .await;

    let dashboard = dashboard(&server);
    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_code("abc"))
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.route().unwrap().as_str(), "/dashboard");
    assert_eq!(
        dashboard.session().current(),
        Some(AccessToken::new("tok123").unwrap())
    );
}

#[tokio::test]
async fn rejected_code_leaves_session_untouched() {
    let server = MockServer::start().await;
    mount_exchange(
        &server,
        ResponseTemplate::new(400).set_body_json(json!({"detail": "bad code"})),
        1,
    )
    .await;

    let dashboard = dashboard(&server);
    dashboard
        .session()
        .save(AccessToken::new("previous").unwrap())
        .unwrap();

    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_code("abc"))
        .await;

    assert_eq!(outcome.route().unwrap().as_str(), "/");
    match outcome.failure() {
        Some(Error::ExchangeFailed { status, detail }) => {
            assert_eq!(*status, Some(400));
            assert_eq!(detail, "bad code");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(
        dashboard.session().current(),
        Some(AccessToken::new("previous").unwrap())
    );
}

#[tokio::test]
async fn provider_denial_skips_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dashboard = dashboard(&server);
    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_error("access_denied"))
        .await;

    assert_eq!(outcome.route().unwrap().as_str(), "/");
    assert!(matches!(
        outcome.failure(),
        Some(Error::OAuthDenied { error, .. }) if error == "access_denied"
    ));
    assert_eq!(dashboard.session().current(), None);
}

#[tokio::test]
async fn error_wins_over_code() {
    let server = MockServer::start().await;
    mount_exchange(&server, ResponseTemplate::new(200), 0).await;

    let dashboard = dashboard(&server);
    let params = CallbackParams::from_query("code=abc&error=access_denied");
    let outcome = dashboard.callback_handler().handle(params).await;

    assert_eq!(outcome.route().unwrap().as_str(), "/");
}

#[tokio::test]
async fn success_without_token_is_a_failure() {
    let server = MockServer::start().await;
    mount_exchange(&server, ResponseTemplate::new(200).set_body_json(json!({})), 1).await;

    let dashboard = dashboard(&server);
    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_code("abc"))
        .await;

    assert_eq!(outcome.route().unwrap().as_str(), "/");
    assert!(matches!(
        outcome.failure(),
        Some(Error::MalformedExchangeResponse)
    ));
    assert_eq!(dashboard.session().current(), None);
}

#[tokio::test]
async fn empty_token_is_a_failure() {
    let server = MockServer::start().await;
    mount_exchange(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"access_token": ""})),
        1,
    )
    .await;

    let dashboard = dashboard(&server);
    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_code("abc"))
        .await;

    assert!(matches!(
        outcome.failure(),
        Some(Error::MalformedExchangeResponse)
    ));
    assert_eq!(dashboard.session().current(), None);
}

#[tokio::test]
async fn no_parameters_keeps_waiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dashboard = dashboard(&server);
    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::default())
        .await;

    assert!(matches!(outcome, CallbackOutcome::Waiting));
    assert!(outcome.route().is_none());
}

#[tokio::test]
async fn duplicate_invocation_exchanges_once() {
    let server = MockServer::start().await;
    mount_exchange(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "tok123"}))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let dashboard = dashboard(&server);
    let handler = dashboard.callback_handler();

    let (first, second) = tokio::join!(
        handler.handle(CallbackParams::with_code("abc")),
        handler.handle(CallbackParams::with_code("abc")),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, CallbackOutcome::Duplicate))
            .count(),
        1
    );

    let again = handler.handle(CallbackParams::with_code("abc")).await;
    assert!(matches!(again, CallbackOutcome::Duplicate));
}

#[tokio::test]
async fn closed_view_still_commits_token() {
    let server = MockServer::start().await;
    mount_exchange(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"access_token": "tok123"}))
            .set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let dashboard = dashboard(&server);
    let handler = dashboard.callback_handler();
    let view = CancellationToken::new();

    let (outcome, ()) = tokio::join!(
        handler.handle_with_cancel(CallbackParams::with_code("abc"), &view),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            view.cancel();
        },
    );

    assert!(matches!(outcome, CallbackOutcome::Detached { failure: None }));
    assert!(outcome.route().is_none());
    assert_eq!(
        dashboard.session().current(),
        Some(AccessToken::new("tok123").unwrap())
    );
}

#[tokio::test]
async fn slow_backend_times_out_to_entry() {
    let server = MockServer::start().await;
    let config = config(&server).with_request_timeout(Duration::from_millis(50));
    Mock::given(method("GET"))
        .and(path("/auth/callback"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok123"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let session = SessionStore::new(MemoryStorage::new(), "canary_token");
    let dashboard = DashboardClient::with_session(config, session).unwrap();
    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_code("abc"))
        .await;

    assert_eq!(outcome.route().unwrap().as_str(), "/");
    assert!(matches!(
        outcome.failure(),
        Some(Error::ExchangeFailed { status: None, .. })
    ));
    assert_eq!(dashboard.session().current(), None);
}

#[tokio::test]
async fn custom_http_client_keeps_configured_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/callback"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "tok123"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = config(&server).with_request_timeout(Duration::from_millis(50));
    let client = ApiClient::new(config)
        .unwrap()
        .with_http_client(reqwest::Client::new());

    let err = client.exchange_code("abc").await.unwrap_err();
    assert!(
        matches!(&err, Error::ExchangeFailed { status: None, detail } if detail == "request timed out"),
        "{err:?}"
    );
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/auth/callback"))
        .and(query_param("code", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok123"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/api/user/repositories"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::new(format!("{}/api/v1", server.uri()).parse().unwrap());
    let session = SessionStore::new(MemoryStorage::new(), "canary_token");
    let dashboard = DashboardClient::with_session(config, session).unwrap();

    assert_eq!(
        dashboard.client().login_url().unwrap().as_str(),
        format!("{}/api/v1/auth/github", server.uri())
    );

    let outcome = dashboard
        .callback_handler()
        .handle(CallbackParams::with_code("abc"))
        .await;
    assert!(outcome.is_success(), "{outcome:?}");

    let repos = dashboard.repositories().list_repositories().await.unwrap();
    assert!(repos.is_empty());
}

#[tokio::test]
async fn session_survives_restart() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let storage_path = dir.path().join("storage.json");
    let config = config(&server).with_storage_path(&storage_path);

    let first = DashboardClient::new(config.clone()).unwrap();
    assert_eq!(first.session().current(), None);
    first.session().save(AccessToken::new("tokA").unwrap()).unwrap();
    first.session().save(AccessToken::new("tokB").unwrap()).unwrap();

    let restarted = DashboardClient::new(config).unwrap();
    assert_eq!(
        restarted.session().current(),
        Some(AccessToken::new("tokB").unwrap())
    );

    restarted.guard().sign_out();
    let reopened = SessionStore::new(FileStorage::new(&storage_path), "canary_token");
    assert_eq!(reopened.load(), None);
}

#[tokio::test]
async fn corrupt_storage_starts_signed_out() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let storage_path = dir.path().join("storage.json");
    std::fs::write(&storage_path, "\u{0}garbage").unwrap();

    let dashboard = DashboardClient::new(config(&server).with_storage_path(&storage_path)).unwrap();
    assert_eq!(dashboard.session().current(), None);
}
