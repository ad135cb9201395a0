use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use syncbridge::config::{DAV_ROOT_PATH, SetupConfig};
use syncbridge::models::{AccountDescriptor, ProbeOutcome, ProxyMode};
use syncbridge::services::{ProbeClient, ServerExistenceProbe};

fn account_for(server: &MockServer) -> AccountDescriptor {
    AccountDescriptor::new(Url::parse(&server.uri()).unwrap(), DAV_ROOT_PATH)
}

fn client() -> ProbeClient {
    ProbeClient::new(&ProxyMode::NoProxy, CancellationToken::new()).unwrap()
}

#[tokio::test]
async fn discovers_installed_server_behind_redirect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/cloud/status.php"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cloud/status.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "installed": true,
            "version": "10.0.9",
            "versionstring": "10.0.9 (stable)"
        })))
        .mount(&server)
        .await;

    let config = SetupConfig::default();
    let client = client();
    let account = account_for(&server);

    let report = ServerExistenceProbe::new(&client, &config)
        .probe(&account)
        .await;

    match report.outcome {
        ProbeOutcome::Success {
            version,
            canonical_url,
        } => {
            assert_eq!(version.as_deref(), Some("10.0.9"));
            assert_eq!(canonical_url.as_str(), format!("{}/cloud", server.uri()));
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert!(!report.downgrade_advised);
}

#[tokio::test]
async fn missing_status_endpoint_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = SetupConfig::default();
    let client = client();
    let report = ServerExistenceProbe::new(&client, &config)
        .probe(&account_for(&server))
        .await;

    assert!(matches!(report.outcome, ProbeOutcome::NotFound));
}

#[tokio::test]
async fn not_installed_body_is_a_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "installed": false, "maintenance": true })),
        )
        .mount(&server)
        .await;

    let config = SetupConfig::default();
    let client = client();
    let report = ServerExistenceProbe::new(&client, &config)
        .probe(&account_for(&server))
        .await;

    match report.outcome {
        ProbeOutcome::TransportError { message, .. } => {
            assert!(message.contains("not installed"), "message: {message}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn html_body_is_a_transport_error_with_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>welcome</body></html>"),
        )
        .mount(&server)
        .await;

    let config = SetupConfig::default();
    let client = client();
    let report = ServerExistenceProbe::new(&client, &config)
        .probe(&account_for(&server))
        .await;

    match report.outcome {
        ProbeOutcome::TransportError { raw_body, .. } => {
            assert!(raw_body.unwrap().contains("welcome"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = SetupConfig {
        plaintext_probe_timeout_seconds: 1,
        ..SetupConfig::default()
    };
    let client = client();
    let report = ServerExistenceProbe::new(&client, &config)
        .probe(&account_for(&server))
        .await;

    assert!(matches!(report.outcome, ProbeOutcome::Timeout));
}

#[tokio::test]
async fn redirect_loop_terminates_with_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status.php"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/status.php"))
        .mount(&server)
        .await;

    let config = SetupConfig {
        max_redirects: 3,
        ..SetupConfig::default()
    };
    let client = client();
    let report = ServerExistenceProbe::new(&client, &config)
        .probe(&account_for(&server))
        .await;

    match report.outcome {
        ProbeOutcome::TransportError { message, .. } => {
            assert!(message.contains("redirected"), "message: {message}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}
