use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use syncbridge::config::DAV_ROOT_PATH;
use syncbridge::credentials::HttpBasicCredentials;
use syncbridge::errors::SetupError;
use syncbridge::models::{AccountDescriptor, ProxyMode};
use syncbridge::services::{FolderProvisioner, LocalOutcome, ProbeClient, RemoteOutcome};

fn account_for(server: &MockServer) -> AccountDescriptor {
    let mut account =
        AccountDescriptor::new(Url::parse(&server.uri()).unwrap(), DAV_ROOT_PATH);
    account.credentials = Arc::new(HttpBasicCredentials::new("demo", "secret"));
    account
}

fn client() -> ProbeClient {
    ProbeClient::new(&ProxyMode::NoProxy, CancellationToken::new()).unwrap()
}

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[tokio::test]
async fn ensure_local_creates_a_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("sync");
    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());

    let outcome = provisioner
        .ensure_local(target.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(outcome, LocalOutcome::Created);
    assert!(target.is_dir());
}

#[tokio::test]
async fn ensure_local_accepts_an_existing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());

    let first = provisioner
        .ensure_local(dir.path().to_str().unwrap())
        .await
        .unwrap();
    let second = provisioner
        .ensure_local(dir.path().to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(first, LocalOutcome::AlreadyExists);
    assert_eq!(second, LocalOutcome::AlreadyExists);
}

#[tokio::test]
async fn ensure_local_converges_on_repeated_calls() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("sync");
    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());

    let first = provisioner
        .ensure_local(target.to_str().unwrap())
        .await
        .unwrap();
    let second = provisioner
        .ensure_local(target.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(first, LocalOutcome::Created);
    assert_eq!(second, LocalOutcome::AlreadyExists);
    assert!(target.is_dir());
}

#[tokio::test]
async fn ensure_local_reports_filesystem_errors() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("occupied");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let error = provisioner
        .ensure_local(blocker.to_str().unwrap())
        .await
        .unwrap_err();

    assert!(matches!(error, SetupError::LocalFilesystem { .. }));
}

#[tokio::test]
async fn existing_remote_folder_is_reused() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(207).set_body_string("<d:multistatus xmlns:d=\"DAV:\"/>"))
        .mount(&server)
        .await;

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let outcome = provisioner
        .ensure_remote(&account_for(&server), "/Documents")
        .await
        .unwrap();

    assert_eq!(outcome, RemoteOutcome::Existed);
}

#[tokio::test]
async fn missing_remote_folder_is_created() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let outcome = provisioner
        .ensure_remote(&account_for(&server), "/Documents")
        .await
        .unwrap();

    assert_eq!(outcome, RemoteOutcome::Created);
}

#[tokio::test]
async fn accepted_creation_counts_as_already_existing() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let outcome = provisioner
        .ensure_remote(&account_for(&server), "/Documents")
        .await
        .unwrap();

    assert_eq!(outcome, RemoteOutcome::Existed);
}

#[tokio::test]
async fn method_not_allowed_creation_is_a_conflict() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let error = provisioner
        .ensure_remote(&account_for(&server), "/Documents")
        .await
        .unwrap_err();

    match error {
        SetupError::RemoteFolderConflict { status } => assert_eq!(status, 405),
        other => panic!("expected remote folder conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_creation_is_a_credential_failure() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let error = provisioner
        .ensure_remote(&account_for(&server), "/Documents")
        .await
        .unwrap_err();

    assert!(matches!(error, SetupError::AuthenticationInvalid { .. }));
}

#[tokio::test]
async fn other_creation_failures_carry_the_status() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("MKCOL"))
        .and(path("/remote.php/webdav/Documents"))
        .respond_with(ResponseTemplate::new(507))
        .mount(&server)
        .await;

    let client = client();
    let provisioner = FolderProvisioner::new(&client, timeout());
    let error = provisioner
        .ensure_remote(&account_for(&server), "/Documents")
        .await
        .unwrap_err();

    match error {
        SetupError::RemoteFolderConflict { status } => assert_eq!(status, 507),
        other => panic!("expected remote folder conflict, got {other:?}"),
    }
}
