use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::SetupError;
use crate::models::{AccountDescriptor, FolderDefinition};
use crate::services::probe_client::{ProbeClient, ProbeFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Existed,
    Created,
}

const EXISTS_PROPFIND_BODY: &str = r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:">
    <d:prop>
        <d:resourcetype/>
    </d:prop>
</d:propfind>"#;

/// Ensures a local directory and a remote folder both exist. Both operations
/// converge: running either twice ends in the same state as running it once.
pub struct FolderProvisioner<'a> {
    client: &'a ProbeClient,
    timeout: Duration,
}

impl<'a> FolderProvisioner<'a> {
    pub fn new(client: &'a ProbeClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Creates the local sync directory if it is missing. An existing
    /// directory succeeds without being touched.
    pub async fn ensure_local(&self, path: &str) -> Result<LocalOutcome, SetupError> {
        let normalized = FolderDefinition::prepare_local_path(path);
        let target = normalized.clone();
        tokio::task::spawn_blocking(move || ensure_local_blocking(&target))
            .await
            .map_err(|e| SetupError::local_filesystem(normalized, e.to_string()))?
    }

    /// Makes sure the remote folder exists, creating it when the existence
    /// probe reports not-found. Remote mutation only ever happens here, after
    /// the local directory is known to be in place.
    pub async fn ensure_remote(
        &self,
        account: &AccountDescriptor,
        remote_path: &str,
    ) -> Result<RemoteOutcome, SetupError> {
        let remote = FolderDefinition::prepare_remote_path(remote_path);
        let url = remote_folder_url(account, &remote)?;
        let credentials = account.credentials.as_ref();

        debug!("checking whether remote folder {} exists", remote);
        let response = self
            .client
            .propfind(&url, credentials, self.timeout, "0", EXISTS_PROPFIND_BODY)
            .await
            .map_err(map_probe_failure)?;

        if response.status == StatusCode::MULTI_STATUS || response.status.is_success() {
            info!("remote folder {} already exists", remote);
            return Ok(RemoteOutcome::Existed);
        }
        if response.status != StatusCode::NOT_FOUND {
            return Err(SetupError::network_transport(format!(
                "Could not check remote folder {}: HTTP {}",
                remote, response.status
            )));
        }

        info!("creating remote folder {}", remote);
        let response = self
            .client
            .mkcol(&url, credentials, self.timeout)
            .await
            .map_err(map_probe_failure)?;

        match response.status.as_u16() {
            // 202 has always been answered by servers that already hold the
            // collection.
            202 => {
                info!("remote folder {} already exists, connecting it for syncing", remote);
                Ok(RemoteOutcome::Existed)
            }
            status if (200..300).contains(&status) => {
                info!("remote folder {} created", remote);
                Ok(RemoteOutcome::Created)
            }
            401 => Err(SetupError::authentication_invalid(
                "Remote folder creation failed because the provided credentials are wrong. \
                 Please go back and check your credentials.",
            )),
            status => Err(SetupError::RemoteFolderConflict { status }),
        }
    }
}

fn ensure_local_blocking(normalized: &str) -> Result<LocalOutcome, SetupError> {
    let path = Path::new(normalized);
    if path.is_dir() {
        debug!("local sync folder {} already exists", normalized);
        return Ok(LocalOutcome::AlreadyExists);
    }

    fs::create_dir_all(path)
        .map_err(|e| SetupError::local_filesystem(normalized, e.to_string()))?;

    if let Err(e) = harden_permissions(path) {
        warn!("could not restrict permissions on {}: {}", normalized, e);
    }
    if let Err(e) = register_favorite_link(path) {
        warn!("could not register favorite link for {}: {}", normalized, e);
    }

    info!("created local sync folder {}", normalized);
    Ok(LocalOutcome::Created)
}

/// Sync folder contents are private to the owning user.
#[cfg(unix)]
fn harden_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o700);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn harden_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Best effort: expose the new folder in the desktop's places sidebar.
#[cfg(target_os = "linux")]
fn register_favorite_link(path: &Path) -> Result<()> {
    use std::io::Write;

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(());
    };
    let bookmarks = config_dir.join("gtk-3.0").join("bookmarks");
    let entry = format!("file://{}", path.display());

    let existing = fs::read_to_string(&bookmarks).unwrap_or_default();
    if existing.lines().any(|line| line == entry) {
        return Ok(());
    }

    if let Some(parent) = bookmarks.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&bookmarks)?;
    writeln!(file, "{entry}")?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn register_favorite_link(_path: &Path) -> Result<()> {
    Ok(())
}

fn remote_folder_url(account: &AccountDescriptor, remote: &str) -> Result<Url, SetupError> {
    account
        .dav_url()
        .join(remote.trim_start_matches('/'))
        .map_err(|e| {
            SetupError::network_transport(format!("Invalid remote folder path {remote}: {e}"))
        })
}

fn map_probe_failure(failure: ProbeFailure) -> SetupError {
    match failure {
        ProbeFailure::Timeout { url, .. } => {
            SetupError::network_transport(format!("Timeout while talking to {url}."))
        }
        ProbeFailure::Cancelled => SetupError::UserCancelled,
        ProbeFailure::Transport { url, message, .. } => {
            SetupError::network_transport(format!("Request to {url} failed: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountDescriptor;

    #[test]
    fn remote_folder_url_joins_under_dav_root() {
        let account = AccountDescriptor::new(
            Url::parse("https://cloud.example.com").unwrap(),
            "remote.php/webdav",
        );
        let url = remote_folder_url(&account, "/Documents").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/remote.php/webdav/Documents"
        );
    }

    #[test]
    fn remote_root_maps_to_dav_root() {
        let account = AccountDescriptor::new(
            Url::parse("https://cloud.example.com").unwrap(),
            "remote.php/webdav",
        );
        let url = remote_folder_url(&account, "/").unwrap();
        assert_eq!(url.as_str(), "https://cloud.example.com/remote.php/webdav/");
    }
}
