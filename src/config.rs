use std::env;
use std::time::Duration;

use anyhow::Result;

/// Version-discovery resource every compatible server answers at.
pub const STATUS_ENDPOINT: &str = "status.php";

/// WebDAV root under the server base URL.
pub const DAV_ROOT_PATH: &str = "remote.php/webdav";

/// Substrings in a redirect URL that indicate a federated identity provider.
/// Matched case-insensitively; the fuzziness is load-bearing.
pub const SSO_INDICATOR_TOKENS: [&str; 2] = ["saml", "wayf"];

#[derive(Clone, Debug)]
pub struct SetupConfig {
    pub default_server_url: Option<String>,
    pub default_local_folder: String,
    pub default_remote_folder: String,
    pub max_redirects: u32,
    pub secure_probe_timeout_seconds: u64,
    pub plaintext_probe_timeout_seconds: u64,
    pub probe_timeout_seconds: u64,
    pub ignore_hidden_files: bool,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            default_server_url: None,
            default_local_folder: "Sync".to_string(),
            default_remote_folder: "/".to_string(),
            max_redirects: 10,
            secure_probe_timeout_seconds: 30,
            plaintext_probe_timeout_seconds: 10,
            probe_timeout_seconds: 30,
            ignore_hidden_files: true,
        }
    }
}

impl SetupConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Ok(SetupConfig {
            default_server_url: env::var("SYNCBRIDGE_SERVER_URL").ok(),
            default_local_folder: env::var("SYNCBRIDGE_LOCAL_FOLDER")
                .unwrap_or(defaults.default_local_folder),
            default_remote_folder: env::var("SYNCBRIDGE_REMOTE_FOLDER")
                .unwrap_or(defaults.default_remote_folder),
            max_redirects: env::var("SYNCBRIDGE_MAX_REDIRECTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_redirects),
            secure_probe_timeout_seconds: env::var("SYNCBRIDGE_SECURE_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.secure_probe_timeout_seconds),
            plaintext_probe_timeout_seconds: env::var("SYNCBRIDGE_PLAINTEXT_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.plaintext_probe_timeout_seconds),
            probe_timeout_seconds: env::var("SYNCBRIDGE_PROBE_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.probe_timeout_seconds),
            ignore_hidden_files: env::var("SYNCBRIDGE_IGNORE_HIDDEN_FILES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ignore_hidden_files),
        })
    }

    /// Deadline for the existence probe. Secure handshakes are slower, so
    /// they get the longer budget; plaintext failures should fail fast.
    pub fn existence_timeout(&self, scheme: &str) -> Duration {
        if scheme == "https" {
            Duration::from_secs(self.secure_probe_timeout_seconds)
        } else {
            Duration::from_secs(self.plaintext_probe_timeout_seconds)
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existence_timeout_is_scheme_dependent() {
        let config = SetupConfig::default();
        assert!(config.existence_timeout("https") > config.existence_timeout("http"));
    }
}
