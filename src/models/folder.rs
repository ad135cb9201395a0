use std::path::Path;

use serde::{Deserialize, Serialize};

/// A configured local/remote folder pair ready for syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDefinition {
    /// Normalized local path (forward slashes, trailing separator).
    pub local_path: String,
    pub remote_path: String,
    pub ignore_hidden_files: bool,
    pub selective_sync_blacklist: Vec<String>,
    pub selective_sync_whitelist: Vec<String>,
}

impl FolderDefinition {
    /// Normalizes a local path: relative paths resolve against the home
    /// directory, separators become forward slashes and the result always
    /// carries a trailing slash, so existence comparisons never miss on
    /// formatting differences.
    pub fn prepare_local_path(path: &str) -> String {
        let mut prepared = if Path::new(path).is_absolute() {
            path.to_string()
        } else {
            match dirs::home_dir() {
                Some(home) => format!(
                    "{}/{}",
                    home.to_string_lossy().trim_end_matches('/'),
                    path
                ),
                None => path.to_string(),
            }
        };
        prepared = prepared.replace('\\', "/");
        if !prepared.ends_with('/') {
            prepared.push('/');
        }
        prepared
    }

    /// Normalizes a remote path to a leading-slash form; an empty path means
    /// the server root.
    pub fn prepare_remote_path(path: &str) -> String {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return "/".to_string();
        }
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// One human-readable line of the provisioning progress log.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: LogLevel,
    pub text: String,
}

impl LogLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

/// Terminal result of a provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisioningResult {
    pub success: bool,
    pub log: Vec<LogLine>,
    pub committed_folder: Option<FolderDefinition>,
    /// Remote folder name the server refused as a credential failure.
    /// Callers must not pre-fill it into the next attempt.
    pub invalid_remote_folder: Option<String>,
}

impl ProvisioningResult {
    pub fn error_lines(&self) -> impl Iterator<Item = &LogLine> {
        self.log.iter().filter(|line| line.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_local_path_appends_trailing_slash() {
        assert_eq!(
            FolderDefinition::prepare_local_path("/home/user/Sync"),
            "/home/user/Sync/"
        );
        assert_eq!(
            FolderDefinition::prepare_local_path("/home/user/Sync/"),
            "/home/user/Sync/"
        );
    }

    #[test]
    fn prepare_local_path_uses_forward_slashes() {
        assert_eq!(
            FolderDefinition::prepare_local_path("/home/user\\Documents\\Sync"),
            "/home/user/Documents/Sync/"
        );
    }

    #[test]
    fn prepare_local_path_is_stable_under_repetition() {
        let once = FolderDefinition::prepare_local_path("/data/sync");
        let twice = FolderDefinition::prepare_local_path(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn prepare_remote_path_defaults_to_root() {
        assert_eq!(FolderDefinition::prepare_remote_path(""), "/");
        assert_eq!(FolderDefinition::prepare_remote_path("  "), "/");
        assert_eq!(FolderDefinition::prepare_remote_path("Documents"), "/Documents");
        assert_eq!(FolderDefinition::prepare_remote_path("/Documents"), "/Documents");
    }
}
