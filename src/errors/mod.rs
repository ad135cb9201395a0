use thiserror::Error;

/// Error taxonomy for the provisioning flow.
///
/// Probes never raise these across their own boundary; they classify into
/// `ProbeOutcome` values, and the saga maps terminal failures onto this enum
/// when it aborts. Filesystem and remote-folder operations return it
/// directly.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("network transport failure: {details}")]
    NetworkTransport { details: String },

    #[error("no compatible server instance found at {url}")]
    ServerNotFound { url: String },

    #[error("authentication rejected: {reason}")]
    AuthenticationInvalid { reason: String },

    #[error("redirect rejected for '{url}': {reason}")]
    RedirectLoopOrMismatch { url: String, reason: String },

    #[error("malformed server response: {details}")]
    MalformedResponse { details: String },

    #[error("local filesystem error at {path}: {details}")]
    LocalFilesystem { path: String, details: String },

    #[error("remote folder creation failed with HTTP status {status}")]
    RemoteFolderConflict { status: u16 },

    #[error("setup cancelled")]
    UserCancelled,
}

impl SetupError {
    pub fn user_message(&self) -> String {
        match self {
            SetupError::NetworkTransport { details } => details.clone(),
            SetupError::ServerNotFound { url } => {
                format!("Could not find a compatible server at {url}.")
            }
            SetupError::AuthenticationInvalid { reason } => reason.clone(),
            SetupError::RedirectLoopOrMismatch { url, reason } => {
                format!("The request was redirected to '{url}': {reason}")
            }
            SetupError::MalformedResponse { details } => details.clone(),
            SetupError::LocalFilesystem { path, details } => {
                format!("Could not create local folder {path}: {details}")
            }
            SetupError::RemoteFolderConflict { status } => {
                format!("The folder creation resulted in HTTP error code {status}.")
            }
            SetupError::UserCancelled => "Setup was cancelled.".to_string(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SetupError::NetworkTransport { .. } => "SETUP_NETWORK_TRANSPORT",
            SetupError::ServerNotFound { .. } => "SETUP_SERVER_NOT_FOUND",
            SetupError::AuthenticationInvalid { .. } => "SETUP_AUTH_INVALID",
            SetupError::RedirectLoopOrMismatch { .. } => "SETUP_REDIRECT_MISMATCH",
            SetupError::MalformedResponse { .. } => "SETUP_MALFORMED_RESPONSE",
            SetupError::LocalFilesystem { .. } => "SETUP_LOCAL_FILESYSTEM",
            SetupError::RemoteFolderConflict { .. } => "SETUP_REMOTE_FOLDER_CONFLICT",
            SetupError::UserCancelled => "SETUP_USER_CANCELLED",
        }
    }
}

/// Convenience constructors, mirroring how the error values are built at
/// their classification sites.
impl SetupError {
    pub fn network_transport<S: Into<String>>(details: S) -> Self {
        Self::NetworkTransport {
            details: details.into(),
        }
    }

    pub fn server_not_found<S: Into<String>>(url: S) -> Self {
        Self::ServerNotFound { url: url.into() }
    }

    pub fn authentication_invalid<S: Into<String>>(reason: S) -> Self {
        Self::AuthenticationInvalid {
            reason: reason.into(),
        }
    }

    pub fn redirect_mismatch<U: Into<String>, R: Into<String>>(url: U, reason: R) -> Self {
        Self::RedirectLoopOrMismatch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_response<S: Into<String>>(details: S) -> Self {
        Self::MalformedResponse {
            details: details.into(),
        }
    }

    pub fn local_filesystem<P: Into<String>, D: Into<String>>(path: P, details: D) -> Self {
        Self::LocalFilesystem {
            path: path.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_identify_each_variant() {
        assert_eq!(
            SetupError::network_transport("offline").error_code(),
            "SETUP_NETWORK_TRANSPORT"
        );
        assert_eq!(
            SetupError::RemoteFolderConflict { status: 507 }.error_code(),
            "SETUP_REMOTE_FOLDER_CONFLICT"
        );
        assert_eq!(SetupError::UserCancelled.error_code(), "SETUP_USER_CANCELLED");
    }

    #[test]
    fn user_messages_stay_presentable() {
        let error = SetupError::server_not_found("https://cloud.example.com");
        assert_eq!(
            error.user_message(),
            "Could not find a compatible server at https://cloud.example.com."
        );
    }
}
