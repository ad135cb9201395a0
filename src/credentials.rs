use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, StatusCode};

use crate::models::AuthKind;

/// Credential seam. The saga attaches credentials to outgoing requests and
/// asks whether a response proves they still work; it never learns their
/// internals.
pub trait Credentials: Send + Sync + fmt::Debug {
    fn kind(&self) -> &'static str;

    /// Attaches authentication material to an outgoing request.
    fn attach(&self, request: RequestBuilder) -> RequestBuilder;

    /// Whether the response leaves these credentials believable. A `false`
    /// here means the server rejected the credentials themselves, not the
    /// request.
    fn still_valid(&self, status: StatusCode, headers: &HeaderMap) -> bool;
}

/// Neutral placeholder used before real credentials exist, so the early
/// probes never carry authentication material.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyCredentials;

impl Credentials for DummyCredentials {
    fn kind(&self) -> &'static str {
        "dummy"
    }

    fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        request
    }

    fn still_valid(&self, _status: StatusCode, _headers: &HeaderMap) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct HttpBasicCredentials {
    username: String,
    password: String,
}

impl HttpBasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for HttpBasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials for HttpBasicCredentials {
    fn kind(&self) -> &'static str {
        "http-basic"
    }

    fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    fn still_valid(&self, status: StatusCode, _headers: &HeaderMap) -> bool {
        status != StatusCode::UNAUTHORIZED
    }
}

/// Collaborator that collects the actual secret from the user once the saga
/// has negotiated the authentication scheme.
#[async_trait]
pub trait CredentialSupplier: Send + Sync {
    /// Returns `None` when the user declines to provide credentials.
    async fn supply(&self, kind: AuthKind) -> Option<Arc<dyn Credentials>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credentials_treat_only_401_as_invalid() {
        let credentials = HttpBasicCredentials::new("user", "pass");
        let headers = HeaderMap::new();
        assert!(!credentials.still_valid(StatusCode::UNAUTHORIZED, &headers));
        assert!(credentials.still_valid(StatusCode::FORBIDDEN, &headers));
        assert!(credentials.still_valid(StatusCode::INTERNAL_SERVER_ERROR, &headers));
    }

    #[test]
    fn basic_credentials_debug_redacts_password() {
        let credentials = HttpBasicCredentials::new("user", "hunter2");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }
}
