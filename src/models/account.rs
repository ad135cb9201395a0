use std::sync::Arc;

use url::Url;

use crate::credentials::{Credentials, DummyCredentials};

/// Authentication scheme the server asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Inline username/password, sent as HTTP basic auth.
    HttpBasic,
    /// Redirect to a third-party identity provider.
    FederatedSso,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyMode {
    NoProxy,
    #[default]
    System,
    Custom(String),
}

/// Mutable draft of an account. Owned exclusively by the provisioning saga
/// until it is detached into an [`AccountState`] at commit.
#[derive(Debug, Clone)]
pub struct AccountDescriptor {
    pub base_url: Url,
    pub dav_base_path: String,
    pub server_version: Option<String>,
    pub auth_kind: Option<AuthKind>,
    pub proxy_mode: ProxyMode,
    pub credentials: Arc<dyn Credentials>,
}

impl AccountDescriptor {
    pub fn new(base_url: Url, dav_base_path: impl Into<String>) -> Self {
        Self {
            base_url,
            dav_base_path: dav_base_path.into(),
            server_version: None,
            auth_kind: None,
            proxy_mode: ProxyMode::default(),
            credentials: Arc::new(DummyCredentials),
        }
    }

    /// Absolute URL of the WebDAV root, always with a trailing slash.
    pub fn dav_url(&self) -> Url {
        let mut joined = self.base_url.to_string();
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(self.dav_base_path.trim_matches('/'));
        joined.push('/');
        Url::parse(&joined).unwrap_or_else(|_| self.base_url.clone())
    }

    pub fn set_base_url(&mut self, url: Url) {
        self.base_url = url;
    }
}

/// Immutable, persisted form of an account. Created only by detaching a
/// draft, so later changes to the draft cannot reach a committed account.
#[derive(Debug, Clone)]
pub struct AccountState {
    base_url: Url,
    dav_base_path: String,
    server_version: Option<String>,
    auth_kind: Option<AuthKind>,
}

impl AccountState {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn dav_base_path(&self) -> &str {
        &self.dav_base_path
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    pub fn auth_kind(&self) -> Option<AuthKind> {
        self.auth_kind
    }
}

impl From<AccountDescriptor> for AccountState {
    fn from(draft: AccountDescriptor) -> Self {
        Self {
            base_url: draft.base_url,
            dav_base_path: draft.dav_base_path,
            server_version: draft.server_version,
            auth_kind: draft.auth_kind,
        }
    }
}
