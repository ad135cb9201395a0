use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

use crate::config::{SetupConfig, SSO_INDICATOR_TOKENS};
use crate::models::{AccountDescriptor, AuthKind};
use crate::services::probe_client::ProbeClient;

/// Classifies how the server wants to authenticate.
///
/// A GET is issued against the WebDAV root with redirects disabled, because
/// the redirects themselves carry the signal: same-service redirects are
/// followed up to the configured limit, a foreign redirect is checked for
/// federated-SSO indicator tokens, and everything else falls back to HTTP
/// basic. HTTP basic is always the safe answer, so the loop never fails.
pub struct AuthTypeNegotiator<'a> {
    client: &'a ProbeClient,
    config: &'a SetupConfig,
}

impl<'a> AuthTypeNegotiator<'a> {
    pub fn new(client: &'a ProbeClient, config: &'a SetupConfig) -> Self {
        Self { client, config }
    }

    pub async fn negotiate(&self, account: &AccountDescriptor) -> AuthKind {
        let mut url = account.dav_url();
        let mut hops: u32 = 0;
        let timeout = self.config.probe_timeout();

        loop {
            let response = match self
                .client
                .get(&url, account.credentials.as_ref(), timeout)
                .await
            {
                Ok(response) => response,
                Err(failure) => {
                    debug!("auth probe failed ({:?}), assuming basic auth", failure);
                    return AuthKind::HttpBasic;
                }
            };

            if response.status == StatusCode::UNAUTHORIZED {
                info!("server challenged for credentials, using basic auth");
                return AuthKind::HttpBasic;
            }

            let Some(target) = response.redirect_target() else {
                return AuthKind::HttpBasic;
            };

            if is_same_service_redirect(&target, &account.dav_base_path) {
                hops += 1;
                if hops >= self.config.max_redirects {
                    debug!("redirect limit reached during auth negotiation, falling back to basic auth");
                    return AuthKind::HttpBasic;
                }
                debug!("same-service redirect to {}, following", target);
                url = target;
                continue;
            }

            return classify_foreign_redirect(&target);
        }
    }
}

/// A redirect that still ends in the WebDAV root path is the same service
/// answering from another address, not an identity provider.
fn is_same_service_redirect(target: &Url, dav_base_path: &str) -> bool {
    target
        .path()
        .trim_end_matches('/')
        .ends_with(dav_base_path.trim_matches('/'))
}

fn classify_foreign_redirect(target: &Url) -> AuthKind {
    let lowered = target.as_str().to_lowercase();
    if SSO_INDICATOR_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
    {
        info!("redirect to {} looks like a federated identity provider", target);
        AuthKind::FederatedSso
    } else {
        AuthKind::HttpBasic
    }
}
