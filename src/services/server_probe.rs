use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{SetupConfig, STATUS_ENDPOINT};
use crate::errors::SetupError;
use crate::models::{AccountDescriptor, ProbeErrorKind, ProbeOutcome, ProbeReport, RedirectChain};
use crate::services::probe_client::{ProbeClient, ProbeFailure, ProbeResponse};
use crate::services::tls_advisor;

/// Body of the version-discovery resource.
#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    installed: bool,
    version: Option<String>,
    #[serde(rename = "versionstring")]
    version_string: Option<String>,
}

/// Confirms a URL hosts a compatible service instance and extracts its
/// version. Redirects are taken by hand so the chain stays bounded and the
/// canonical URL can be derived from wherever the server actually answered.
pub struct ServerExistenceProbe<'a> {
    client: &'a ProbeClient,
    config: &'a SetupConfig,
}

impl<'a> ServerExistenceProbe<'a> {
    pub fn new(client: &'a ProbeClient, config: &'a SetupConfig) -> Self {
        Self { client, config }
    }

    pub async fn probe(&self, account: &AccountDescriptor) -> ProbeReport {
        let scheme = account.base_url.scheme().to_string();
        let timeout = self.config.existence_timeout(&scheme);

        let status_url = match status_url(&account.base_url) {
            Ok(url) => url,
            Err(e) => {
                return ProbeReport::ok(ProbeOutcome::transport_error(None, e.user_message()))
            }
        };

        let mut chain = RedirectChain::new(status_url, self.config.max_redirects);
        loop {
            let response = match self
                .client
                .get(chain.current(), account.credentials.as_ref(), timeout)
                .await
            {
                Ok(response) => response,
                Err(failure) => return self.classify_failure(&scheme, failure),
            };

            if let Some(target) = response.redirect_target() {
                debug!("status endpoint redirected to {}", target);
                if !chain.push(target.clone()) {
                    warn!(
                        "giving up on {} after {} redirects",
                        target,
                        chain.hops()
                    );
                    let error = SetupError::redirect_mismatch(
                        target.as_str(),
                        format!("more than {} redirects", self.config.max_redirects),
                    );
                    return ProbeReport {
                        outcome: ProbeOutcome::transport_error(
                            Some(response.status.as_u16()),
                            error.user_message(),
                        ),
                        downgrade_advised: tls_advisor::downgrade_advised(
                            &scheme,
                            ProbeErrorKind::Generic,
                            response.has_hsts(),
                        ),
                    };
                }
                continue;
            }

            return self.classify_response(&scheme, response);
        }
    }

    fn classify_response(&self, scheme: &str, response: ProbeResponse) -> ProbeReport {
        let hsts = response.has_hsts();

        if response.status == StatusCode::NOT_FOUND {
            return ProbeReport {
                outcome: ProbeOutcome::NotFound,
                downgrade_advised: tls_advisor::downgrade_advised(
                    scheme,
                    ProbeErrorKind::NotFound,
                    hsts,
                ),
            };
        }
        if response.status == StatusCode::UNAUTHORIZED {
            return ProbeReport {
                outcome: ProbeOutcome::AuthRequired,
                downgrade_advised: tls_advisor::downgrade_advised(
                    scheme,
                    ProbeErrorKind::AuthRequired,
                    hsts,
                ),
            };
        }
        if !response.status.is_success() {
            return ProbeReport {
                outcome: ProbeOutcome::TransportError {
                    status: Some(response.status.as_u16()),
                    message: format!(
                        "Failed to connect to {}: the server answered HTTP {}",
                        response.url, response.status
                    ),
                    raw_body: Some(response.body),
                },
                downgrade_advised: tls_advisor::downgrade_advised(
                    scheme,
                    ProbeErrorKind::Generic,
                    hsts,
                ),
            };
        }

        match serde_json::from_str::<StatusBody>(&response.body) {
            Ok(body) if body.installed => {
                let version = body.version.or(body.version_string);
                let canonical_url = canonicalize(&response.url);
                info!(
                    "found server version {} at {}",
                    version.as_deref().unwrap_or("unknown"),
                    canonical_url
                );
                ProbeReport::ok(ProbeOutcome::Success {
                    version,
                    canonical_url,
                })
            }
            Ok(_) => {
                let error = SetupError::malformed_response(format!(
                    "The service at {} reports it is not installed.",
                    response.url
                ));
                ProbeReport {
                    outcome: ProbeOutcome::transport_error(
                        Some(response.status.as_u16()),
                        error.user_message(),
                    ),
                    downgrade_advised: tls_advisor::downgrade_advised(
                        scheme,
                        ProbeErrorKind::Generic,
                        hsts,
                    ),
                }
            }
            Err(e) => {
                debug!("status document did not parse: {}", e);
                let error = SetupError::malformed_response(format!(
                    "The server at {} did not answer with a valid status document.",
                    response.url
                ));
                ProbeReport {
                    outcome: ProbeOutcome::TransportError {
                        status: Some(response.status.as_u16()),
                        message: error.user_message(),
                        raw_body: Some(response.body),
                    },
                    downgrade_advised: tls_advisor::downgrade_advised(
                        scheme,
                        ProbeErrorKind::Generic,
                        hsts,
                    ),
                }
            }
        }
    }

    fn classify_failure(&self, scheme: &str, failure: ProbeFailure) -> ProbeReport {
        match failure {
            ProbeFailure::Timeout { url, elapsed } => {
                warn!("probe of {} timed out after {:?}", url, elapsed);
                ProbeReport {
                    outcome: ProbeOutcome::Timeout,
                    downgrade_advised: tls_advisor::downgrade_advised(
                        scheme,
                        ProbeErrorKind::Timeout,
                        false,
                    ),
                }
            }
            ProbeFailure::Cancelled => {
                ProbeReport::ok(ProbeOutcome::transport_error(None, "operation cancelled"))
            }
            ProbeFailure::Transport {
                url,
                message,
                host_not_found,
            } => {
                let kind = if host_not_found {
                    ProbeErrorKind::HostNotFound
                } else {
                    ProbeErrorKind::Generic
                };
                ProbeReport {
                    outcome: ProbeOutcome::transport_error(
                        None,
                        format!("Failed to connect to {url}: {message}"),
                    ),
                    downgrade_advised: tls_advisor::downgrade_advised(scheme, kind, false),
                }
            }
        }
    }
}

fn status_url(base: &Url) -> Result<Url, SetupError> {
    let mut joined = base.to_string();
    if !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(STATUS_ENDPOINT);
    Url::parse(&joined)
        .map_err(|e| SetupError::network_transport(format!("Invalid URL '{base}': {e}")))
}

/// Servers may answer the discovery probe at a sub-path; the canonical base
/// URL is the responding URL with the discovery suffix stripped.
fn canonicalize(responding_url: &Url) -> Url {
    let mut url = responding_url.clone();
    let path = url.path().to_string();
    if let Some(prefix) = path.strip_suffix(&format!("/{STATUS_ENDPOINT}")) {
        url.set_path(if prefix.is_empty() { "/" } else { prefix });
    }
    url
}
