use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SetupConfig;
use crate::dav_xml;
use crate::errors::SetupError;
use crate::models::{AccountDescriptor, ProbeErrorKind, ProbeOutcome, ProbeReport};
use crate::services::probe_client::{ProbeClient, ProbeFailure, ProbeResponse};
use crate::services::tls_advisor;

const VERIFY_PROPFIND_BODY: &str = r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:">
    <d:prop>
        <d:getlastmodified/>
    </d:prop>
</d:propfind>"#;

/// Verifies that the supplied credentials work against the *authenticated*
/// WebDAV surface, not just the public one.
pub struct AuthenticatedConnectivityProbe<'a> {
    client: &'a ProbeClient,
    config: &'a SetupConfig,
}

impl<'a> AuthenticatedConnectivityProbe<'a> {
    pub fn new(client: &'a ProbeClient, config: &'a SetupConfig) -> Self {
        Self { client, config }
    }

    /// Issues a PROPFIND against the WebDAV root with redirects disabled.
    /// If the authenticated request is redirected to a URL that still ends in
    /// the WebDAV root path, the prefix is the server's real base URL:
    /// `account.base_url` is corrected in place and the verification re-runs
    /// exactly once. A second redirect means the server is misconfigured.
    pub async fn verify(&self, account: &mut AccountDescriptor) -> ProbeReport {
        let timeout = self.config.probe_timeout();
        let mut corrected = false;

        loop {
            let scheme = account.base_url.scheme().to_string();
            let url = account.dav_url();
            let response = match self
                .client
                .propfind(&url, account.credentials.as_ref(), timeout, "0", VERIFY_PROPFIND_BODY)
                .await
            {
                Ok(response) => response,
                Err(failure) => return classify_failure(&scheme, failure),
            };

            if let Some(target) = response.redirect_target() {
                debug!("authenticated request was redirected to {}", target);
                match strip_dav_suffix(&target, &account.dav_base_path) {
                    Some(base) if !corrected => {
                        info!("correcting account base URL to {}", base);
                        account.set_base_url(base);
                        corrected = true;
                        continue;
                    }
                    _ => {
                        let error = SetupError::redirect_mismatch(
                            target.as_str(),
                            "the URL is bad, the server is misconfigured",
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
                }
            }

            return classify_response(&scheme, account, response);
        }
    }
}

fn classify_response(
    scheme: &str,
    account: &AccountDescriptor,
    response: ProbeResponse,
) -> ProbeReport {
    let hsts = response.has_hsts();

    // Being told the root does not exist still proves the credentials were
    // accepted; the folder gets created later.
    if response.status == StatusCode::NOT_FOUND {
        return ProbeReport::ok(ProbeOutcome::Success {
            version: None,
            canonical_url: account.base_url.clone(),
        });
    }

    if response.status == StatusCode::MULTI_STATUS {
        return match dav_xml::parse_multistatus(&response.body) {
            Ok(_) => ProbeReport::ok(ProbeOutcome::Success {
                version: None,
                canonical_url: account.base_url.clone(),
            }),
            Err(e) => {
                warn!("authenticated PROPFIND returned an unparseable body: {}", e);
                invalid_response(scheme, response.status, hsts)
            }
        };
    }

    if response.status.is_client_error() || response.status.is_server_error() {
        if !account
            .credentials
            .still_valid(response.status, &response.headers)
        {
            // Recoverable by the user supplying different credentials.
            return ProbeReport {
                outcome: ProbeOutcome::AuthRequired,
                downgrade_advised: false,
            };
        }
        return ProbeReport {
            outcome: ProbeOutcome::TransportError {
                status: Some(response.status.as_u16()),
                message: format!(
                    "The authenticated request to {} failed: HTTP {}",
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

    // 2xx that is not a multistatus is not what a PROPFIND may answer.
    invalid_response(scheme, response.status, hsts)
}

fn invalid_response(scheme: &str, status: StatusCode, hsts: bool) -> ProbeReport {
    let error = SetupError::malformed_response(
        "There was an invalid response to an authenticated WebDAV request.",
    );
    ProbeReport {
        outcome: ProbeOutcome::transport_error(Some(status.as_u16()), error.user_message()),
        downgrade_advised: tls_advisor::downgrade_advised(scheme, ProbeErrorKind::Generic, hsts),
    }
}

fn classify_failure(scheme: &str, failure: ProbeFailure) -> ProbeReport {
    match failure {
        ProbeFailure::Timeout { url, elapsed } => {
            warn!("authenticated probe of {} timed out after {:?}", url, elapsed);
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
                    format!("The authenticated request to {url} failed: {message}"),
                ),
                downgrade_advised: tls_advisor::downgrade_advised(scheme, kind, false),
            }
        }
    }
}

/// Strips the WebDAV root suffix from a redirect target. `Some(base)` means
/// the target was the same WebDAV root served from `base`.
fn strip_dav_suffix(target: &Url, dav_base_path: &str) -> Option<Url> {
    let suffix = format!("/{}", dav_base_path.trim_matches('/'));
    let path = target.path().trim_end_matches('/').to_string();
    let prefix = path.strip_suffix(&suffix)?;
    let mut base = target.clone();
    base.set_path(if prefix.is_empty() { "/" } else { prefix });
    Some(base)
}
