use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::header::{HeaderMap, LOCATION, STRICT_TRANSPORT_SECURITY};
use reqwest::{redirect, Client, Method, Proxy, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::Credentials;
use crate::models::ProxyMode;

/// Everything a caller needs to classify one probe response.
#[derive(Debug)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    /// URL this single request was answered at.
    pub url: Url,
    pub elapsed: Duration,
}

impl ProbeResponse {
    /// Redirect target from the Location header, resolved against the
    /// request URL. `None` unless the status is a redirection.
    pub fn redirect_target(&self) -> Option<Url> {
        if !self.status.is_redirection() {
            return None;
        }
        let location = self.headers.get(LOCATION)?.to_str().ok()?;
        self.url.join(location).ok()
    }

    pub fn has_hsts(&self) -> bool {
        self.headers.contains_key(STRICT_TRANSPORT_SECURITY)
    }
}

/// Terminal failure of a single request, before any classification.
#[derive(Debug)]
pub enum ProbeFailure {
    Timeout { url: Url, elapsed: Duration },
    Cancelled,
    Transport {
        url: Url,
        message: String,
        host_not_found: bool,
    },
}

/// Thin cancellable request primitive. Redirects are never followed
/// automatically; callers inspect [`ProbeResponse::redirect_target`] and
/// decide themselves. Each request owns its own deadline.
pub struct ProbeClient {
    client: Client,
    cancel: CancellationToken,
}

impl ProbeClient {
    pub fn new(proxy_mode: &ProxyMode, cancel: CancellationToken) -> Result<Self> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        match proxy_mode {
            ProxyMode::NoProxy => builder = builder.no_proxy(),
            // reqwest picks the environment proxy settings up on its own
            ProxyMode::System => {}
            ProxyMode::Custom(proxy_url) => builder = builder.proxy(Proxy::all(proxy_url)?),
        }
        Ok(Self {
            client: builder.build()?,
            cancel,
        })
    }

    pub async fn get(
        &self,
        url: &Url,
        credentials: &dyn Credentials,
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeFailure> {
        self.request(Method::GET, url, credentials, timeout, &[], None)
            .await
    }

    pub async fn propfind(
        &self,
        url: &Url,
        credentials: &dyn Credentials,
        timeout: Duration,
        depth: &str,
        body: &str,
    ) -> Result<ProbeResponse, ProbeFailure> {
        self.request(
            Method::from_bytes(b"PROPFIND").unwrap(),
            url,
            credentials,
            timeout,
            &[("Depth", depth), ("Content-Type", "application/xml")],
            Some(body.to_string()),
        )
        .await
    }

    pub async fn mkcol(
        &self,
        url: &Url,
        credentials: &dyn Credentials,
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeFailure> {
        self.request(
            Method::from_bytes(b"MKCOL").unwrap(),
            url,
            credentials,
            timeout,
            &[],
            None,
        )
        .await
    }

    async fn request(
        &self,
        method: Method,
        url: &Url,
        credentials: &dyn Credentials,
        timeout: Duration,
        headers: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<ProbeResponse, ProbeFailure> {
        let started = Instant::now();
        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url.clone()).timeout(timeout);
        request = credentials.attach(request);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ProbeFailure::Cancelled),
            sent = tokio::time::timeout(timeout, request.send()) => match sent {
                Err(_) => {
                    return Err(ProbeFailure::Timeout {
                        url: url.clone(),
                        elapsed: started.elapsed(),
                    })
                }
                Ok(Err(e)) if e.is_timeout() => {
                    return Err(ProbeFailure::Timeout {
                        url: url.clone(),
                        elapsed: started.elapsed(),
                    })
                }
                Ok(Err(e)) => {
                    warn!("request to {} failed: {}", url, e);
                    return Err(ProbeFailure::Transport {
                        url: url.clone(),
                        message: e.to_string(),
                        host_not_found: e.is_connect(),
                    });
                }
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        let response_headers = response.headers().clone();
        let final_url = response.url().clone();
        let body = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ProbeFailure::Cancelled),
            text = response.text() => text.unwrap_or_default(),
        };

        debug!("{} answered {} in {:?}", final_url, status, started.elapsed());
        Ok(ProbeResponse {
            status,
            headers: response_headers,
            body,
            url: final_url,
            elapsed: started.elapsed(),
        })
    }
}
