use url::Url;

/// Classified result of a single network probe. Every probe resolves to
/// exactly one outcome; probes never raise errors past their own boundary.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Success {
        version: Option<String>,
        canonical_url: Url,
    },
    NotFound,
    AuthRequired,
    TransportError {
        status: Option<u16>,
        message: String,
        raw_body: Option<String>,
    },
    Timeout,
}

impl ProbeOutcome {
    pub fn transport_error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransportError {
            status,
            message: message.into(),
            raw_body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Error kind fed to the TLS downgrade advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    NoError,
    NotFound,
    AuthRequired,
    HostNotFound,
    Timeout,
    Generic,
}

/// A probe outcome plus the plaintext-retry advisory computed at the
/// classification site, where status, error kind and headers are still known.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    pub downgrade_advised: bool,
}

impl ProbeReport {
    pub fn ok(outcome: ProbeOutcome) -> Self {
        Self {
            outcome,
            downgrade_advised: false,
        }
    }
}

/// Ordered sequence of URLs visited by one logical probe. The length bound is
/// checked before each additional hop, so a redirect loop terminates instead
/// of spinning.
#[derive(Debug, Clone)]
pub struct RedirectChain {
    visited: Vec<Url>,
    max_redirects: u32,
}

impl RedirectChain {
    pub fn new(start: Url, max_redirects: u32) -> Self {
        Self {
            visited: vec![start],
            max_redirects,
        }
    }

    /// Records one more hop. Returns false (and records nothing) when the
    /// bound would be exceeded.
    pub fn push(&mut self, url: Url) -> bool {
        if self.hops() >= self.max_redirects {
            return false;
        }
        self.visited.push(url);
        true
    }

    pub fn hops(&self) -> u32 {
        (self.visited.len() - 1) as u32
    }

    pub fn current(&self) -> &Url {
        self.visited.last().expect("chain always holds its start URL")
    }

    pub fn visited(&self) -> &[Url] {
        &self.visited
    }
}
