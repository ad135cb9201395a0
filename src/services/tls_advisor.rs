use crate::models::ProbeErrorKind;

/// Decides whether a failure warrants suggesting a retry over plain HTTP.
///
/// Plaintext transports never get the advisory. Error kinds that are normal
/// over a working secure transport are no evidence the endpoint is broken,
/// and a server that sent Strict-Transport-Security has opted into
/// secure-only access, so downgrading it would be wrong.
pub fn downgrade_advised(scheme: &str, error: ProbeErrorKind, hsts_present: bool) -> bool {
    if scheme != "https" {
        return false;
    }

    match error {
        ProbeErrorKind::NoError
        | ProbeErrorKind::NotFound
        | ProbeErrorKind::AuthRequired
        | ProbeErrorKind::HostNotFound => return false,
        ProbeErrorKind::Timeout | ProbeErrorKind::Generic => {}
    }

    !hsts_present
}
