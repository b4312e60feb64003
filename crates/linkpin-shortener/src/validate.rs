use url::{Host, Url};

use crate::error::ShortenerError;

const MAX_LABEL_LENGTH: usize = 63;

/// Checks that `input` is an absolute http(s) URL with a plausible host.
///
/// Accepted hosts are `localhost`, IP literals, and dotted DNS names whose
/// top-level label is 2-63 letters (or an `xn--` IDN label).
pub fn validate_url(input: &str) -> Result<(), ShortenerError> {
    if input.is_empty() {
        return Err(ShortenerError::InvalidUrl(
            "URL cannot be empty".to_string(),
        ));
    }

    if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ShortenerError::InvalidUrl(
            "URL must not contain whitespace".to_string(),
        ));
    }

    let parsed = Url::parse(input)
        .map_err(|e| ShortenerError::InvalidUrl(format!("{input}: {e}")))?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL scheme must be http or https: {scheme}"
        )));
    }

    // the parser also accepts `http:example.com`
    if !input
        .get(scheme.len()..)
        .is_some_and(|rest| rest.starts_with("://"))
    {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must have a valid scheme and host: {input}"
        )));
    }

    match parsed.host() {
        Some(Host::Domain(domain)) if is_valid_domain(domain) => Ok(()),
        Some(Host::Domain(domain)) => Err(ShortenerError::InvalidUrl(format!(
            "invalid host: {domain}"
        ))),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => Ok(()),
        None => Err(ShortenerError::InvalidUrl(format!(
            "URL must have a host: {input}"
        ))),
    }
}

fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| is_valid_label(label)) {
        return false;
    }

    let tld = labels[labels.len() - 1];
    tld.starts_with("xn--")
        || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LENGTH
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
