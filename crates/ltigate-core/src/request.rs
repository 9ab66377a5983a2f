//! The inbound launch request model.
//!
//! A [`LaunchRequest`] is an immutable snapshot of one HTTP POST from the
//! tool consumer: the method, the normalized base URL (query excluded), and
//! an ordered multi-valued parameter list merged from the query string, the
//! form body and, when present, the `Authorization: OAuth` header. OAuth 1.0a
//! allows the protocol parameters in either the header or the body, so both
//! transports are accepted.

use url::Url;
use url::form_urlencoded;

/// Immutable view of one inbound launch request.
///
/// Parameters keep their arrival order and may repeat; signing treats them
/// as a multiset, so order only matters for diagnostics.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    method: String,
    url: String,
    params: Vec<(String, String)>,
}

impl LaunchRequest {
    /// Creates a request from already-normalized parts.
    ///
    /// `url` must be the base URL (scheme + host + path, no query); the
    /// method is uppercased. Prefer [`LaunchRequest::from_form`] when
    /// starting from raw transport data.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        params: Vec<(String, String)>,
    ) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            params,
        }
    }

    /// Builds a request from raw transport data.
    ///
    /// Query-string pairs are folded into the parameter list (they take part
    /// in signing), followed by the form body pairs and any OAuth parameters
    /// from the `Authorization` header. The stored URL is the normalized
    /// base URL: lowercase scheme and host, default ports elided, query
    /// stripped.
    #[must_use]
    pub fn from_form(
        method: &str,
        url: &Url,
        authorization: Option<&str>,
        body: &str,
    ) -> Self {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        params.extend(
            form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        if let Some(header) = authorization {
            params.extend(parse_authorization_header(header));
        }
        Self::new(method, base_url(url), params)
    }

    /// The uppercase HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The normalized base URL (no query component).
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// All parameters, in arrival order, duplicates preserved.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The first value recorded for `name`, if any.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The first non-empty value recorded for `name`, trimmed.
    ///
    /// Consumers routinely send empty form fields; the validation pipeline
    /// treats those the same as absent parameters.
    #[must_use]
    pub fn first_nonempty(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Renders a transcript of the request for diagnostics.
    ///
    /// The transcript carries the method, base URL and parameter list. The
    /// consumer secret never travels in a request, so nothing here needs
    /// redaction.
    #[must_use]
    pub fn transcript(&self) -> String {
        let mut out = format!("{} {}", self.method, self.url);
        for (name, value) in &self.params {
            out.push('\n');
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Normalizes a URL into the OAuth base-URL form: lowercase scheme and host,
/// default ports elided, query and fragment stripped.
#[must_use]
pub fn base_url(url: &Url) -> String {
    let mut out = format!("{}://", url.scheme());
    if let Some(host) = url.host_str() {
        out.push_str(host);
    }
    if let Some(port) = url.port() {
        // `Url::port` is `None` for the scheme's default port.
        out.push_str(&format!(":{port}"));
    }
    out.push_str(url.path());
    out
}

/// Extracts OAuth protocol parameters from an `Authorization: OAuth` header.
///
/// Returns an empty list when the header does not use the OAuth scheme.
/// The `realm` parameter is transport metadata and is skipped; every other
/// pair is percent-decoded per RFC 5849 section 3.5.1.
#[must_use]
pub fn parse_authorization_header(header: &str) -> Vec<(String, String)> {
    let Some(rest) = strip_scheme(header) else {
        return Vec::new();
    };
    rest.split(',')
        .filter_map(|part| {
            let part = part.trim();
            let (name, value) = part.split_once('=')?;
            let name = percent_decode(name.trim());
            if name.eq_ignore_ascii_case("realm") {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((name, percent_decode(value)))
        })
        .collect()
}

fn strip_scheme(header: &str) -> Option<&str> {
    let header = header.trim();
    let (scheme, rest) = header.split_once(char::is_whitespace)?;
    scheme.eq_ignore_ascii_case("oauth").then_some(rest)
}

fn percent_decode(value: &str) -> String {
    // Header parameter values are percent-encoded but not form-encoded, so
    // '+' stays literal.
    percent_encoding::percent_decode_str(value)
        .decode_utf8_lossy()
        .into_owned()
}
