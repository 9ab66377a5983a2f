//! OAuth 1.0a signature base string construction and HMAC-SHA1 verification.
//!
//! Two-legged LTI signing: the key is `percent(consumer_secret)&` with an
//! empty token secret. Only the `HMAC-SHA1` method is accepted. Comparison
//! of the supplied and recomputed signatures is constant-time via
//! [`hmac::Mac::verify_slice`].
//!
//! # Diagnostics
//!
//! A mismatch report carries the computed signature base string and a
//! transcript of the request so operators can debug consumer
//! misconfiguration. The consumer secret is never attached.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;

use ltigate_core::params::{
    OAUTH_CONSUMER_KEY, OAUTH_NONCE, OAUTH_SIGNATURE, OAUTH_SIGNATURE_METHOD, OAUTH_TIMESTAMP,
};
use ltigate_core::problem::{ProblemCode, ProblemReport};
use ltigate_core::request::LaunchRequest;
use ltigate_core::LaunchResult;

type HmacSha1 = Hmac<Sha1>;

/// The only signature method this tool provider accepts.
pub const HMAC_SHA1: &str = "HMAC-SHA1";

/// OAuth protocol parameters that must accompany every signed request.
pub const REQUIRED_OAUTH_PARAMETERS: [&str; 5] = [
    OAUTH_CONSUMER_KEY,
    OAUTH_SIGNATURE_METHOD,
    OAUTH_SIGNATURE,
    OAUTH_TIMESTAMP,
    OAUTH_NONCE,
];

// RFC 3986 section 2.3: everything except ALPHA / DIGIT / "-" / "." / "_" /
// "~" is percent-encoded. Space becomes %20, never '+'.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a string per RFC 3986 as OAuth 1.0a requires.
#[must_use]
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Builds the OAuth 1.0a signature base string for a request.
///
/// Uppercase HTTP method, the normalized base URL, and the
/// alphabetically-sorted, percent-encoded, ampersand-joined set of all
/// parameters except `oauth_signature`, each component percent-encoded and
/// joined with `&`.
#[must_use]
pub fn signature_base_string(request: &LaunchRequest) -> String {
    let mut pairs: Vec<(String, String)> = request
        .params()
        .iter()
        .filter(|(name, _)| name != OAUTH_SIGNATURE)
        .map(|(name, value)| (percent_encode(name), percent_encode(value)))
        .collect();
    pairs.sort();

    let normalized = pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        request.method(),
        percent_encode(request.url()),
        percent_encode(&normalized)
    )
}

/// Computes the base64 HMAC-SHA1 signature over a base string.
///
/// The signing key is `percent(consumer_secret)&`; the token secret is
/// empty for two-legged LTI.
#[must_use]
pub fn sign(base_string: &str, consumer_secret: &str) -> String {
    let key = format!("{}&", percent_encode(consumer_secret));
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base_string.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Recomputes and checks the OAuth signature of a launch request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Verifies the request signature against the consumer secret.
    ///
    /// # Errors
    ///
    /// - `parameter_missing:<name>` when a required OAuth protocol
    ///   parameter is absent
    /// - `signature_method_rejected` for any method other than HMAC-SHA1
    /// - `signature_invalid` on mismatch, with the computed base string and
    ///   a request transcript attached for diagnosis
    pub fn verify(&self, request: &LaunchRequest, consumer_secret: &str) -> LaunchResult<()> {
        for name in REQUIRED_OAUTH_PARAMETERS {
            self.require(request, name)?;
        }
        let method = self.require(request, OAUTH_SIGNATURE_METHOD)?;
        if method != HMAC_SHA1 {
            tracing::debug!(method, "rejected OAuth signature method");
            return Err(
                ProblemReport::new(ProblemCode::SignatureMethodRejected)
                    .with_message(format!("signature method '{method}' is not accepted"))
                    .with_url(request.url()),
            );
        }

        let provided = self.require(request, OAUTH_SIGNATURE)?;
        let base_string = signature_base_string(request);

        let key = format!("{}&", percent_encode(consumer_secret));
        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
        mac.update(base_string.as_bytes());

        let verified = STANDARD
            .decode(provided)
            .ok()
            .is_some_and(|bytes| mac.verify_slice(&bytes).is_ok());
        if verified {
            Ok(())
        } else {
            tracing::debug!(url = request.url(), "OAuth signature mismatch");
            Err(self.mismatch_report(request, base_string))
        }
    }

    fn require<'a>(&self, request: &'a LaunchRequest, name: &str) -> LaunchResult<&'a str> {
        request.first_nonempty(name).ok_or_else(|| {
            ProblemReport::new(ProblemCode::ParameterMissing(name.to_string()))
                .with_url(request.url())
        })
    }

    fn mismatch_report(&self, request: &LaunchRequest, base_string: String) -> ProblemReport {
        ProblemReport::new(ProblemCode::SignatureInvalid)
            .with_signature_base_string(base_string)
            .with_url(request.url())
            .with_http_request(request.transcript())
    }
}
