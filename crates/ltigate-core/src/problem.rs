//! Problem codes and structured diagnostic reports.
//!
//! Every validation failure is surfaced as a [`ProblemReport`]: a write-once
//! value carrying a machine-readable [`ProblemCode`] plus named diagnostic
//! fields (raw request, raw response excerpt, HTTP status, signature base
//! string, request URL, advice link). Reports are returned, never raised,
//! and are never persisted.
//!
//! # Security Considerations
//!
//! - The consumer secret must never appear in a report. The typed diagnostic
//!   fields cannot hold it by construction; free-form extras are filtered
//!   through a field-name denylist at render time.
//! - Reports are safe to serialize into an HTTP error body as-is.

use std::collections::BTreeMap;
use std::fmt;

/// Link to the OAuth problem-reporting extension that defines the protocol
/// level problem vocabulary.
pub const PROBLEM_REPORTING_URL: &str = "http://wiki.oauth.net/ProblemReporting";

/// Field-name fragments that must never be rendered from the extras map,
/// even if a caller mistakenly stores them.
const RENDER_DENYLIST: [&str; 2] = ["secret", "password"];

// =============================================================================
// Problem Codes
// =============================================================================

/// Machine-readable identifier for a launch validation failure.
///
/// Codes render in the wire form used by the error taxonomy, e.g.
/// `signature_invalid` or `parameter_missing:resource_link_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProblemCode {
    /// The `oauth_consumer_key` is not registered (or the consumer is
    /// disabled; the two are deliberately indistinguishable).
    ConsumerUnknown,

    /// A required OAuth or LTI parameter is absent or empty.
    ParameterMissing(String),

    /// The request asked for a signature method other than HMAC-SHA1.
    SignatureMethodRejected,

    /// The supplied `oauth_signature` does not match the recomputed one.
    SignatureInvalid,

    /// The `oauth_timestamp` is outside the accepted window.
    TimestampRefused,

    /// The (consumer key, nonce) pair was already accepted within the
    /// replay window.
    NonceUsed,

    /// A parameter is present but carries an unrecognized value.
    ParameterUnsupported(String),

    /// The completion hook declined the launch.
    CompletionRejected,

    /// The completion hook failed or panicked.
    CompletionError,

    /// A storage collaborator failed or timed out.
    StoreUnavailable,
}

impl ProblemCode {
    /// Returns the invariant part of the code, without any parameter name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConsumerUnknown => "consumer_unknown",
            Self::ParameterMissing(_) => "parameter_missing",
            Self::SignatureMethodRejected => "signature_method_rejected",
            Self::SignatureInvalid => "signature_invalid",
            Self::TimestampRefused => "timestamp_refused",
            Self::NonceUsed => "nonce_used",
            Self::ParameterUnsupported(_) => "parameter_unsupported",
            Self::CompletionRejected => "completion_rejected",
            Self::CompletionError => "completion_error",
            Self::StoreUnavailable => "store_unavailable",
        }
    }

    /// Returns the matching problem name from the OAuth problem-reporting
    /// extension, when the failure is protocol-level.
    #[must_use]
    pub fn oauth_problem(&self) -> Option<&'static str> {
        match self {
            Self::ConsumerUnknown => Some("consumer_key_unknown"),
            Self::ParameterMissing(_) => Some("parameter_absent"),
            Self::SignatureMethodRejected => Some("signature_method_rejected"),
            Self::SignatureInvalid => Some("signature_invalid"),
            Self::TimestampRefused => Some("timestamp_refused"),
            Self::NonceUsed => Some("nonce_used"),
            Self::ParameterUnsupported(_)
            | Self::CompletionRejected
            | Self::CompletionError
            | Self::StoreUnavailable => None,
        }
    }

    /// Returns `true` if the failure concerns the OAuth protocol itself.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        self.oauth_problem().is_some()
    }

    /// Returns `true` if the failure is application-level (the launch was
    /// cryptographically valid but downstream processing declined or failed).
    #[must_use]
    pub fn is_application_error(&self) -> bool {
        matches!(self, Self::CompletionRejected | Self::CompletionError)
    }

    /// Returns `true` if the failure comes from infrastructure rather than
    /// the request.
    #[must_use]
    pub fn is_infrastructure_error(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterMissing(name) | Self::ParameterUnsupported(name) => {
                write!(f, "{}:{}", self.kind(), name)
            }
            _ => f.write_str(self.kind()),
        }
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Named diagnostic fields attached to a [`ProblemReport`].
///
/// All fields are optional; a report carries only what the failing stage
/// could observe. `extra` holds free-form supplementary fields.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Transcript of the inbound HTTP request.
    pub http_request: Option<String>,

    /// Excerpt of an HTTP response involved in the failure.
    pub http_response: Option<String>,

    /// HTTP status code involved in the failure. `None` means no status was
    /// recorded; it is a distinct state, never defaulted to a success code.
    pub http_status: Option<u16>,

    /// The signature base string the verifier computed. Never contains the
    /// consumer secret.
    pub signature_base_string: Option<String>,

    /// The request URL as used for signing.
    pub url: Option<String>,

    /// Link to documentation of the problem vocabulary.
    pub advice: Option<String>,

    /// The rendered cause of an application-level failure.
    pub cause: Option<String>,

    /// Free-form supplementary fields. Filtered through a field-name
    /// denylist at render time.
    pub extra: BTreeMap<String, String>,
}

// =============================================================================
// Problem Report
// =============================================================================

/// Structured diagnostic value describing a validation failure.
///
/// Constructed once at the point of failure and propagated up to the HTTP
/// layer unchanged. The derived message follows a fixed precedence:
/// explicit message, then problem code, then the trimmed first line of the
/// HTTP response, then `HTTP status {code}`, then none.
///
/// # Example
///
/// ```
/// use ltigate_core::problem::{ProblemCode, ProblemReport};
///
/// let report = ProblemReport::new(ProblemCode::NonceUsed)
///     .with_url("https://tool.example.edu/launch");
/// assert_eq!(report.message().as_deref(), Some("nonce_used"));
/// ```
#[derive(Debug, Clone)]
pub struct ProblemReport {
    code: Option<ProblemCode>,
    message: Option<String>,
    diagnostics: Diagnostics,
}

impl ProblemReport {
    /// Creates a report for the given problem code.
    ///
    /// Protocol-level codes get the problem-reporting advice link set
    /// automatically.
    #[must_use]
    pub fn new(code: ProblemCode) -> Self {
        let advice = code.is_protocol_error().then(|| {
            // Anchor into the extension document for the specific problem.
            match code.oauth_problem() {
                Some(problem) => format!("{PROBLEM_REPORTING_URL}#{problem}"),
                None => PROBLEM_REPORTING_URL.to_string(),
            }
        });
        Self {
            code: Some(code),
            message: None,
            diagnostics: Diagnostics {
                advice,
                ..Diagnostics::default()
            },
        }
    }

    /// Creates a diagnostic-only report with no problem code, for captured
    /// HTTP exchanges where the failure cannot be classified.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            code: None,
            message: None,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Sets an explicit human-readable message, overriding the derived one.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches a transcript of the inbound HTTP request.
    #[must_use]
    pub fn with_http_request(mut self, request: impl Into<String>) -> Self {
        self.diagnostics.http_request = Some(request.into());
        self
    }

    /// Attaches an excerpt of an HTTP response.
    #[must_use]
    pub fn with_http_response(mut self, response: impl Into<String>) -> Self {
        self.diagnostics.http_response = Some(response.into());
        self
    }

    /// Records an HTTP status code.
    #[must_use]
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.diagnostics.http_status = Some(status);
        self
    }

    /// Attaches the signature base string computed by the verifier.
    #[must_use]
    pub fn with_signature_base_string(mut self, base_string: impl Into<String>) -> Self {
        self.diagnostics.signature_base_string = Some(base_string.into());
        self
    }

    /// Records the request URL as used for signing.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.diagnostics.url = Some(url.into());
        self
    }

    /// Records the rendered cause of an application-level failure.
    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.diagnostics.cause = Some(cause.into());
        self
    }

    /// Adds a free-form supplementary field.
    #[must_use]
    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.diagnostics.extra.insert(name.into(), value.into());
        self
    }

    /// Returns the problem code, if the report carries one.
    #[must_use]
    pub fn code(&self) -> Option<&ProblemCode> {
        self.code.as_ref()
    }

    /// Returns the attached diagnostic fields.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Returns the recorded HTTP status code, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.diagnostics.http_status
    }

    /// Derives the human-readable message.
    ///
    /// Precedence: explicit message, problem code, trimmed first line of the
    /// HTTP response, `HTTP status {code}`, none.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(message.clone());
        }
        if let Some(code) = &self.code {
            return Some(code.to_string());
        }
        if let Some(response) = &self.diagnostics.http_response {
            let first = response
                .split(['\n', '\r'])
                .next()
                .unwrap_or_default()
                .trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
        self.diagnostics
            .http_status
            .map(|status| format!("HTTP status {status}"))
    }

    fn render_denied(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        RENDER_DENYLIST
            .iter()
            .any(|fragment| lower.contains(fragment))
    }
}

impl fmt::Display for ProblemReport {
    /// Renders the report in fixed order: the message summary, then advice,
    /// URL and signature base string when present, then either a
    /// request/response transcript block or the remaining named fields.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "launch problem: {message}")?,
            None => write!(f, "launch problem")?,
        }
        let d = &self.diagnostics;
        if let Some(advice) = &d.advice {
            write!(f, "\noauth_problem_advice: {advice}")?;
        }
        if let Some(url) = &d.url {
            write!(f, "\nURL: {url}")?;
        }
        if let Some(base) = &d.signature_base_string {
            write!(f, "\noauth_signature base string: {base}")?;
        }
        if let Some(request) = &d.http_request {
            write!(f, "\n>>>>>>>> HTTP request:\n{request}")?;
        }
        if let Some(response) = &d.http_response {
            write!(f, "\n<<<<<<<< HTTP response:\n{response}")?;
        } else {
            // No transcript to show; fall back to the remaining named fields.
            if let Some(status) = d.http_status {
                write!(f, "\nHTTP status: {status}")?;
            }
            if let Some(cause) = &d.cause {
                write!(f, "\ncause: {cause}")?;
            }
            for (name, value) in &d.extra {
                if Self::render_denied(name) {
                    continue;
                }
                write!(f, "\n{name}: {value}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ProblemReport {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(ProblemCode::SignatureInvalid.to_string(), "signature_invalid");
        assert_eq!(
            ProblemCode::ParameterMissing("resource_link_id".to_string()).to_string(),
            "parameter_missing:resource_link_id"
        );
        assert_eq!(
            ProblemCode::ParameterUnsupported("lti_message_type".to_string()).to_string(),
            "parameter_unsupported:lti_message_type"
        );
    }

    #[test]
    fn test_code_classification() {
        assert!(ProblemCode::NonceUsed.is_protocol_error());
        assert!(ProblemCode::TimestampRefused.is_protocol_error());
        assert!(!ProblemCode::CompletionRejected.is_protocol_error());
        assert!(ProblemCode::CompletionError.is_application_error());
        assert!(ProblemCode::StoreUnavailable.is_infrastructure_error());
        assert!(!ProblemCode::SignatureInvalid.is_infrastructure_error());
    }

    #[test]
    fn test_message_precedence_explicit_wins() {
        let report = ProblemReport::new(ProblemCode::NonceUsed)
            .with_message("nonce was replayed")
            .with_http_status(401);
        assert_eq!(report.message().as_deref(), Some("nonce was replayed"));
    }

    #[test]
    fn test_message_precedence_code() {
        let report = ProblemReport::new(ProblemCode::NonceUsed);
        assert_eq!(report.message().as_deref(), Some("nonce_used"));
    }

    #[test]
    fn test_message_precedence_response_first_line() {
        let report = ProblemReport::bare()
            .with_http_response("  401 Unauthorized  \r\nWWW-Authenticate: OAuth");
        assert_eq!(report.message().as_deref(), Some("401 Unauthorized"));
    }

    #[test]
    fn test_message_precedence_status_fallback() {
        let report = ProblemReport::bare().with_http_status(401);
        assert_eq!(report.message().as_deref(), Some("HTTP status 401"));
    }

    #[test]
    fn test_message_none() {
        assert_eq!(ProblemReport::bare().message(), None);
    }

    #[test]
    fn test_protocol_reports_carry_advice() {
        let report = ProblemReport::new(ProblemCode::SignatureInvalid);
        let advice = report.diagnostics().advice.as_deref().unwrap();
        assert!(advice.starts_with(PROBLEM_REPORTING_URL));
        assert!(advice.ends_with("signature_invalid"));

        let report = ProblemReport::new(ProblemCode::CompletionRejected);
        assert!(report.diagnostics().advice.is_none());
    }

    #[test]
    fn test_render_order_and_fields() {
        let report = ProblemReport::new(ProblemCode::SignatureInvalid)
            .with_url("https://tool.example.edu/launch")
            .with_signature_base_string("POST&https%3A%2F%2Ftool.example.edu%2Flaunch&a%3Db");
        let rendered = report.to_string();
        assert!(rendered.starts_with("launch problem: signature_invalid"));
        let advice_at = rendered.find("oauth_problem_advice:").unwrap();
        let url_at = rendered.find("URL:").unwrap();
        let base_at = rendered.find("oauth_signature base string:").unwrap();
        assert!(advice_at < url_at && url_at < base_at);
    }

    #[test]
    fn test_render_transcript_suppresses_remaining_fields() {
        let report = ProblemReport::bare()
            .with_http_response("500 Internal Server Error")
            .with_http_status(500);
        let rendered = report.to_string();
        assert!(rendered.contains("<<<<<<<< HTTP response:"));
        // The status line belongs to the remaining-fields block, which is
        // mutually exclusive with the response transcript.
        assert!(!rendered.contains("HTTP status: 500"));
    }

    #[test]
    fn test_render_remaining_fields_without_transcript() {
        let report = ProblemReport::new(ProblemCode::CompletionError)
            .with_http_status(500)
            .with_cause("handler panicked");
        let rendered = report.to_string();
        assert!(rendered.contains("HTTP status: 500"));
        assert!(rendered.contains("cause: handler panicked"));
    }

    #[test]
    fn test_render_denylist_hides_secrets() {
        let report = ProblemReport::new(ProblemCode::SignatureInvalid)
            .with_extra("consumer_secret", "hunter2")
            .with_extra("shared_password", "hunter2")
            .with_extra("consumer", "moodle");
        let rendered = report.to_string();
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("consumer: moodle"));
    }
}
