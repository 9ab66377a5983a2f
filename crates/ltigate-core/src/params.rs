//! LTI parameter names and the parameter validator.
//!
//! The parameter validator is the third pipeline stage: it runs only after
//! the signature and replay checks, so every parameter it sees is already
//! authenticated. It checks presence, format and internal consistency of the
//! LTI launch parameters and produces the typed [`LaunchContext`].

use crate::context::{LaunchContext, LaunchPresentation, LisPerson, LtiRole};
use crate::problem::{ProblemCode, ProblemReport};
use crate::request::LaunchRequest;
use crate::LaunchResult;

/// The LTI 1.x basic launch message type.
pub const LAUNCH_MESSAGE_TYPE: &str = "basic-lti-launch-request";

/// LTI version values this tool provider recognizes.
pub const SUPPORTED_LTI_VERSIONS: [&str; 1] = ["LTI-1p0"];

/// Prefix marking consumer-defined custom parameters.
pub const CUSTOM_PREFIX: &str = "custom_";

// OAuth protocol parameter names used across the pipeline.
pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub const OAUTH_SIGNATURE_METHOD: &str = "oauth_signature_method";
pub const OAUTH_SIGNATURE: &str = "oauth_signature";
pub const OAUTH_TIMESTAMP: &str = "oauth_timestamp";
pub const OAUTH_NONCE: &str = "oauth_nonce";

// LTI parameter names.
pub const LTI_MESSAGE_TYPE: &str = "lti_message_type";
pub const LTI_VERSION: &str = "lti_version";
pub const RESOURCE_LINK_ID: &str = "resource_link_id";

/// Checks presence, format and consistency of LTI launch parameters.
///
/// # Example
///
/// ```
/// use ltigate_core::{LaunchRequest, ParameterValidator};
///
/// let request = LaunchRequest::new(
///     "POST",
///     "https://tool.example.edu/launch",
///     vec![
///         ("oauth_consumer_key".into(), "moodle".into()),
///         ("lti_message_type".into(), "basic-lti-launch-request".into()),
///         ("lti_version".into(), "LTI-1p0".into()),
///         ("resource_link_id".into(), "rl-1".into()),
///         ("custom_Section_Id".into(), "42".into()),
///     ],
/// );
/// let context = ParameterValidator::new().validate(&request).unwrap();
/// assert_eq!(context.custom.get("section_id").map(String::as_str), Some("42"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterValidator;

impl ParameterValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validates the LTI parameters of an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns `parameter_missing:<name>` when a required parameter is
    /// absent or empty, and `parameter_unsupported:<name>` when
    /// `lti_message_type` or `lti_version` carries an unrecognized value.
    pub fn validate(&self, request: &LaunchRequest) -> LaunchResult<LaunchContext> {
        let message_type = self.require(request, LTI_MESSAGE_TYPE)?;
        let version = self.require(request, LTI_VERSION)?;
        let resource_link_id = self.require(request, RESOURCE_LINK_ID)?;

        if message_type != LAUNCH_MESSAGE_TYPE {
            return Err(self.unsupported(request, LTI_MESSAGE_TYPE, message_type));
        }
        if !SUPPORTED_LTI_VERSIONS.contains(&version) {
            return Err(self.unsupported(request, LTI_VERSION, version));
        }

        let roles = request
            .first_nonempty("roles")
            .map(parse_roles)
            .unwrap_or_default();

        let custom = request
            .params()
            .iter()
            .filter_map(|(name, value)| {
                name.strip_prefix(CUSTOM_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), value.clone()))
            })
            .collect();

        let opt = |name: &str| request.first_nonempty(name).map(str::to_string);

        Ok(LaunchContext {
            consumer_key: opt(OAUTH_CONSUMER_KEY).unwrap_or_default(),
            user_id: opt("user_id"),
            roles,
            context_id: opt("context_id"),
            context_title: opt("context_title"),
            resource_link_id: resource_link_id.to_string(),
            resource_link_title: opt("resource_link_title"),
            presentation: LaunchPresentation {
                document_target: opt("launch_presentation_document_target"),
                return_url: opt("launch_presentation_return_url"),
                locale: opt("launch_presentation_locale"),
                css_url: opt("launch_presentation_css_url"),
            },
            person: LisPerson {
                given_name: opt("lis_person_name_given"),
                family_name: opt("lis_person_name_family"),
                full_name: opt("lis_person_name_full"),
                email: opt("lis_person_contact_email_primary"),
            },
            custom,
        })
    }

    fn require<'a>(&self, request: &'a LaunchRequest, name: &str) -> LaunchResult<&'a str> {
        request.first_nonempty(name).ok_or_else(|| {
            tracing::debug!(parameter = name, "required LTI parameter missing");
            ProblemReport::new(ProblemCode::ParameterMissing(name.to_string()))
                .with_url(request.url())
        })
    }

    fn unsupported(&self, request: &LaunchRequest, name: &str, value: &str) -> ProblemReport {
        tracing::debug!(parameter = name, value, "unsupported LTI parameter value");
        ProblemReport::new(ProblemCode::ParameterUnsupported(name.to_string()))
            .with_message(format!("{name} '{value}' is not supported"))
            .with_url(request.url())
    }
}

/// Splits a comma-separated role list into the role vocabulary.
#[must_use]
pub fn parse_roles(raw: &str) -> Vec<LtiRole> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(LtiRole::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch_params() -> Vec<(String, String)> {
        vec![
            (OAUTH_CONSUMER_KEY.to_string(), "moodle".to_string()),
            (LTI_MESSAGE_TYPE.to_string(), LAUNCH_MESSAGE_TYPE.to_string()),
            (LTI_VERSION.to_string(), "LTI-1p0".to_string()),
            (RESOURCE_LINK_ID.to_string(), "rl-1".to_string()),
        ]
    }

    fn request_with(params: Vec<(String, String)>) -> LaunchRequest {
        LaunchRequest::new("POST", "https://tool.example.edu/launch", params)
    }

    #[test]
    fn test_minimal_launch_validates() {
        let context = ParameterValidator::new()
            .validate(&request_with(launch_params()))
            .unwrap();
        assert_eq!(context.consumer_key, "moodle");
        assert_eq!(context.resource_link_id, "rl-1");
        assert!(context.roles.is_empty());
        assert!(context.custom.is_empty());
    }

    #[test]
    fn test_missing_required_parameter() {
        for required in [LTI_MESSAGE_TYPE, LTI_VERSION, RESOURCE_LINK_ID] {
            let params = launch_params()
                .into_iter()
                .filter(|(name, _)| name != required)
                .collect();
            let err = ParameterValidator::new()
                .validate(&request_with(params))
                .unwrap_err();
            assert_eq!(
                err.code().unwrap().to_string(),
                format!("parameter_missing:{required}")
            );
        }
    }

    #[test]
    fn test_empty_required_parameter_counts_as_missing() {
        let mut params = launch_params();
        for (name, value) in &mut params {
            if name == RESOURCE_LINK_ID {
                *value = "  ".to_string();
            }
        }
        let err = ParameterValidator::new()
            .validate(&request_with(params))
            .unwrap_err();
        assert_eq!(
            err.code().unwrap().to_string(),
            "parameter_missing:resource_link_id"
        );
    }

    #[test]
    fn test_unrecognized_message_type() {
        let mut params = launch_params();
        params[1].1 = "ToolProxyRegistrationRequest".to_string();
        let err = ParameterValidator::new()
            .validate(&request_with(params))
            .unwrap_err();
        assert_eq!(
            err.code().unwrap().to_string(),
            "parameter_unsupported:lti_message_type"
        );
    }

    #[test]
    fn test_unrecognized_version() {
        let mut params = launch_params();
        params[2].1 = "LTI-2p0".to_string();
        let err = ParameterValidator::new()
            .validate(&request_with(params))
            .unwrap_err();
        assert_eq!(
            err.code().unwrap().to_string(),
            "parameter_unsupported:lti_version"
        );
    }

    #[test]
    fn test_roles_split_and_unknown_preserved() {
        let mut params = launch_params();
        params.push((
            "roles".to_string(),
            "Instructor, urn:lti:role:ims/lis/Learner,urn:example:Proctor".to_string(),
        ));
        let context = ParameterValidator::new()
            .validate(&request_with(params))
            .unwrap();
        assert_eq!(
            context.roles,
            vec![
                LtiRole::Instructor,
                LtiRole::Learner,
                LtiRole::Other("urn:example:Proctor".to_string()),
            ]
        );
    }

    #[test]
    fn test_custom_parameters_lowercased_and_stripped() {
        let mut params = launch_params();
        params.push(("custom_foo_bar".to_string(), "1".to_string()));
        params.push(("custom_Due_Date".to_string(), "2026-09-01".to_string()));
        let context = ParameterValidator::new()
            .validate(&request_with(params))
            .unwrap();
        assert_eq!(context.custom.get("foo_bar").map(String::as_str), Some("1"));
        assert_eq!(
            context.custom.get("due_date").map(String::as_str),
            Some("2026-09-01")
        );
    }

    #[test]
    fn test_presentation_and_person_fields() {
        let mut params = launch_params();
        params.extend([
            ("user_id".to_string(), "u-9".to_string()),
            ("context_id".to_string(), "course-7".to_string()),
            ("launch_presentation_document_target".to_string(), "iframe".to_string()),
            ("launch_presentation_return_url".to_string(), "https://lms.example.edu/back".to_string()),
            ("lis_person_name_given".to_string(), "Ada".to_string()),
            ("lis_person_contact_email_primary".to_string(), "ada@example.edu".to_string()),
        ]);
        let context = ParameterValidator::new()
            .validate(&request_with(params))
            .unwrap();
        assert_eq!(context.user_id.as_deref(), Some("u-9"));
        assert_eq!(context.presentation.document_target.as_deref(), Some("iframe"));
        assert_eq!(context.person.given_name.as_deref(), Some("Ada"));
        assert_eq!(context.person.email.as_deref(), Some("ada@example.edu"));
    }
}
