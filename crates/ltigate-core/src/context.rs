//! Validated launch context and the LTI role vocabulary.
//!
//! A [`LaunchContext`] is the typed view of a launch request, constructed
//! only after every validation stage has passed. It is immutable and owned
//! by the completion hook for the duration of its invocation.

use std::collections::BTreeMap;

use serde::Serialize;

/// Roles a tool consumer can assert for the launching user.
///
/// Role strings arrive comma-separated, either as simple names
/// (`Instructor`) or as full URNs (`urn:lti:role:ims/lis/Instructor`).
/// Unknown roles are preserved verbatim rather than rejected, so newer
/// consumer vocabularies keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum LtiRole {
    Learner,
    Instructor,
    Administrator,
    TeachingAssistant,
    ContentDeveloper,
    Mentor,
    Member,
    Manager,
    Observer,
    /// A role outside the known vocabulary, kept exactly as received.
    Other(String),
}

impl LtiRole {
    /// Parses one role string from the consumer.
    ///
    /// URN-style roles are matched on their final path segment, so
    /// `urn:lti:role:ims/lis/Learner` and `Learner` are the same role.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let name = raw.rsplit('/').next().unwrap_or(raw);
        match name.to_ascii_lowercase().as_str() {
            "learner" | "student" => Self::Learner,
            "instructor" | "faculty" | "staff" => Self::Instructor,
            "administrator" => Self::Administrator,
            "teachingassistant" => Self::TeachingAssistant,
            "contentdeveloper" => Self::ContentDeveloper,
            "mentor" => Self::Mentor,
            "member" => Self::Member,
            "manager" => Self::Manager,
            "observer" => Self::Observer,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// The canonical name of this role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Learner => "Learner",
            Self::Instructor => "Instructor",
            Self::Administrator => "Administrator",
            Self::TeachingAssistant => "TeachingAssistant",
            Self::ContentDeveloper => "ContentDeveloper",
            Self::Mentor => "Mentor",
            Self::Member => "Member",
            Self::Manager => "Manager",
            Self::Observer => "Observer",
            Self::Other(raw) => raw,
        }
    }
}

impl From<LtiRole> for String {
    fn from(role: LtiRole) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for LtiRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Launch presentation hints from the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LaunchPresentation {
    /// Where the tool is rendered (`iframe`, `window`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_target: Option<String>,

    /// URL the tool may redirect back to when finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,

    /// The user's locale as asserted by the consumer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Consumer stylesheet the tool may adopt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_url: Option<String>,
}

/// LIS person fields describing the launching user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LisPerson {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Validated, typed view of the LTI launch parameters.
///
/// Constructed by the parameter validator after signature and replay checks
/// pass; handed to the completion hook as the final stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchContext {
    /// Key of the consumer that signed the launch.
    pub consumer_key: String,

    /// Consumer-scoped user identifier. Optional in LTI 1.x; anonymous
    /// launches carry no user.
    pub user_id: Option<String>,

    /// Roles asserted for the user, unknown entries preserved verbatim.
    pub roles: Vec<LtiRole>,

    /// Course/context identifier within the consumer.
    pub context_id: Option<String>,

    /// Human-readable title of the context.
    pub context_title: Option<String>,

    /// The placement this launch comes from. Required by LTI 1.x.
    pub resource_link_id: String,

    /// Human-readable title of the placement.
    pub resource_link_title: Option<String>,

    /// Presentation hints for rendering the tool.
    pub presentation: LaunchPresentation,

    /// LIS person fields for the launching user.
    pub person: LisPerson,

    /// Custom parameters: `custom_` prefix stripped, keys lower-cased,
    /// values verbatim.
    pub custom: BTreeMap<String, String>,
}

impl LaunchContext {
    /// Returns `true` if the user was asserted with the given role.
    #[must_use]
    pub fn has_role(&self, role: &LtiRole) -> bool {
        self.roles.contains(role)
    }

    /// Returns `true` for staff-side launches.
    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.roles.iter().any(|r| {
            matches!(
                r,
                LtiRole::Instructor | LtiRole::Administrator | LtiRole::TeachingAssistant
            )
        })
    }

    /// Returns `true` for student-side launches.
    #[must_use]
    pub fn is_learner(&self) -> bool {
        self.has_role(&LtiRole::Learner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_simple_and_urn() {
        assert_eq!(LtiRole::parse("Learner"), LtiRole::Learner);
        assert_eq!(LtiRole::parse("urn:lti:role:ims/lis/Instructor"), LtiRole::Instructor);
        assert_eq!(
            LtiRole::parse("urn:lti:sysrole:ims/lis/Administrator"),
            LtiRole::Administrator
        );
        assert_eq!(LtiRole::parse(" Mentor "), LtiRole::Mentor);
    }

    #[test]
    fn test_role_parse_unknown_preserved_verbatim() {
        let role = LtiRole::parse("urn:example:role/Proctor");
        assert_eq!(role, LtiRole::Other("urn:example:role/Proctor".to_string()));
        assert_eq!(role.as_str(), "urn:example:role/Proctor");
    }

    #[test]
    fn test_role_case_insensitive() {
        assert_eq!(LtiRole::parse("instructor"), LtiRole::Instructor);
        assert_eq!(LtiRole::parse("LEARNER"), LtiRole::Learner);
    }

    #[test]
    fn test_context_serializes_roles_as_strings() {
        let ctx = LaunchContext {
            consumer_key: "moodle".to_string(),
            user_id: None,
            roles: vec![LtiRole::Learner, LtiRole::Other("Proctor".to_string())],
            context_id: Some("course-7".to_string()),
            context_title: None,
            resource_link_id: "rl-1".to_string(),
            resource_link_title: None,
            presentation: LaunchPresentation::default(),
            person: LisPerson::default(),
            custom: BTreeMap::new(),
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["roles"], serde_json::json!(["Learner", "Proctor"]));
        assert_eq!(json["context_id"], "course-7");
        // Absent presentation hints are omitted entirely.
        assert_eq!(json["presentation"], serde_json::json!({}));
    }

    #[test]
    fn test_staff_and_learner_predicates() {
        let ctx = LaunchContext {
            consumer_key: "moodle".to_string(),
            user_id: Some("u-1".to_string()),
            roles: vec![LtiRole::TeachingAssistant],
            context_id: None,
            context_title: None,
            resource_link_id: "rl-1".to_string(),
            resource_link_title: None,
            presentation: LaunchPresentation::default(),
            person: LisPerson::default(),
            custom: BTreeMap::new(),
        };
        assert!(ctx.is_instructor());
        assert!(!ctx.is_learner());
        assert!(ctx.has_role(&LtiRole::TeachingAssistant));
    }
}
