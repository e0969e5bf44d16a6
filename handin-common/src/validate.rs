//! Submission form validation.
//!
//! The checks are deliberately shallow: a repository URL must start with one
//! of the accepted GitHub prefixes and a hosted-app URL must mention one of
//! the accepted hosting domains. Nothing here touches the network.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ErrorCode;
use crate::types::SubmissionForm;

/// Repository prefixes accepted for every course.
pub const DEFAULT_REPO_PREFIXES: [&str; 4] = [
    "https://www.github.com/",
    "https://github.com/",
    "www.github.com/",
    "github.com/",
];

/// Hosting domains accepted for courses that ask for a deployed app.
pub const DEFAULT_SECONDARY_SUBSTRINGS: [&str; 2] = ["shinyapps.io", "run.app"];

/// Per-course validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Literal prefixes; the repository must start with one of them.
    pub primary_url_prefixes: Vec<String>,
    /// Substrings; the secondary URL must contain one of them. `None` when
    /// the course has no secondary URL field.
    pub secondary_url_substrings: Option<Vec<String>>,
}

impl ValidationRules {
    /// Rules for a course with only a repository field.
    pub fn repository_only() -> Self {
        Self {
            primary_url_prefixes: DEFAULT_REPO_PREFIXES.iter().map(|s| s.to_string()).collect(),
            secondary_url_substrings: None,
        }
    }

    /// Rules for a course that also asks for a hosted app URL.
    pub fn with_secondary(substrings: Vec<String>) -> Self {
        Self {
            secondary_url_substrings: Some(substrings),
            ..Self::repository_only()
        }
    }

    pub fn requires_secondary(&self) -> bool {
        self.secondary_url_substrings.is_some()
    }
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self::repository_only()
    }
}

/// Which field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid repository url '{value}'")]
    InvalidRepository { value: String },

    #[error("invalid secondary url '{value}'")]
    InvalidSecondaryUrl { value: String },
}

impl ValidationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidRepository { .. } => ErrorCode::InvalidRepositoryUrl,
            Self::InvalidSecondaryUrl { .. } => ErrorCode::InvalidSecondaryUrl,
        }
    }

    /// Message shown to the student; `secondary_label` names the course's
    /// hosted-app field (e.g. "shiny app url").
    pub fn user_message(&self, secondary_label: &str) -> String {
        match self {
            Self::InvalidRepository { .. } => "ERROR: invalid repo".to_string(),
            Self::InvalidSecondaryUrl { .. } => format!("ERROR: invalid {secondary_label}"),
        }
    }
}

pub type ValidationResult = Result<(), ValidationError>;

/// Check a repository URL against the accepted prefixes (case-sensitive).
pub fn is_valid_repository(repo: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| repo.starts_with(prefix.as_str()))
}

/// Check a secondary URL for any accepted substring, anywhere in the string.
pub fn is_valid_secondary(url: &str, substrings: &[String]) -> bool {
    substrings.iter().any(|needle| url.contains(needle.as_str()))
}

/// Validate already-trimmed form values. The repository is checked first.
pub fn validate(form: &SubmissionForm, rules: &ValidationRules) -> ValidationResult {
    if !is_valid_repository(&form.repo, &rules.primary_url_prefixes) {
        return Err(ValidationError::InvalidRepository {
            value: form.repo.clone(),
        });
    }

    if let Some(substrings) = &rules.secondary_url_substrings {
        if !is_valid_secondary(&form.shiny, substrings) {
            return Err(ValidationError::InvalidSecondaryUrl {
                value: form.shiny.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shiny_rules() -> ValidationRules {
        ValidationRules::with_secondary(
            DEFAULT_SECONDARY_SUBSTRINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn form(repo: &str, shiny: &str) -> SubmissionForm {
        SubmissionForm {
            repo: repo.to_string(),
            shiny: shiny.to_string(),
            remark: String::new(),
        }
    }

    #[test]
    fn test_accepts_all_historical_prefixes() {
        let rules = ValidationRules::repository_only();
        for repo in [
            "github.com/x",
            "www.github.com/x",
            "https://github.com/x",
            "https://www.github.com/x",
        ] {
            assert_eq!(validate(&form(repo, ""), &rules), Ok(()), "{repo}");
        }
    }

    #[test]
    fn test_rejects_other_schemes_and_hosts() {
        let rules = ValidationRules::repository_only();
        for repo in [
            "ftp://github.com/x",
            "http://github.com/x",
            "not-a-url",
            "",
            "https://gitlab.com/x",
            "GitHub.com/x",
        ] {
            assert_eq!(
                validate(&form(repo, ""), &rules),
                Err(ValidationError::InvalidRepository {
                    value: repo.to_string()
                }),
                "{repo}"
            );
        }
    }

    #[test]
    fn test_secondary_substring_anywhere() {
        let rules = shiny_rules();
        assert!(validate(&form("github.com/a/b", "https://foo.shinyapps.io/app"), &rules).is_ok());
        assert!(validate(&form("github.com/a/b", "svc-123.a.run.app"), &rules).is_ok());
        assert_eq!(
            validate(&form("github.com/a/b", "example.org"), &rules),
            Err(ValidationError::InvalidSecondaryUrl {
                value: "example.org".to_string()
            })
        );
    }

    #[test]
    fn test_secondary_ignored_when_course_has_none() {
        let rules = ValidationRules::repository_only();
        assert!(validate(&form("github.com/a/b", "example.org"), &rules).is_ok());
    }

    #[test]
    fn test_repository_checked_before_secondary() {
        let err = validate(&form("nope", "also nope"), &shiny_rules()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRepository { .. }));
    }

    #[test]
    fn test_user_messages() {
        let repo = ValidationError::InvalidRepository { value: "x".into() };
        let shiny = ValidationError::InvalidSecondaryUrl { value: "y".into() };
        assert_eq!(repo.user_message("shiny app url"), "ERROR: invalid repo");
        assert_eq!(
            shiny.user_message("shiny app url"),
            "ERROR: invalid shiny app url"
        );
        assert_eq!(repo.code(), ErrorCode::InvalidRepositoryUrl);
        assert_eq!(shiny.code(), ErrorCode::InvalidSecondaryUrl);
    }

    proptest! {
        #[test]
        fn prop_any_suffix_after_prefix_is_valid(suffix in ".*", idx in 0usize..4) {
            let repo = format!("{}{}", DEFAULT_REPO_PREFIXES[idx], suffix);
            prop_assert!(validate(&form(&repo, ""), &ValidationRules::repository_only()).is_ok());
        }

        #[test]
        fn prop_secondary_valid_iff_contains_substring(url in "[a-z./:]{0,30}") {
            let expected = url.contains("shinyapps.io") || url.contains("run.app");
            let result = validate(&form("github.com/a/b", &url), &shiny_rules());
            prop_assert_eq!(result.is_ok(), expected);
        }
    }
}
