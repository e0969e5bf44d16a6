//! Startup validation of the assembled configuration.
//!
//! Problems are reported together; any [`Severity::Error`] stops the daemon
//! before it binds a socket.

use std::fmt;

use serde::Serialize;

use super::courses::is_valid_slug;
use super::portal::{PortalConfig, StoreKind};
use crate::errors::ErrorCode;
use crate::timestamp::parse_timezone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigWarning {
    pub severity: Severity,
    /// Setting the problem is about, e.g. `HANDIN_TIMEZONE` or `course 141b`.
    pub field: String,
    pub message: String,
    pub code: ErrorCode,
}

impl ConfigWarning {
    fn error(field: impl Into<String>, message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            severity: Severity::Error,
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            field: field.into(),
            message: message.into(),
            code: ErrorCode::ConfigValidationError,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.code.code_string(),
            self.severity,
            self.field,
            self.message
        )
    }
}

/// Check cross-field constraints the individual parsers cannot see.
pub fn validate_config(config: &PortalConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let profile = config.profile.value;

    if parse_timezone(&config.timezone.value).is_none() {
        warnings.push(ConfigWarning::error(
            "HANDIN_TIMEZONE",
            format!("unknown timezone '{}'", config.timezone.value),
            ErrorCode::ConfigValidationError,
        ));
    }

    if config.courses.courses.is_empty() {
        warnings.push(ConfigWarning::error(
            "courses",
            "no courses configured",
            ErrorCode::ConfigValidationError,
        ));
    }
    for slug in config.courses.duplicate_slugs() {
        warnings.push(ConfigWarning::error(
            format!("course {slug}"),
            "slug is defined more than once",
            ErrorCode::ConfigValidationError,
        ));
    }

    for course in &config.courses.courses {
        let field = format!("course {}", course.slug);
        if !is_valid_slug(&course.slug) {
            warnings.push(ConfigWarning::error(
                field.clone(),
                "slug must be a non-reserved path segment of letters, digits, '-' or '_'",
                ErrorCode::ConfigValidationError,
            ));
        }
        if course.repo_prefixes.as_ref().is_some_and(|p| p.is_empty()) {
            warnings.push(ConfigWarning::warning(
                field.clone(),
                "repo_prefixes is empty; only the GitHub defaults apply",
            ));
        }
        if course
            .secondary_url
            .as_ref()
            .is_some_and(|s| s.substrings.is_empty())
        {
            warnings.push(ConfigWarning::error(
                field.clone(),
                "secondary_url.substrings is empty; no app url would validate",
                ErrorCode::ConfigValidationError,
            ));
        }
        if config.store.value == StoreKind::Sheets && course.resolved_sheet_id().is_none() {
            warnings.push(ConfigWarning::error(
                field,
                format!("sheet_id '{}' is empty or names an unset variable", course.sheet_id),
                ErrorCode::ConfigCredentialsMissing,
            ));
        }
    }

    match config.store.value {
        StoreKind::Sheets => {
            if !config.service_account_path.value.exists() {
                warnings.push(ConfigWarning::error(
                    "HANDIN_SERVICE_ACCOUNT",
                    format!(
                        "service account key {} not found",
                        config.service_account_path.value.display()
                    ),
                    ErrorCode::ConfigCredentialsMissing,
                ));
            }
        }
        StoreKind::Memory => {
            if profile.allows_memory_store() {
                warnings.push(ConfigWarning::warning(
                    "HANDIN_STORE",
                    "memory store selected; submissions are lost on restart",
                ));
            } else {
                warnings.push(ConfigWarning::error(
                    "HANDIN_STORE",
                    format!("memory store is not allowed in the {profile} profile"),
                    ErrorCode::ConfigValidationError,
                ));
            }
        }
    }

    let missing_oauth = [
        (config.github_client_id.is_none(), config.client_id_var()),
        (config.github_client_secret.is_none(), config.client_secret_var()),
    ];
    for (missing, var) in missing_oauth {
        if !missing {
            continue;
        }
        let message = "GitHub OAuth app credential is not set; logins will fail";
        warnings.push(if profile.allows_memory_store() {
            ConfigWarning::warning(var, message)
        } else {
            ConfigWarning::error(var, message, ErrorCode::ConfigCredentialsMissing)
        });
    }

    if let Some(public_url) = &config.public_url.value {
        if url::Url::parse(public_url).is_err() {
            warnings.push(ConfigWarning::error(
                "HANDIN_PUBLIC_URL",
                format!("'{public_url}' is not an absolute URL"),
                ErrorCode::ConfigValidationError,
            ));
        } else if profile.secure_cookies() && !public_url.starts_with("https://") {
            warnings.push(ConfigWarning::warning(
                "HANDIN_PUBLIC_URL",
                "secure cookies are only sent over https",
            ));
        }
    }

    warnings
}

/// True when any entry is an error.
pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
    warnings.iter().any(ConfigWarning::is_error)
}
