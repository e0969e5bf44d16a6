//! Error Catalog for the handin portal
//!
//! Each entry has:
//! - A unique code (HND-E001 through HND-E599)
//! - A human-readable message
//! - Remediation steps
//!
//! # Example
//!
//! ```rust
//! use handin_common::errors::catalog::ErrorCode;
//!
//! let entry = ErrorCode::StoreWriteFailed.entry();
//! println!("Error {}: {}", entry.code, entry.message);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering all portal error scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Courses file not found
    ConfigNotFound,
    /// Courses file contains invalid TOML or unknown keys
    ConfigParseError,
    /// Configuration contains invalid values
    ConfigValidationError,
    /// Environment variable has invalid value
    ConfigEnvError,
    /// OAuth client or service account credentials are missing
    ConfigCredentialsMissing,

    // =========================================================================
    // Validation Errors (E100-E199)
    // =========================================================================
    /// Repository URL does not start with an accepted prefix
    InvalidRepositoryUrl,
    /// Secondary (hosted app) URL does not contain an accepted domain
    InvalidSecondaryUrl,

    // =========================================================================
    // Network Errors (E200-E299)
    // =========================================================================
    /// Submitted URL did not answer with a 2xx status
    UrlUnreachable,

    // =========================================================================
    // Auth Errors (E300-E399)
    // =========================================================================
    /// OAuth callback state did not match the session
    OAuthStateMismatch,
    /// Authorization code could not be exchanged for a token
    OAuthExchangeFailed,
    /// Provider did not confirm the user after bounded retries
    LoginFetchExhausted,

    // =========================================================================
    // Store Errors (E400-E499)
    // =========================================================================
    /// Reading the identity column failed
    StoreReadFailed,
    /// Writing or appending a row failed
    StoreWriteFailed,
    /// Store rejected the service account credentials
    StoreAuthFailed,

    // =========================================================================
    // Internal Errors (E500-E599)
    // =========================================================================
    /// A blocking worker task panicked or was cancelled
    TaskJoinFailed,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigNotFound => 1,
            Self::ConfigParseError => 2,
            Self::ConfigValidationError => 3,
            Self::ConfigEnvError => 4,
            Self::ConfigCredentialsMissing => 5,

            Self::InvalidRepositoryUrl => 101,
            Self::InvalidSecondaryUrl => 102,

            Self::UrlUnreachable => 201,

            Self::OAuthStateMismatch => 301,
            Self::OAuthExchangeFailed => 302,
            Self::LoginFetchExhausted => 303,

            Self::StoreReadFailed => 401,
            Self::StoreWriteFailed => 402,
            Self::StoreAuthFailed => 403,

            Self::TaskJoinFailed => 500,
        }
    }

    /// Returns the formatted code string (e.g., "HND-E401").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("HND-E{:03}", self.code_number())
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Validation,
            200..=299 => ErrorCategory::Network,
            300..=399 => ErrorCategory::Auth,
            400..=499 => ErrorCategory::Store,
            _ => ErrorCategory::Internal,
        }
    }

    /// Returns the human-readable message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigNotFound => "Courses configuration file not found",
            Self::ConfigParseError => "Courses configuration file could not be parsed",
            Self::ConfigValidationError => "Configuration contains invalid values",
            Self::ConfigEnvError => "Environment variable has an invalid value",
            Self::ConfigCredentialsMissing => "Required credentials are not configured",
            Self::InvalidRepositoryUrl => "Repository URL is not a GitHub repository",
            Self::InvalidSecondaryUrl => "Hosted app URL is not on an accepted domain",
            Self::UrlUnreachable => "Submitted URL could not be reached",
            Self::OAuthStateMismatch => "Login callback did not match the pending login",
            Self::OAuthExchangeFailed => "Login could not be completed with the identity provider",
            Self::LoginFetchExhausted => "Identity provider did not return the user profile",
            Self::StoreReadFailed => "Submission sheet could not be read",
            Self::StoreWriteFailed => "Submission could not be saved to the sheet",
            Self::StoreAuthFailed => "Submission sheet rejected the service credentials",
            Self::TaskJoinFailed => "Background task failed to complete",
        }
    }

    /// Returns remediation steps for this error.
    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigNotFound => &[
                "Set HANDIN_COURSES to the path of a courses TOML file",
                "Or remove the variable to use the built-in course list",
            ],
            Self::ConfigParseError => &[
                "Check the courses file for TOML syntax errors",
                "Each course needs `slug`, `title` and `sheet_id`",
            ],
            Self::ConfigValidationError => &["Review the reported settings and restart handind"],
            Self::ConfigEnvError => &["Fix or unset the reported HANDIN_* variable"],
            Self::ConfigCredentialsMissing => &[
                "Set HANDIN_GITHUB_CLIENT_ID and HANDIN_GITHUB_CLIENT_SECRET",
                "Point HANDIN_SERVICE_ACCOUNT at the service account key file",
            ],
            Self::InvalidRepositoryUrl => &["Use a URL of the form https://github.com/<user>/<repo>"],
            Self::InvalidSecondaryUrl => &["Paste the public URL of the deployed app"],
            Self::UrlUnreachable => &[
                "Check that the repository is public or shared with the course staff",
                "The submission is still recorded",
            ],
            Self::OAuthStateMismatch => &["Start the login again from the home page"],
            Self::OAuthExchangeFailed => &[
                "Start the login again from the home page",
                "Verify the OAuth app client secret",
            ],
            Self::LoginFetchExhausted => &["Log in again; GitHub may be temporarily unavailable"],
            Self::StoreReadFailed | Self::StoreWriteFailed => &[
                "Retry the submission in a few minutes",
                "Contact the course staff if the problem persists",
            ],
            Self::StoreAuthFailed => &[
                "Share the spreadsheet with the service account email",
                "Check that the service account key has not been revoked",
            ],
            Self::TaskJoinFailed => &["Retry the request"],
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    /// All catalog entries, in code order.
    pub fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigNotFound,
            Self::ConfigParseError,
            Self::ConfigValidationError,
            Self::ConfigEnvError,
            Self::ConfigCredentialsMissing,
            Self::InvalidRepositoryUrl,
            Self::InvalidSecondaryUrl,
            Self::UrlUnreachable,
            Self::OAuthStateMismatch,
            Self::OAuthExchangeFailed,
            Self::LoginFetchExhausted,
            Self::StoreReadFailed,
            Self::StoreWriteFailed,
            Self::StoreAuthFailed,
            Self::TaskJoinFailed,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    /// Configuration and startup errors (E001-E099)
    Config,
    /// Submission validation errors (E100-E199)
    Validation,
    /// Reachability probe errors (E200-E299)
    Network,
    /// Identity provider errors (E300-E399)
    Auth,
    /// Spreadsheet store errors (E400-E499)
    Store,
    /// Internal/unexpected errors (E500-E599)
    Internal,
}

impl ErrorCategory {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Validation => "validation",
            Self::Network => "network",
            Self::Auth => "auth",
            Self::Store => "store",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "HND-E401")
    pub code: String,
    /// Error category
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// One-line summary: `[HND-E401] Submission sheet could not be read`.
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}
