//! The assembled portal configuration.
//!
//! Precedence, lowest first: built-in default, profile, environment
//! (including `.env`), command line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono_tz::Tz;
use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

use super::courses::{CourseConfig, CourseConfigError};
use super::env::{ENV_PREFIX, EnvError, EnvParser};
use super::profiles::Profile;
use super::source::{ConfigSource, Sourced};
use crate::errors::ErrorCode;
use crate::identity::{DEFAULT_LOGIN_ATTEMPTS, OAuthClient};
use crate::timestamp::{DEFAULT_TIMEZONE, parse_timezone};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_COURSES_FILE: &str = "courses.toml";
pub const DEFAULT_SERVICE_ACCOUNT_FILE: &str = "service_account.json";

/// Path of the OAuth callback, relative to the public URL.
pub const OAUTH_CALLBACK_PATH: &str = "/login/github/authorized";

/// Backend holding the course worksheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sheets,
    Memory,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sheets => "sheets",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sheets" => Ok(Self::Sheets),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment: {}", join_env_errors(.0))]
    Env(Vec<EnvError>),

    #[error(transparent)]
    Courses(#[from] CourseConfigError),
}

fn join_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Env(_) => ErrorCode::ConfigEnvError,
            Self::Courses(CourseConfigError::Io { .. }) => ErrorCode::ConfigNotFound,
            Self::Courses(CourseConfigError::Parse { .. }) => ErrorCode::ConfigParseError,
        }
    }
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub courses: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub profile: Sourced<Profile>,
    pub host: Sourced<String>,
    pub port: Sourced<u16>,
    pub courses_path: Sourced<PathBuf>,
    pub courses: CourseConfig,
    /// False when the built-in catalogue is in use.
    pub courses_from_file: bool,
    pub service_account_path: Sourced<PathBuf>,
    pub store: Sourced<StoreKind>,
    pub timezone: Sourced<String>,
    pub login_attempts: Sourced<u32>,
    pub public_url: Sourced<Option<String>>,
    pub log_level: Sourced<String>,
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<SecretString>,
}

impl PortalConfig {
    /// Read the environment, apply `overrides` and load the course catalogue.
    pub fn load(overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let mut parser = EnvParser::new();

        let profile_raw = parser.get_choice(
            "PROFILE",
            Profile::default().as_str(),
            &["development", "production", "dev", "prod"],
        );
        let profile = Sourced {
            value: profile_raw.value.parse::<Profile>().unwrap_or_default(),
            source: profile_raw.source,
            env_var: profile_raw.env_var,
        };

        let host = match parser.get_optional_string("HOST") {
            Sourced {
                value: Some(host),
                env_var,
                ..
            } => Sourced {
                value: host,
                source: ConfigSource::Environment,
                env_var,
            },
            _ => Sourced::from_profile(profile.value.default_host().to_string()),
        }
        .override_with(overrides.host.clone(), ConfigSource::CommandLine);

        let port = parser
            .get_port("PORT", DEFAULT_PORT)
            .override_with(overrides.port, ConfigSource::CommandLine);

        let courses_path = parser
            .get_path("COURSES", DEFAULT_COURSES_FILE, false)
            .override_with(overrides.courses.clone(), ConfigSource::CommandLine);

        let service_account_path =
            parser.get_path("SERVICE_ACCOUNT", DEFAULT_SERVICE_ACCOUNT_FILE, false);

        let store_raw = parser.get_choice("STORE", StoreKind::Sheets.as_str(), &["sheets", "memory"]);
        let store = Sourced {
            value: store_raw.value.parse().unwrap_or(StoreKind::Sheets),
            source: store_raw.source,
            env_var: store_raw.env_var,
        };

        let timezone = parser.get_string("TIMEZONE", DEFAULT_TIMEZONE);
        let login_attempts =
            parser.get_u32_range("LOGIN_ATTEMPTS", DEFAULT_LOGIN_ATTEMPTS, 1, 10);
        let public_url = parser.get_optional_string("PUBLIC_URL");
        let log_level = parser.get_log_level("LOG_LEVEL", "info");

        let github_client_id = parser
            .get_optional_string(profile.value.client_id_var())
            .value;
        let github_client_secret = parser
            .get_optional_string(profile.value.client_secret_var())
            .value
            .map(SecretString::from);

        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }

        let (courses, courses_from_file) = load_courses(&courses_path)?;
        debug!(
            profile = %profile.value,
            courses = courses.courses.len(),
            from_file = courses_from_file,
            "Configuration loaded"
        );

        Ok(Self {
            profile,
            host,
            port,
            courses_path,
            courses,
            courses_from_file,
            service_account_path,
            store,
            timezone,
            login_attempts,
            public_url,
            log_level,
            github_client_id,
            github_client_secret,
        })
    }

    /// Parsed timezone; the default zone if the configured name is unknown.
    pub fn tz(&self) -> Tz {
        parse_timezone(&self.timezone.value).unwrap_or(chrono_tz::America::Los_Angeles)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host.value, self.port.value)
    }

    pub fn client_id_var(&self) -> String {
        format!("{ENV_PREFIX}{}", self.profile.value.client_id_var())
    }

    pub fn client_secret_var(&self) -> String {
        format!("{ENV_PREFIX}{}", self.profile.value.client_secret_var())
    }

    /// Absolute OAuth callback URL when a public URL is configured.
    pub fn redirect_uri(&self) -> Option<String> {
        self.public_url
            .value
            .as_ref()
            .map(|base| format!("{}{OAUTH_CALLBACK_PATH}", base.trim_end_matches('/')))
    }

    /// OAuth app credentials. Missing values become empty strings so the
    /// daemon can still serve pages in development.
    pub fn oauth_client(&self) -> OAuthClient {
        OAuthClient {
            client_id: self.github_client_id.clone().unwrap_or_default(),
            client_secret: self
                .github_client_secret
                .clone()
                .unwrap_or_else(|| SecretString::from(String::new())),
            redirect_uri: self.redirect_uri(),
        }
    }

    /// Lines describing each effective setting and where it came from.
    pub fn describe(&self) -> Vec<String> {
        let courses_origin = if self.courses_from_file {
            self.courses_path.value.display().to_string()
        } else {
            "built-in".to_string()
        };
        vec![
            format!(
                "profile = {} [{}]",
                self.profile.value,
                self.profile.describe_source()
            ),
            format!("bind = {} [{}]", self.bind_address(), self.port.describe_source()),
            format!("courses = {} ({courses_origin})", self.courses.slugs().join(", ")),
            format!("store = {} [{}]", self.store.value, self.store.describe_source()),
            format!(
                "timezone = {} [{}]",
                self.timezone.value,
                self.timezone.describe_source()
            ),
            format!(
                "login_attempts = {} [{}]",
                self.login_attempts.value,
                self.login_attempts.describe_source()
            ),
        ]
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            profile: Sourced::default_value(Profile::Development),
            host: Sourced::from_profile("127.0.0.1".to_string()),
            port: Sourced::default_value(DEFAULT_PORT),
            courses_path: Sourced::default_value(PathBuf::from(DEFAULT_COURSES_FILE)),
            courses: CourseConfig::builtin(),
            courses_from_file: false,
            service_account_path: Sourced::default_value(PathBuf::from(
                DEFAULT_SERVICE_ACCOUNT_FILE,
            )),
            store: Sourced::default_value(StoreKind::Memory),
            timezone: Sourced::default_value(DEFAULT_TIMEZONE.to_string()),
            login_attempts: Sourced::default_value(DEFAULT_LOGIN_ATTEMPTS),
            public_url: Sourced::default_value(None),
            log_level: Sourced::default_value("info".to_string()),
            github_client_id: None,
            github_client_secret: None,
        }
    }
}

/// Resolve the course catalogue.
///
/// An explicitly configured path must exist. The default path falls back to
/// `<config dir>/handin/courses.toml` and then to the built-in catalogue.
fn load_courses(path: &Sourced<PathBuf>) -> Result<(CourseConfig, bool), CourseConfigError> {
    if !path.is_default() {
        return CourseConfig::from_file(&path.value).map(|c| (c, true));
    }
    if path.value.exists() {
        return CourseConfig::from_file(&path.value).map(|c| (c, true));
    }
    match user_courses_file() {
        Some(user) if user.exists() => CourseConfig::from_file(&user).map(|c| (c, true)),
        _ => CourseConfig::load_or_builtin(Path::new(&path.value)),
    }
}

fn user_courses_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("handin").join(DEFAULT_COURSES_FILE))
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;
    use secrecy::ExposeSecret;
    use std::io::Write;

    const VARS: &[&str] = &[
        "HANDIN_PROFILE",
        "HANDIN_HOST",
        "HANDIN_PORT",
        "HANDIN_COURSES",
        "HANDIN_SERVICE_ACCOUNT",
        "HANDIN_STORE",
        "HANDIN_TIMEZONE",
        "HANDIN_LOGIN_ATTEMPTS",
        "HANDIN_PUBLIC_URL",
        "HANDIN_LOG_LEVEL",
        "HANDIN_GITHUB_CLIENT_ID",
        "HANDIN_GITHUB_CLIENT_SECRET",
        "HANDIN_GITHUB_CLIENT_ID_DEVELOP",
        "HANDIN_GITHUB_CLIENT_SECRET_DEVELOP",
    ];

    fn cleanup_env() {
        for var in VARS {
            // SAFETY: serialized by env_test_lock
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: &str) {
        // SAFETY: serialized by env_test_lock
        unsafe { std::env::set_var(key, value) };
    }

    fn courses_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("courses.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[[course]]\nslug = \"cs1\"\ntitle = \"CS 1\"\nsheet_id = \"abc\""
        )
        .unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let _guard = env_test_lock();
        cleanup_env();
        let dir = tempfile::tempdir().unwrap();
        set_env(
            "HANDIN_COURSES",
            dir.path().join("courses.toml").to_str().unwrap(),
        );
        courses_file(&dir);

        let config = PortalConfig::load(&CliOverrides::default()).unwrap();
        assert_eq!(config.profile.value, Profile::Development);
        assert_eq!(config.host.value, "127.0.0.1");
        assert_eq!(config.host.source, ConfigSource::Profile);
        assert_eq!(config.port.value, DEFAULT_PORT);
        assert_eq!(config.store.value, StoreKind::Sheets);
        assert_eq!(config.login_attempts.value, 3);
        assert_eq!(config.tz(), chrono_tz::America::Los_Angeles);
        assert!(config.courses_from_file);
        assert_eq!(config.courses.slugs(), vec!["cs1"]);
        assert!(config.github_client_id.is_none());

        cleanup_env();
    }

    #[test]
    fn test_production_profile_reads_production_credentials() {
        let _guard = env_test_lock();
        cleanup_env();
        let dir = tempfile::tempdir().unwrap();
        set_env("HANDIN_COURSES", courses_file(&dir).to_str().unwrap());
        set_env("HANDIN_PROFILE", "production");
        set_env("HANDIN_GITHUB_CLIENT_ID", "Iv1.prod");
        set_env("HANDIN_GITHUB_CLIENT_SECRET", "prod-secret");
        set_env("HANDIN_GITHUB_CLIENT_ID_DEVELOP", "Iv1.dev");
        set_env("HANDIN_PUBLIC_URL", "https://handin.example.edu/");

        let config = PortalConfig::load(&CliOverrides::default()).unwrap();
        assert_eq!(config.profile.value, Profile::Production);
        assert_eq!(config.host.value, "0.0.0.0");
        assert_eq!(config.github_client_id.as_deref(), Some("Iv1.prod"));

        let client = config.oauth_client();
        assert_eq!(client.client_secret.expose_secret(), "prod-secret");
        assert_eq!(
            client.redirect_uri.as_deref(),
            Some("https://handin.example.edu/login/github/authorized")
        );

        cleanup_env();
    }

    #[test]
    fn test_cli_overrides_environment() {
        let _guard = env_test_lock();
        cleanup_env();
        let dir = tempfile::tempdir().unwrap();
        set_env("HANDIN_HOST", "10.0.0.5");
        set_env("HANDIN_PORT", "9000");

        let overrides = CliOverrides {
            host: None,
            port: Some(9100),
            courses: Some(courses_file(&dir)),
        };
        let config = PortalConfig::load(&overrides).unwrap();
        assert_eq!(config.host.value, "10.0.0.5");
        assert_eq!(config.host.env_var.as_deref(), Some("HANDIN_HOST"));
        assert_eq!(config.port.value, 9100);
        assert_eq!(config.port.source, ConfigSource::CommandLine);
        assert_eq!(config.bind_address(), "10.0.0.5:9100");
        assert_eq!(config.courses_path.source, ConfigSource::CommandLine);

        cleanup_env();
    }

    #[test]
    fn test_env_errors_are_collected() {
        let _guard = env_test_lock();
        cleanup_env();
        set_env("HANDIN_PORT", "eighty");
        set_env("HANDIN_LOGIN_ATTEMPTS", "99");
        set_env("HANDIN_STORE", "postgres");

        let err = PortalConfig::load(&CliOverrides::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigEnvError);
        match err {
            ConfigError::Env(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {other:?}"),
        }

        cleanup_env();
    }

    #[test]
    fn test_explicit_missing_courses_file_fails() {
        let _guard = env_test_lock();
        cleanup_env();
        set_env("HANDIN_COURSES", "/nonexistent/handin/courses.toml");

        let err = PortalConfig::load(&CliOverrides::default()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigNotFound);

        cleanup_env();
    }

    #[test]
    fn test_describe_mentions_sources() {
        let mut config = PortalConfig::for_tests();
        config.port = Sourced::from_env(9000, "HANDIN_PORT");
        let lines = config.describe();
        assert!(lines.iter().any(|l| l == "bind = 127.0.0.1:9000 [environment (HANDIN_PORT)]"));
        assert!(lines.iter().any(|l| l == "courses = 141b, 141c (built-in)"));
    }

    #[test]
    fn test_store_kind_parse() {
        assert_eq!("memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!("redis".parse::<StoreKind>().is_err());
    }
}
