//! Where a configuration value came from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Origin of a configuration value, lowest precedence first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default.
    Default,
    /// Selected by the active profile.
    Profile,
    /// Loaded from a file on disk.
    File(PathBuf),
    /// Process environment (including values loaded from `.env`).
    Environment,
    /// Command-line flag.
    CommandLine,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Profile => write!(f, "profile"),
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Environment => write!(f, "environment"),
            Self::CommandLine => write!(f, "command line"),
        }
    }
}

/// A value together with its [`ConfigSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    /// The environment variable that supplied the value, if any.
    pub env_var: Option<String>,
}

impl<T> Sourced<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self {
            value,
            source,
            env_var: None,
        }
    }

    pub fn default_value(value: T) -> Self {
        Self::new(value, ConfigSource::Default)
    }

    pub fn from_env(value: T, var: impl Into<String>) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            env_var: Some(var.into()),
        }
    }

    pub fn from_profile(value: T) -> Self {
        Self::new(value, ConfigSource::Profile)
    }

    pub fn from_cli(value: T) -> Self {
        Self::new(value, ConfigSource::CommandLine)
    }

    /// Replace the value when `other` is set, recording the new source.
    pub fn override_with(self, other: Option<T>, source: ConfigSource) -> Self {
        match other {
            Some(value) => Self::new(value, source),
            None => self,
        }
    }

    pub fn is_default(&self) -> bool {
        self.source == ConfigSource::Default
    }

    /// Human description such as `environment (HANDIN_PORT)`.
    pub fn describe_source(&self) -> String {
        match &self.env_var {
            Some(var) => format!("{} ({var})", self.source),
            None => self.source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_with() {
        let port = Sourced::default_value(8080u16);
        let same = port.clone().override_with(None, ConfigSource::CommandLine);
        assert_eq!(same.value, 8080);
        assert!(same.is_default());

        let flag = port.override_with(Some(9000), ConfigSource::CommandLine);
        assert_eq!(flag.value, 9000);
        assert_eq!(flag.source, ConfigSource::CommandLine);
        assert!(flag.env_var.is_none());
    }

    #[test]
    fn test_describe_source() {
        assert_eq!(
            Sourced::from_env(1, "HANDIN_PORT").describe_source(),
            "environment (HANDIN_PORT)"
        );
        assert_eq!(Sourced::from_profile(1).describe_source(), "profile");
        assert_eq!(
            Sourced::new(1, ConfigSource::File(PathBuf::from("courses.toml"))).describe_source(),
            "file courses.toml"
        );
    }
}
