//! Deployment profiles.
//!
//! | Profile       | Bind host   | Secure cookie | OAuth app variables                      |
//! |---------------|-------------|---------------|------------------------------------------|
//! | `development` | `127.0.0.1` | no            | `HANDIN_GITHUB_CLIENT_{ID,SECRET}_DEVELOP` |
//! | `production`  | `0.0.0.0`   | yes           | `HANDIN_GITHUB_CLIENT_{ID,SECRET}`         |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Development,
    Production,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            Self::Development => "127.0.0.1",
            Self::Production => "0.0.0.0",
        }
    }

    /// Whether the session cookie carries the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Variable names (without prefix) holding the OAuth app credentials.
    pub fn client_id_var(&self) -> &'static str {
        match self {
            Self::Development => "GITHUB_CLIENT_ID_DEVELOP",
            Self::Production => "GITHUB_CLIENT_ID",
        }
    }

    pub fn client_secret_var(&self) -> &'static str {
        match self {
            Self::Development => "GITHUB_CLIENT_SECRET_DEVELOP",
            Self::Production => "GITHUB_CLIENT_SECRET",
        }
    }

    /// The in-memory store loses every submission on restart.
    pub fn allows_memory_store(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "unknown profile '{other}' (expected development or production)"
            )),
        }
    }
}
