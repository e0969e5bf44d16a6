//! Course catalogue.
//!
//! Courses come from a TOML file with one `[[course]]` table each:
//!
//! ```toml
//! [[course]]
//! slug = "141b"
//! title = "STA 141B"
//! sheet_id = "$STA141B_SHEET_ID"
//! secondary_url = { label = "shiny app url", substrings = ["shinyapps.io", "run.app"] }
//! ```
//!
//! Without a file the built-in catalogue is used.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::{DEFAULT_REPO_PREFIXES, DEFAULT_SECONDARY_SUBSTRINGS, ValidationRules};

/// Label used in flashes for the hosted-app field when none is configured.
pub const DEFAULT_SECONDARY_LABEL: &str = "shiny app url";

#[derive(Debug, Error)]
pub enum CourseConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// The hosted-app field of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryUrl {
    #[serde(default = "default_secondary_label")]
    pub label: String,
    #[serde(default = "default_secondary_substrings")]
    pub substrings: Vec<String>,
}

fn default_secondary_label() -> String {
    DEFAULT_SECONDARY_LABEL.to_string()
}

fn default_secondary_substrings() -> Vec<String> {
    DEFAULT_SECONDARY_SUBSTRINGS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SecondaryUrl {
    fn default() -> Self {
        Self {
            label: default_secondary_label(),
            substrings: default_secondary_substrings(),
        }
    }
}

/// One course as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub slug: String,
    pub title: String,
    /// Spreadsheet id; `$VAR` references are expanded on load.
    pub sheet_id: String,
    /// Worksheet title. The first worksheet when absent.
    #[serde(default)]
    pub worksheet: Option<String>,
    #[serde(default)]
    pub secondary_url: Option<SecondaryUrl>,
    #[serde(default)]
    pub repo_prefixes: Option<Vec<String>>,
}

impl Course {
    pub fn has_secondary(&self) -> bool {
        self.secondary_url.is_some()
    }

    pub fn secondary_label(&self) -> &str {
        self.secondary_url
            .as_ref()
            .map(|s| s.label.as_str())
            .unwrap_or(DEFAULT_SECONDARY_LABEL)
    }

    pub fn rules(&self) -> ValidationRules {
        let mut rules = match &self.secondary_url {
            Some(secondary) => ValidationRules::with_secondary(secondary.substrings.clone()),
            None => ValidationRules::repository_only(),
        };
        rules.primary_url_prefixes = self.repo_prefix_list();
        rules
    }

    /// The default repository prefixes followed by any extra ones the
    /// course configures, without duplicates.
    pub fn repo_prefix_list(&self) -> Vec<String> {
        let mut prefixes = default_repo_prefixes();
        for extra in self.repo_prefixes.iter().flatten() {
            if !prefixes.contains(extra) {
                prefixes.push(extra.clone());
            }
        }
        prefixes
    }

    /// Header row of the course worksheet.
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["login".to_string(), "repo".to_string()];
        if self.has_secondary() {
            header.push("shiny".to_string());
        }
        header.push("remark".to_string());
        header.push("timestamp".to_string());
        header
    }

    /// The sheet id after `$VAR` expansion, or `None` while a referenced
    /// variable is unset.
    pub fn resolved_sheet_id(&self) -> Option<String> {
        let expanded = shellexpand::env(&self.sheet_id).ok()?;
        let id = expanded.trim();
        if id.is_empty() { None } else { Some(id.to_string()) }
    }
}

/// The full catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseConfig {
    #[serde(default, rename = "course")]
    pub courses: Vec<Course>,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CourseConfig {
    /// STA 141B (repository plus a deployed Shiny app) and STA 141C
    /// (repository only).
    pub fn builtin() -> Self {
        Self {
            courses: vec![
                Course {
                    slug: "141b".to_string(),
                    title: "STA 141B".to_string(),
                    sheet_id: "$STA141B_SHEET_ID".to_string(),
                    worksheet: None,
                    secondary_url: Some(SecondaryUrl::default()),
                    repo_prefixes: None,
                },
                Course {
                    slug: "141c".to_string(),
                    title: "STA 141C".to_string(),
                    sheet_id: "$STA141C_SHEET_ID".to_string(),
                    worksheet: None,
                    secondary_url: None,
                    repo_prefixes: None,
                },
            ],
        }
    }

    pub fn parse(content: &str, path: &str) -> Result<Self, CourseConfigError> {
        toml::from_str(content).map_err(|source| CourseConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, CourseConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| CourseConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::parse(&content, &display)
    }

    /// Load `path` when it exists, else the built-in catalogue.
    ///
    /// Returns whether the file was used.
    pub fn load_or_builtin(path: &Path) -> Result<(Self, bool), CourseConfigError> {
        if path.exists() {
            Ok((Self::from_file(path)?, true))
        } else {
            Ok((Self::builtin(), false))
        }
    }

    pub fn get(&self, slug: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.slug == slug)
    }

    pub fn slugs(&self) -> Vec<String> {
        self.courses.iter().map(|c| c.slug.clone()).collect()
    }

    /// Slugs that appear more than once.
    pub fn duplicate_slugs(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for course in &self.courses {
            if !seen.insert(course.slug.as_str()) && !dups.contains(&course.slug) {
                dups.push(course.slug.clone());
            }
        }
        dups
    }
}

/// A slug is used as a single path segment.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !matches!(slug, "login" | "logout" | "getlogin" | "health")
}

/// The repository prefixes every course starts from.
pub fn default_repo_prefixes() -> Vec<String> {
    DEFAULT_REPO_PREFIXES.iter().map(|s| s.to_string()).collect()
}
