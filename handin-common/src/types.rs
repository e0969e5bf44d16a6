//! Common types used across handin components.

use serde::{Deserialize, Serialize};

/// A student's submission as persisted in a course worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Stable login handle returned by the identity provider.
    pub identity: String,
    /// Course-specific field values, in column order.
    pub fields: Vec<String>,
    /// Wall-clock time of the submission (`YYYY/MM/DD HH:MM:SS`).
    pub timestamp: String,
}

impl Submission {
    pub fn new(identity: impl Into<String>, fields: Vec<String>, timestamp: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            fields,
            timestamp: timestamp.into(),
        }
    }

    /// Number of columns this submission occupies: identity, fields, timestamp.
    pub fn width(&self) -> usize {
        self.fields.len() + 2
    }

    /// The row tuple `[identity, field_1, ..., field_k, timestamp]`.
    pub fn row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(self.width());
        row.push(self.identity.clone());
        row.extend(self.fields.iter().cloned());
        row.push(self.timestamp.clone());
        row
    }
}

/// Raw values from the submission form (`?repo=&shiny=&remark=`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionForm {
    #[serde(default)]
    pub repo: String,
    /// Secondary (hosted app) URL. Ignored for courses without one.
    #[serde(default)]
    pub shiny: String,
    #[serde(default)]
    pub remark: String,
}

impl SubmissionForm {
    /// Strip leading/trailing whitespace from every field.
    pub fn trimmed(&self) -> Self {
        Self {
            repo: self.repo.trim().to_string(),
            shiny: self.shiny.trim().to_string(),
            remark: self.remark.trim().to_string(),
        }
    }

    /// Ordered worksheet fields: repo, secondary URL (if the course has one), remark.
    pub fn ordered_fields(&self, with_secondary: bool) -> Vec<String> {
        let mut fields = vec![self.repo.clone()];
        if with_secondary {
            fields.push(self.shiny.clone());
        }
        fields.push(self.remark.clone());
        fields
    }
}

/// Result of an upsert against a course worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No previous row existed; a new row was appended.
    Created,
    /// An existing row for the identity was replaced in place.
    Overwritten,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Overwritten => "overwritten",
        }
    }
}

/// Severity of a message shown to the user on the next rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Info,
    Warning,
    Danger,
}

impl FlashLevel {
    /// CSS class suffix used by the page templates.
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// A one-shot user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Warning,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Danger,
            message: message.into(),
        }
    }
}
