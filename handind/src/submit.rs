//! Submission pipeline: validate, probe, upsert.
//!
//! Validation failures stop the pipeline before any network traffic. Probe
//! failures only add warnings. Store failures are returned to the caller.

use std::sync::Arc;

use chrono_tz::Tz;
use handin_common::errors::ErrorCode;
use handin_common::probe::{Prober, Reachability};
use handin_common::timestamp::submission_timestamp;
use handin_common::types::{Flash, Submission, SubmissionForm, UpsertOutcome};
use handin_common::upsert::{UpsertError, upsert_submission};
use handin_common::validate::{ValidationError, validate};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

use crate::state::CourseRuntime;

pub const REPO_UNREACHABLE: &str =
    "WARNING: it seems that the repo is not approachable (maybe it is private!?)";
pub const SUBMISSION_CREATED: &str = "Submission successful.";
pub const SUBMISSION_OVERWRITTEN: &str =
    "Old submission is found, the new submission will overwrite the old one.";

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Store(#[from] UpsertError),

    #[error("background task failed: {0}")]
    Task(#[from] JoinError),
}

impl SubmitError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Store(err) => err.code(),
            Self::Task(_) => ErrorCode::TaskJoinFailed,
        }
    }
}

/// What happened to one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    /// Flashes to queue, in display order.
    pub flashes: Vec<Flash>,
    pub rejected: Option<ValidationError>,
    pub outcome: Option<UpsertOutcome>,
}

pub fn unreachable_secondary_message(label: &str) -> String {
    format!("WARNING: it seems that the {label} is not approachable")
}

async fn probe(prober: &Arc<dyn Prober>, url: &str) -> Result<Reachability, JoinError> {
    let prober = Arc::clone(prober);
    let url = url.to_string();
    tokio::task::spawn_blocking(move || prober.probe(&url)).await
}

/// Run a trimmed `form` from `identity` through the pipeline for `course`.
pub async fn process_submission(
    course: &CourseRuntime,
    prober: &Arc<dyn Prober>,
    identity: &str,
    form: &SubmissionForm,
    tz: Tz,
) -> Result<SubmissionReport, SubmitError> {
    let slug = course.slug();
    let label = course.course.secondary_label();

    if let Err(rejected) = validate(form, &course.rules) {
        info!(course = slug, identity, code = %rejected.code().code_string(), "Submission rejected");
        return Ok(SubmissionReport {
            flashes: vec![Flash::danger(rejected.user_message(label))],
            rejected: Some(rejected),
            outcome: None,
        });
    }

    let mut flashes = Vec::new();
    let with_secondary = course.rules.requires_secondary();

    if with_secondary {
        let (repo, secondary) = tokio::join!(probe(prober, &form.repo), probe(prober, &form.shiny));
        if !repo?.is_reachable() {
            warn!(course = slug, identity, url = %form.repo, code = %ErrorCode::UrlUnreachable.code_string(), "Repository not reachable");
            flashes.push(Flash::warning(REPO_UNREACHABLE));
        }
        if !secondary?.is_reachable() {
            warn!(course = slug, identity, url = %form.shiny, code = %ErrorCode::UrlUnreachable.code_string(), "Secondary url not reachable");
            flashes.push(Flash::warning(unreachable_secondary_message(label)));
        }
    } else if !probe(prober, &form.repo).await?.is_reachable() {
        warn!(course = slug, identity, url = %form.repo, code = %ErrorCode::UrlUnreachable.code_string(), "Repository not reachable");
        flashes.push(Flash::warning(REPO_UNREACHABLE));
    }

    let submission = Submission::new(
        identity,
        form.ordered_fields(with_secondary),
        submission_timestamp(tz),
    );
    let store = Arc::clone(&course.store);
    let outcome =
        tokio::task::spawn_blocking(move || upsert_submission(store.as_ref(), &submission))
            .await??;

    flashes.push(match outcome {
        UpsertOutcome::Created => Flash::info(SUBMISSION_CREATED),
        UpsertOutcome::Overwritten => Flash::warning(SUBMISSION_OVERWRITTEN),
    });

    Ok(SubmissionReport {
        flashes,
        rejected: None,
        outcome: Some(outcome),
    })
}
