//! Best-effort reachability checks for submitted URLs.
//!
//! A failed probe is only ever a warning: private repositories and apps that
//! are asleep must still be submittable.

use serde::{Deserialize, Serialize};
use tracing::debug;
use ureq::Agent;

/// Outcome of probing one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    Reachable,
    Unreachable,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// Something that can check whether a URL answers.
pub trait Prober: Send + Sync {
    fn probe(&self, url: &str) -> Reachability;
}

/// Prefix `https://` when the student left the scheme out.
pub fn normalize_probe_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Classify a final HTTP status.
pub fn classify_status(status: u16) -> Reachability {
    if (200..300).contains(&status) {
        Reachability::Reachable
    } else {
        Reachability::Unreachable
    }
}

/// Plain GET with the HTTP client's defaults; redirects are followed.
pub struct HttpProber {
    agent: Agent,
}

impl HttpProber {
    pub fn new() -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for HttpProber {
    fn probe(&self, url: &str) -> Reachability {
        let target = normalize_probe_url(url);
        match self.agent.get(target.as_str()).call() {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(url = %target, status, "Probe answered");
                classify_status(status)
            }
            Err(e) => {
                debug!(url = %target, error = %e, "Probe failed");
                Reachability::Unreachable
            }
        }
    }
}
