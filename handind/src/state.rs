//! Shared daemon state handed to every request handler.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use handin_common::config::{Course, PortalConfig, StoreKind};
use handin_common::identity::IdentityProvider;
use handin_common::probe::Prober;
use handin_common::retry::RetryPolicy;
use handin_common::store::{
    MemoryStore, ServiceAccountAuth, ServiceAccountKey, SheetsStore, TabularStore,
};
use handin_common::validate::ValidationRules;
use tracing::info;

use crate::session::SessionStore;

/// A configured course with its worksheet client.
pub struct CourseRuntime {
    pub course: Course,
    pub rules: ValidationRules,
    pub store: Arc<dyn TabularStore>,
}

impl CourseRuntime {
    pub fn new(course: Course, store: Arc<dyn TabularStore>) -> Self {
        Self {
            rules: course.rules(),
            course,
            store,
        }
    }

    pub fn slug(&self) -> &str {
        &self.course.slug
    }
}

pub struct PortalState {
    /// Courses in catalogue order.
    pub courses: Vec<CourseRuntime>,
    index: HashMap<String, usize>,
    pub sessions: SessionStore,
    pub prober: Arc<dyn Prober>,
    pub identity: Arc<dyn IdentityProvider>,
    pub login_policy: RetryPolicy,
    pub tz: Tz,
    pub version: &'static str,
    pub started_at: Instant,
}

impl PortalState {
    pub fn new(
        courses: Vec<CourseRuntime>,
        sessions: SessionStore,
        prober: Arc<dyn Prober>,
        identity: Arc<dyn IdentityProvider>,
        login_policy: RetryPolicy,
        tz: Tz,
    ) -> Self {
        let index = courses
            .iter()
            .enumerate()
            .map(|(i, c)| (c.slug().to_string(), i))
            .collect();
        Self {
            courses,
            index,
            sessions,
            prober,
            identity,
            login_policy,
            tz,
            version: env!("CARGO_PKG_VERSION"),
            started_at: Instant::now(),
        }
    }

    pub fn course(&self, slug: &str) -> Option<&CourseRuntime> {
        self.index.get(slug).map(|&i| &self.courses[i])
    }
}

/// Build one worksheet client per course.
///
/// Sheets stores share a single service-account token cache.
pub fn build_course_stores(
    courses: &[Course],
    kind: StoreKind,
    key_path: &Path,
) -> Result<Vec<CourseRuntime>> {
    match kind {
        StoreKind::Memory => Ok(courses
            .iter()
            .map(|course| {
                let store = MemoryStore::with_header(course.slug.clone(), course.header());
                CourseRuntime::new(course.clone(), Arc::new(store))
            })
            .collect()),
        StoreKind::Sheets => {
            let key = ServiceAccountKey::from_file(key_path).with_context(|| {
                format!("loading service account key {}", key_path.display())
            })?;
            let agent = SheetsStore::default_agent();
            let auth = Arc::new(ServiceAccountAuth::new(key, agent.clone()));
            info!(account = %auth.client_email(), "Using Google Sheets store");

            courses
                .iter()
                .map(|course| {
                    let sheet_id = course.resolved_sheet_id().with_context(|| {
                        format!("course {} has no sheet id", course.slug)
                    })?;
                    let store = SheetsStore::new(
                        Arc::clone(&auth),
                        agent.clone(),
                        sheet_id,
                        course.worksheet.clone(),
                    )
                    .with_context(|| format!("course {}", course.slug))?;
                    Ok(CourseRuntime::new(course.clone(), Arc::new(store)))
                })
                .collect()
        }
    }
}

/// Build stores for `config`.
pub fn course_stores_for(config: &PortalConfig) -> Result<Vec<CourseRuntime>> {
    build_course_stores(
        &config.courses.courses,
        config.store.value,
        &config.service_account_path.value,
    )
}
