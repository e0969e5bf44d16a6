//! Server-side sessions keyed by an opaque cookie.
//!
//! The cookie only carries a random UUID v4; everything else lives in
//! [`SessionStore`]. A request works on a [`Session`] copy and hands it back
//! through [`SessionStore::commit`], which decides whether a `Set-Cookie`
//! header is needed.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, HeaderValue, header};
use handin_common::identity::AccessToken;
use handin_common::types::{Flash, SubmissionForm};
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "handin_session";

/// Sessions untouched for this long are dropped.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Idle lifetime of sessions that hold no access token.
pub const ANONYMOUS_IDLE_TTL: Duration = Duration::from_secs(10 * 60);

/// At most this many sessions without an access token are kept; the least
/// recently seen ones are evicted first.
pub const MAX_ANONYMOUS_SESSIONS: usize = 10_000;

/// Everything the portal remembers about one browser.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub oauth_token: Option<AccessToken>,
    /// Anti-forgery state of a login in progress.
    pub oauth_state: Option<String>,
    /// Cached identity-provider login.
    pub login: Option<String>,
    /// Path to return to after login.
    pub previous_url: Option<String>,
    /// Last submitted form values per course slug.
    pub forms: HashMap<String, SubmissionForm>,
    pub flashes: Vec<Flash>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.oauth_token.is_none()
            && self.oauth_state.is_none()
            && self.login.is_none()
            && self.previous_url.is_none()
            && self.forms.is_empty()
            && self.flashes.is_empty()
    }
}

/// A request's working copy of its session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    pub data: SessionData,
}

impl Session {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.data.oauth_token.is_some()
    }

    pub fn login(&self) -> Option<&str> {
        self.data.login.as_deref()
    }

    pub fn flash(&mut self, flash: Flash) {
        self.data.flashes.push(flash);
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.data.flashes)
    }

    /// Form values last entered for `course`, empty when none.
    pub fn form(&self, course: &str) -> SubmissionForm {
        self.data.forms.get(course).cloned().unwrap_or_default()
    }

    /// Forget everything, including the login.
    pub fn clear(&mut self) {
        self.data = SessionData::default();
    }
}

struct Entry {
    data: SessionData,
    last_seen: Instant,
}

impl Entry {
    fn is_anonymous(&self) -> bool {
        self.data.oauth_token.is_none()
    }
}

pub struct SessionStore {
    entries: RwLock<HashMap<String, Entry>>,
    secure: bool,
    idle_ttl: Duration,
    anonymous_ttl: Duration,
    max_anonymous: usize,
}

impl SessionStore {
    pub fn new(secure: bool) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            secure,
            idle_ttl: SESSION_IDLE_TTL,
            anonymous_ttl: ANONYMOUS_IDLE_TTL,
            max_anonymous: MAX_ANONYMOUS_SESSIONS,
        }
    }

    #[cfg(test)]
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    #[cfg(test)]
    pub fn with_anonymous_limits(mut self, ttl: Duration, max: usize) -> Self {
        self.anonymous_ttl = ttl;
        self.max_anonymous = max.max(1);
        self
    }

    fn is_live(&self, entry: &Entry) -> bool {
        let ttl = if entry.is_anonymous() {
            self.anonymous_ttl
        } else {
            self.idle_ttl
        };
        entry.last_seen.elapsed() < ttl
    }

    /// Evict the least recently seen anonymous sessions until one more fits.
    fn make_room_for_anonymous(&self, entries: &mut HashMap<String, Entry>) {
        let mut anonymous = entries.values().filter(|e| e.is_anonymous()).count();
        while anonymous >= self.max_anonymous {
            let oldest = entries
                .iter()
                .filter(|(_, e)| e.is_anonymous())
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(id, _)| id.clone());
            let Some(id) = oldest else { break };
            entries.remove(&id);
            anonymous -= 1;
            debug!("Evicted anonymous session");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The session named by the request cookie, or a fresh one.
    pub fn load(&self, headers: &HeaderMap) -> Session {
        let Some(id) = session_id_from_headers(headers) else {
            return Session::default();
        };
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        match entries.get(&id) {
            Some(entry) if self.is_live(entry) => Session {
                id: Some(id),
                data: entry.data.clone(),
            },
            _ => Session::default(),
        }
    }

    /// Persist `session`; returns the `Set-Cookie` value to send, if any.
    pub fn commit(&self, session: Session) -> Option<HeaderValue> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match (session.id, session.data.is_empty()) {
            (None, true) => None,
            (Some(id), true) => {
                entries.remove(&id);
                debug!("Session cleared");
                self.removal_cookie()
            }
            (Some(id), false) => {
                entries.insert(
                    id,
                    Entry {
                        data: session.data,
                        last_seen: Instant::now(),
                    },
                );
                None
            }
            (None, false) => {
                entries.retain(|_, entry| self.is_live(entry));
                if session.data.oauth_token.is_none() {
                    self.make_room_for_anonymous(&mut entries);
                }
                let id = Uuid::new_v4().to_string();
                let cookie = self.session_cookie(&id);
                entries.insert(
                    id,
                    Entry {
                        data: session.data,
                        last_seen: Instant::now(),
                    },
                );
                debug!(sessions = entries.len(), "Session started");
                cookie
            }
        }
    }

    fn attributes(&self) -> &'static str {
        if self.secure {
            "; Path=/; HttpOnly; SameSite=Lax; Secure"
        } else {
            "; Path=/; HttpOnly; SameSite=Lax"
        }
    }

    fn session_cookie(&self, id: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!("{SESSION_COOKIE}={id}{}", self.attributes())).ok()
    }

    fn removal_cookie(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{SESSION_COOKIE}=; Max-Age=0{}",
            self.attributes()
        ))
        .ok()
    }
}

/// Extract a well-formed session id from the `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| id.to_string())
}
