//! Shared building blocks for the handin portal.
//!
//! The daemon (`handind`) wires these together; everything here is usable
//! without an HTTP server:
//!
//! - [`validate`]: shallow URL checks on the submission form
//! - [`probe`]: best-effort reachability of submitted URLs
//! - [`upsert`]: one-row-per-identity writes against a [`store::TabularStore`]
//! - [`identity`]: OAuth provider client and bounded login lookup
//! - [`config`]: environment, profiles and the course catalogue

pub mod config;
pub mod errors;
pub mod identity;
pub mod probe;
pub mod retry;
pub mod store;
pub mod timestamp;
pub mod types;
pub mod upsert;
pub mod validate;

pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use identity::{AccessToken, GitHubProvider, IdentityError, IdentityProvider, current_login};
pub use probe::{HttpProber, Prober, Reachability};
pub use retry::{RetryPolicy, RetryableError, run_with_retry};
pub use store::{MemoryStore, SheetsStore, StoreError, TabularStore};
pub use types::{Flash, FlashLevel, Submission, SubmissionForm, UpsertOutcome};
pub use upsert::{UpsertError, upsert, upsert_submission};
pub use validate::{ValidationError, ValidationRules, validate};
