//! Configuration for the handin portal.
//!
//! - Environment variable parsing with type safety
//! - .env file support for development
//! - Deployment profiles (development/production)
//! - Course catalogue (TOML)
//! - Source tracking and startup validation

pub mod courses;
pub mod dotenv;
pub mod env;
pub mod portal;
pub mod profiles;
pub mod source;
pub mod validate;

pub use courses::{Course, CourseConfig, SecondaryUrl};
pub use env::{EnvError, EnvParser};
pub use portal::{CliOverrides, ConfigError, PortalConfig, StoreKind};
pub use profiles::Profile;
pub use source::{ConfigSource, Sourced};
pub use validate::{ConfigWarning, Severity, validate_config};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}
