//! `.env` file support for local development.
//!
//! Variables already present in the process environment always win.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DotenvError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: expected KEY=VALUE")]
    Syntax { path: String, line: usize },
}

/// Parse `.env` content into key/value pairs.
///
/// Supports `#` comments, an optional `export ` prefix and single or double
/// quoted values. Later keys replace earlier ones.
pub fn parse_dotenv(content: &str, path: &str) -> Result<BTreeMap<String, String>, DotenvError> {
    let mut vars = BTreeMap::new();
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            return Err(DotenvError::Syntax {
                path: path.to_string(),
                line: idx + 1,
            });
        };
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(DotenvError::Syntax {
                path: path.to_string(),
                line: idx + 1,
            });
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    // Unquoted values may carry a trailing comment.
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end(),
        None => value,
    }
}

/// Load `path` into the process environment.
///
/// Returns the names of the variables that were set. A missing file is not
/// an error.
#[allow(unsafe_code)]
pub fn load_dotenv(path: &Path) -> Result<Vec<String>, DotenvError> {
    if !path.exists() {
        debug!(path = %path.display(), "No .env file");
        return Ok(Vec::new());
    }
    let path_text = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| DotenvError::Io {
        path: path_text.clone(),
        source,
    })?;

    let mut applied = Vec::new();
    for (key, value) in parse_dotenv(&content, &path_text)? {
        if std::env::var_os(&key).is_some() {
            continue;
        }
        // SAFETY: called from main before the runtime spawns worker threads.
        unsafe { std::env::set_var(&key, value) };
        applied.push(key);
    }
    debug!(path = %path_text, count = applied.len(), "Loaded .env");
    Ok(applied)
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use crate::config::env_test_lock;
    use std::io::Write;

    #[test]
    fn test_parse_dotenv() {
        let content = r#"
# OAuth app for local testing
HANDIN_GITHUB_CLIENT_ID_DEVELOP=Iv1.dev
export HANDIN_PROFILE=development
STA141B_SHEET_ID="1AbC def"
QUOTED='x # not a comment'
TRAILING=value # comment
EMPTY=
"#;
        let vars = parse_dotenv(content, ".env").unwrap();
        assert_eq!(vars["HANDIN_GITHUB_CLIENT_ID_DEVELOP"], "Iv1.dev");
        assert_eq!(vars["HANDIN_PROFILE"], "development");
        assert_eq!(vars["STA141B_SHEET_ID"], "1AbC def");
        assert_eq!(vars["QUOTED"], "x # not a comment");
        assert_eq!(vars["TRAILING"], "value");
        assert_eq!(vars["EMPTY"], "");
    }

    #[test]
    fn test_parse_dotenv_rejects_garbage() {
        let err = parse_dotenv("GOOD=1\nnot an assignment\n", ".env").unwrap_err();
        assert!(matches!(err, DotenvError::Syntax { line: 2, .. }));
        assert!(parse_dotenv("BAD KEY=1", ".env").is_err());
    }

    #[test]
    fn test_load_dotenv_never_overrides() {
        let _guard = env_test_lock();
        // SAFETY: serialized by env_test_lock
        unsafe {
            std::env::set_var("HANDIN_DOTENV_EXISTING", "from-process");
            std::env::remove_var("HANDIN_DOTENV_NEW");
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "HANDIN_DOTENV_EXISTING=from-file").unwrap();
        writeln!(file, "HANDIN_DOTENV_NEW=fresh").unwrap();

        let applied = load_dotenv(file.path()).unwrap();
        assert_eq!(applied, vec!["HANDIN_DOTENV_NEW".to_string()]);
        assert_eq!(std::env::var("HANDIN_DOTENV_EXISTING").unwrap(), "from-process");
        assert_eq!(std::env::var("HANDIN_DOTENV_NEW").unwrap(), "fresh");

        // SAFETY: serialized by env_test_lock
        unsafe {
            std::env::remove_var("HANDIN_DOTENV_EXISTING");
            std::env::remove_var("HANDIN_DOTENV_NEW");
        }
    }

    #[test]
    fn test_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dotenv(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dotenv(dir.path()).unwrap_err();
        assert!(matches!(err, DotenvError::Io { .. }));
        assert!(err.to_string().contains(&dir.path().display().to_string()));
    }

    #[test]
    fn test_syntax_error_names_path_and_line() {
        let _guard = env_test_lock();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "HANDIN_DOTENV_OK=1\nnot an assignment").unwrap();
        let err = load_dotenv(file.path()).unwrap_err();
        match err {
            DotenvError::Syntax { path, line } => {
                assert_eq!(path, file.path().display().to_string());
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
