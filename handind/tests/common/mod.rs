pub mod logging;

pub use logging::init_test_logging;

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Run the daemon binary with a clean environment rooted in `dir`.
pub fn run_handind(dir: &Path, envs: &[(&str, &str)], args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_handind"));
    command
        .env_clear()
        .current_dir(dir)
        .arg("--env-file")
        .arg(dir.join("missing.env"));
    for (key, value) in envs {
        command.env(key, value);
    }
    command.args(args).output().expect("spawn handind")
}

/// Write a one-course catalogue into `dir`.
pub fn write_courses(dir: &Path) -> PathBuf {
    let path = dir.join("courses.toml");
    std::fs::write(
        &path,
        "[[course]]\nslug = \"141c\"\ntitle = \"STA 141C\"\nsheet_id = \"sheet-141c\"\n",
    )
    .expect("write courses.toml");
    path
}
