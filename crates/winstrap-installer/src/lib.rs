use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

mod download;
mod execute;
mod install;
mod verify;
mod winget;

pub use download::{download_installer, Downloader, ReqwestDownloader};
pub use execute::execute_installer;
pub use install::{download_and_install, InstallOutcome, InstallRequest};
pub use verify::{expand_env_placeholders, first_existing_path, resolve_verification_path};
pub use winget::{WingetAdapter, MIN_WINGET_BUILD};


/// Captured result of one subprocess invocation. Installer exit codes are
/// recorded but never trusted on their own; verification decides success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Subprocess seam. Production code uses [`SystemRunner`]; tests inject a
/// recording fake so no installer ever actually runs.
pub trait CommandRunner {
    fn run(&self, command: &mut Command, context_message: &str) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &mut Command, context_message: &str) -> Result<CommandOutput> {
        let output = command
            .output()
            .with_context(|| format!("{context_message}: command failed to start"))?;
        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Per-run scratch directory under the OS temp root. Downloaded installers
/// land here and are deleted best-effort after execution, succeed or fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchLayout {
    root: PathBuf,
}

impl ScratchLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a unique scratch directory for this run.
    pub fn for_run() -> Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system time is before unix epoch")?
            .as_nanos();
        let root = std::env::temp_dir().join(format!(
            "winstrap-{}-{}",
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&root)
            .with_context(|| format!("failed creating scratch dir: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn installer_path(&self, item_id: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{item_id}.{extension}"))
    }

    pub fn cleanup(&self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
