use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use winstrap_core::InstallerKind;

use crate::download::download_installer;
use crate::execute::execute_installer;
use crate::verify::first_existing_path;
use crate::{CommandRunner, Downloader, ScratchLayout};

#[derive(Debug, Clone)]
pub struct InstallRequest<'a> {
    pub item_id: &'a str,
    pub url: &'a str,
    pub installer_kind: InstallerKind,
    pub extension: &'a str,
    pub silent_args: &'a [String],
    pub verification_paths: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub succeeded: bool,
    /// The verification path that confirmed the install, when one did.
    pub verified_path: Option<PathBuf>,
    pub exit_codes: Vec<i32>,
    /// Set when the downloaded installer could not be deleted afterwards.
    /// Never fatal; surfaced so the caller can log it.
    pub cleanup_error: Option<String>,
}

/// Downloads the installer, runs it silently, and confirms success by
/// filesystem inspection. Returns `Err` only for download or launch
/// failures; an installer that ran but left no verification path behind is
/// `Ok` with `succeeded == false`.
///
/// The downloaded binary is deleted on every exit path, success or failure.
pub fn download_and_install(
    downloader: &dyn Downloader,
    runner: &dyn CommandRunner,
    scratch: &ScratchLayout,
    request: &InstallRequest<'_>,
) -> Result<InstallOutcome> {
    // Feature enablement has nothing to download; the commands run verbatim.
    if request.installer_kind == InstallerKind::FeatureInstall {
        let outputs = execute_installer(
            runner,
            request.installer_kind,
            scratch.root(),
            request.silent_args,
        )?;
        let exit_codes: Vec<i32> = outputs.iter().map(|output| output.exit_code).collect();
        let verified_path = first_existing_path(request.verification_paths);
        let succeeded = if request.verification_paths.is_empty() {
            exit_codes.iter().all(|code| *code == 0)
        } else {
            verified_path.is_some()
        };
        return Ok(InstallOutcome {
            succeeded,
            verified_path,
            exit_codes,
            cleanup_error: None,
        });
    }

    let installer_path = scratch.installer_path(request.item_id, request.extension);
    download_installer(downloader, request.url, &installer_path)?;

    let executed = execute_installer(
        runner,
        request.installer_kind,
        &installer_path,
        request.silent_args,
    );

    let cleanup_error = match fs::remove_file(&installer_path) {
        Ok(()) => None,
        Err(err) => Some(format!(
            "failed deleting installer {}: {err}",
            installer_path.display()
        )),
    };

    let outputs = executed?;
    let exit_codes: Vec<i32> = outputs.iter().map(|output| output.exit_code).collect();

    // Exit codes are advisory only; the filesystem is the verdict.
    let verified_path = first_existing_path(request.verification_paths);
    Ok(InstallOutcome {
        succeeded: verified_path.is_some(),
        verified_path,
        exit_codes,
        cleanup_error,
    })
}
