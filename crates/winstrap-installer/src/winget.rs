use std::process::Command;

use anyhow::Result;

use crate::download::download_installer;
use crate::{CommandRunner, Downloader, ScratchLayout};

/// First Windows 10 build shipping the platform winget depends on (1709).
/// Hosts below this never attempt package-manager installs.
pub const MIN_WINGET_BUILD: u32 = 16299;

const APP_INSTALLER_FAMILY: &str = "Microsoft.DesktopAppInstaller_8wekyb3d8bbwe";
const APP_INSTALLER_BUNDLE_URL: &str = "https://aka.ms/getwinget";

/// Adapter over the host `winget` binary. All invocations are
/// non-interactive; subprocesses go through the injected [`CommandRunner`].
#[derive(Debug, Clone)]
pub struct WingetAdapter<R> {
    runner: R,
}

impl<R: CommandRunner> WingetAdapter<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn is_host_compatible(&self, build_number: u32) -> bool {
        build_number >= MIN_WINGET_BUILD
    }

    pub fn is_available(&self) -> bool {
        let mut command = Command::new("winget");
        command.arg("--version");
        self.runner
            .run(&mut command, "failed probing winget")
            .map(|output| output.success())
            .unwrap_or(false)
    }

    /// Installs a package non-interactively, auto-accepting license and
    /// source agreements. Success is exit code 0.
    pub fn install(&self, package_id: &str) -> Result<(bool, i32)> {
        let mut command = Command::new("winget");
        command
            .arg("install")
            .arg("--id")
            .arg(package_id)
            .arg("--exact")
            .arg("--silent")
            .arg("--accept-package-agreements")
            .arg("--accept-source-agreements")
            .arg("--disable-interactivity");
        let output = self.runner.run(
            &mut command,
            &format!("failed launching winget install for '{package_id}'"),
        )?;
        Ok((output.success(), output.exit_code))
    }

    pub fn installed_version(&self, package_id: &str) -> Option<String> {
        let mut command = Command::new("winget");
        command
            .arg("list")
            .arg("--id")
            .arg(package_id)
            .arg("--exact")
            .arg("--disable-interactivity");
        let output = self
            .runner
            .run(&mut command, "failed querying installed version")
            .ok()?;
        if !output.success() {
            return None;
        }
        parse_listed_version(&output.stdout, package_id)
    }

    /// One-time bootstrap for a compatible host where winget is absent:
    /// re-register the preinstalled App Installer package in place, then
    /// fall back to downloading and installing the msixbundle directly.
    /// Returns whether winget ended up usable; on `false` the caller must
    /// downgrade to direct downloads for the rest of the run.
    pub fn ensure_available(
        &self,
        downloader: &dyn Downloader,
        scratch: &ScratchLayout,
    ) -> bool {
        if self.is_available() {
            return true;
        }

        let mut register = Command::new("powershell");
        register
            .arg("-NoProfile")
            .arg("-Command")
            .arg(format!(
                "Add-AppxPackage -DisableDevelopmentMode -RegisterByFamilyName -MainPackage {APP_INSTALLER_FAMILY}"
            ));
        if self
            .runner
            .run(&mut register, "failed re-registering App Installer")
            .map(|output| output.success())
            .unwrap_or(false)
            && self.is_available()
        {
            return true;
        }

        let bundle_path = scratch.installer_path("app-installer", "msixbundle");
        if download_installer(downloader, APP_INSTALLER_BUNDLE_URL, &bundle_path).is_err() {
            return false;
        }

        let mut add = Command::new("powershell");
        add.arg("-NoProfile").arg("-Command").arg(format!(
            "Add-AppxPackage -Path '{}'",
            bundle_path.display().to_string().replace('\'', "''")
        ));
        let installed = self
            .runner
            .run(&mut add, "failed installing App Installer bundle")
            .map(|output| output.success())
            .unwrap_or(false);
        let _ = std::fs::remove_file(&bundle_path);

        installed && self.is_available()
    }
}

/// `winget list` prints aligned Name / Id / Version columns; names may
/// contain spaces, so the version is taken as the token right after the id.
pub(crate) fn parse_listed_version(stdout: &str, package_id: &str) -> Option<String> {
    for line in stdout.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(id_index) = tokens.iter().position(|token| *token == package_id) else {
            continue;
        };
        if let Some(version) = tokens.get(id_index + 1) {
            return Some((*version).to_string());
        }
    }
    None
}
