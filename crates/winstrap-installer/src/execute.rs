use std::path::Path;
use std::process::Command;

use anyhow::{anyhow, Result};
use winstrap_core::InstallerKind;

use crate::{CommandOutput, CommandRunner};

pub(crate) fn build_exe_install_command(installer_path: &Path, silent_args: &[String]) -> Command {
    let mut command = Command::new(installer_path);
    command.args(silent_args);
    command
}

pub(crate) fn build_msi_install_command(installer_path: &Path, silent_args: &[String]) -> Command {
    let mut command = Command::new("msiexec");
    command.arg("/i").arg(installer_path).args(silent_args);
    command
}

/// Feature enablement commands are carried verbatim in the descriptor's
/// argument list, e.g. `dism /online /enable-feature /featurename:… /norestart`.
pub(crate) fn build_feature_command(verbatim: &str) -> Result<Command> {
    let mut parts = verbatim.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("empty feature enablement command"))?;
    let mut command = Command::new(program);
    command.args(parts);
    Ok(command)
}

/// Runs the installer (or feature commands) and waits synchronously.
/// Exit codes are collected, not judged: some silent installers return
/// nonzero on success, so verification owns the verdict.
pub fn execute_installer(
    runner: &dyn CommandRunner,
    kind: InstallerKind,
    installer_path: &Path,
    silent_args: &[String],
) -> Result<Vec<CommandOutput>> {
    match kind {
        InstallerKind::Exe => {
            let mut command = build_exe_install_command(installer_path, silent_args);
            let output = runner.run(
                &mut command,
                &format!("failed launching installer {}", installer_path.display()),
            )?;
            Ok(vec![output])
        }
        InstallerKind::Msi => {
            let mut command = build_msi_install_command(installer_path, silent_args);
            let output = runner.run(
                &mut command,
                &format!("failed launching msiexec for {}", installer_path.display()),
            )?;
            Ok(vec![output])
        }
        InstallerKind::FeatureInstall => {
            let mut outputs = Vec::with_capacity(silent_args.len());
            for verbatim in silent_args {
                let mut command = build_feature_command(verbatim)?;
                let output = runner.run(
                    &mut command,
                    &format!("failed launching feature command '{verbatim}'"),
                )?;
                outputs.push(output);
            }
            Ok(outputs)
        }
    }
}
