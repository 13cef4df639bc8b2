use anyhow::{Context, Result};
use winstrap_core::{CatalogEntry, WindowsRelease};
use winstrap_installer::first_existing_path;
use winstrap_state::{OperationStatus, OperationType, StateStore};

use crate::progress::{CancelFlag, ProgressSink, Severity};
use crate::seams::{DirectInstaller, PackageManager};
use crate::summary::{AttemptStatus, InstallAttempt, InstallMethod, RunSummary, SkippedItem, Stage};

/// Everything a run needs from the embedding application: the host build
/// number, the durable state store, the reporting sink, and the
/// cancellation handle.
pub struct RunContext<'a> {
    pub build_number: u32,
    pub store: &'a StateStore,
    pub sink: &'a dyn ProgressSink,
    pub cancel: CancelFlag,
}

/// Startup recovery pass: items whose last recorded install attempt was left
/// in progress or failed, and should be offered for a retry from scratch.
pub fn resumable_installs(store: &StateStore) -> Result<Vec<String>> {
    Ok(store.load_all()?.resumable(OperationType::Install))
}

/// Drives selected catalog entries through the install state machine, one at
/// a time on the calling thread. Item failures never abort the run; the only
/// fatal condition is the state store refusing a write, since continuing
/// without a durable trail would make crash recovery lie.
pub struct Orchestrator<'a> {
    package_manager: &'a dyn PackageManager,
    direct: &'a dyn DirectInstaller,
}

impl<'a> Orchestrator<'a> {
    pub fn new(package_manager: &'a dyn PackageManager, direct: &'a dyn DirectInstaller) -> Self {
        Self {
            package_manager,
            direct,
        }
    }

    pub fn run(&self, ctx: &RunContext<'_>, entries: &[CatalogEntry]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        // Package-manager availability is probed once and latched for the
        // whole run; a mid-run flip would make item outcomes depend on order.
        let mut pm_available: Option<bool> = None;

        for entry in entries {
            if ctx.cancel.is_cancelled() {
                ctx.sink.report(
                    Severity::Warning,
                    "run cancelled; remaining items were not attempted",
                );
                summary.cancelled = true;
                break;
            }
            self.run_item(ctx, entry, &mut pm_available, &mut summary)?;
        }

        Ok(summary)
    }

    fn run_item(
        &self,
        ctx: &RunContext<'_>,
        entry: &CatalogEntry,
        pm_available: &mut Option<bool>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let release = WindowsRelease::from_build(ctx.build_number);
        if !entry.applies_to(release) {
            let reason = format!(
                "not applicable on this windows release (build {})",
                ctx.build_number
            );
            ctx.sink.report(
                Severity::Info,
                &format!("{}: skipped: {reason}", entry.display_name),
            );
            persist(ctx, &entry.id, OperationStatus::Skipped, Some(reason.clone()))?;
            summary.skips.push(SkippedItem {
                item_id: entry.id.clone(),
                reason,
            });
            return Ok(());
        }

        let mut attempt = InstallAttempt::new(&entry.id, &entry.display_name);

        // Idempotence short-circuit: an existing verification path means the
        // item is installed, whatever got it there. No network, no installer.
        if let Some(descriptor) = &entry.download {
            if let Some(existing) = first_existing_path(&descriptor.verification_paths) {
                ctx.sink.report(
                    Severity::Info,
                    &format!(
                        "{}: already installed ({})",
                        entry.display_name,
                        existing.display()
                    ),
                );
                persist(
                    ctx,
                    &entry.id,
                    OperationStatus::Succeeded,
                    Some(format!("already installed: {}", existing.display())),
                )?;
                attempt.method = Some(InstallMethod::AlreadyInstalled);
                attempt.status = AttemptStatus::Succeeded;
                summary.attempts.push(attempt);
                return Ok(());
            }
        }

        persist(
            ctx,
            &entry.id,
            OperationStatus::InProgress,
            Some("pending".to_string()),
        )?;

        if let Some(package_id) = &entry.package_manager_id {
            let available = match *pm_available {
                Some(latched) => latched,
                None => {
                    let compatible = self.package_manager.is_host_compatible(ctx.build_number);
                    if !compatible {
                        ctx.sink.report(
                            Severity::Warning,
                            &format!(
                                "host build {} predates the package manager; using direct downloads",
                                ctx.build_number
                            ),
                        );
                    }
                    let usable = compatible && self.package_manager.ensure_available();
                    if compatible && !usable {
                        ctx.sink.report(
                            Severity::Warning,
                            "package manager could not be made available; using direct downloads for this run",
                        );
                    }
                    *pm_available = Some(usable);
                    usable
                }
            };

            if available {
                attempt.method = Some(InstallMethod::PackageManager);
                attempt.status = AttemptStatus::Installing;
                persist(
                    ctx,
                    &entry.id,
                    OperationStatus::InProgress,
                    Some("installing via package manager".to_string()),
                )?;
                match self.package_manager.install(package_id) {
                    Ok((true, _)) => {
                        ctx.sink.report(
                            Severity::Info,
                            &format!("{}: installed via package manager", entry.display_name),
                        );
                        persist(
                            ctx,
                            &entry.id,
                            OperationStatus::Succeeded,
                            Some("installed via package manager".to_string()),
                        )?;
                        attempt.status = AttemptStatus::Succeeded;
                        summary.attempts.push(attempt);
                        return Ok(());
                    }
                    Ok((false, exit_code)) => {
                        ctx.sink.report(
                            Severity::Warning,
                            &format!(
                                "{}: package manager install exited {exit_code}; falling back to direct download",
                                entry.display_name
                            ),
                        );
                    }
                    Err(err) => {
                        ctx.sink.report(
                            Severity::Warning,
                            &format!(
                                "{}: package manager install failed: {err:#}; falling back to direct download",
                                entry.display_name
                            ),
                        );
                    }
                }
            }
        }

        let Some(descriptor) = &entry.download else {
            let detail =
                "package manager install did not succeed and no direct download is configured"
                    .to_string();
            attempt.method = attempt.method.or(Some(InstallMethod::PackageManager));
            return self.fail(ctx, summary, attempt, Stage::Install, detail);
        };

        attempt.method = Some(InstallMethod::DirectDownload);
        persist(
            ctx,
            &entry.id,
            OperationStatus::InProgress,
            Some("resolving download url".to_string()),
        )?;
        let url = match self.direct.resolve_url(descriptor, &entry.display_name) {
            Ok(url) => url,
            Err(err) => return self.fail(ctx, summary, attempt, Stage::Resolve, format!("{err:#}")),
        };
        attempt.resolved_url = Some(url.clone());

        attempt.status = AttemptStatus::Downloading;
        persist(
            ctx,
            &entry.id,
            OperationStatus::InProgress,
            Some("downloading and installing".to_string()),
        )?;
        let outcome = match self.direct.install(&entry.id, &url, descriptor) {
            Ok(outcome) => outcome,
            Err(err) => {
                return self.fail(ctx, summary, attempt, Stage::Download, format!("{err:#}"))
            }
        };
        if let Some(cleanup) = &outcome.cleanup_error {
            ctx.sink.report(Severity::Warning, cleanup);
        }

        attempt.status = AttemptStatus::Verifying;
        if outcome.succeeded {
            let detail = outcome
                .verified_path
                .as_ref()
                .map(|path| format!("verified: {}", path.display()));
            ctx.sink.report(
                Severity::Info,
                &format!("{}: installed", entry.display_name),
            );
            persist(ctx, &entry.id, OperationStatus::Succeeded, detail)?;
            attempt.status = AttemptStatus::Succeeded;
            summary.attempts.push(attempt);
            return Ok(());
        }

        self.fail(
            ctx,
            summary,
            attempt,
            Stage::Verify,
            "installer ran but no verification path exists".to_string(),
        )
    }

    fn fail(
        &self,
        ctx: &RunContext<'_>,
        summary: &mut RunSummary,
        mut attempt: InstallAttempt,
        stage: Stage,
        detail: String,
    ) -> Result<()> {
        ctx.sink.report(
            Severity::Error,
            &format!(
                "{}: failed during {}: {detail}",
                attempt.display_name,
                stage.as_str()
            ),
        );
        persist(
            ctx,
            &attempt.item_id,
            OperationStatus::Failed,
            Some(format!("{}: {detail}", stage.as_str())),
        )?;
        attempt.status = AttemptStatus::Failed;
        attempt.failed_stage = Some(stage);
        attempt.error_detail = Some(detail);
        summary.attempts.push(attempt);
        Ok(())
    }
}

fn persist(
    ctx: &RunContext<'_>,
    item_id: &str,
    status: OperationStatus,
    data: Option<String>,
) -> Result<()> {
    ctx.store
        .save(OperationType::Install, item_id, status, data)
        .context("operation state store rejected a write; aborting the run")
}
