use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use winstrap_core::{CatalogEntry, DownloadDescriptor, UrlKind};
use winstrap_installer::{InstallOutcome, MIN_WINGET_BUILD};
use winstrap_state::{OperationStatus, OperationType, StateStore};

use crate::{
    resumable_installs, AttemptStatus, CancelFlag, DirectInstaller, InstallMethod, Orchestrator,
    PackageManager, ProgressSink, RunContext, Severity, Stage,
};

const WIN10_BUILD: u32 = 19045;
const WIN11_BUILD: u32 = 22631;

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let root = std::env::temp_dir().join(format!(
        "winstrap-engine-tests-{}-{}",
        std::process::id(),
        nanos
    ));
    fs::create_dir_all(&root).expect("must create test root");
    root
}

struct RecordingSink {
    messages: RefCell<Vec<String>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            messages: RefCell::new(Vec::new()),
        }
    }

    fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn report(&self, severity: Severity, message: &str) {
        self.messages
            .borrow_mut()
            .push(format!("{}: {message}", severity.as_str()));
    }
}

struct FakePackageManager {
    available: bool,
    install_success: bool,
    exit_code: i32,
    availability_checks: RefCell<u32>,
    install_calls: RefCell<Vec<String>>,
}

impl FakePackageManager {
    fn working() -> Self {
        Self {
            available: true,
            install_success: true,
            exit_code: 0,
            availability_checks: RefCell::new(0),
            install_calls: RefCell::new(Vec::new()),
        }
    }

    fn failing(exit_code: i32) -> Self {
        Self {
            install_success: false,
            exit_code,
            ..Self::working()
        }
    }

    fn absent() -> Self {
        Self {
            available: false,
            ..Self::working()
        }
    }
}

impl PackageManager for FakePackageManager {
    fn is_host_compatible(&self, build_number: u32) -> bool {
        build_number >= MIN_WINGET_BUILD
    }

    fn ensure_available(&self) -> bool {
        *self.availability_checks.borrow_mut() += 1;
        self.available
    }

    fn install(&self, package_id: &str) -> Result<(bool, i32)> {
        self.install_calls.borrow_mut().push(package_id.to_string());
        Ok((self.install_success, self.exit_code))
    }
}

struct FakeDirect {
    url: Option<String>,
    outcome: InstallOutcome,
    resolve_calls: RefCell<u32>,
    install_calls: RefCell<Vec<String>>,
}

impl FakeDirect {
    fn succeeding() -> Self {
        Self {
            url: Some("https://example.test/resolved.exe".to_string()),
            outcome: InstallOutcome {
                succeeded: true,
                verified_path: Some(PathBuf::from("/opt/app/app.exe")),
                exit_codes: vec![0],
                cleanup_error: None,
            },
            resolve_calls: RefCell::new(0),
            install_calls: RefCell::new(Vec::new()),
        }
    }

    fn verify_failing() -> Self {
        Self {
            outcome: InstallOutcome {
                succeeded: false,
                verified_path: None,
                exit_codes: vec![0],
                cleanup_error: None,
            },
            ..Self::succeeding()
        }
    }

    fn unresolvable() -> Self {
        Self {
            url: None,
            ..Self::succeeding()
        }
    }
}

impl DirectInstaller for FakeDirect {
    fn resolve_url(&self, _descriptor: &DownloadDescriptor, display_name: &str) -> Result<String> {
        *self.resolve_calls.borrow_mut() += 1;
        self.url
            .clone()
            .ok_or_else(|| anyhow!("mock: resolution failed for '{display_name}'"))
    }

    fn install(
        &self,
        item_id: &str,
        url: &str,
        _descriptor: &DownloadDescriptor,
    ) -> Result<InstallOutcome> {
        self.install_calls
            .borrow_mut()
            .push(format!("{item_id} {url}"));
        Ok(self.outcome.clone())
    }
}

fn direct_descriptor(verification_path: &str) -> DownloadDescriptor {
    DownloadDescriptor {
        url_template: "https://example.test/app.exe".to_string(),
        url_kind: UrlKind::Direct,
        asset_pattern: None,
        fallback_url: None,
        extension: "exe".to_string(),
        silent_args: vec!["/S".to_string()],
        verification_paths: vec![verification_path.to_string()],
    }
}

fn entry(id: &str, package_manager_id: Option<&str>, download: Option<DownloadDescriptor>) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        display_name: id.to_string(),
        package_manager_id: package_manager_id.map(ToOwned::to_owned),
        default_selected: true,
        win10: true,
        win11: true,
        download,
    }
}

fn context<'a>(
    build_number: u32,
    store: &'a StateStore,
    sink: &'a RecordingSink,
) -> RunContext<'a> {
    RunContext {
        build_number,
        store,
        sink,
        cancel: CancelFlag::new(),
    }
}

#[test]
fn inapplicable_item_is_skipped_without_any_calls() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let mut win11_only = entry("wsl", Some("Microsoft.WSL"), None);
    win11_only.win10 = false;

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN10_BUILD, &store, &sink), &[win11_only])
        .expect("run must complete");

    assert_eq!(summary.skipped(), 1);
    assert!(summary.attempts.is_empty());
    assert!(pm.install_calls.borrow().is_empty());
    assert_eq!(*pm.availability_checks.borrow(), 0);
    assert_eq!(*direct.resolve_calls.borrow(), 0);

    let record = store
        .load(OperationType::Install, "wsl")
        .expect("must load")
        .expect("record must exist");
    assert_eq!(record.status, OperationStatus::Skipped);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn installed_item_short_circuits_to_succeeded() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let marker = root.join("git.exe");
    fs::write(&marker, b"bin").expect("must write marker");
    let item = entry(
        "git",
        Some("Git.Git"),
        Some(direct_descriptor(&marker.to_string_lossy())),
    );

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.attempts[0].method, Some(InstallMethod::AlreadyInstalled));
    assert!(pm.install_calls.borrow().is_empty());
    assert_eq!(*direct.resolve_calls.borrow(), 0);
    assert!(direct.install_calls.borrow().is_empty());

    let record = store
        .load(OperationType::Install, "git")
        .expect("must load")
        .expect("record must exist");
    assert_eq!(record.status, OperationStatus::Succeeded);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn package_manager_success_never_touches_direct_download() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let item = entry(
        "git",
        Some("Git.Git"),
        Some(direct_descriptor(&root.join("missing.exe").to_string_lossy())),
    );

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.attempts[0].method, Some(InstallMethod::PackageManager));
    assert_eq!(pm.install_calls.borrow().as_slice(), ["Git.Git"]);
    assert_eq!(*direct.resolve_calls.borrow(), 0);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn package_manager_failure_falls_back_to_direct_download() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::failing(1603);
    let direct = FakeDirect::succeeding();

    let item = entry(
        "git",
        Some("Git.Git"),
        Some(direct_descriptor(&root.join("missing.exe").to_string_lossy())),
    );

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.succeeded(), 1);
    let attempt = &summary.attempts[0];
    assert_eq!(attempt.method, Some(InstallMethod::DirectDownload));
    assert_eq!(
        attempt.resolved_url.as_deref(),
        Some("https://example.test/resolved.exe")
    );
    assert_eq!(direct.install_calls.borrow().len(), 1);
    assert!(sink
        .messages()
        .iter()
        .any(|message| message.contains("exited 1603")));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn old_build_never_calls_package_manager() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let item = entry(
        "git",
        Some("Git.Git"),
        Some(direct_descriptor(&root.join("missing.exe").to_string_lossy())),
    );

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(10240, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.attempts[0].method, Some(InstallMethod::DirectDownload));
    assert!(pm.install_calls.borrow().is_empty());
    // Incompatible hosts skip the bootstrap probe entirely.
    assert_eq!(*pm.availability_checks.borrow(), 0);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn availability_is_probed_once_per_run() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let items = vec![
        entry("git", Some("Git.Git"), None),
        entry("vscode", Some("Microsoft.VisualStudioCode"), None),
    ];

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &items)
        .expect("run must complete");

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(*pm.availability_checks.borrow(), 1);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn absent_manager_without_descriptor_is_failed() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::absent();
    let direct = FakeDirect::succeeding();

    let item = entry("git", Some("Git.Git"), None);

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.failed(), 1);
    let attempt = &summary.attempts[0];
    assert_eq!(attempt.status, AttemptStatus::Failed);
    assert_eq!(attempt.failed_stage, Some(Stage::Install));
    assert!(attempt.error_detail.is_some());

    let record = store
        .load(OperationType::Install, "git")
        .expect("must load")
        .expect("record must exist");
    assert_eq!(record.status, OperationStatus::Failed);

    let _ = fs::remove_dir_all(root);
}

#[test]
fn resolution_failure_is_recorded_at_resolve_stage() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::unresolvable();

    let item = entry(
        "vlc",
        None,
        Some(direct_descriptor(&root.join("missing.exe").to_string_lossy())),
    );

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.failed(), 1);
    let attempt = &summary.attempts[0];
    assert_eq!(attempt.failed_stage, Some(Stage::Resolve));
    assert!(attempt.resolved_url.is_none());
    assert!(direct.install_calls.borrow().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn verification_failure_is_recorded_at_verify_stage() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::verify_failing();

    let item = entry(
        "vlc",
        None,
        Some(direct_descriptor(&root.join("missing.exe").to_string_lossy())),
    );

    let summary = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect("run must complete");

    assert_eq!(summary.failed(), 1);
    let attempt = &summary.attempts[0];
    assert_eq!(attempt.failed_stage, Some(Stage::Verify));
    assert_eq!(attempt.status, AttemptStatus::Failed);

    let record = store
        .load(OperationType::Install, "vlc")
        .expect("must load")
        .expect("record must exist");
    assert_eq!(record.status, OperationStatus::Failed);
    assert!(record
        .data
        .as_deref()
        .is_some_and(|data| data.starts_with("verify:")));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn cancellation_stops_before_the_next_item() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let items = vec![
        entry("git", Some("Git.Git"), None),
        entry("vscode", Some("Microsoft.VisualStudioCode"), None),
    ];

    let cancel = CancelFlag::new();
    cancel.cancel();
    let ctx = RunContext {
        build_number: WIN11_BUILD,
        store: &store,
        sink: &sink,
        cancel,
    };

    let summary = Orchestrator::new(&pm, &direct)
        .run(&ctx, &items)
        .expect("run must complete");

    assert!(summary.cancelled);
    assert!(summary.attempts.is_empty());
    assert!(pm.install_calls.borrow().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn store_write_failure_aborts_the_run() {
    let root = test_root();
    // Parent of the state path is a plain file, so every write must fail.
    let blocker = root.join("blocker");
    fs::write(&blocker, b"not a directory").expect("must write blocker");
    let store = StateStore::new(blocker.join("state.json"));
    let sink = RecordingSink::new();
    let pm = FakePackageManager::working();
    let direct = FakeDirect::succeeding();

    let item = entry("git", Some("Git.Git"), None);

    let err = Orchestrator::new(&pm, &direct)
        .run(&context(WIN11_BUILD, &store, &sink), &[item])
        .expect_err("run must abort");
    assert!(err.to_string().contains("state store"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn recovery_pass_surfaces_interrupted_installs() {
    let root = test_root();
    let store = StateStore::new(root.join("state.json"));

    store
        .save(OperationType::Install, "git", OperationStatus::InProgress, Some("downloading and installing".to_string()))
        .expect("must save");
    store
        .save(OperationType::Install, "vscode", OperationStatus::Succeeded, None)
        .expect("must save");
    store
        .save(OperationType::Tweak, "telemetry", OperationStatus::InProgress, None)
        .expect("must save");

    let resumable = resumable_installs(&store).expect("must load");
    assert_eq!(resumable, ["git"]);

    let _ = fs::remove_dir_all(root);
}
