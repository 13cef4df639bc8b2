/// How an item ended up installed (or was attempted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    PackageManager,
    DirectDownload,
    AlreadyInstalled,
}

impl InstallMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PackageManager => "package manager",
            Self::DirectDownload => "direct download",
            Self::AlreadyInstalled => "already installed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Pending,
    Downloading,
    Installing,
    Verifying,
    Succeeded,
    Failed,
}

/// Where a failed attempt gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Download,
    Install,
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Download => "download",
            Self::Install => "install",
            Self::Verify => "verify",
        }
    }
}

/// In-memory record of one item's trip through the install state machine.
/// Ephemeral; the durable trail lives in the operation-state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallAttempt {
    pub item_id: String,
    pub display_name: String,
    pub method: Option<InstallMethod>,
    pub resolved_url: Option<String>,
    pub status: AttemptStatus,
    pub failed_stage: Option<Stage>,
    pub error_detail: Option<String>,
}

impl InstallAttempt {
    pub(crate) fn new(item_id: &str, display_name: &str) -> Self {
        Self {
            item_id: item_id.to_string(),
            display_name: display_name.to_string(),
            method: None,
            resolved_url: None,
            status: AttemptStatus::Pending,
            failed_stage: None,
            error_detail: None,
        }
    }
}

/// An item that was never attempted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub item_id: String,
    pub reason: String,
}

/// End-of-run report handed back to the embedding application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub attempts: Vec<InstallAttempt>,
    pub skips: Vec<SkippedItem>,
    /// Set when the run stopped early on the cancellation flag; items after
    /// the cut-off appear in neither list.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| attempt.status == AttemptStatus::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.attempts
            .iter()
            .filter(|attempt| attempt.status == AttemptStatus::Failed)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.skips.len()
    }
}
