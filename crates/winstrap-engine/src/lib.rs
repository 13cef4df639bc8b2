mod orchestrator;
mod progress;
mod seams;
mod summary;

#[cfg(test)]
mod tests;

pub use orchestrator::{resumable_installs, Orchestrator, RunContext};
pub use progress::{CancelFlag, NullSink, ProgressSink, Severity};
pub use seams::{DirectInstaller, HttpDirectInstaller, PackageManager, WingetPackageManager};
pub use summary::{
    AttemptStatus, InstallAttempt, InstallMethod, RunSummary, SkippedItem, Stage,
};
