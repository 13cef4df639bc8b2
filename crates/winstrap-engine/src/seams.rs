use anyhow::Result;
use winstrap_core::DownloadDescriptor;
use winstrap_installer::{
    download_and_install, InstallOutcome, InstallRequest, ReqwestDownloader, ScratchLayout,
    SystemRunner, WingetAdapter,
};
use winstrap_resolver::ReqwestFetcher;

/// Package-manager seam for the run loop. Production code uses
/// [`WingetPackageManager`]; tests inject a fake so nothing is installed.
pub trait PackageManager {
    fn is_host_compatible(&self, build_number: u32) -> bool;

    /// Probes availability, bootstrapping the manager if necessary. Called
    /// at most once per run; the run loop latches the answer.
    fn ensure_available(&self) -> bool;

    /// Returns whether the install succeeded, plus the raw exit code for
    /// reporting.
    fn install(&self, package_id: &str) -> Result<(bool, i32)>;
}

pub struct WingetPackageManager {
    adapter: WingetAdapter<SystemRunner>,
    downloader: ReqwestDownloader,
    scratch: ScratchLayout,
}

impl WingetPackageManager {
    pub fn new(scratch: ScratchLayout) -> Result<Self> {
        Ok(Self {
            adapter: WingetAdapter::new(SystemRunner),
            downloader: ReqwestDownloader::new()?,
            scratch,
        })
    }
}

impl PackageManager for WingetPackageManager {
    fn is_host_compatible(&self, build_number: u32) -> bool {
        self.adapter.is_host_compatible(build_number)
    }

    fn ensure_available(&self) -> bool {
        self.adapter.ensure_available(&self.downloader, &self.scratch)
    }

    fn install(&self, package_id: &str) -> Result<(bool, i32)> {
        self.adapter.install(package_id)
    }
}

/// Direct-download seam: url resolution plus the download/execute/verify
/// pipeline behind it.
pub trait DirectInstaller {
    fn resolve_url(&self, descriptor: &DownloadDescriptor, display_name: &str) -> Result<String>;

    fn install(
        &self,
        item_id: &str,
        url: &str,
        descriptor: &DownloadDescriptor,
    ) -> Result<InstallOutcome>;
}

pub struct HttpDirectInstaller {
    fetcher: ReqwestFetcher,
    downloader: ReqwestDownloader,
    runner: SystemRunner,
    scratch: ScratchLayout,
}

impl HttpDirectInstaller {
    pub fn new(scratch: ScratchLayout) -> Result<Self> {
        Ok(Self {
            fetcher: ReqwestFetcher::new()?,
            downloader: ReqwestDownloader::new()?,
            runner: SystemRunner,
            scratch,
        })
    }
}

impl DirectInstaller for HttpDirectInstaller {
    fn resolve_url(&self, descriptor: &DownloadDescriptor, display_name: &str) -> Result<String> {
        winstrap_resolver::resolve(&self.fetcher, descriptor, display_name)
    }

    fn install(
        &self,
        item_id: &str,
        url: &str,
        descriptor: &DownloadDescriptor,
    ) -> Result<InstallOutcome> {
        let installer_kind = descriptor.installer_kind()?;
        download_and_install(
            &self.downloader,
            &self.runner,
            &self.scratch,
            &InstallRequest {
                item_id,
                url,
                installer_kind,
                extension: &descriptor.extension,
                silent_args: &descriptor.silent_args,
                verification_paths: &descriptor.verification_paths,
            },
        )
    }
}
