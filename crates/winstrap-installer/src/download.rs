use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const RETRY_BACKOFF: Duration = Duration::from_secs(2);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Fetches an installer binary to a local path. Production code uses
/// [`ReqwestDownloader`]; tests inject a fake.
pub trait Downloader {
    fn fetch_to(&self, url: &str, destination: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ReqwestDownloader {
    client: reqwest::blocking::Client,
}

impl ReqwestDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .context("failed building download client")?;
        Ok(Self { client })
    }
}

impl Downloader for ReqwestDownloader {
    fn fetch_to(&self, url: &str, destination: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("download request failed: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("download returned {status}: {url}"));
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("failed reading download body: {url}"))?;
        fs::write(destination, &bytes).with_context(|| {
            format!("failed writing installer to {}", destination.display())
        })
    }
}

/// Downloads with exactly one retry after a short backoff. A partial file
/// from a failed first attempt is removed before retrying.
pub fn download_installer(
    downloader: &dyn Downloader,
    url: &str,
    destination: &Path,
) -> Result<()> {
    download_with_backoff(downloader, url, destination, RETRY_BACKOFF)
}

pub(crate) fn download_with_backoff(
    downloader: &dyn Downloader,
    url: &str,
    destination: &Path,
    backoff: Duration,
) -> Result<()> {
    let first = downloader.fetch_to(url, destination);
    let Err(first_err) = first else {
        return Ok(());
    };

    let _ = fs::remove_file(destination);
    std::thread::sleep(backoff);

    downloader.fetch_to(url, destination).map_err(|retry_err| {
        let _ = fs::remove_file(destination);
        anyhow!("download failed twice: first: {first_err:#}; retry: {retry_err:#}")
    })
}
