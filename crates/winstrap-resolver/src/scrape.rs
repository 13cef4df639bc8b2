use anyhow::{anyhow, Result};
use regex::Regex;

use crate::HttpFetch;

/// Vendors whose latest version is scraped from a fixed download page.
///
/// The extraction patterns are tied to the current page formats and are
/// expected to rot eventually; when one stops matching, resolution falls
/// back to the descriptor's pinned fallback URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrapeVendor {
    Python,
    Vlc,
    SevenZip,
}

impl ScrapeVendor {
    fn for_url(url: &str) -> Option<Self> {
        if url.contains("python.org") {
            Some(Self::Python)
        } else if url.contains("videolan.org") {
            Some(Self::Vlc)
        } else if url.contains("7-zip.org") {
            Some(Self::SevenZip)
        } else {
            None
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Vlc => "vlc",
            Self::SevenZip => "7-zip",
        }
    }

    fn extract(self, html: &str) -> Option<String> {
        match self {
            Self::Python => {
                let pattern =
                    Regex::new(r"Latest Python 3 Release - Python (3\.\d+\.\d+)").ok()?;
                let version = pattern.captures(html)?.get(1)?.as_str();
                Some(format!(
                    "https://www.python.org/ftp/python/{version}/python-{version}-amd64.exe"
                ))
            }
            Self::Vlc => {
                let pattern = Regex::new(r"vlc-(\d+\.\d+\.\d+(?:\.\d+)?)-win64\.exe").ok()?;
                let version = pattern.captures(html)?.get(1)?.as_str();
                Some(format!(
                    "https://get.videolan.org/vlc/{version}/win64/vlc-{version}-win64.exe"
                ))
            }
            Self::SevenZip => {
                let pattern = Regex::new(r"Download 7-Zip (\d+)\.(\d+)").ok()?;
                let captures = pattern.captures(html)?;
                let major = captures.get(1)?.as_str();
                let minor = captures.get(2)?.as_str();
                Some(format!("https://www.7-zip.org/a/7z{major}{minor}-x64.exe"))
            }
        }
    }
}

pub(crate) fn resolve_scrape_latest(http: &dyn HttpFetch, url_template: &str) -> Result<String> {
    let vendor = ScrapeVendor::for_url(url_template)
        .ok_or_else(|| anyhow!("no scrape pattern registered for url: {url_template}"))?;
    let html = http.get_text(url_template)?;
    vendor.extract(&html).ok_or_else(|| {
        anyhow!(
            "scrape pattern for vendor '{}' found no version at {url_template}",
            vendor.name()
        )
    })
}
