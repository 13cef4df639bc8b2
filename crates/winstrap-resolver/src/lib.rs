use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use winstrap_core::{DownloadDescriptor, UrlKind};

mod assets;
mod scrape;
mod vendor;


/// Network seam for the resolution strategies. Production code uses
/// [`ReqwestFetcher`]; tests inject an in-memory mock.
pub trait HttpFetch {
    fn get_text(&self, url: &str) -> Result<String>;

    /// Issues a HEAD request with redirect following disabled and returns
    /// the `Location` response header, if the server sent one.
    fn head_location(&self, url: &str) -> Result<Option<String>>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("winstrap/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
    no_redirect_client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("failed building http client")?;
        let no_redirect_client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed building redirect-probe http client")?;
        Ok(Self {
            client,
            no_redirect_client,
        })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("request returned {status}: {url}"));
        }
        response
            .text()
            .with_context(|| format!("failed reading response body: {url}"))
    }

    fn head_location(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .no_redirect_client
            .head(url)
            .send()
            .with_context(|| format!("redirect probe failed: {url}"))?;
        Ok(response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned))
    }
}

/// Turns a download descriptor into a concrete, fetchable URL.
///
/// Never fails hard while the descriptor carries a fallback: on any network
/// or parse failure the fallback URL is returned instead, and an error is
/// produced only when the strategy failed and no fallback exists. Retries
/// are the orchestrator's concern, not the resolver's.
pub fn resolve(
    http: &dyn HttpFetch,
    descriptor: &DownloadDescriptor,
    display_name: &str,
) -> Result<String> {
    let resolved = match descriptor.url_kind {
        UrlKind::Direct => return Ok(descriptor.url_template.clone()),
        UrlKind::Redirect => resolve_redirect(http, &descriptor.url_template),
        UrlKind::ReleaseAssetPattern => assets::resolve_release_asset(http, descriptor),
        UrlKind::VendorApi => vendor::resolve_vendor_api(http, &descriptor.url_template),
        UrlKind::ScrapeLatest => scrape::resolve_scrape_latest(http, &descriptor.url_template),
    };

    match resolved {
        Ok(url) => Ok(url),
        Err(err) => fallback_for(descriptor, display_name, err),
    }
}

fn resolve_redirect(http: &dyn HttpFetch, url_template: &str) -> Result<String> {
    http.head_location(url_template)?
        .ok_or_else(|| anyhow!("no Location header in redirect response: {url_template}"))
}

fn fallback_for(
    descriptor: &DownloadDescriptor,
    display_name: &str,
    err: anyhow::Error,
) -> Result<String> {
    if let Some(fallback) = &descriptor.fallback_url {
        if !fallback.trim().is_empty() {
            return Ok(fallback.clone());
        }
    }
    Err(err).with_context(|| {
        format!("failed resolving download url for '{display_name}' and no fallback is configured")
    })
}
