use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use winstrap_core::DownloadDescriptor;

use crate::HttpFetch;

#[derive(Debug, Clone, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReleaseResponse {
    Release(Release),
    Assets(Vec<ReleaseAsset>),
    Releases(Vec<Release>),
}

/// Extensions accepted when the descriptor carries no asset pattern.
const DEFAULT_INSTALLER_SUFFIXES: [&str; 4] = [".exe", ".msi", ".msix", ".msixbundle"];

pub(crate) fn resolve_release_asset(
    http: &dyn HttpFetch,
    descriptor: &DownloadDescriptor,
) -> Result<String> {
    let body = http.get_text(&descriptor.url_template)?;
    let assets = parse_release_assets(&body)
        .with_context(|| format!("failed parsing release response: {}", descriptor.url_template))?;

    select_asset(&assets, descriptor.asset_pattern.as_deref())?.ok_or_else(|| {
        anyhow!(
            "no release asset matched pattern '{}' at {}",
            descriptor.asset_pattern.as_deref().unwrap_or("<installer suffix>"),
            descriptor.url_template
        )
    })
}

fn parse_release_assets(body: &str) -> Result<Vec<ReleaseAsset>> {
    let response: ReleaseResponse =
        serde_json::from_str(body).context("release response is not a release or asset list")?;
    Ok(match response {
        ReleaseResponse::Release(release) => release.assets,
        ReleaseResponse::Assets(assets) => assets,
        ReleaseResponse::Releases(releases) => releases
            .into_iter()
            .next()
            .map(|release| release.assets)
            .unwrap_or_default(),
    })
}

fn select_asset(assets: &[ReleaseAsset], pattern: Option<&str>) -> Result<Option<String>> {
    match pattern.filter(|pattern| !pattern.is_empty()) {
        Some(pattern) => {
            // Case-sensitive glob, matched against asset names as published.
            let pattern = glob::Pattern::new(pattern)
                .with_context(|| format!("invalid asset pattern '{pattern}'"))?;
            Ok(assets
                .iter()
                .find(|asset| pattern.matches(&asset.name))
                .map(|asset| asset.browser_download_url.clone()))
        }
        None => Ok(assets
            .iter()
            .find(|asset| {
                DEFAULT_INSTALLER_SUFFIXES
                    .iter()
                    .any(|suffix| asset.name.ends_with(suffix))
            })
            .map(|asset| asset.browser_download_url.clone())),
    }
}
