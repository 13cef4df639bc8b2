use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum UrlKind {
    Direct,
    Redirect,
    ReleaseAssetPattern,
    VendorApi,
    ScrapeLatest,
}

impl UrlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Redirect => "redirect",
            Self::ReleaseAssetPattern => "release-asset-pattern",
            Self::VendorApi => "vendor-api",
            Self::ScrapeLatest => "scrape-latest",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstallerKind {
    Exe,
    Msi,
    FeatureInstall,
}

impl InstallerKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "exe" => Some(Self::Exe),
            "msi" => Some(Self::Msi),
            "feature" => Some(Self::FeatureInstall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exe => "exe",
            Self::Msi => "msi",
            Self::FeatureInstall => "feature",
        }
    }
}

/// Direct-download half of a catalog entry. Field names follow the external
/// catalog format; which optional fields are required depends on `url_kind`,
/// enforced by [`DownloadDescriptor::validate`] at catalog-load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadDescriptor {
    #[serde(rename = "Url")]
    pub url_template: String,
    #[serde(rename = "UrlType")]
    pub url_kind: UrlKind,
    #[serde(rename = "AssetPattern", default)]
    pub asset_pattern: Option<String>,
    #[serde(rename = "FallbackUrl", default)]
    pub fallback_url: Option<String>,
    #[serde(rename = "Extension", default = "default_extension")]
    pub extension: String,
    #[serde(rename = "Arguments", default)]
    pub silent_args: Vec<String>,
    #[serde(rename = "VerificationPaths", default)]
    pub verification_paths: Vec<String>,
}

fn default_extension() -> String {
    "exe".to_string()
}

impl DownloadDescriptor {
    pub fn installer_kind(&self) -> Result<InstallerKind> {
        InstallerKind::parse(&self.extension).ok_or_else(|| {
            anyhow!(
                "unsupported installer extension '{}'; supported: exe, msi, feature",
                self.extension
            )
        })
    }

    /// Load-time validation of the kind-dependent field combinations.
    pub fn validate(&self) -> Result<()> {
        let kind = self.installer_kind()?;

        if kind == InstallerKind::FeatureInstall {
            if self.silent_args.is_empty() {
                return Err(anyhow!(
                    "feature install requires at least one enablement command in Arguments"
                ));
            }
            return Ok(());
        }

        if self.url_template.trim().is_empty() {
            return Err(anyhow!("download Url must not be empty"));
        }
        if self.verification_paths.is_empty() {
            return Err(anyhow!(
                "installer of kind '{}' requires at least one verification path",
                kind.as_str()
            ));
        }

        match self.url_kind {
            UrlKind::ReleaseAssetPattern => {
                if let Some(pattern) = &self.asset_pattern {
                    glob::Pattern::new(pattern)
                        .map_err(|err| anyhow!("invalid AssetPattern '{pattern}': {err}"))?;
                }
            }
            _ => {
                if self.asset_pattern.is_some() {
                    return Err(anyhow!(
                        "AssetPattern is only meaningful for url type '{}', not '{}'",
                        UrlKind::ReleaseAssetPattern.as_str(),
                        self.url_kind.as_str()
                    ));
                }
            }
        }

        Ok(())
    }
}
