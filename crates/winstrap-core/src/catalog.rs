use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::descriptor::DownloadDescriptor;

/// Windows release line, derived from the host build number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowsRelease {
    Win10,
    Win11,
}

const FIRST_WIN11_BUILD: u32 = 22000;

impl WindowsRelease {
    pub fn from_build(build: u32) -> Self {
        if build >= FIRST_WIN11_BUILD {
            Self::Win11
        } else {
            Self::Win10
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    #[serde(rename = "Key")]
    pub id: String,
    #[serde(rename = "Name")]
    pub display_name: String,
    #[serde(rename = "PackageManagerId", default)]
    pub package_manager_id: Option<String>,
    #[serde(rename = "Default", default)]
    pub default_selected: bool,
    #[serde(rename = "Win10", default = "applicable_default")]
    pub win10: bool,
    #[serde(rename = "Win11", default = "applicable_default")]
    pub win11: bool,
    #[serde(rename = "DirectDownload", default)]
    pub download: Option<DownloadDescriptor>,
}

fn applicable_default() -> bool {
    true
}

impl CatalogEntry {
    pub fn applies_to(&self, release: WindowsRelease) -> bool {
        match release {
            WindowsRelease::Win10 => self.win10,
            WindowsRelease::Win11 => self.win11,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("entry Key must not be empty");
        }
        if self.display_name.trim().is_empty() {
            anyhow::bail!("entry Name must not be empty");
        }
        if self.package_manager_id.is_none() && self.download.is_none() {
            anyhow::bail!("entry needs a PackageManagerId or a DirectDownload descriptor");
        }
        if let Some(download) = &self.download {
            download.validate()?;
        }
        Ok(())
    }
}

/// A catalog entry rejected during load-time validation. Surfaced to the
/// caller so the item can be reported as skipped; never aborts the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIssue {
    pub id: String,
    pub category: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: BTreeMap<String, Vec<CatalogEntry>>,
    issues: Vec<CatalogIssue>,
}

impl Catalog {
    /// Reads the external JSON catalog: a map from category name to entry
    /// list. The file itself must parse; individual malformed entries are
    /// collected as [`CatalogIssue`]s and excluded from the entry set.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading catalog: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("failed parsing catalog: {}", path.display()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<CatalogEntry>> =
            serde_json::from_str(content).context("catalog must be a map of category to entries")?;

        let mut categories: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
        let mut issues = Vec::new();
        for (category, entries) in raw {
            for entry in entries {
                match entry.validate() {
                    Ok(()) => categories
                        .entry(category.clone())
                        .or_default()
                        .push(entry),
                    Err(err) => issues.push(CatalogIssue {
                        id: entry.id.clone(),
                        category: category.clone(),
                        reason: format!("{err:#}"),
                    }),
                }
            }
        }

        Ok(Self { categories, issues })
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[CatalogEntry])> {
        self.categories
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.categories.values().flatten()
    }

    pub fn entry(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries().find(|entry| entry.id == id)
    }

    pub fn default_selection(&self) -> Vec<&CatalogEntry> {
        self.entries()
            .filter(|entry| entry.default_selected)
            .collect()
    }

    pub fn issues(&self) -> &[CatalogIssue] {
        &self.issues
    }
}
