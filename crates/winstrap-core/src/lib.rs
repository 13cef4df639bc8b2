mod catalog;
mod descriptor;

pub use catalog::{Catalog, CatalogEntry, CatalogIssue, WindowsRelease};
pub use descriptor::{DownloadDescriptor, InstallerKind, UrlKind};
