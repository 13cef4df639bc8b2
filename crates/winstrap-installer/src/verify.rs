use std::fs;
use std::path::{Path, PathBuf};

/// Expands `%Name%` environment placeholders in a verification path
/// template. Unknown variables are left in place, which then simply fails
/// the existence probe instead of erroring.
pub fn expand_env_placeholders(template: &str) -> String {
    expand_env_placeholders_with(template, &|name| std::env::var(name).ok())
}

pub(crate) fn expand_env_placeholders_with(
    template: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('%');
                rest = after;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Probes one verification path template: expands environment placeholders
/// and supports a single wildcard path segment for version-numbered
/// directories (e.g. `…\app-*\app.exe`). Returns the concrete existing path,
/// if any.
pub fn resolve_verification_path(template: &str) -> Option<PathBuf> {
    resolve_verification_path_with(template, &|name| std::env::var(name).ok())
}

pub(crate) fn resolve_verification_path_with(
    template: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    let expanded = expand_env_placeholders_with(template, lookup);
    let Some(star) = expanded.find('*') else {
        let path = PathBuf::from(&expanded);
        return path.exists().then_some(path);
    };

    // One wildcard segment: everything before it is a literal directory,
    // everything after it a literal relative path.
    let segment_start = expanded[..star]
        .rfind(['\\', '/'])
        .map(|index| index + 1)
        .unwrap_or(0);
    let segment_end = expanded[star..]
        .find(['\\', '/'])
        .map(|index| star + index)
        .unwrap_or(expanded.len());

    let base = if segment_start == 0 {
        Path::new(".")
    } else {
        Path::new(&expanded[..segment_start])
    };
    let pattern = glob::Pattern::new(&expanded[segment_start..segment_end]).ok()?;
    let remainder: Vec<&str> = expanded[segment_end..]
        .split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .collect();

    let mut matches: Vec<PathBuf> = fs::read_dir(base)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| pattern.matches(name))
        })
        .map(|entry| entry.path())
        .collect();
    matches.sort();

    matches
        .into_iter()
        .map(|matched| {
            let mut candidate = matched;
            for part in &remainder {
                candidate.push(part);
            }
            candidate
        })
        .find(|candidate| candidate.exists())
}

/// Iterates verification paths in order; the first one that exists on disk
/// marks the installation successful.
pub fn first_existing_path(templates: &[String]) -> Option<PathBuf> {
    first_existing_path_with(templates, &|name| std::env::var(name).ok())
}

pub(crate) fn first_existing_path_with(
    templates: &[String],
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    templates
        .iter()
        .find_map(|template| resolve_verification_path_with(template, lookup))
}
