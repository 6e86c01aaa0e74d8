//! Path, filter and time utilities

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::utils::config::WILDCARD_TOKEN;

/// Ordered exclude rules. A path is excluded when any rule matches anywhere in it.
#[derive(Clone, Debug, Default)]
pub struct ExcludeRules {
    rules: Vec<Regex>,
}

impl ExcludeRules {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref())
                    .with_context(|| format!("bad exclude regexp pattern '{}'", p.as_ref()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.rules.iter().any(|rule| rule.is_match(&path_str))
    }
}

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Object-key form of a relative path: forward slashes on every platform.
pub fn path_to_key_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Base name of `path` as a key; falls back to the whole path when there is none.
pub fn base_name_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_to_key_string(path))
}

/// Split a file name into (stem, extension) at the last dot of its base name.
/// `"dir/test.me"` → `("test", "me")`, `"test"` → `("test", "")`, `"test."` → `("test", "")`.
pub fn split_name_and_extension(name: &str) -> (&str, &str) {
    let base = match name.rfind(['/', '\\']) {
        Some(pos) => &name[pos + 1..],
        None => name,
    };
    match base.rfind('.') {
        Some(pos) => (&base[..pos], &base[pos + 1..]),
        None => (base, ""),
    }
}

/// True if `name` ends in the bare wildcard extension (e.g. `report.*`).
pub fn has_wildcard_extension(name: &str) -> bool {
    let (_, ext) = split_name_and_extension(name);
    ext == WILDCARD_TOKEN
}

/// Substitute the first wildcard token in `key` with `ext`.
pub fn replace_wildcard(key: &str, ext: &str) -> String {
    key.replacen(WILDCARD_TOKEN, ext, 1)
}

/// True if `mtime` is strictly before `cutoff`. No cutoff never skips.
pub fn is_older_than(mtime: SystemTime, cutoff: Option<SystemTime>) -> bool {
    match cutoff {
        Some(cutoff) => mtime < cutoff,
        None => false,
    }
}

/// Parse a `--newer-than` value. Empty means no cutoff. Naive times are local.
pub fn parse_cutoff(value: &str) -> Result<Option<SystemTime>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(t.into()));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return local_to_system_time(naive, value).map(Some);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(naive) = date.and_hms_opt(0, 0, 0)
    {
        return local_to_system_time(naive, value).map(Some);
    }
    anyhow::bail!(
        "correct format for newer-than is RFC 3339 (e.g. 2001-01-24T01:45:00Z), 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD'; got '{}'",
        value
    )
}

fn local_to_system_time(naive: NaiveDateTime, raw: &str) -> Result<SystemTime> {
    let local = naive
        .and_local_timezone(Local)
        .earliest()
        .with_context(|| format!("'{raw}' does not exist in the local time zone"))?;
    Ok(local.into())
}

/// Canonicalize a required input path; failure is a setup error.
pub fn check_and_canonicalize(path: &Path, what: &str) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("{} '{}' is not a valid path", what, path.display()))
}
