//! Manifest strategy: `source,destination` rows, with `name.*` sources resolved on disk.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::engine::hashing::fingerprint_file;
use crate::engine::tools::{
    base_name_key, has_wildcard_extension, is_older_than, replace_wildcard,
    split_name_and_extension,
};
use crate::error::ItemError;
use crate::ItemDescriptor;

pub struct ManifestSource {
    manifest: PathBuf,
    records: csv::StringRecordsIntoIter<File>,
    cutoff: Option<SystemTime>,
    rows: u64,
}

impl ManifestSource {
    /// Open the manifest. Failure to open is a setup error; row problems are per item.
    pub fn open(manifest: &Path, cutoff: Option<SystemTime>) -> Result<Self> {
        let file = File::open(manifest)
            .with_context(|| format!("error opening manifest {}", manifest.display()))?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);
        Ok(Self {
            manifest: manifest.to_path_buf(),
            records: reader.into_records(),
            cutoff,
            rows: 0,
        })
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// Resolve one row. `None` for blank rows and rows skipped by the cutoff.
    fn record_to_item(&self, source_ref: &str, dest: &str, line: u64) -> Option<ItemDescriptor> {
        if source_ref.is_empty() && dest.is_empty() {
            debug!("found empty record on line {}", line);
            return None;
        }

        let abs = match std::path::absolute(source_ref) {
            Ok(p) => p,
            Err(source) => {
                let failure = ItemError::Resolve {
                    reference: source_ref.to_string(),
                    source,
                };
                return Some(ItemDescriptor::failed(
                    PathBuf::from(source_ref),
                    dest.to_string(),
                    failure,
                ));
            }
        };

        let (path, ext) = match resolve_wildcard(&abs) {
            Ok(resolved) => resolved,
            Err(failure) => {
                return Some(ItemDescriptor::failed(abs, dest.to_string(), failure));
            }
        };
        let key = match (dest.is_empty(), ext) {
            (true, _) => base_name_key(&path),
            (false, Some(ext)) => replace_wildcard(dest, &ext),
            (false, None) => dest.to_string(),
        };

        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) if is_older_than(mtime, self.cutoff) => {
                debug!("skipping {} as its mod time is before the cutoff", path.display());
                return None;
            }
            Ok(_) => {}
            Err(source) => {
                let failure = ItemError::Lookup {
                    reference: source_ref.to_string(),
                    source,
                };
                return Some(ItemDescriptor::failed(path, key, failure));
            }
        }

        Some(match fingerprint_file(&path) {
            Ok(fp) => ItemDescriptor::new(path, fp, key),
            Err(e) => ItemDescriptor::failed(path, key, e.into()),
        })
    }
}

impl Iterator for ManifestSource {
    type Item = ItemDescriptor;

    fn next(&mut self) -> Option<ItemDescriptor> {
        loop {
            let record = self.records.next()?;
            self.rows += 1;
            match record {
                Ok(rec) => {
                    let line = rec.position().map(|p| p.line()).unwrap_or(self.rows);
                    let source_ref = rec.get(0).unwrap_or("");
                    let dest = rec.get(1).unwrap_or("");
                    if let Some(item) = self.record_to_item(source_ref, dest, line) {
                        return Some(item);
                    }
                }
                Err(err) => {
                    let line = err
                        .position()
                        .map(|p| p.line())
                        .unwrap_or(self.rows);
                    warn!("{}: unreadable record on line {}: {}", self.manifest.display(), line, err);
                    let failure = ItemError::Manifest {
                        line,
                        message: err.to_string(),
                    };
                    return Some(ItemDescriptor::failed(
                        self.manifest.clone(),
                        format!("{}:{}", self.manifest.display(), line),
                        failure,
                    ));
                }
            }
        }
    }
}

/// Resolve a `name.*` reference to the first matching file in its directory (sorted by name,
/// case-insensitive stem match). Returns the concrete path and, for wildcards, the extension.
pub fn resolve_wildcard(path: &Path) -> Result<(PathBuf, Option<String>), ItemError> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok((path.to_path_buf(), None));
    };
    if !has_wildcard_extension(name) {
        return Ok((path.to_path_buf(), None));
    }
    let (stem, _) = split_name_and_extension(name);
    let wanted = stem.to_lowercase();
    let dir = path.parent().unwrap_or(Path::new("."));
    let lookup_err = |source| ItemError::Lookup {
        reference: path.display().to_string(),
        source,
    };

    let mut entries = std::fs::read_dir(dir)
        .map_err(lookup_err)?
        .filter_map(|e| e.ok())
        .collect::<Vec<_>>();
    entries.sort_by_key(|e| e.file_name());

    let matches: Vec<(PathBuf, String)> = entries
        .iter()
        .filter(|e| e.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .filter_map(|e| {
            let file_name = e.file_name().into_string().ok()?;
            let (candidate, ext) = split_name_and_extension(&file_name);
            (candidate.to_lowercase() == wanted).then(|| (e.path(), ext.to_string()))
        })
        .collect();

    if matches.len() > 1 {
        warn!(
            "multiple files with the same name available by path '{}', using {}",
            path.display(),
            matches[0].0.display()
        );
    }
    match matches.into_iter().next() {
        Some((found, ext)) => Ok((found, Some(ext))),
        None => Err(ItemError::SourceNotFound(stem.to_string())),
    }
}
