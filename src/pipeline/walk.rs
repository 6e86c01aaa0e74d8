//! Filesystem walk strategy: every non-directory under the root, fingerprinted inline.

use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use crate::engine::hashing::fingerprint_file;
use crate::engine::tools::{
    ExcludeRules, base_name_key, check_and_canonicalize, is_older_than, path_relative_to,
    path_to_key_string,
};
use crate::error::ItemError;
use crate::{ItemDescriptor, KeyLayout};

/// One result from a directory walk: either a path to consider or an error with optional path.
pub enum WalkOutcome {
    Ok { path: PathBuf, is_dir: bool },
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`].
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> WalkOutcome {
    match r {
        Ok(entry) => {
            // With follow_links off, a symlink to a directory is reported as a symlink.
            let is_dir = entry.file_type().is_dir()
                || (entry.path_is_symlink() && entry.path().is_dir());
            WalkOutcome::Ok {
                path: entry.into_path(),
                is_dir,
            }
        }
        Err(err) => WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        },
    }
}

/// Lazy, non-restartable walk over `root`. Unreadable directories become failure items and the
/// walk carries on with their siblings.
pub struct WalkSource {
    root: PathBuf,
    iter: Box<dyn Iterator<Item = WalkOutcome> + Send>,
    exclude: ExcludeRules,
    cutoff: Option<SystemTime>,
    key_layout: KeyLayout,
}

impl WalkSource {
    /// Fails only when `root` does not exist.
    pub fn new(
        root: &Path,
        exclude: ExcludeRules,
        cutoff: Option<SystemTime>,
        key_layout: KeyLayout,
        follow_links: bool,
    ) -> Result<Self> {
        let root = check_and_canonicalize(root, "path")?;
        let iter = Box::new(
            WalkDir::new(&root)
                .follow_links(follow_links)
                .into_iter()
                .map(to_outcome_walkdir),
        );
        Ok(Self {
            root,
            iter,
            exclude,
            cutoff,
            key_layout,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn destination_key(&self, path: &Path) -> String {
        match self.key_layout {
            KeyLayout::BaseName => base_name_key(path),
            KeyLayout::RelativePath => path_relative_to(path, &self.root)
                .filter(|rel| !rel.as_os_str().is_empty())
                .map(|rel| path_to_key_string(&rel))
                .unwrap_or_else(|| base_name_key(path)),
        }
    }

    /// Turn an admitted file into an item. `None` when the cutoff skips it.
    fn file_to_item(&self, path: PathBuf) -> Option<ItemDescriptor> {
        let key = self.destination_key(&path);
        match std::fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) if is_older_than(mtime, self.cutoff) => {
                debug!("skipping {} as its mod time is before the cutoff", path.display());
                return None;
            }
            Ok(_) => {}
            Err(source) => {
                let failure = ItemError::Mtime {
                    path: path.clone(),
                    source,
                };
                return Some(ItemDescriptor::failed(path, key, failure));
            }
        }
        debug!("adding {} to be copied", path.display());
        Some(match fingerprint_file(&path) {
            Ok(fp) => ItemDescriptor::new(path, fp, key),
            Err(e) => ItemDescriptor::failed(path, key, e.into()),
        })
    }
}

impl Iterator for WalkSource {
    type Item = ItemDescriptor;

    fn next(&mut self) -> Option<ItemDescriptor> {
        loop {
            match self.iter.next()? {
                WalkOutcome::Ok { is_dir: true, .. } => continue,
                WalkOutcome::Ok { path, .. } => {
                    if self.exclude.is_excluded(&path) {
                        debug!("skipping {}", path.display());
                        continue;
                    }
                    if let Some(item) = self.file_to_item(path) {
                        return Some(item);
                    }
                }
                WalkOutcome::Err { msg, path } => {
                    warn!("walk error, skipping: {}", msg);
                    let path = path.unwrap_or_else(|| self.root.clone());
                    let key = path_to_key_string(&path);
                    return Some(ItemDescriptor::failed(path, key, ItemError::Walk(msg)));
                }
            }
        }
    }
}
