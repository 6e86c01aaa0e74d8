//! Load `.s3ship.toml` (CLI only). Lib callers build [`Opts`](crate::Opts) directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::tools::parse_cutoff;
use crate::utils::config::PackagePaths;
use crate::{ConcurrencyPolicy, KeyLayout, Opts};

#[derive(Debug, Default, Deserialize)]
pub struct S3shipToml {
    #[serde(default)]
    pub settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsSection {
    path: Option<PathBuf>,
    input_csv: Option<PathBuf>,
    exclude: Option<Vec<String>>,
    newer_than: Option<String>,
    workers: Option<usize>,
    policy: Option<ConcurrencyPolicy>,
    preserve_tree: Option<bool>,
    follow_links: Option<bool>,
    verbose: Option<bool>,
    output_success: Option<PathBuf>,
    output_failure: Option<PathBuf>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub sse_c: Option<String>,
    pub local_store: Option<PathBuf>,
}

impl S3shipToml {
    pub fn verbose(&self) -> Option<bool> {
        self.settings.verbose
    }
}

/// Load the config file: `explicit` if given, else `.s3ship.toml` in `dir` if present.
/// A missing default file is `Ok(None)`; unreadable or invalid files are errors and the caller
/// decides whether they are fatal.
pub fn load_s3ship_toml(explicit: Option<&Path>, dir: &Path) -> Result<Option<S3shipToml>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = dir.join(PackagePaths::get().config_filename());
            if !path.is_file() {
                return Ok(None);
            }
            path
        }
    };
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let parsed = toml::from_str(&s).with_context(|| format!("parse config {}", path.display()))?;
    Ok(Some(parsed))
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($idx:expr, $opts:expr, $idx_field:ident => $opts_field:ident) => {
        if let Some(v) = $idx.$idx_field.clone() {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// dry_run and the SSE-C key are never read from the file.
pub fn apply_file_to_opts(file: &S3shipToml, opts: &mut Opts) -> Result<()> {
    let s = &file.settings;
    apply_file_opt!(s, opts, path => path);
    if let Some(ref p) = s.input_csv {
        opts.manifest = Some(p.clone());
    }
    apply_file_opt!(s, opts, exclude => exclude);
    if let Some(ref t) = s.newer_than {
        opts.newer_than = parse_cutoff(t)?;
    }
    apply_file_opt!(s, opts, workers => workers);
    apply_file_opt!(s, opts, policy => policy);
    if let Some(preserve) = s.preserve_tree {
        opts.key_layout = if preserve {
            KeyLayout::RelativePath
        } else {
            KeyLayout::BaseName
        };
    }
    apply_file_opt!(s, opts, follow_links => follow_links);
    apply_file_opt!(s, opts, verbose => verbose);
    apply_file_opt!(s, opts, output_success => output_success);
    apply_file_opt!(s, opts, output_failure => output_failure);
    Ok(())
}
