//! Enumerator: picks a strategy from the options and yields fingerprinted items.

use anyhow::Result;

use crate::engine::tools::ExcludeRules;
use crate::pipeline::manifest::ManifestSource;
use crate::pipeline::walk::WalkSource;
use crate::{ItemDescriptor, Opts};

/// The two enumeration strategies behind one iterator.
pub enum Source {
    Walk(WalkSource),
    Manifest(ManifestSource),
}

impl Source {
    /// Manifest when one is configured, walk otherwise. Errors are setup errors (missing root,
    /// unreadable manifest, bad exclude pattern).
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        match &opts.manifest {
            Some(manifest) => Ok(Source::Manifest(ManifestSource::open(
                manifest,
                opts.newer_than,
            )?)),
            None => {
                let exclude = ExcludeRules::new(&opts.exclude)?;
                Ok(Source::Walk(WalkSource::new(
                    &opts.path,
                    exclude,
                    opts.newer_than,
                    opts.key_layout,
                    opts.follow_links,
                )?))
            }
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        match self {
            Source::Walk(_) => "walk",
            Source::Manifest(_) => "manifest",
        }
    }
}

impl Iterator for Source {
    type Item = ItemDescriptor;

    fn next(&mut self) -> Option<ItemDescriptor> {
        match self {
            Source::Walk(walk) => walk.next(),
            Source::Manifest(manifest) => manifest.next(),
        }
    }
}
