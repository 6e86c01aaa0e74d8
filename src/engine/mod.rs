//! Engine: CLI surface, fingerprinting and shared tools.

pub mod arg_parser;
pub mod cli;
pub mod hashing;
pub mod progress;
pub mod tools;
pub mod validate;

pub use arg_parser::Cli;
pub use cli::{handle_run, setup_opts};
pub use hashing::{fingerprint_file, hash_reader};
pub use tools::{ExcludeRules, parse_cutoff, split_name_and_extension};
pub use validate::validate_opts;
