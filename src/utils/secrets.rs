//! SSE-C key loading: command line → env var → .env in dir.

use log::debug;
use std::path::Path;

use crate::utils::config::PackagePaths;

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn try_env_then_dotenv(dir: &Path) -> Option<String> {
    let key = PackagePaths::get().sse_key_env();
    if let Some(s) = std::env::var(key).ok().and_then(non_empty) {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return std::env::var(key).ok().and_then(non_empty);
    }
    None
}

/// Resolve the SSE-C key. `None` means uploads go out without customer encryption.
pub fn get_sse_key(from_cli: Option<&str>, dir: &Path) -> Option<String> {
    if let Some(s) = from_cli.map(str::to_string).and_then(non_empty) {
        return Some(s);
    }
    let found = try_env_then_dotenv(dir);
    if found.is_some() {
        debug!(
            "SSE-C key found in environment ({})",
            PackagePaths::get().sse_key_env()
        );
    }
    found
}
