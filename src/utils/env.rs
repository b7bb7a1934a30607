// src/utils/env.rs - .env discovery for the binaries
use log::{debug, info, warn};
use std::path::Path;

const ENV_PATHS: [&str; 3] = [".env", ".env.local", "../.env"];

/// Loads the first `.env` file found. Variables already set in the process
/// environment win over file values. Returns the path that was loaded.
pub fn load_env() -> Option<&'static str> {
    for path in ENV_PATHS.iter() {
        if !Path::new(path).exists() {
            continue;
        }
        match dotenv::from_path(path) {
            Ok(()) => {
                info!("Loaded environment variables from {}", path);
                return Some(path);
            }
            Err(e) => warn!("Failed to load environment from {}: {}", path, e),
        }
    }
    debug!("No .env file found, using environment variables from system");
    None
}

/// Reads `key` and parses it, falling back to `default` when unset or unparsable.
pub(crate) fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparsable {}='{}', using default", key, raw);
                default
            }
        },
        None => default,
    }
}

/// Process-environment lookup used by every `from_env`.
pub(crate) fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
