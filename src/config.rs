//! Service configuration. Every tunable named in the spec gets a field with
//! a sane default, following the teacher's plain-struct-with-`Default`
//! convention rather than reaching for a config-framework dependency.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub server_addr: String,
    /// Upload streaming enforces this bound incrementally (§4.8, §5); a
    /// breach aborts the upload immediately with `FileTooLarge`.
    pub max_upload_size_bytes: u64,
    /// Default row batch size for canonicalize+upsert during import (§4.3,
    /// §4.8: "recommended batch size 1 000-10 000 rows").
    pub import_batch_size: usize,
    /// Canonicalization/hashing is dispatched to a worker pool only once a
    /// batch exceeds this many rows (§5: "CPU-bound... dispatched... when
    /// batches exceed a threshold").
    pub canonicalize_parallel_threshold: usize,
    pub job_poll_interval: Duration,
    pub temp_upload_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/rowledger".to_string(),
            server_addr: "0.0.0.0:8080".to_string(),
            max_upload_size_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB
            import_batch_size: 5_000,
            canonicalize_parallel_threshold: 2_000,
            job_poll_interval: Duration::from_millis(500),
            temp_upload_dir: PathBuf::from("/tmp/rowledger-uploads"),
        }
    }
}

impl Settings {
    /// Overlay environment variables (prefix `ROWLEDGER_`) onto the defaults.
    /// Unset variables keep the default; malformed ones are ignored in favor
    /// of the default rather than failing startup over a single bad knob.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Ok(v) = std::env::var("ROWLEDGER_DATABASE_URL") {
            settings.database_url = v;
        }
        if let Ok(v) = std::env::var("ROWLEDGER_SERVER_ADDR") {
            settings.server_addr = v;
        }
        if let Ok(v) = std::env::var("ROWLEDGER_MAX_UPLOAD_SIZE_BYTES") {
            if let Ok(parsed) = v.parse() {
                settings.max_upload_size_bytes = parsed;
            }
        }
        if let Ok(v) = std::env::var("ROWLEDGER_IMPORT_BATCH_SIZE") {
            if let Ok(parsed) = v.parse() {
                settings.import_batch_size = parsed;
            }
        }
        if let Ok(v) = std::env::var("ROWLEDGER_CANONICALIZE_PARALLEL_THRESHOLD") {
            if let Ok(parsed) = v.parse() {
                settings.canonicalize_parallel_threshold = parsed;
            }
        }
        if let Ok(v) = std::env::var("ROWLEDGER_JOB_POLL_INTERVAL_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                settings.job_poll_interval = Duration::from_millis(parsed);
            }
        }
        if let Ok(v) = std::env::var("ROWLEDGER_TEMP_UPLOAD_DIR") {
            settings.temp_upload_dir = PathBuf::from(v);
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_env() {
        let settings = Settings::default();
        assert_eq!(settings.import_batch_size, 5_000);
        assert!(settings.max_upload_size_bytes > 0);
    }
}
