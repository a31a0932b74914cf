//! Runtime configuration read from the environment.

use std::path::PathBuf;

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// Standard error, so stdout stays clean for JSON output
    #[default]
    Stderr,
    File,
}

impl std::str::FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stderr" => Ok(Self::Stderr),
            "file" => Ok(Self::File),
            other => Err(format!("Unknown log mode '{other}' (expected stderr or file)")),
        }
    }
}

/// Configuration for loading reference data and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthConfig {
    /// Reference data JSON file
    pub reference_path: Option<PathBuf>,
    /// Expected SHA-256 of the reference file (hex)
    pub reference_sha256: Option<String>,
    /// Interpolation profile JSON; UK-WHO built-in when unset
    pub profile_path: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            reference_path: None,
            reference_sha256: None,
            profile_path: None,
            log_mode: LogMode::Stderr,
            log_file: PathBuf::from("lmsgrowth.log"),
        }
    }
}

impl GrowthConfig {
    /// Load config overrides from environment (best-effort).
    ///
    /// Supported:
    /// - LMSGROWTH_REFERENCE_PATH
    /// - LMSGROWTH_REFERENCE_SHA256 (64 hex characters)
    /// - LMSGROWTH_PROFILE_PATH
    /// - LMSGROWTH_LOG_MODE (stderr|file)
    /// - LMSGROWTH_LOG_FILE
    ///
    /// Malformed values are ignored and the default kept.
    #[must_use]
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = non_empty("LMSGROWTH_REFERENCE_PATH") {
            cfg.reference_path = Some(PathBuf::from(v));
        }

        if let Some(v) = non_empty("LMSGROWTH_REFERENCE_SHA256") {
            if v.len() == 64 && v.chars().all(|c| c.is_ascii_hexdigit()) {
                cfg.reference_sha256 = Some(v.to_ascii_lowercase());
            }
        }

        if let Some(v) = non_empty("LMSGROWTH_PROFILE_PATH") {
            cfg.profile_path = Some(PathBuf::from(v));
        }

        if let Some(mode) = non_empty("LMSGROWTH_LOG_MODE").and_then(|v| v.parse().ok()) {
            cfg.log_mode = mode;
        }

        if let Some(v) = non_empty("LMSGROWTH_LOG_FILE") {
            cfg.log_file = PathBuf::from(v);
        }

        cfg
    }
}
