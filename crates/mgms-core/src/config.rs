//! Environment-driven configuration for the MGMS backend.
//!
//! All settings come from `MGMS_*` environment variables with typed
//! defaults. SMTP delivery is optional: it counts as configured only when
//! host, username, and password are all present, mirroring how the rest of
//! the system treats a missing mail channel as a soft condition.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default OTP lifetime in seconds (10 minutes).
pub const DEFAULT_OTP_TTL_SECS: i64 = 600;

/// Default SMTP submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Complete MGMS backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Base directory for scratch archive files. Injected (rather than a
    /// hardcoded constant) so tests and deployments can redirect it.
    pub scratch_dir: PathBuf,

    /// Lifetime of an issued one-time code, in seconds.
    pub otp_ttl_secs: i64,

    /// SMTP delivery settings; `None` when the mail channel is not
    /// configured.
    pub smtp: Option<SmtpConfig>,
}

/// SMTP transport settings for outbound one-time-code mail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; defaults to the username when not set explicitly.
    pub from_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/mgms.db"),
            scratch_dir: std::env::temp_dir().join("mgms-archives"),
            otp_ttl_secs: DEFAULT_OTP_TTL_SECS,
            smtp: None,
        }
    }
}

impl Config {
    /// Load configuration from `MGMS_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a closure over a map instead of
    /// mutating process-global environment variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_path = lookup("MGMS_DATABASE_PATH")
            .map_or(defaults.database_path, PathBuf::from);
        let scratch_dir = lookup("MGMS_SCRATCH_DIR").map_or(defaults.scratch_dir, PathBuf::from);
        let otp_ttl_secs = lookup("MGMS_OTP_TTL_SECS")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_OTP_TTL_SECS);

        let smtp = Self::smtp_from_lookup(&lookup);

        Self {
            database_path,
            scratch_dir,
            otp_ttl_secs,
            smtp,
        }
    }

    /// SMTP is configured only when host, username, and password are all
    /// present; a partially set channel is treated as absent.
    fn smtp_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Option<SmtpConfig> {
        let host = non_empty(lookup("MGMS_SMTP_HOST")?)?;
        let username = non_empty(lookup("MGMS_SMTP_USERNAME")?)?;
        let password = non_empty(lookup("MGMS_SMTP_PASSWORD")?)?;

        let port = lookup("MGMS_SMTP_PORT")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);
        let from_address = lookup("MGMS_SMTP_FROM")
            .and_then(non_empty)
            .unwrap_or_else(|| username.clone());

        Some(SmtpConfig {
            host,
            port,
            username,
            password,
            from_address,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
