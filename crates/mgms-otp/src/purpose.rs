//! The scope tag separating the verification and password-reset flows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What an issued code may be used for.
///
/// A code issued for one purpose is invisible to the other, so a
/// registration code cannot be replayed to reset a password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OtpPurpose {
    Verification,
    PasswordReset,
}

impl OtpPurpose {
    /// Stable string form, also used as the storage key component.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verification => "verification",
            Self::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OtpPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verification" => Ok(Self::Verification),
            "password-reset" => Ok(Self::PasswordReset),
            other => Err(format!(
                "unknown purpose {other:?}; expected \"verification\" or \"password-reset\""
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        for purpose in [OtpPurpose::Verification, OtpPurpose::PasswordReset] {
            assert_eq!(purpose.as_str().parse::<OtpPurpose>().unwrap(), purpose);
        }
    }

    #[test]
    fn rejects_unknown_purpose() {
        assert!("login".parse::<OtpPurpose>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&OtpPurpose::PasswordReset).unwrap();
        assert_eq!(json, "\"password-reset\"");
    }
}
