//! Issuance and verification of one-time passcodes.
//!
//! Represents "prove you control this email address" as a short-lived shared
//! secret: a 6-digit code scoped to `(email, purpose)`, good for one use,
//! for ten minutes, with at most five failed guesses.

use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use mgms_core::config::DEFAULT_OTP_TTL_SECS;
use mgms_core::unix_timestamp;

use crate::OtpError;
use crate::mailer::Mailer;
use crate::purpose::OtpPurpose;
use crate::store::OtpDatabase;

/// Failed verification attempts allowed before a key is exhausted.
pub const MAX_ATTEMPTS: i64 = 5;

/// One-time passcode lifecycle manager.
pub struct OtpManager {
    db: OtpDatabase,
    /// `None` means the mail channel is not configured; issuance then falls
    /// back to surfacing the code through operational logs.
    mailer: Option<Arc<dyn Mailer>>,
    ttl_secs: i64,
}

impl OtpManager {
    pub fn new(db: OtpDatabase, mailer: Option<Arc<dyn Mailer>>) -> Self {
        Self {
            db,
            mailer,
            ttl_secs: DEFAULT_OTP_TTL_SECS,
        }
    }

    /// Override the code lifetime (seconds).
    #[must_use]
    pub const fn with_ttl_secs(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Issue a fresh code for `(email, purpose)`.
    ///
    /// Upserts the record (replacing any outstanding code and resetting the
    /// attempt counter), then delivers the code through the mail channel.
    /// With no channel configured the code is logged for operator retrieval
    /// and issuance still succeeds; a configured channel that fails to send
    /// is a hard [`OtpError::Delivery`] error, since the caller cannot
    /// assume the user received the code.
    ///
    /// Returns the generated code for testability and local fallback.
    pub async fn issue(&self, email: &str, purpose: OtpPurpose) -> Result<String, OtpError> {
        let email = normalize_email(email);
        let code = generate_code();
        let now = unix_timestamp();

        // Opportunistic sweep, standing in for a store-level TTL index.
        self.db.purge_expired(now).await?;

        self.db
            .upsert_code(&email, purpose, &code, now + self.ttl_secs, now)
            .await?;

        match &self.mailer {
            Some(mailer) => {
                mailer
                    .send_code(&email, &code, purpose)
                    .await
                    .map_err(|e| OtpError::Delivery(e.to_string()))?;
            }
            None => {
                warn!(
                    email = %email,
                    purpose = %purpose,
                    code = %code,
                    "Mail channel not configured; code available in logs only"
                );
            }
        }

        info!(email = %email, purpose = %purpose, "One-time code issued");
        Ok(code)
    }

    /// Verify a code for `(email, purpose)`.
    ///
    /// Check order is significant and fixed: missing record, then attempt
    /// limit, then expiry, then code equality. A sixth attempt is rejected
    /// outright even when the supplied code is correct; an expired record is
    /// deleted on detection so later attempts collapse to [`OtpError::NotFound`];
    /// a mismatch increments the persisted counter and keeps the record so
    /// the user can retry up to the limit. Success consumes the record.
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<(), OtpError> {
        let email = normalize_email(email);
        let code = code.trim();

        let record = self
            .db
            .get_code(&email, purpose)
            .await?
            .ok_or(OtpError::NotFound)?;

        if record.attempts >= MAX_ATTEMPTS {
            return Err(OtpError::TooManyAttempts);
        }

        let now = unix_timestamp();
        if now > record.expires_at {
            self.db.delete_code(&email, purpose).await?;
            return Err(OtpError::Expired);
        }

        if record.code != code {
            self.db.increment_attempts(&email, purpose).await?;
            return Err(OtpError::InvalidCode);
        }

        // One-time use: consuming the code returns the key to "absent".
        self.db.delete_code(&email, purpose).await?;
        info!(email = %email, purpose = %purpose, "One-time code verified");
        Ok(())
    }
}

/// Canonical form of an address key: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 6-digit code, uniform in [100000, 999999].
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::mailer::MailerError;

    use super::*;

    /// Records every send; never fails.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String, OtpPurpose)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_code(
            &self,
            email: &str,
            code: &str,
            purpose: OtpPurpose,
        ) -> Result<(), MailerError> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), code.to_string(), purpose));
            Ok(())
        }
    }

    /// A configured channel whose sends always fail.
    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send_code(&self, _: &str, _: &str, _: OtpPurpose) -> Result<(), MailerError> {
            Err(MailerError::Transport("connection refused".to_string()))
        }
    }

    async fn test_manager() -> OtpManager {
        let db = OtpDatabase::open_in_memory().await.unwrap();
        OtpManager::new(db, None)
    }

    /// Backdate the stored expiry so the next verify sees a dead record.
    async fn expire_record(manager: &OtpManager, email: &str, purpose: OtpPurpose) {
        sqlx::query("UPDATE otp_codes SET expires_at = ? WHERE email = ? AND purpose = ?")
            .bind(unix_timestamp() - 1)
            .bind(email)
            .bind(purpose.as_str())
            .execute(manager.db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn issue_creates_single_live_record() {
        let manager = test_manager().await;
        let code = manager
            .issue("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap();

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let record = manager
            .db
            .get_code("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.attempts, 0);

        let remaining = record.expires_at - unix_timestamp();
        assert!((595..=600).contains(&remaining), "expiry ~10 minutes out");
    }

    #[tokio::test]
    async fn issue_delivers_through_mailer() {
        let db = OtpDatabase::open_in_memory().await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let manager = OtpManager::new(db, Some(mailer.clone()));

        let code = manager
            .issue("  A@X.com ", OtpPurpose::Verification)
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        // Delivery sees the normalized address and the stored code.
        assert_eq!(sent[0].0, "a@x.com");
        assert_eq!(sent[0].1, code);
        assert_eq!(sent[0].2, OtpPurpose::Verification);
    }

    #[tokio::test]
    async fn reissue_invalidates_previous_code() {
        let manager = test_manager().await;
        let first = manager
            .issue("a@x.com", OtpPurpose::Verification)
            .await
            .unwrap();
        let second = manager
            .issue("a@x.com", OtpPurpose::Verification)
            .await
            .unwrap();

        if first != second {
            let err = manager
                .verify("a@x.com", &first, OtpPurpose::Verification)
                .await
                .unwrap_err();
            assert!(matches!(err, OtpError::InvalidCode));
        }

        manager
            .verify("a@x.com", &second, OtpPurpose::Verification)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn verify_succeeds_exactly_once() {
        let manager = test_manager().await;
        let code = manager
            .issue("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap();

        manager
            .verify("a@x.com", &code, OtpPurpose::PasswordReset)
            .await
            .unwrap();

        let err = manager
            .verify("a@x.com", &code, OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn wrong_guess_increments_attempts_then_correct_code_succeeds() {
        let manager = test_manager().await;
        let code = manager
            .issue("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap();

        let wrong = if code == "000000" { "000001" } else { "000000" };
        let err = manager
            .verify("a@x.com", wrong, OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::InvalidCode));

        let record = manager
            .db
            .get_code("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.attempts, 1);

        manager
            .verify("a@x.com", &code, OtpPurpose::PasswordReset)
            .await
            .unwrap();

        let err = manager
            .verify("a@x.com", "111111", OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn sixth_attempt_fails_even_with_correct_code() {
        let manager = test_manager().await;
        let code = manager
            .issue("a@x.com", OtpPurpose::Verification)
            .await
            .unwrap();

        let wrong = if code == "000000" { "000001" } else { "000000" };
        for _ in 0..MAX_ATTEMPTS {
            let err = manager
                .verify("a@x.com", wrong, OtpPurpose::Verification)
                .await
                .unwrap_err();
            assert!(matches!(err, OtpError::InvalidCode));
        }

        let err = manager
            .verify("a@x.com", &code, OtpPurpose::Verification)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::TooManyAttempts));
    }

    #[tokio::test]
    async fn expired_code_is_rejected_and_removed() {
        let manager = test_manager().await;
        let code = manager
            .issue("a@x.com", OtpPurpose::Verification)
            .await
            .unwrap();

        expire_record(&manager, "a@x.com", OtpPurpose::Verification).await;

        // Correctness of the supplied code does not matter once expired.
        let err = manager
            .verify("a@x.com", &code, OtpPurpose::Verification)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::Expired));

        let err = manager
            .verify("a@x.com", &code, OtpPurpose::Verification)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn code_is_scoped_to_its_purpose() {
        let manager = test_manager().await;
        let code = manager
            .issue("a@x.com", OtpPurpose::Verification)
            .await
            .unwrap();

        let err = manager
            .verify("a@x.com", &code, OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::NotFound));
    }

    #[tokio::test]
    async fn issue_purges_other_expired_keys() {
        let manager = test_manager().await;
        manager
            .issue("stale@x.com", OtpPurpose::Verification)
            .await
            .unwrap();
        expire_record(&manager, "stale@x.com", OtpPurpose::Verification).await;

        manager
            .issue("fresh@x.com", OtpPurpose::Verification)
            .await
            .unwrap();

        assert!(manager
            .db
            .get_code("stale@x.com", OtpPurpose::Verification)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn failing_configured_channel_is_a_hard_error() {
        let db = OtpDatabase::open_in_memory().await.unwrap();
        let manager = OtpManager::new(db, Some(Arc::new(FailingMailer)));

        let err = manager
            .issue("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap_err();
        assert!(matches!(err, OtpError::Delivery(_)));

        // The record was written before the send, so the code issued over a
        // side channel would still verify.
        let record = manager
            .db
            .get_code("a@x.com", OtpPurpose::PasswordReset)
            .await
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn unconfigured_channel_is_soft() {
        let manager = test_manager().await;
        // No mailer at all: issuance succeeds and returns the code.
        let code = manager
            .issue("a@x.com", OtpPurpose::Verification)
            .await
            .unwrap();
        manager
            .verify("a@x.com", &code, OtpPurpose::Verification)
            .await
            .unwrap();
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  User@Example.COM "), "user@example.com");
    }

    #[test]
    fn generated_codes_stay_in_range() {
        for _ in 0..100 {
            let code = generate_code();
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }
}
