//! One-time passcode lifecycle for the MGMS backend.
//!
//! Issues, stores, and verifies short-lived 6-digit codes tied to an email
//! address and a purpose (email verification or password reset), enforcing
//! expiry and a bounded number of failed attempts. Codes are delivered
//! through a pluggable [`Mailer`]; when no mail channel is configured the
//! code is surfaced through operational logs instead.

pub mod mailer;
pub mod manager;
pub mod purpose;
pub mod store;

pub use mailer::{Mailer, MailerError, SmtpMailer};
pub use manager::{MAX_ATTEMPTS, OtpManager, normalize_email};
pub use purpose::OtpPurpose;
pub use store::{OtpDatabase, OtpRecord};

use mgms_core::DatabaseError;

/// Failures of the OTP lifecycle, surfaced distinctly so callers can map
/// each to its own user-facing message.
#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    /// No live record for the `(email, purpose)` key. Deliberately covers
    /// both "never issued" and "already consumed" so callers do not leak
    /// issuance state.
    #[error("code not found or expired")]
    NotFound,

    /// The attempt limit was reached; only a fresh issue recovers the key.
    #[error("too many failed attempts; request a new code")]
    TooManyAttempts,

    /// The code outlived its window; the record has been removed.
    #[error("code has expired")]
    Expired,

    /// The supplied code did not match; the record remains for retry.
    #[error("invalid code")]
    InvalidCode,

    /// The mail channel is configured but the send failed. The record still
    /// exists, but the caller cannot assume the user received the code.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Storage layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] DatabaseError),
}
