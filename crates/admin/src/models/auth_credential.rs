//! Identity provider account.

use apolo_core::Uid;

/// An identity provider account (domain type).
///
/// The password is write-only and never read back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCredential {
    /// Provider-assigned ID, stable across password resets.
    pub uid: Uid,
    /// Login email.
    pub email: String,
    /// Whether the email counts as verified.
    pub email_verified: bool,
    /// Whether sign-in is blocked.
    pub disabled: bool,
}
