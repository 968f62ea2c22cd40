//! The external identity provider.
//!
//! Accounts live in our own database, but the email/password credential,
//! email-ownership proof and password resets are delegated to a hosted
//! identity service. Everything the portal needs from that service goes
//! through the [`IdentityProvider`] trait, so tests and offline demos can
//! swap in an in-process implementation.

use serde::{Deserialize, Serialize};

pub mod local;
pub mod rest;

pub use local::LocalIdentityProvider;
pub use rest::RestIdentityProvider;

/// An identity as known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// The provider's stable ID for this identity.
    pub uid: String,
    /// The identity's email address.
    pub email: String,
    /// Whether the provider has proven ownership of the email address.
    pub email_verified: bool,
}

/// Errors from the identity provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The email/password pair was wrong, or no such identity exists.
    #[error("The credential was rejected")]
    InvalidCredential,
    /// An identity with this email already exists.
    #[error("An identity with this email already exists")]
    EmailTaken,
    /// The token was malformed, expired, or already used.
    #[error("The token was rejected")]
    TokenInvalid,
    /// The provider could not be reached or answered nonsense.
    #[error("The identity provider is unavailable: {0}")]
    Unavailable(String),
}

/// Operations the portal needs from its identity provider.
#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a new identity holding the given credential.
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<ProviderIdentity, ProviderError>;

    /// Check a credential, returning the identity it belongs to.
    async fn verify_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError>;

    /// Email the identity a link carrying a single-use verification token.
    async fn send_verification_email(&self, email: &str) -> Result<(), ProviderError>;

    /// Redeem a verification token, marking its identity's email as proven.
    ///
    /// Returns the verified email address. Tokens are single use; redeeming
    /// one a second time fails with [`ProviderError::TokenInvalid`].
    async fn exchange_verification_token(&self, token: &str) -> Result<String, ProviderError>;

    /// Email the identity a password reset link.
    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError>;

    /// Remove an identity again, given its credential.
    ///
    /// Used to roll back a registration whose account insert failed, so the
    /// email address is not left permanently unable to register.
    async fn delete_identity(&self, email: &str, password: &str) -> Result<(), ProviderError>;
}
