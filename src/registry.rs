//! Account registration, sign-in, and email verification.
//!
//! The registry coordinates three parties: our own account store, the
//! external identity provider holding the credentials, and the built-in
//! demo directory. Demo emails are checked locally and never reach the
//! provider.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{password::validate_password, CredentialGate, DemoDirectory, DemoUser};
use crate::error::{Error, Result};
use crate::identity::{IdentityProvider, ProviderError};
use crate::model::{
    account::{Account, NewAccount},
    email::StudentEmail,
};
use crate::store::{bounded, Store};

/// A successful registration.
#[derive(Debug)]
pub struct Registration {
    pub account: Account,
    /// Set when the account exists but the verification email failed to go
    /// out; the user should be told to use "resend verification".
    pub warning: Option<String>,
}

/// Who signed in.
#[derive(Debug)]
pub enum SignIn {
    /// A demo user; no account record exists for these.
    Demo(DemoUser),
    /// A real account. `verified` is false when the credential was correct
    /// but the email is still unverified; the session is established either
    /// way.
    Account { account: Account, verified: bool },
}

/// Registration and sign-in flows.
pub struct IdentityRegistry {
    store: Arc<dyn Store>,
    provider: Arc<dyn IdentityProvider>,
    demo: DemoDirectory,
}

impl IdentityRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        provider: Arc<dyn IdentityProvider>,
        demo: DemoDirectory,
    ) -> Self {
        Self {
            store,
            provider,
            demo,
        }
    }

    /// Register a new student account.
    ///
    /// Validation and duplicate checks all run before the first side
    /// effect. The duplicate checks are advisory, for friendly errors; the
    /// store's unique indexes are the real enforcement, so a race here
    /// still cannot produce two accounts.
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        phone: Option<String>,
    ) -> Result<Registration> {
        let email: StudentEmail = email.parse()?;
        validate_password(password)?;

        if bounded(self.store.account_by_student_id(email.student_id()))
            .await?
            .is_some()
        {
            return Err(Error::DuplicateStudentId);
        }
        if bounded(self.store.account_by_email(email.as_str()))
            .await?
            .is_some()
        {
            return Err(Error::DuplicateEmail);
        }

        self.provider
            .create_identity(email.as_str(), password, full_name)
            .await?;

        let account = match bounded(self.store.insert_account(&NewAccount::new(
            full_name.to_string(),
            email.clone(),
            phone,
        )))
        .await
        {
            Ok(account) => account,
            Err(e) => {
                // The insert lost a race or the store is down; remove the
                // identity again so the address can still register later.
                if let Err(rollback) = self.provider.delete_identity(email.as_str(), password).await
                {
                    warn!("Could not roll back the identity for {email}: {rollback}");
                }
                return Err(e.into());
            }
        };
        info!(
            "Registered account {} for student {}",
            account.id, account.student_id
        );

        let warning = match self.provider.send_verification_email(email.as_str()).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Could not send verification email to {email}: {e}");
                Some(
                    "Your account was created, but the verification email could not be sent. \
                     Use \"Resend verification email\" to try again."
                        .to_string(),
                )
            }
        };

        Ok(Registration { account, warning })
    }

    /// Sign in with an email and password.
    ///
    /// The gate covers only the credential check itself. Everything after
    /// it, unverified email included, is a policy matter and must not count
    /// against the identifier's failed-attempt record.
    pub async fn login(
        &self,
        gate: &CredentialGate,
        email: &str,
        password: &str,
    ) -> Result<SignIn> {
        if let Some(user) = self.demo.find_by_email(email) {
            let user = user.clone();
            return gate
                .attempt(email, || async move {
                    if user.verify_password(password) {
                        Ok(SignIn::Demo(user))
                    } else {
                        Err(Error::InvalidCredential)
                    }
                })
                .await;
        }

        let identity = gate
            .attempt(email, || async {
                Ok(self.provider.verify_credential(email, password).await?)
            })
            .await?;

        let account = bounded(self.store.account_by_email(&identity.email))
            .await?
            .ok_or(Error::InvalidCredential)?;
        if !account.is_active {
            return Err(Error::Unauthorized(
                "This account has been deactivated".to_string(),
            ));
        }

        // The provider is authoritative for verification state; pick up a
        // proof that was completed elsewhere.
        let account = if identity.email_verified && !account.email_verified {
            bounded(self.store.mark_email_verified(account.id))
                .await?
                .unwrap_or(account)
        } else {
            account
        };

        let verified = account.email_verified;
        if verified {
            bounded(self.store.record_login(account.id, Utc::now())).await?;
        }
        Ok(SignIn::Account { account, verified })
    }

    /// Redeem an emailed verification token and mark the account verified.
    pub async fn verify_email(&self, token: &str) -> Result<Account> {
        let email = self.provider.exchange_verification_token(token).await?;
        let account = bounded(self.store.account_by_email(&email))
            .await?
            .ok_or(Error::VerificationFailed)?;
        let account = bounded(self.store.mark_email_verified(account.id))
            .await?
            .ok_or(Error::VerificationFailed)?;
        info!("Email verified for account {}", account.id);
        Ok(account)
    }

    /// Send the signed-in account another verification email.
    pub async fn resend_verification(&self, account: &Account) -> Result<()> {
        self.provider
            .send_verification_email(account.email.as_str())
            .await?;
        Ok(())
    }

    /// Email a password reset link.
    ///
    /// Reports success for any well-formed address, so the endpoint cannot
    /// be used to probe which emails are registered.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email: StudentEmail = email.parse()?;
        match self.provider.send_password_reset(email.as_str()).await {
            Ok(()) | Err(ProviderError::InvalidCredential) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
