//! An in-process identity provider for tests and offline demos.

use std::collections::HashMap;

use rocket::tokio::sync::Mutex;

use super::{IdentityProvider, ProviderError, ProviderIdentity};

#[derive(Debug, Clone)]
struct LocalIdentity {
    uid: String,
    password: String,
    email_verified: bool,
}

#[derive(Debug, Default)]
struct State {
    /// Identities, keyed by normalised email.
    identities: HashMap<String, LocalIdentity>,
    /// Outstanding verification tokens, each mapping to an email.
    tokens: HashMap<String, String>,
}

/// Identity provider backed by process-local maps.
///
/// No email is ever sent; tests mint verification tokens directly with
/// [`issue_verification_token`](Self::issue_verification_token), standing in
/// for the link a real provider would email out.
#[derive(Debug, Default)]
pub struct LocalIdentityProvider {
    state: Mutex<State>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a verification token for the given email.
    pub async fn issue_verification_token(&self, email: &str) -> String {
        let token = format!("verify-{:032x}", rand::random::<u128>());
        let mut state = self.state.lock().await;
        state.tokens.insert(token.clone(), normalise(email));
        token
    }
}

fn normalise(email: &str) -> String {
    email.trim().to_lowercase()
}

#[rocket::async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        _display_name: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let email = normalise(email);
        let mut state = self.state.lock().await;
        if state.identities.contains_key(&email) {
            return Err(ProviderError::EmailTaken);
        }
        let uid = format!("local-{:032x}", rand::random::<u128>());
        state.identities.insert(
            email.clone(),
            LocalIdentity {
                uid: uid.clone(),
                password: password.to_string(),
                email_verified: false,
            },
        );
        Ok(ProviderIdentity {
            uid,
            email,
            email_verified: false,
        })
    }

    async fn verify_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let email = normalise(email);
        let state = self.state.lock().await;
        // Unknown email and wrong password are indistinguishable on purpose.
        let identity = state
            .identities
            .get(&email)
            .filter(|identity| identity.password == password)
            .ok_or(ProviderError::InvalidCredential)?;
        Ok(ProviderIdentity {
            uid: identity.uid.clone(),
            email,
            email_verified: identity.email_verified,
        })
    }

    async fn send_verification_email(&self, _email: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn exchange_verification_token(&self, token: &str) -> Result<String, ProviderError> {
        let mut state = self.state.lock().await;
        // Tokens are single use; `remove` consumes it whatever happens next.
        let email = state
            .tokens
            .remove(token)
            .ok_or(ProviderError::TokenInvalid)?;
        if let Some(identity) = state.identities.get_mut(&email) {
            identity.email_verified = true;
        }
        Ok(email)
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn delete_identity(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        let email = normalise(email);
        let mut state = self.state.lock().await;
        match state.identities.get(&email) {
            Some(identity) if identity.password == password => {
                state.identities.remove(&email);
                Ok(())
            }
            _ => Err(ProviderError::InvalidCredential),
        }
    }
}
