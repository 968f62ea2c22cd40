//! Identity provider backed by a hosted REST service.
//!
//! The wire format is the Identity Toolkit protocol spoken by Firebase
//! Authentication and its emulator: JSON POSTs to `accounts:*` endpoints
//! with the project's API key as a query parameter, and errors reported as
//! an upper-snake-case code in the response body.

use std::time::Duration;

use reqwest::Client;
use rocket::serde::json::serde_json::{json, Value};
use rocket::tokio::time::timeout;
use serde::Deserialize;

use super::{IdentityProvider, ProviderError, ProviderIdentity};

/// Longest we will wait for one round trip to the identity service.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity provider speaking the Identity Toolkit REST protocol.
#[derive(Debug, Clone)]
pub struct RestIdentityProvider {
    http: Client,
    base_url: String,
    api_key: String,
    deadline: Duration,
}

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(rename = "localId")]
    local_id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    #[serde(rename = "idToken")]
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct LookupUser {
    #[serde(rename = "localId")]
    local_id: String,
    email: String,
    #[serde(rename = "emailVerified", default)]
    email_verified: bool,
}

#[derive(Debug, Deserialize)]
struct OobResponse {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl RestIdentityProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self::with_deadline(base_url, api_key, PROVIDER_TIMEOUT)
    }

    fn with_deadline(base_url: String, api_key: String, deadline: Duration) -> Self {
        Self {
            http: Client::new(),
            base_url,
            api_key,
            deadline,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.base_url.trim_end_matches('/'),
            method,
            self.api_key
        )
    }

    /// One bounded round trip. A service that accepts the connection and
    /// never answers must not suspend a login forever, so the whole exchange
    /// runs against a deadline, just like storage operations do.
    async fn call<T>(&self, method: &str, body: Value) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        match timeout(self.deadline, self.exchange(method, body)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unavailable(format!(
                "accounts:{method} did not respond in time"
            ))),
        }
    }

    async fn exchange<T>(&self, method: &str, body: Value) -> Result<T, ProviderError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))
        } else {
            match response.json::<ApiErrorBody>().await {
                Ok(body) => Err(provider_error(&body.error.message)),
                Err(_) => Err(ProviderError::Unavailable(format!(
                    "unexpected {status} response from accounts:{method}"
                ))),
            }
        }
    }

    /// Fetch the account record behind a session token.
    ///
    /// Signing in does not report verification state, so every credential
    /// check is followed by a lookup.
    async fn lookup(&self, id_token: &str) -> Result<ProviderIdentity, ProviderError> {
        let response: LookupResponse = self
            .call("lookup", json!({ "idToken": id_token }))
            .await?;
        let user = response.users.into_iter().next().ok_or_else(|| {
            ProviderError::Unavailable("accounts:lookup returned no users".to_string())
        })?;
        Ok(ProviderIdentity {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
        })
    }
}

/// Map the provider's error code to our own vocabulary. The code may carry
/// a suffix, e.g. "TOO_MANY_ATTEMPTS_TRY_LATER : ...", so match on prefixes.
fn provider_error(message: &str) -> ProviderError {
    const CREDENTIAL_CODES: [&str; 3] =
        ["EMAIL_NOT_FOUND", "INVALID_PASSWORD", "INVALID_LOGIN_CREDENTIALS"];
    const TOKEN_CODES: [&str; 2] = ["INVALID_OOB_CODE", "EXPIRED_OOB_CODE"];

    if message.starts_with("EMAIL_EXISTS") {
        ProviderError::EmailTaken
    } else if CREDENTIAL_CODES.iter().any(|code| message.starts_with(code)) {
        ProviderError::InvalidCredential
    } else if TOKEN_CODES.iter().any(|code| message.starts_with(code)) {
        ProviderError::TokenInvalid
    } else {
        ProviderError::Unavailable(message.to_string())
    }
}

#[rocket::async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let response: SignUpResponse = self
            .call(
                "signUp",
                json!({
                    "email": email,
                    "password": password,
                    "displayName": display_name,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(ProviderIdentity {
            uid: response.local_id,
            email: response.email,
            email_verified: false,
        })
    }

    async fn verify_credential(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderIdentity, ProviderError> {
        let response: SignInResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        self.lookup(&response.id_token).await
    }

    async fn send_verification_email(&self, email: &str) -> Result<(), ProviderError> {
        let _: OobResponse = self
            .call(
                "sendOobCode",
                json!({
                    "requestType": "VERIFY_EMAIL",
                    "email": email,
                }),
            )
            .await?;
        Ok(())
    }

    async fn exchange_verification_token(&self, token: &str) -> Result<String, ProviderError> {
        let response: OobResponse = self.call("update", json!({ "oobCode": token })).await?;
        Ok(response.email)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        let _: OobResponse = self
            .call(
                "sendOobCode",
                json!({
                    "requestType": "PASSWORD_RESET",
                    "email": email,
                }),
            )
            .await?;
        Ok(())
    }

    async fn delete_identity(&self, email: &str, password: &str) -> Result<(), ProviderError> {
        // accounts:delete wants the identity's own session token.
        let response: SignInResponse = self
            .call(
                "signInWithPassword",
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        let _: Value = self
            .call("delete", json!({ "idToken": response.id_token }))
            .await?;
        Ok(())
    }
}
