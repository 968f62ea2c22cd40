use std::sync::Arc;

use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::{serde_json::json, Json, Value},
    Route, State,
};
use serde::{Deserialize, Serialize};

use crate::api::common::account_from_token;
use crate::auth::{AnyLevel, AuthToken, CredentialGate, DemoDirectory, AUTH_TOKEN_COOKIE};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::account::AccountProfile;
use crate::registry::{IdentityRegistry, SignIn};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![
        register,
        login,
        logout,
        me,
        verify_email,
        resend_verification,
        forgot_password,
    ]
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    full_name: String,
    email: String,
    password: String,
    phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterResponse {
    user: AccountProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    registry: &State<IdentityRegistry>,
) -> Result<Json<RegisterResponse>> {
    let request = request.into_inner();
    let registration = registry
        .register(
            &request.full_name,
            &request.email,
            &request.password,
            request.phone,
        )
        .await?;
    Ok(Json(RegisterResponse {
        user: AccountProfile::from(&registration.account),
        warning: registration.warning,
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[post("/auth/login", data = "<request>", format = "json")]
async fn login(
    request: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    registry: &State<IdentityRegistry>,
    gate: &State<CredentialGate>,
    config: &State<Config>,
) -> Result<Json<AccountProfile>> {
    match registry
        .login(gate, &request.email, &request.password)
        .await?
    {
        SignIn::Demo(user) => {
            cookies.add(AuthToken::for_demo(&user).into_cookie(config));
            Ok(Json(AccountProfile::from(&user)))
        }
        SignIn::Account { account, verified } => {
            // The session is established either way; an unverified user needs
            // it to request a fresh verification email.
            cookies.add(AuthToken::for_account(&account).into_cookie(config));
            if !verified {
                return Err(Error::EmailNotVerified);
            }
            Ok(Json(AccountProfile::from(&account)))
        }
    }
}

#[delete("/auth")]
fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

/// The profile of whoever is signed in.
#[get("/auth/me")]
async fn me(
    token: AuthToken<AnyLevel>,
    store: &State<Arc<dyn Store>>,
    demo: &State<DemoDirectory>,
) -> Result<Json<AccountProfile>> {
    if let Some(user) = demo.by_uid(&token.sub) {
        return Ok(Json(AccountProfile::from(user)));
    }
    let account = account_from_token(&token, store).await?;
    Ok(Json(AccountProfile::from(&account)))
}

#[derive(Debug, Deserialize)]
struct VerifyEmailRequest {
    token: String,
}

#[post("/auth/verify-email", data = "<request>", format = "json")]
async fn verify_email(
    request: Json<VerifyEmailRequest>,
    registry: &State<IdentityRegistry>,
) -> Result<Value> {
    registry.verify_email(&request.token).await?;
    Ok(json!({ "message": "Email verified successfully" }))
}

#[post("/auth/resend-verification")]
async fn resend_verification(
    token: AuthToken<AnyLevel>,
    store: &State<Arc<dyn Store>>,
    registry: &State<IdentityRegistry>,
) -> Result<Value> {
    let account = account_from_token(&token, store).await?;
    registry.resend_verification(&account).await?;
    Ok(json!({ "message": "Verification email sent" }))
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[post("/auth/forgot-password", data = "<request>", format = "json")]
async fn forgot_password(
    request: Json<ForgotPasswordRequest>,
    registry: &State<IdentityRegistry>,
) -> Result<Value> {
    registry.request_password_reset(&request.email).await?;
    Ok(json!({
        "message": "If an account exists with this email, a password reset link has been sent"
    }))
}
