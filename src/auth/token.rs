use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::auth::demo::{is_demo_subject, DemoDirectory, DemoUser};
use crate::config::Config;
use crate::error::Error;
use crate::model::{
    account::{Account, Role},
    id::Id,
};
use crate::store::Store;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// The role requirement a route places on its caller.
pub trait AccessLevel {
    /// Does the given role satisfy this level?
    fn permits(role: Role) -> bool;
}

/// Any signed-in user.
pub struct AnyLevel;

/// Students only.
pub struct StudentLevel;

/// Election officers and administrators.
pub struct OfficerLevel;

/// Administrators only.
pub struct AdminLevel;

impl AccessLevel for AnyLevel {
    fn permits(_role: Role) -> bool {
        true
    }
}

impl AccessLevel for StudentLevel {
    fn permits(role: Role) -> bool {
        role == Role::Student
    }
}

impl AccessLevel for OfficerLevel {
    fn permits(role: Role) -> bool {
        matches!(role, Role::Officer | Role::Admin)
    }
}

impl AccessLevel for AdminLevel {
    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

/// An authentication token representing a signed-in user.
///
/// The subject is the account's database ID, or the fixed UID of a demo
/// user; the two are distinguished by [`is_demo_subject`].
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken<L> {
    pub sub: String,
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<L>,
}

impl AuthToken<AnyLevel> {
    /// Create a token for the given account.
    pub fn for_account(account: &Account) -> Self {
        Self {
            sub: account.id.to_string(),
            role: account.role,
            phantom: PhantomData,
        }
    }

    /// Create a token for the given demo user.
    pub fn for_demo(user: &DemoUser) -> Self {
        Self {
            sub: user.uid.to_string(),
            role: user.role,
            phantom: PhantomData,
        }
    }
}

impl<L> AuthToken<L> {
    /// Is this a demo session?
    pub fn is_demo(&self) -> bool {
        is_demo_subject(&self.sub)
    }

    /// The account ID of the bearer, unless this is a demo session.
    pub fn account_id(&self) -> Option<Id> {
        if self.is_demo() {
            None
        } else {
            self.sub.parse().ok()
        }
    }

    /// Serialize this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<L>>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<L> {
    #[serde(flatten, bound = "")]
    token: AuthToken<L>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, L> FromRequest<'r> for AuthToken<L>
where
    L: AccessLevel + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and verify that its bearer
    /// satisfies this route's access level and still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));

        // Decode the token.
        let token: Self = try_outcome!(Self::from_cookie(cookie, config).or_forward(()));

        // Check the bearer's role satisfies this route's access level.
        if !L::permits(token.role) {
            return Outcome::Forward(());
        }

        // Check the user still exists.
        if token.is_demo() {
            // Unwrap is safe as `DemoDirectory` is always managed.
            let demo = req.guard::<&State<DemoDirectory>>().await.unwrap();
            match demo.by_uid(&token.sub) {
                Some(_) => Outcome::Success(token),
                None => Outcome::Forward(()),
            }
        } else {
            let Some(id) = token.account_id() else {
                return Outcome::Forward(());
            };
            // Unwrap is safe as the store is always managed.
            let store = req.guard::<&State<Arc<dyn Store>>>().await.unwrap();
            match store.account(id).await {
                Ok(Some(account)) if account.is_active => Outcome::Success(token),
                Ok(_) => Outcome::Forward(()),
                Err(e) => Outcome::Failure((Status::InternalServerError, e.into())),
            }
        }
    }
}
