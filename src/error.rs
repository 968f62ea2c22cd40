//! The application-wide error type and its HTTP mapping.
//!
//! Every variant carries a message fit for display to the user; the
//! response body pairs it with a stable machine-readable tag. Server-side
//! failures are logged here and reported to the client without internal
//! detail.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{status::Custom, Responder},
    serde::json::Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::ProviderError;
use crate::model::email::EmailParseError;
use crate::store::{StoreError, UniqueField};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The identifier is locked out after too many failed sign-ins.
    #[error("Too many failed attempts. Please try again in {0} minutes.")]
    RateLimited(i64),
    /// The email/password pair was wrong.
    #[error("The email or password you entered is incorrect")]
    InvalidCredential,
    /// Sign-in succeeded but the email is not verified yet.
    #[error("Please verify your email before logging in. Check your inbox for the verification link.")]
    EmailNotVerified,
    #[error(transparent)]
    InvalidEmailFormat(#[from] EmailParseError),
    /// The password fails one or more strength rules; they are all listed.
    #[error("Password must contain: {}", .0.join(", "))]
    WeakPassword(Vec<String>),
    #[error("This Student ID is already registered")]
    DuplicateStudentId,
    #[error("This email is already registered")]
    DuplicateEmail,
    #[error("Email verification failed. The link may be expired or invalid.")]
    VerificationFailed,
    #[error("You have already voted in this election")]
    AlreadyVoted,
    /// The account does not meet an eligibility rule; the message says which.
    #[error("{0}")]
    NotEligible(String),
    /// The election is not currently accepting votes.
    #[error("{0}")]
    ElectionClosed(String),
    #[error("Demo accounts cannot vote in elections")]
    DemoAccountCannotVote,
    /// The requested review conflicts with the application's current state.
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Rejection reason is required")]
    MissingRejectionReason,
    /// The storage backend did not answer in time. Carries no detail; the
    /// cause is logged when the response is built.
    #[error("The service is temporarily unavailable. Please try again.")]
    StorageUnavailable,
    /// The identity provider failed; the field holds the internal reason.
    #[error("The authentication service is temporarily unavailable. Please try again.")]
    ProviderUnavailable(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl Error {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::RateLimited(_) => Status::TooManyRequests,
            Self::InvalidCredential | Self::Unauthorized(_) => Status::Unauthorized,
            Self::EmailNotVerified
            | Self::NotEligible(_)
            | Self::ElectionClosed(_)
            | Self::DemoAccountCannotVote => Status::Forbidden,
            Self::InvalidEmailFormat(_)
            | Self::WeakPassword(_)
            | Self::MissingRejectionReason => Status::UnprocessableEntity,
            Self::DuplicateStudentId
            | Self::DuplicateEmail
            | Self::AlreadyVoted
            | Self::InvalidTransition(_) => Status::Conflict,
            Self::VerificationFailed | Self::BadRequest(_) => Status::BadRequest,
            Self::StorageUnavailable | Self::ProviderUnavailable(_) => Status::ServiceUnavailable,
            Self::NotFound(_) => Status::NotFound,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Db(_) => Status::InternalServerError,
        }
    }

    /// Stable machine-readable tag for the error body.
    fn code(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::InvalidCredential => "invalid_credential",
            Self::EmailNotVerified => "email_not_verified",
            Self::InvalidEmailFormat(_) => "invalid_email_format",
            Self::WeakPassword(_) => "weak_password",
            Self::DuplicateStudentId => "duplicate_student_id",
            Self::DuplicateEmail => "duplicate_email",
            Self::VerificationFailed => "verification_failed",
            Self::AlreadyVoted => "already_voted",
            Self::NotEligible(_) => "not_eligible",
            Self::ElectionClosed(_) => "election_closed",
            Self::DemoAccountCannotVote => "demo_account_cannot_vote",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::MissingRejectionReason => "missing_rejection_reason",
            Self::StorageUnavailable => "storage_unavailable",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::Jwt(_) => "invalid_token",
            Self::Db(_) => "internal_error",
        }
    }

    fn body(&self) -> ErrorBody {
        let message = if self.status() == Status::InternalServerError {
            // Never expose internal failure detail.
            "Something went wrong on our side. Please try again.".to_string()
        } else {
            self.to_string()
        };
        let details = match self {
            Self::WeakPassword(rules) => Some(rules.clone()),
            _ => None,
        };
        ErrorBody {
            error: self.code().to_string(),
            message,
            details,
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error tag.
    pub error: String,
    /// Human-readable message, suitable for display.
    pub message: String,
    /// Individual problems, where there are several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{} {} failed: {:?}", req.method(), req.uri(), self);
        }
        Custom(status, Json(self.body())).respond_to(req)
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::StudentId) => Self::DuplicateStudentId,
            StoreError::Duplicate(UniqueField::Email) => Self::DuplicateEmail,
            StoreError::Timeout => Self::StorageUnavailable,
            StoreError::Db(e) => Self::Db(e),
        }
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidCredential => Self::InvalidCredential,
            ProviderError::EmailTaken => Self::DuplicateEmail,
            ProviderError::TokenInvalid => Self::VerificationFailed,
            ProviderError::Unavailable(reason) => Self::ProviderUnavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_fit_for_display() {
        assert_eq!(
            Error::RateLimited(15).to_string(),
            "Too many failed attempts. Please try again in 15 minutes."
        );
        assert_eq!(
            Error::WeakPassword(vec![
                "one uppercase letter".to_string(),
                "one number".to_string()
            ])
            .to_string(),
            "Password must contain: one uppercase letter, one number"
        );
        assert_eq!(
            Error::DuplicateStudentId.to_string(),
            "This Student ID is already registered"
        );
    }

    #[test]
    fn store_errors_map_to_their_variants() {
        assert!(matches!(
            Error::from(StoreError::Duplicate(UniqueField::StudentId)),
            Error::DuplicateStudentId
        ));
        assert!(matches!(
            Error::from(StoreError::Duplicate(UniqueField::Email)),
            Error::DuplicateEmail
        ));
        assert!(matches!(
            Error::from(StoreError::Timeout),
            Error::StorageUnavailable
        ));
    }

    #[test]
    fn statuses_follow_the_error_class() {
        assert_eq!(Error::RateLimited(1).status(), Status::TooManyRequests);
        assert_eq!(Error::InvalidCredential.status(), Status::Unauthorized);
        assert_eq!(Error::EmailNotVerified.status(), Status::Forbidden);
        assert_eq!(Error::AlreadyVoted.status(), Status::Conflict);
        assert_eq!(
            Error::WeakPassword(Vec::new()).status(),
            Status::UnprocessableEntity
        );
        assert_eq!(Error::StorageUnavailable.status(), Status::ServiceUnavailable);
    }

    #[test]
    fn internal_detail_stays_out_of_the_body() {
        let body = Error::ProviderUnavailable("connection refused".to_string()).body();
        assert_eq!(body.error, "provider_unavailable");
        assert!(!body.message.contains("connection refused"));
    }
}
