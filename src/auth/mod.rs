//! Authentication: password rules, failed-login lockout, demo logins, and
//! the session token issued once credentials check out.

pub mod demo;
pub mod gate;
pub mod password;
pub mod token;

pub use demo::{DemoDirectory, DemoUser, DEMO_UID_PREFIX};
pub use gate::{CredentialGate, MAX_FAILED_ATTEMPTS};
pub use token::{AccessLevel, AdminLevel, AnyLevel, AuthToken, OfficerLevel, StudentLevel, AUTH_TOKEN_COOKIE};
