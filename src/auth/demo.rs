//! Built-in demonstration logins.
//!
//! Demo sessions let the portal be shown off without a real university
//! account. Their credentials are checked locally, never against the
//! identity provider, and demo sessions are barred from casting votes.

use argon2::Config;
use rand::Rng;

use crate::model::account::{AccountProfile, Role};

/// Token subjects with this prefix belong to demo users, not accounts.
pub const DEMO_UID_PREFIX: &str = "demo-";

/// A built-in login with a fixed identity and a hashed password.
#[derive(Debug, Clone)]
pub struct DemoUser {
    pub uid: &'static str,
    pub email: &'static str,
    pub full_name: &'static str,
    pub student_id: &'static str,
    pub role: Role,
    password_hash: String,
}

impl DemoUser {
    fn new(
        uid: &'static str,
        email: &'static str,
        full_name: &'static str,
        student_id: &'static str,
        role: Role,
        password: &str,
    ) -> Self {
        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash = argon2::hash_encoded(password.as_bytes(), &salt, &Config::default())
            .unwrap(); // Safe because the default `Config` is valid.
        Self {
            uid,
            email,
            full_name,
            student_id,
            role,
            password_hash,
        }
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the hash was created by `hash_encoded`, so it
        // is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

impl From<&DemoUser> for AccountProfile {
    fn from(user: &DemoUser) -> Self {
        Self {
            id: user.uid.to_string(),
            student_id: user.student_id.to_string(),
            email: user.email.to_string(),
            full_name: user.full_name.to_string(),
            role: user.role,
            email_verified: true,
            is_demo: true,
        }
    }
}

/// The set of demo logins this deployment accepts.
#[derive(Debug, Clone, Default)]
pub struct DemoDirectory {
    users: Vec<DemoUser>,
}

impl DemoDirectory {
    /// The standard demo logins: one admin and one election officer.
    pub fn standard() -> Self {
        Self {
            users: vec![
                DemoUser::new(
                    "demo-admin-001",
                    "admin@ub.ac.bw",
                    "System Administrator",
                    "202400001",
                    Role::Admin,
                    "admin123",
                ),
                DemoUser::new(
                    "demo-officer-001",
                    "officer@ub.ac.bw",
                    "Election Officer",
                    "202400002",
                    Role::Officer,
                    "officer123",
                ),
            ],
        }
    }

    /// A directory that accepts nothing, for deployments with demo logins
    /// switched off.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a demo user by email, case-insensitively.
    pub fn find_by_email(&self, email: &str) -> Option<&DemoUser> {
        let email = email.trim().to_lowercase();
        self.users.iter().find(|user| user.email == email)
    }

    /// Look up a demo user by their token subject.
    pub fn by_uid(&self, uid: &str) -> Option<&DemoUser> {
        self.users.iter().find(|user| user.uid == uid)
    }
}

/// Does this token subject belong to a demo user?
pub fn is_demo_subject(sub: &str) -> bool {
    sub.starts_with(DEMO_UID_PREFIX)
}
