//! Account types for students, election officers and administrators.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::{
    datetime::opt_chrono_datetime_as_bson_datetime,
    email::StudentEmail,
    id::Id,
};

/// What an account is allowed to do.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A registered student; may vote and apply for candidacy.
    Student,
    /// An election officer; reviews candidate applications.
    Officer,
    /// A system administrator; everything an officer can do and more.
    Admin,
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        to_bson(&role).expect("Serialisation is infallible")
    }
}

/// Core account data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCore {
    /// Student number, taken from the email's local part. Unique.
    pub student_id: String,
    /// University email address. Unique.
    pub email: StudentEmail,
    /// Display name.
    pub full_name: String,
    /// Optional contact number.
    pub phone: Option<String>,
    /// Permission level.
    pub role: Role,
    /// Whether ownership of the email address has been proven.
    pub email_verified: bool,
    /// Deactivated accounts cannot sign in.
    pub is_active: bool,
    /// Demo accounts exist for walkthroughs and may never vote.
    pub is_demo: bool,
    /// Set once a candidate application has been approved.
    pub is_candidate: bool,
    /// Whether the account has voted in at least one election.
    pub has_voted: bool,
    /// Elections this account has already voted in.
    pub voted_elections: Vec<Id>,
    /// Number of successful sign-ins.
    pub login_count: u32,
    /// When the account last successfully signed in.
    #[serde(with = "opt_chrono_datetime_as_bson_datetime")]
    pub last_login: Option<DateTime<Utc>>,
    /// When the account was created.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl AccountCore {
    /// Create a new, unverified student account.
    pub fn new(full_name: String, email: StudentEmail, phone: Option<String>) -> Self {
        Self {
            student_id: email.student_id().to_string(),
            email,
            full_name,
            phone,
            role: Role::Student,
            email_verified: false,
            is_active: true,
            is_demo: false,
            is_candidate: false,
            has_voted: false,
            voted_elections: Vec::new(),
            login_count: 0,
            last_login: None,
            created_at: Utc::now(),
        }
    }
}

/// An account without an ID.
pub type NewAccount = AccountCore;

/// An account from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub account: AccountCore,
}

impl Deref for Account {
    type Target = AccountCore;

    fn deref(&self) -> &Self::Target {
        &self.account
    }
}

impl DerefMut for Account {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.account
    }
}

/// The account data exposed over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: String,
    pub student_id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub email_verified: bool,
    pub is_demo: bool,
}

impl From<&Account> for AccountProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            student_id: account.student_id.clone(),
            email: account.email.to_string(),
            full_name: account.full_name.clone(),
            role: account.role,
            email_verified: account.email_verified,
            is_demo: account.is_demo,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AccountCore {
        pub fn example() -> Self {
            Self::new(
                "Naledi Moyo".to_string(),
                "202207201@ub.ac.bw".parse().expect("Example email is valid"),
                Some("+26771000001".to_string()),
            )
        }

        /// A second, distinct student for multi-account tests.
        pub fn example2() -> Self {
            Self::new(
                "Kabelo Tau".to_string(),
                "202301234@student.ub.bw".parse().expect("Example email is valid"),
                None,
            )
        }
    }

    impl Account {
        pub fn example() -> Self {
            Self {
                id: Id::generate(),
                account: AccountCore::example(),
            }
        }
    }
}
