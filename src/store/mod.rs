//! Storage abstraction.
//!
//! All persistent state goes through the [`Store`] trait, so the election
//! logic can run against MongoDB in production and an in-memory table set in
//! tests. Both implementations promise the same atomicity: `cast_vote` either
//! applies all three of its writes or none of them, and `review_application`
//! only ever moves an application out of `pending` once.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mongodb::error::Error as DbError;
use rocket::tokio::time::timeout;
use thiserror::Error;

use crate::model::{
    account::{Account, NewAccount},
    application::{ApplicationStatus, CandidateApplication, NewApplication, ReviewUpdate},
    election::{Candidate, Election, NewCandidate, NewElection},
    id::Id,
    notification::{NewNotification, Notification, UserType},
    vote::{NewVote, Vote},
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::{ensure_indexes_exist, MongoStore};

/// Longest we will wait for any single storage operation.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound a storage operation to [`STORE_TIMEOUT`].
///
/// A timed-out operation surfaces as [`StoreError::Timeout`]; it is reported
/// to the caller as retryable but never retried here.
pub async fn bounded<T>(
    operation: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    bounded_within(STORE_TIMEOUT, operation).await
}

async fn bounded_within<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

/// A field protected by a unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    StudentId,
    Email,
}

impl Display for UniqueField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::StudentId => write!(f, "student ID"),
            UniqueField::Email => write!(f, "email"),
        }
    }
}

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("Duplicate value for unique {0} field")]
    Duplicate(UniqueField),
    /// The operation exceeded [`STORE_TIMEOUT`].
    #[error("The storage backend did not respond in time")]
    Timeout,
    /// Anything else the database reported.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// How the vote transaction ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CastOutcome {
    /// All three writes landed atomically.
    Cast(Vote),
    /// The voter already holds a ballot in this election; nothing was written.
    AlreadyVoted,
    /// No such candidate in this election; nothing was written.
    CandidateMissing,
}

/// The persistence operations the portal needs.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    // Accounts.

    /// Insert a new account. The unique indexes on student ID and email are
    /// the real duplicate-registration enforcement; advisory pre-checks
    /// elsewhere only improve error messages.
    async fn insert_account(&self, account: &NewAccount) -> Result<Account, StoreError>;

    async fn account(&self, id: Id) -> Result<Option<Account>, StoreError>;

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn account_by_student_id(&self, student_id: &str)
        -> Result<Option<Account>, StoreError>;

    /// Record that the account's email address has been verified.
    /// Returns the updated account, or `None` if it does not exist.
    async fn mark_email_verified(&self, id: Id) -> Result<Option<Account>, StoreError>;

    /// Record a successful sign-in: bump the counter, set the timestamp.
    async fn record_login(&self, id: Id, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Flag the account behind the given student ID as an approved candidate.
    async fn mark_candidate(&self, student_id: &str) -> Result<(), StoreError>;

    // Elections.

    async fn insert_election(&self, election: &NewElection) -> Result<Election, StoreError>;

    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError>;

    /// All elections, newest first.
    async fn elections(&self) -> Result<Vec<Election>, StoreError>;

    async fn insert_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, StoreError>;

    async fn candidates_for(&self, election_id: Id) -> Result<Vec<Candidate>, StoreError>;

    // Votes.

    /// Atomically: mark the voter as having voted in the election, insert the
    /// ballot, and bump the candidate tally. The already-voted check is part
    /// of the atomic unit, so two concurrent casts by the same voter cannot
    /// both succeed.
    async fn cast_vote(&self, vote: &NewVote) -> Result<CastOutcome, StoreError>;

    async fn votes_for_election(&self, election_id: Id) -> Result<Vec<Vote>, StoreError>;

    // Candidate applications.

    async fn insert_application(
        &self,
        application: &NewApplication,
    ) -> Result<CandidateApplication, StoreError>;

    async fn application(&self, id: Id) -> Result<Option<CandidateApplication>, StoreError>;

    /// All applications, optionally filtered by status, newest first.
    async fn applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<CandidateApplication>, StoreError>;

    async fn applications_by_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<CandidateApplication>, StoreError>;

    /// Apply a review decision iff the application is still pending.
    /// Returns the updated application, or `None` if it was not pending
    /// (including if it does not exist).
    async fn review_application(
        &self,
        id: Id,
        update: &ReviewUpdate,
    ) -> Result<Option<CandidateApplication>, StoreError>;

    // Notifications.

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError>;

    async fn notification(&self, id: Id) -> Result<Option<Notification>, StoreError>;

    /// A user's notifications, newest first.
    async fn notifications_for(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn count_unread_notifications(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<u64, StoreError>;

    /// Returns the updated notification, or `None` if it does not exist.
    async fn mark_notification_read(&self, id: Id) -> Result<Option<Notification>, StoreError>;

    /// Returns whether anything was deleted.
    async fn delete_notification(&self, id: Id) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use super::*;

    #[rocket::async_test]
    async fn results_inside_the_limit_pass_through() {
        let result = bounded_within(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[rocket::async_test]
    async fn hung_operations_surface_as_timeouts() {
        let result: Result<(), StoreError> =
            bounded_within(Duration::from_millis(10), pending()).await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }
}
