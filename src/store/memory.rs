//! In-memory storage for tests and single-node demo deployments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::model::{
    account::{Account, NewAccount},
    application::{ApplicationStatus, CandidateApplication, NewApplication, ReviewUpdate},
    election::{Candidate, Election, NewCandidate, NewElection},
    id::Id,
    notification::{NewNotification, Notification, UserType},
    vote::{NewVote, Vote},
};

use super::{CastOutcome, Store, StoreError, UniqueField};

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<Id, Account>,
    elections: HashMap<Id, Election>,
    candidates: HashMap<Id, Candidate>,
    votes: HashMap<Id, Vote>,
    applications: HashMap<Id, CandidateApplication>,
    notifications: HashMap<Id, Notification>,
}

/// Storage backed by process-local tables.
///
/// One mutex guards the whole table set, making every operation a critical
/// section. That is slower than MongoDB's document-level concurrency but
/// gives exactly the same observable atomicity, which is what the tests are
/// interested in.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    #[cfg(test)]
    refuse_account_insert: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deactivate an account directly, bypassing the API. There is no
    /// endpoint for this; operators do it in the database.
    #[cfg(test)]
    pub async fn deactivate_account(&self, id: Id) {
        let mut tables = self.tables.lock().await;
        if let Some(account) = tables.accounts.get_mut(&id) {
            account.is_active = false;
        }
    }

    /// Make the next account insert fail as a duplicate, standing in for
    /// losing a unique-index race to a concurrent registration.
    #[cfg(test)]
    pub fn refuse_next_account_insert(&self) {
        self.refuse_account_insert
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn insert_account(&self, account: &NewAccount) -> Result<Account, StoreError> {
        #[cfg(test)]
        if self
            .refuse_account_insert
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StoreError::Duplicate(UniqueField::StudentId));
        }
        let mut tables = self.tables.lock().await;
        if tables
            .accounts
            .values()
            .any(|existing| existing.student_id == account.student_id)
        {
            return Err(StoreError::Duplicate(UniqueField::StudentId));
        }
        if tables
            .accounts
            .values()
            .any(|existing| existing.email == account.email)
        {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        let account = Account {
            id: Id::generate(),
            account: account.clone(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account(&self, id: Id) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .find(|account| account.email.as_str() == email)
            .cloned())
    }

    async fn account_by_student_id(
        &self,
        student_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .find(|account| account.student_id == student_id)
            .cloned())
    }

    async fn mark_email_verified(&self, id: Id) -> Result<Option<Account>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.email_verified = true;
            account.clone()
        }))
    }

    async fn record_login(&self, id: Id, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(account) = tables.accounts.get_mut(&id) {
            account.login_count += 1;
            account.last_login = Some(at);
        }
        Ok(())
    }

    async fn mark_candidate(&self, student_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(account) = tables
            .accounts
            .values_mut()
            .find(|account| account.student_id == student_id)
        {
            account.is_candidate = true;
        }
        Ok(())
    }

    async fn insert_election(&self, election: &NewElection) -> Result<Election, StoreError> {
        let mut tables = self.tables.lock().await;
        let election = Election {
            id: Id::generate(),
            election: election.clone(),
        };
        tables.elections.insert(election.id, election.clone());
        Ok(election)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.elections.get(&id).cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>, StoreError> {
        let tables = self.tables.lock().await;
        let mut elections: Vec<Election> = tables.elections.values().cloned().collect();
        elections.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(elections)
    }

    async fn insert_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, StoreError> {
        let mut tables = self.tables.lock().await;
        let candidate = Candidate {
            id: Id::generate(),
            candidate: candidate.clone(),
        };
        tables.candidates.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn candidates_for(&self, election_id: Id) -> Result<Vec<Candidate>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .candidates
            .values()
            .filter(|candidate| candidate.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn cast_vote(&self, vote: &NewVote) -> Result<CastOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let Tables {
            accounts,
            candidates,
            votes,
            ..
        } = &mut *tables;

        // Validate everything up front so the mutation below is all or
        // nothing, mirroring the MongoDB transaction.
        let account = match accounts.get_mut(&vote.voter_id) {
            Some(account) if !account.voted_elections.contains(&vote.election_id) => account,
            _ => return Ok(CastOutcome::AlreadyVoted),
        };
        if votes
            .values()
            .any(|v| v.voter_id == vote.voter_id && v.election_id == vote.election_id)
        {
            return Ok(CastOutcome::AlreadyVoted);
        }
        let candidate = match candidates.get_mut(&vote.candidate_id) {
            Some(candidate) if candidate.election_id == vote.election_id => candidate,
            _ => return Ok(CastOutcome::CandidateMissing),
        };

        account.voted_elections.push(vote.election_id);
        account.has_voted = true;
        candidate.vote_count += 1;
        candidate.last_updated = vote.voted_at;
        let vote = Vote {
            id: Id::generate(),
            vote: vote.clone(),
        };
        votes.insert(vote.id, vote.clone());
        Ok(CastOutcome::Cast(vote))
    }

    async fn votes_for_election(&self, election_id: Id) -> Result<Vec<Vote>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .values()
            .filter(|vote| vote.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn insert_application(
        &self,
        application: &NewApplication,
    ) -> Result<CandidateApplication, StoreError> {
        let mut tables = self.tables.lock().await;
        let application = CandidateApplication {
            id: Id::generate(),
            application: application.clone(),
        };
        tables.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn application(&self, id: Id) -> Result<Option<CandidateApplication>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.applications.get(&id).cloned())
    }

    async fn applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<CandidateApplication>, StoreError> {
        let tables = self.tables.lock().await;
        let mut applications: Vec<CandidateApplication> = tables
            .applications
            .values()
            .filter(|application| status.map_or(true, |status| application.status == status))
            .cloned()
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }

    async fn applications_by_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<CandidateApplication>, StoreError> {
        let tables = self.tables.lock().await;
        let mut applications: Vec<CandidateApplication> = tables
            .applications
            .values()
            .filter(|application| application.student_id == student_id)
            .cloned()
            .collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(applications)
    }

    async fn review_application(
        &self,
        id: Id,
        update: &ReviewUpdate,
    ) -> Result<Option<CandidateApplication>, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.applications.get_mut(&id) {
            Some(application) if application.status == ApplicationStatus::Pending => {
                application.status = update.status;
                application.reviewed_by = Some(update.reviewed_by.clone());
                application.reviewed_at = Some(update.reviewed_at);
                application.rejection_reason = update.rejection_reason.clone();
                application.updated_at = update.reviewed_at;
                Ok(Some(application.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let mut tables = self.tables.lock().await;
        let notification = Notification {
            id: Id::generate(),
            notification: notification.clone(),
        };
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn notification(&self, id: Id) -> Result<Option<Notification>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.notifications.get(&id).cloned())
    }

    async fn notifications_for(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Vec<Notification>, StoreError> {
        let tables = self.tables.lock().await;
        let mut notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|notification| {
                notification.user_id == user_id && notification.user_type == user_type
            })
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn count_unread_notifications(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .notifications
            .values()
            .filter(|notification| {
                notification.user_id == user_id
                    && notification.user_type == user_type
                    && !notification.is_read
            })
            .count() as u64)
    }

    async fn mark_notification_read(&self, id: Id) -> Result<Option<Notification>, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.notifications.get_mut(&id).map(|notification| {
            notification.is_read = true;
            notification.read_at = Some(Utc::now());
            notification.clone()
        }))
    }

    async fn delete_notification(&self, id: Id) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        Ok(tables.notifications.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        account::AccountCore,
        application::{ApplicationCore, ReviewDecision},
        election::{CandidateCore, ElectionCore},
        notification::NotificationCore,
        vote::VoteCore,
    };

    use super::*;

    async fn seeded_voter_and_election(
        store: &MemoryStore,
    ) -> (Account, Election, Candidate) {
        let mut core = AccountCore::example();
        core.email_verified = true;
        let account = store.insert_account(&core).await.unwrap();
        let election = store
            .insert_election(&ElectionCore::example())
            .await
            .unwrap();
        let candidate = store
            .insert_candidate(&CandidateCore::example(election.id))
            .await
            .unwrap();
        (account, election, candidate)
    }

    #[rocket::async_test]
    async fn rejects_duplicate_student_id_and_email() {
        let store = MemoryStore::new();
        store.insert_account(&AccountCore::example()).await.unwrap();

        // Same student number via the other domain.
        let mut same_id = AccountCore::example2();
        same_id.email = "202207201@student.ub.bw".parse().unwrap();
        same_id.student_id = same_id.email.student_id().to_string();
        assert!(matches!(
            store.insert_account(&same_id).await,
            Err(StoreError::Duplicate(UniqueField::StudentId))
        ));

        // Same email with a student number the store has not seen. The
        // student ID check runs first, so this exercises the email branch.
        let mut same_email = AccountCore::example2();
        same_email.email = AccountCore::example().email;
        assert!(matches!(
            store.insert_account(&same_email).await,
            Err(StoreError::Duplicate(UniqueField::Email))
        ));
    }

    #[rocket::async_test]
    async fn cast_vote_applies_all_three_writes() {
        let store = MemoryStore::new();
        let (account, election, candidate) = seeded_voter_and_election(&store).await;

        let vote = VoteCore::new(
            account.id,
            account.student_id.clone(),
            election.id,
            candidate.id,
        );
        let outcome = store.cast_vote(&vote).await.unwrap();
        let cast = match outcome {
            CastOutcome::Cast(cast) => cast,
            other => panic!("expected Cast, got {other:?}"),
        };
        assert_eq!(cast.candidate_id, candidate.id);

        let account = store.account(account.id).await.unwrap().unwrap();
        assert!(account.has_voted);
        assert!(account.voted_elections.contains(&election.id));
        let candidates = store.candidates_for(election.id).await.unwrap();
        assert_eq!(candidates[0].vote_count, 1);
        assert_eq!(store.votes_for_election(election.id).await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn second_cast_is_rejected() {
        let store = MemoryStore::new();
        let (account, election, candidate) = seeded_voter_and_election(&store).await;

        let vote = VoteCore::new(
            account.id,
            account.student_id.clone(),
            election.id,
            candidate.id,
        );
        assert!(matches!(
            store.cast_vote(&vote).await.unwrap(),
            CastOutcome::Cast(_)
        ));
        assert!(matches!(
            store.cast_vote(&vote).await.unwrap(),
            CastOutcome::AlreadyVoted
        ));

        // Still exactly one ballot and one tallied vote.
        assert_eq!(store.votes_for_election(election.id).await.unwrap().len(), 1);
        let candidates = store.candidates_for(election.id).await.unwrap();
        assert_eq!(candidates[0].vote_count, 1);
    }

    #[rocket::async_test]
    async fn unknown_candidate_leaves_no_trace() {
        let store = MemoryStore::new();
        let (account, election, _candidate) = seeded_voter_and_election(&store).await;

        // A candidate from a different election.
        let other_election = store
            .insert_election(&ElectionCore::example())
            .await
            .unwrap();
        let foreign = store
            .insert_candidate(&CandidateCore::example(other_election.id))
            .await
            .unwrap();

        let vote = VoteCore::new(
            account.id,
            account.student_id.clone(),
            election.id,
            foreign.id,
        );
        assert!(matches!(
            store.cast_vote(&vote).await.unwrap(),
            CastOutcome::CandidateMissing
        ));

        // All or nothing: the voter must not be marked as having voted.
        let account = store.account(account.id).await.unwrap().unwrap();
        assert!(!account.has_voted);
        assert!(account.voted_elections.is_empty());
        assert!(store.votes_for_election(election.id).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn review_is_first_writer_wins() {
        let store = MemoryStore::new();
        let account = store.insert_account(&AccountCore::example()).await.unwrap();
        let application = store
            .insert_application(&ApplicationCore::example(&account))
            .await
            .unwrap();

        let approve = ReviewUpdate::new(ReviewDecision::Approved, "Election Officer".to_string(), None);
        let reject = ReviewUpdate::new(
            ReviewDecision::Rejected,
            "Election Officer".to_string(),
            Some("incomplete_application".to_string()),
        );

        let first = store
            .review_application(application.id, &approve)
            .await
            .unwrap();
        assert_eq!(first.unwrap().status, ApplicationStatus::Approved);

        // The second decision must not land.
        let second = store
            .review_application(application.id, &reject)
            .await
            .unwrap();
        assert!(second.is_none());
        let stored = store.application(application.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Approved);
        assert!(stored.rejection_reason.is_none());
    }

    #[rocket::async_test]
    async fn notifications_filter_by_inbox() {
        let store = MemoryStore::new();
        let application_id = Id::generate();
        store
            .insert_notification(&NotificationCore::application_submitted(
                "202207201",
                "SRC President",
                application_id,
            ))
            .await
            .unwrap();
        store
            .insert_notification(&NotificationCore::application_received(
                "Naledi Moyo",
                "SRC President",
                "Independent Candidate",
                application_id,
            ))
            .await
            .unwrap();

        let student_inbox = store
            .notifications_for("202207201", UserType::Student)
            .await
            .unwrap();
        assert_eq!(student_inbox.len(), 1);
        let admin_inbox = store
            .notifications_for(crate::model::notification::ADMIN_USER_ID, UserType::Admin)
            .await
            .unwrap();
        assert_eq!(admin_inbox.len(), 1);

        assert_eq!(
            store
                .count_unread_notifications("202207201", UserType::Student)
                .await
                .unwrap(),
            1
        );
        let read = store
            .mark_notification_read(student_inbox[0].id)
            .await
            .unwrap()
            .unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());
        assert_eq!(
            store
                .count_unread_notifications("202207201", UserType::Student)
                .await
                .unwrap(),
            0
        );

        assert!(store.delete_notification(read.id).await.unwrap());
        assert!(!store.delete_notification(read.id).await.unwrap());
    }
}
