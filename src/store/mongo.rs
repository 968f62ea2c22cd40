//! MongoDB-backed storage.

use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::{Error as DbError, ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    results::InsertOneResult,
    Client, Collection, Database, IndexModel,
};
use rocket::futures::TryStreamExt;

use crate::model::{
    account::{Account, NewAccount},
    application::{ApplicationStatus, CandidateApplication, NewApplication, ReviewUpdate},
    election::{Candidate, Election, NewCandidate, NewElection},
    id::Id,
    notification::{NewNotification, Notification, UserType},
    vote::{NewVote, Vote},
};

use super::{CastOutcome, Store, StoreError, UniqueField};

/// The mongodb crate doesn't provide error code constants; fill in the gap.
const DUPLICATE_KEY: i32 = 11000;

/// If the error is a duplicate key violation, work out which unique field was
/// hit. The offending index's name is embedded in the error message.
fn duplicate_key_field(err: &DbError) -> Option<UniqueField> {
    if let ErrorKind::Write(WriteFailure::WriteError(ref write_err)) = *err.kind {
        if write_err.code == DUPLICATE_KEY {
            return if write_err.message.contains("email") {
                Some(UniqueField::Email)
            } else {
                Some(UniqueField::StudentId)
            };
        }
    }
    None
}

/// The freshly inserted ID.
fn inserted_id(result: &InsertOneResult) -> Id {
    result
        .inserted_id
        .as_object_id()
        .unwrap() // Valid because the ID comes directly from the DB
        .into()
}

/// A type with a fixed home collection, so reads and writes cannot be
/// aimed at the wrong one.
trait MongoCollection {
    const NAME: &'static str;
}

/// A handle on the collection holding values of type `T`.
struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Account collections.
const USERS: &str = "users";
impl MongoCollection for Account {
    const NAME: &'static str = USERS;
}
impl MongoCollection for NewAccount {
    const NAME: &'static str = USERS;
}

// Election collections.
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Candidate collections.
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Vote collections.
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Candidate application collections.
const CANDIDATE_APPLICATIONS: &str = "candidate_applications";
impl MongoCollection for CandidateApplication {
    const NAME: &'static str = CANDIDATE_APPLICATIONS;
}
impl MongoCollection for NewApplication {
    const NAME: &'static str = CANDIDATE_APPLICATIONS;
}

// Notification collections.
const NOTIFICATIONS: &str = "notifications";
impl MongoCollection for Notification {
    const NAME: &'static str = NOTIFICATIONS;
}
impl MongoCollection for NewNotification {
    const NAME: &'static str = NOTIFICATIONS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent. The unique indexes are load-bearing:
/// duplicate registration and double voting are ultimately prevented here,
/// not by the advisory pre-checks in the service layer.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One account per student number.
    let student_id_index = IndexModel::builder()
        .keys(doc! { "student_id": 1 })
        .options(unique.clone())
        .build();
    Coll::<Account>::from_db(db)
        .create_index(student_id_index, None)
        .await?;

    // One account per email address.
    let email_index = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(unique.clone())
        .build();
    Coll::<Account>::from_db(db)
        .create_index(email_index, None)
        .await?;

    // One ballot per voter per election.
    let ballot_index = IndexModel::builder()
        .keys(doc! { "voter_id": 1, "election_id": 1 })
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(ballot_index, None)
        .await?;

    Ok(())
}

/// Storage backed by a MongoDB replica set.
///
/// Holds the client for transactions and the database for collection handles.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn insert_account(&self, account: &NewAccount) -> Result<Account, StoreError> {
        let result = self.coll::<NewAccount>().insert_one(account, None).await;
        match result {
            Ok(result) => Ok(Account {
                id: inserted_id(&result),
                account: account.clone(),
            }),
            Err(err) => match duplicate_key_field(&err) {
                Some(field) => Err(StoreError::Duplicate(field)),
                None => Err(err.into()),
            },
        }
    }

    async fn account(&self, id: Id) -> Result<Option<Account>, StoreError> {
        Ok(self.coll::<Account>().find_one(id.as_doc(), None).await?)
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let filter = doc! { "email": email };
        Ok(self.coll::<Account>().find_one(filter, None).await?)
    }

    async fn account_by_student_id(
        &self,
        student_id: &str,
    ) -> Result<Option<Account>, StoreError> {
        let filter = doc! { "student_id": student_id };
        Ok(self.coll::<Account>().find_one(filter, None).await?)
    }

    async fn mark_email_verified(&self, id: Id) -> Result<Option<Account>, StoreError> {
        let update = doc! { "$set": { "email_verified": true } };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .coll::<Account>()
            .find_one_and_update(id.as_doc(), update, options)
            .await?)
    }

    async fn record_login(&self, id: Id, at: DateTime<Utc>) -> Result<(), StoreError> {
        let update = doc! {
            "$inc": { "login_count": 1 },
            "$set": { "last_login": BsonDateTime::from_chrono(at) },
        };
        self.coll::<Account>()
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(())
    }

    async fn mark_candidate(&self, student_id: &str) -> Result<(), StoreError> {
        let filter = doc! { "student_id": student_id };
        let update = doc! { "$set": { "is_candidate": true } };
        self.coll::<Account>()
            .update_one(filter, update, None)
            .await?;
        Ok(())
    }

    async fn insert_election(&self, election: &NewElection) -> Result<Election, StoreError> {
        let result = self.coll::<NewElection>().insert_one(election, None).await?;
        Ok(Election {
            id: inserted_id(&result),
            election: election.clone(),
        })
    }

    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError> {
        Ok(self.coll::<Election>().find_one(id.as_doc(), None).await?)
    }

    async fn elections(&self) -> Result<Vec<Election>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "start_time": -1 })
            .build();
        let elections = self
            .coll::<Election>()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn insert_candidate(&self, candidate: &NewCandidate) -> Result<Candidate, StoreError> {
        let result = self
            .coll::<NewCandidate>()
            .insert_one(candidate, None)
            .await?;
        Ok(Candidate {
            id: inserted_id(&result),
            candidate: candidate.clone(),
        })
    }

    async fn candidates_for(&self, election_id: Id) -> Result<Vec<Candidate>, StoreError> {
        let filter = doc! { "election_id": *election_id };
        let candidates = self
            .coll::<Candidate>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn cast_vote(&self, vote: &NewVote) -> Result<CastOutcome, StoreError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Claim the voter's ballot for this election. The filter only
        // matches if the election is absent from their voted list, so a
        // concurrent duplicate cast loses here.
        let claim_filter = doc! {
            "_id": *vote.voter_id,
            "voted_elections": { "$ne": *vote.election_id },
        };
        let claim_update = doc! {
            "$addToSet": { "voted_elections": *vote.election_id },
            "$set": { "has_voted": true },
        };
        let claim = self
            .coll::<Account>()
            .update_one_with_session(claim_filter, claim_update, None, &mut session)
            .await?;
        if claim.modified_count != 1 {
            session.abort_transaction().await?;
            return Ok(CastOutcome::AlreadyVoted);
        }

        // Insert the immutable ballot. The unique (voter, election) index
        // backs up the claim above.
        let inserted = self
            .coll::<NewVote>()
            .insert_one_with_session(vote, None, &mut session)
            .await;
        let vote_id = match inserted {
            Ok(result) => inserted_id(&result),
            Err(err) if duplicate_key_field(&err).is_some() => {
                session.abort_transaction().await?;
                return Ok(CastOutcome::AlreadyVoted);
            }
            Err(err) => return Err(err.into()),
        };

        // Bump the tally, checking the candidate really stands in this
        // election.
        let tally_filter = doc! {
            "_id": *vote.candidate_id,
            "election_id": *vote.election_id,
        };
        let tally_update = doc! {
            "$inc": { "vote_count": 1 },
            "$set": { "last_updated": BsonDateTime::from_chrono(vote.voted_at) },
        };
        let tally = self
            .coll::<Candidate>()
            .update_one_with_session(tally_filter, tally_update, None, &mut session)
            .await?;
        if tally.modified_count != 1 {
            session.abort_transaction().await?;
            return Ok(CastOutcome::CandidateMissing);
        }

        session.commit_transaction().await?;
        Ok(CastOutcome::Cast(Vote {
            id: vote_id,
            vote: vote.clone(),
        }))
    }

    async fn votes_for_election(&self, election_id: Id) -> Result<Vec<Vote>, StoreError> {
        let filter = doc! { "election_id": *election_id };
        let votes = self
            .coll::<Vote>()
            .find(filter, None)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn insert_application(
        &self,
        application: &NewApplication,
    ) -> Result<CandidateApplication, StoreError> {
        let result = self
            .coll::<NewApplication>()
            .insert_one(application, None)
            .await?;
        Ok(CandidateApplication {
            id: inserted_id(&result),
            application: application.clone(),
        })
    }

    async fn application(&self, id: Id) -> Result<Option<CandidateApplication>, StoreError> {
        Ok(self
            .coll::<CandidateApplication>()
            .find_one(id.as_doc(), None)
            .await?)
    }

    async fn applications(
        &self,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<CandidateApplication>, StoreError> {
        let filter = status.map(|status| doc! { "status": status });
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let applications = self
            .coll::<CandidateApplication>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(applications)
    }

    async fn applications_by_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<CandidateApplication>, StoreError> {
        let filter = doc! { "student_id": student_id };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let applications = self
            .coll::<CandidateApplication>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(applications)
    }

    async fn review_application(
        &self,
        id: Id,
        update: &ReviewUpdate,
    ) -> Result<Option<CandidateApplication>, StoreError> {
        // Compare-and-set against the pending status. Of two concurrent
        // reviews, exactly one matches; the other gets `None`.
        let filter = doc! { "_id": *id, "status": ApplicationStatus::Pending };
        let update_doc = doc! {
            "$set": {
                "status": update.status,
                "reviewed_by": &update.reviewed_by,
                "reviewed_at": BsonDateTime::from_chrono(update.reviewed_at),
                "rejection_reason": update.rejection_reason.as_deref(),
                "updated_at": BsonDateTime::from_chrono(update.reviewed_at),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .coll::<CandidateApplication>()
            .find_one_and_update(filter, update_doc, options)
            .await?)
    }

    async fn insert_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let result = self
            .coll::<NewNotification>()
            .insert_one(notification, None)
            .await?;
        Ok(Notification {
            id: inserted_id(&result),
            notification: notification.clone(),
        })
    }

    async fn notification(&self, id: Id) -> Result<Option<Notification>, StoreError> {
        Ok(self
            .coll::<Notification>()
            .find_one(id.as_doc(), None)
            .await?)
    }

    async fn notifications_for(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<Vec<Notification>, StoreError> {
        let filter = doc! { "user_id": user_id, "user_type": user_type };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let notifications = self
            .coll::<Notification>()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(notifications)
    }

    async fn count_unread_notifications(
        &self,
        user_id: &str,
        user_type: UserType,
    ) -> Result<u64, StoreError> {
        let filter = doc! {
            "user_id": user_id,
            "user_type": user_type,
            "is_read": false,
        };
        Ok(self
            .coll::<Notification>()
            .count_documents(filter, None)
            .await?)
    }

    async fn mark_notification_read(&self, id: Id) -> Result<Option<Notification>, StoreError> {
        let update = doc! {
            "$set": {
                "is_read": true,
                "read_at": BsonDateTime::now(),
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .coll::<Notification>()
            .find_one_and_update(id.as_doc(), update, options)
            .await?)
    }

    async fn delete_notification(&self, id: Id) -> Result<bool, StoreError> {
        let result = self
            .coll::<Notification>()
            .delete_one(id.as_doc(), None)
            .await?;
        Ok(result.deleted_count == 1)
    }
}
