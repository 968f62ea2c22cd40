//! The vote ledger: the single path by which ballots are cast.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    account::Account,
    election::Election,
    id::Id,
    vote::{NewVote, VoteReceipt},
};
use crate::policy;
use crate::store::{bounded, CastOutcome, Store};

/// Casts ballots.
///
/// Eligibility is checked here immediately before the write, but the write
/// itself re-checks the already-voted rule atomically, so two concurrent
/// casts by the same voter cannot both land however stale the eligibility
/// answer was.
pub struct VoteLedger {
    store: Arc<dyn Store>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Cast a vote for a candidate in an election.
    pub async fn cast(
        &self,
        account: &Account,
        election: &Election,
        candidate_id: Id,
    ) -> Result<VoteReceipt> {
        // Demo sessions are refused before any storage traffic.
        if account.is_demo {
            return Err(Error::DemoAccountCannotVote);
        }
        policy::ensure_can_vote(account, election)?;

        let vote = NewVote::new(
            account.id,
            account.student_id.clone(),
            election.id,
            candidate_id,
        );
        match bounded(self.store.cast_vote(&vote)).await? {
            CastOutcome::Cast(vote) => {
                // The candidate chosen is deliberately not logged.
                info!(
                    "Vote recorded in election {} by student {}",
                    election.id, account.student_id
                );
                Ok(VoteReceipt::from(&vote))
            }
            CastOutcome::AlreadyVoted => Err(Error::AlreadyVoted),
            CastOutcome::CandidateMissing => Err(Error::NotFound(format!(
                "No candidate found with ID {candidate_id} in this election"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio;

    use crate::model::{
        account::AccountCore,
        election::{Candidate, CandidateCore, ElectionCore, ElectionStatus},
    };
    use crate::store::MemoryStore;

    use super::*;

    async fn seed(store: &MemoryStore) -> (Account, Election, Candidate) {
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
    async fn a_valid_cast_returns_a_receipt() {
        let store = Arc::new(MemoryStore::new());
        let (account, election, candidate) = seed(&store).await;
        let ledger = VoteLedger::new(store.clone());

        let receipt = ledger
            .cast(&account, &election, candidate.id)
            .await
            .unwrap();
        assert_eq!(receipt.election_id, election.id.into());
        assert_eq!(receipt.candidate_id, candidate.id.into());

        let candidates = store.candidates_for(election.id).await.unwrap();
        assert_eq!(candidates[0].vote_count, 1);
    }

    #[rocket::async_test]
    async fn demo_accounts_are_refused_without_store_traffic() {
        let store = Arc::new(MemoryStore::new());
        let (_account, election, candidate) = seed(&store).await;
        let ledger = VoteLedger::new(store.clone());

        let mut demo_core = AccountCore::example2();
        demo_core.email_verified = true;
        demo_core.is_demo = true;
        let demo = store.insert_account(&demo_core).await.unwrap();

        let result = ledger.cast(&demo, &election, candidate.id).await;
        assert!(matches!(result, Err(Error::DemoAccountCannotVote)));
        assert!(store.votes_for_election(election.id).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn eligibility_is_enforced_at_cast_time() {
        let store = Arc::new(MemoryStore::new());
        let (account, election, candidate) = seed(&store).await;
        let ledger = VoteLedger::new(store.clone());

        let mut unverified = account.clone();
        unverified.email_verified = false;
        let result = ledger.cast(&unverified, &election, candidate.id).await;
        assert!(matches!(result, Err(Error::NotEligible(_))));

        let mut closed = election.clone();
        closed.status = ElectionStatus::Completed;
        let result = ledger.cast(&account, &closed, candidate.id).await;
        assert!(matches!(result, Err(Error::ElectionClosed(_))));
    }

    #[rocket::async_test]
    async fn stale_eligibility_cannot_produce_a_second_ballot() {
        let store = Arc::new(MemoryStore::new());
        let (account, election, candidate) = seed(&store).await;
        let ledger = VoteLedger::new(store.clone());

        ledger
            .cast(&account, &election, candidate.id)
            .await
            .unwrap();

        // The caller still holds the pre-vote account snapshot, so the
        // policy check passes; the atomic write must refuse anyway.
        let result = ledger.cast(&account, &election, candidate.id).await;
        assert!(matches!(result, Err(Error::AlreadyVoted)));
        assert_eq!(store.votes_for_election(election.id).await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn unknown_candidates_are_not_found() {
        let store = Arc::new(MemoryStore::new());
        let (account, election, _candidate) = seed(&store).await;
        let ledger = VoteLedger::new(store.clone());

        let result = ledger.cast(&account, &election, Id::generate()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // The all-or-nothing write left the voter unmarked.
        let stored = store.account(account.id).await.unwrap().unwrap();
        assert!(!stored.has_voted);
    }

    #[rocket::async_test]
    async fn concurrent_casts_produce_exactly_one_ballot() {
        let store = Arc::new(MemoryStore::new());
        let (account, election, candidate) = seed(&store).await;
        let ledger = Arc::new(VoteLedger::new(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = Arc::clone(&ledger);
            let account = account.clone();
            let election = election.clone();
            let candidate_id = candidate.id;
            handles.push(tokio::spawn(async move {
                ledger.cast(&account, &election, candidate_id).await
            }));
        }

        let mut cast = 0;
        let mut already_voted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => cast += 1,
                Err(Error::AlreadyVoted) => already_voted += 1,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(cast, 1);
        assert_eq!(already_voted, 49);

        // Exactly one ballot, one tallied vote, one election marked.
        assert_eq!(store.votes_for_election(election.id).await.unwrap().len(), 1);
        let candidates = store.candidates_for(election.id).await.unwrap();
        assert_eq!(candidates.iter().map(|c| c.vote_count).sum::<u32>(), 1);
        let stored = store.account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.voted_elections.len(), 1);
    }
}
