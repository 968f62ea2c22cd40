//! Eligibility rules for voting and candidacy.
//!
//! These are pure checks over data already in hand; they hit no storage.
//! The vote path re-runs them at cast time and backs them with the ledger's
//! atomic already-voted check, so a stale answer here can delay a voter but
//! never produce a second ballot.

use crate::error::Error;
use crate::model::{
    account::{Account, Role},
    election::{Election, ElectionStatus},
};

/// Check whether the account may vote in the election right now.
///
/// The checks run in a fixed order and the first failure wins: demo
/// account, unverified email, election not active, already voted.
pub fn ensure_can_vote(account: &Account, election: &Election) -> Result<(), Error> {
    if account.is_demo {
        return Err(Error::DemoAccountCannotVote);
    }
    if !account.email_verified {
        return Err(Error::NotEligible(
            "Please verify your email before voting".to_string(),
        ));
    }
    match election.status {
        ElectionStatus::Upcoming => {
            return Err(Error::ElectionClosed(
                "This election has not opened yet".to_string(),
            ));
        }
        ElectionStatus::Completed => {
            return Err(Error::ElectionClosed("This election has closed".to_string()));
        }
        ElectionStatus::Active => {}
    }
    if account.voted_elections.contains(&election.id) {
        return Err(Error::AlreadyVoted);
    }
    Ok(())
}

/// Is the account eligible to vote in the election right now?
pub fn can_vote(account: &Account, election: &Election) -> bool {
    ensure_can_vote(account, election).is_ok()
}

/// Check whether the account may apply to stand as a candidate.
pub fn ensure_can_apply(account: &Account) -> Result<(), Error> {
    if account.role != Role::Student {
        return Err(Error::NotEligible(
            "Only students can apply for candidacy".to_string(),
        ));
    }
    if !account.email_verified {
        return Err(Error::NotEligible(
            "Please verify your email before applying".to_string(),
        ));
    }
    Ok(())
}

/// Is the account eligible to apply for candidacy?
pub fn can_apply(account: &Account) -> bool {
    ensure_can_apply(account).is_ok()
}

#[cfg(test)]
mod tests {
    use crate::model::{election::ElectionCore, id::Id};

    use super::*;

    fn verified_account() -> Account {
        let mut account = Account::example();
        account.email_verified = true;
        account
    }

    fn active_election() -> Election {
        Election {
            id: Id::generate(),
            election: ElectionCore::example(),
        }
    }

    #[test]
    fn verified_student_in_active_election_can_vote() {
        let account = verified_account();
        let election = active_election();
        assert!(can_vote(&account, &election));
        assert!(can_apply(&account));
    }

    #[test]
    fn demo_accounts_are_refused_first() {
        let mut account = verified_account();
        account.is_demo = true;
        // Demo wins even when another rule also fails.
        account.email_verified = false;
        let election = active_election();
        assert!(matches!(
            ensure_can_vote(&account, &election),
            Err(Error::DemoAccountCannotVote)
        ));
    }

    #[test]
    fn unverified_accounts_cannot_vote_or_apply() {
        let account = Account::example();
        let election = active_election();
        assert!(matches!(
            ensure_can_vote(&account, &election),
            Err(Error::NotEligible(reason)) if reason.contains("verify your email")
        ));
        assert!(!can_apply(&account));
    }

    #[test]
    fn inactive_elections_are_refused() {
        let account = verified_account();

        let mut upcoming = active_election();
        upcoming.status = ElectionStatus::Upcoming;
        assert!(matches!(
            ensure_can_vote(&account, &upcoming),
            Err(Error::ElectionClosed(reason)) if reason.contains("not opened")
        ));

        let mut completed = active_election();
        completed.status = ElectionStatus::Completed;
        assert!(matches!(
            ensure_can_vote(&account, &completed),
            Err(Error::ElectionClosed(reason)) if reason.contains("closed")
        ));
    }

    #[test]
    fn double_voting_is_refused() {
        let mut account = verified_account();
        let election = active_election();
        account.voted_elections.push(election.id);
        assert!(matches!(
            ensure_can_vote(&account, &election),
            Err(Error::AlreadyVoted)
        ));
    }

    #[test]
    fn only_students_can_apply() {
        let mut account = verified_account();
        account.role = Role::Officer;
        assert!(matches!(
            ensure_can_apply(&account),
            Err(Error::NotEligible(reason)) if reason.contains("students")
        ));
    }
}
