//! Ballot types. Votes are immutable once cast.

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::model::id::{ApiId, Id};

/// Core vote data, as stored in the database.
///
/// Never updated after insertion. The `(voter_id, election_id)` pair is
/// covered by a unique index, which is what ultimately guarantees one ballot
/// per voter per election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCore {
    /// Who cast the vote.
    pub voter_id: Id,
    /// The voter's student number, kept for audit trails.
    pub student_id: String,
    /// The election voted in.
    pub election_id: Id,
    /// The candidate voted for.
    pub candidate_id: Id,
    /// When the vote was cast.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub voted_at: DateTime<Utc>,
}

impl VoteCore {
    pub fn new(voter_id: Id, student_id: String, election_id: Id, candidate_id: Id) -> Self {
        Self {
            voter_id,
            student_id,
            election_id,
            candidate_id,
            voted_at: Utc::now(),
        }
    }
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// Proof of a cast vote, as returned over the API.
///
/// Deliberately omits the voter's identity; the receipt may be shown on
/// shared screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub voted_at: DateTime<Utc>,
}

impl From<&Vote> for VoteReceipt {
    fn from(vote: &Vote) -> Self {
        Self {
            vote_id: vote.id.into(),
            election_id: vote.election_id.into(),
            candidate_id: vote.candidate_id.into(),
            voted_at: vote.voted_at,
        }
    }
}
