//! Election and candidate types.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::model::id::{ApiId, Id};

/// Where an election is in its lifecycle.
///
/// The status field is authoritative; the start and end times are what gets
/// shown to students and what officers base status changes on.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Announced but not yet open for voting.
    Upcoming,
    /// Open for voting.
    Active,
    /// Voting has ended.
    Completed,
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Human-readable title, e.g. "SRC President 2024".
    pub title: String,
    /// What the election is about.
    pub description: String,
    /// Lifecycle status.
    pub status: ElectionStatus,
    /// When voting opens.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// When voting closes.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Core candidate data, as stored in the database.
///
/// Candidates are created by officers, usually from an approved candidate
/// application, so the campaign fields are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCore {
    /// The election this candidate stands in.
    pub election_id: Id,
    /// Display name.
    pub name: String,
    /// The position contested, e.g. "SRC President".
    pub position: String,
    /// Party code, e.g. "udc", or "independent".
    pub party: Option<String>,
    /// Full party name for display.
    pub party_name: Option<String>,
    /// Campaign manifesto.
    pub manifesto: Option<String>,
    /// Running tally of votes received.
    pub vote_count: u32,
    /// When the tally last changed.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_updated: DateTime<Utc>,
}

impl CandidateCore {
    /// A candidate with no votes yet.
    pub fn new(election_id: Id, name: String, position: String) -> Self {
        Self {
            election_id,
            name,
            position,
            party: None,
            party_name: None,
            manifesto: None,
            vote_count: 0,
            last_updated: Utc::now(),
        }
    }
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// An election as listed over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub status: ElectionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<&Election> for ElectionSummary {
    fn from(election: &Election) -> Self {
        Self {
            id: election.id.into(),
            title: election.title.clone(),
            description: election.description.clone(),
            status: election.status,
            start_time: election.start_time,
            end_time: election.end_time,
        }
    }
}

/// A single election with its candidates, as returned over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionDetail {
    #[serde(flatten)]
    pub summary: ElectionSummary,
    pub candidates: Vec<CandidateView>,
    pub total_votes: u32,
}

impl ElectionDetail {
    pub fn new(election: &Election, candidates: Vec<Candidate>) -> Self {
        let candidates: Vec<CandidateView> = candidates.iter().map(CandidateView::from).collect();
        let total_votes = candidates.iter().map(|c| c.vote_count).sum();
        Self {
            summary: election.into(),
            candidates,
            total_votes,
        }
    }
}

/// A candidate as returned over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateView {
    pub id: ApiId,
    pub name: String,
    pub position: String,
    pub party: Option<String>,
    pub party_name: Option<String>,
    pub manifesto: Option<String>,
    pub vote_count: u32,
}

impl From<&Candidate> for CandidateView {
    fn from(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name.clone(),
            position: candidate.position.clone(),
            party: candidate.party.clone(),
            party_name: candidate.party_name.clone(),
            manifesto: candidate.manifesto.clone(),
            vote_count: candidate.vote_count,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl ElectionCore {
        /// An election that is currently open for voting.
        pub fn example() -> Self {
            Self {
                title: "SRC President 2024".to_string(),
                description: "Annual Student Representative Council presidential election".to_string(),
                status: ElectionStatus::Active,
                start_time: Utc::now() - Duration::days(1),
                end_time: Utc::now() + Duration::days(7),
            }
        }
    }

    impl CandidateCore {
        pub fn example(election_id: Id) -> Self {
            Self {
                party: Some("udc".to_string()),
                party_name: Some("Umbrella for Democratic Change (UDC)".to_string()),
                manifesto: Some("Better housing, better food, better WiFi.".to_string()),
                ..Self::new(election_id, "Naledi Moyo".to_string(), "SRC President".to_string())
            }
        }
    }
}
