//! Candidate application types and the review state machine's vocabulary.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

use crate::model::{
    account::Account,
    datetime::opt_chrono_datetime_as_bson_datetime,
    id::{ApiId, Id},
};

/// Review state of a candidate application.
///
/// The only legal transitions are `Pending -> Approved` and
/// `Pending -> Rejected`; both are final.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl From<ApplicationStatus> for Bson {
    fn from(status: ApplicationStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// Core candidate application data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCore {
    /// The applicant's student number.
    pub student_id: String,
    /// The applicant's display name at submission time.
    pub student_name: String,
    /// The applicant's email address at submission time.
    pub email: String,
    /// The position contested, e.g. "SRC President".
    pub position: String,
    /// Party code, e.g. "udc", or "independent".
    pub party: String,
    /// Full party name for display.
    pub party_name: String,
    /// Campaign manifesto.
    pub manifesto: String,
    /// Relevant qualifications and experience.
    pub qualifications: String,
    /// Notable achievements.
    pub achievements: String,
    /// The applicant's headline campaign promise.
    pub campaign_promise: String,
    /// Review state.
    pub status: ApplicationStatus,
    /// Enrolment year, taken from the student number.
    pub year_of_study: String,
    /// The applicant's faculty.
    pub faculty: String,
    /// Display name of the officer who reviewed this application.
    pub reviewed_by: Option<String>,
    /// When the application was reviewed.
    #[serde(with = "opt_chrono_datetime_as_bson_datetime")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Why the application was rejected; set iff rejected.
    pub rejection_reason: Option<String>,
    /// When the application was submitted.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// When the application last changed.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ApplicationCore {
    /// Create a pending application for the given account.
    ///
    /// Identity fields come from the account, never from the request; the
    /// enrolment year is the first four digits of the student number.
    pub fn new(account: &Account, draft: ApplicationDraft) -> Self {
        let now = Utc::now();
        Self {
            student_id: account.student_id.clone(),
            student_name: account.full_name.clone(),
            email: account.email.to_string(),
            position: draft.position,
            party: draft.party,
            party_name: draft.party_name,
            manifesto: draft.manifesto,
            qualifications: draft.qualifications,
            achievements: draft.achievements,
            campaign_promise: draft.campaign_promise,
            status: ApplicationStatus::Pending,
            // Student numbers are validated as nine digits starting with the
            // enrolment year.
            year_of_study: account.student_id.chars().take(4).collect(),
            faculty: "To be determined".to_string(),
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An application without an ID.
pub type NewApplication = ApplicationCore;

/// An application from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateApplication {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub application: ApplicationCore,
}

impl Deref for CandidateApplication {
    type Target = ApplicationCore;

    fn deref(&self) -> &Self::Target {
        &self.application
    }
}

impl DerefMut for CandidateApplication {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.application
    }
}

/// The fields an applicant fills in themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    pub position: String,
    pub party: String,
    pub party_name: String,
    pub manifesto: String,
    pub qualifications: String,
    pub achievements: String,
    pub campaign_promise: String,
}

/// An officer's verdict on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// The fields written when a review lands; applied atomically against the
/// `pending` status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewUpdate {
    pub status: ApplicationStatus,
    pub reviewed_by: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub reviewed_at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
}

impl ReviewUpdate {
    pub fn new(decision: ReviewDecision, reviewed_by: String, rejection_reason: Option<String>) -> Self {
        let status = match decision {
            ReviewDecision::Approved => ApplicationStatus::Approved,
            ReviewDecision::Rejected => ApplicationStatus::Rejected,
        };
        Self {
            status,
            reviewed_by,
            reviewed_at: Utc::now(),
            rejection_reason,
        }
    }
}

/// An application as returned over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: ApiId,
    pub student_id: String,
    pub student_name: String,
    pub email: String,
    pub position: String,
    pub party: String,
    pub party_name: String,
    pub manifesto: String,
    pub qualifications: String,
    pub achievements: String,
    pub campaign_promise: String,
    pub status: ApplicationStatus,
    pub year_of_study: String,
    pub faculty: String,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CandidateApplication> for ApplicationResponse {
    fn from(application: &CandidateApplication) -> Self {
        Self {
            id: application.id.into(),
            student_id: application.student_id.clone(),
            student_name: application.student_name.clone(),
            email: application.email.clone(),
            position: application.position.clone(),
            party: application.party.clone(),
            party_name: application.party_name.clone(),
            manifesto: application.manifesto.clone(),
            qualifications: application.qualifications.clone(),
            achievements: application.achievements.clone(),
            campaign_promise: application.campaign_promise.clone(),
            status: application.status,
            year_of_study: application.year_of_study.clone(),
            faculty: application.faculty.clone(),
            reviewed_by: application.reviewed_by.clone(),
            reviewed_at: application.reviewed_at,
            rejection_reason: application.rejection_reason.clone(),
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }
}
