//! In-app notification types.
//!
//! Notifications are addressed by `(user_id, user_type)`. Students are
//! addressed by student number; everything for the admin team goes to the
//! shared [`ADMIN_USER_ID`] inbox.

use chrono::{DateTime, Utc};
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use crate::model::{
    datetime::opt_chrono_datetime_as_bson_datetime,
    id::{ApiId, Id},
};

/// The shared inbox for the admin team.
pub const ADMIN_USER_ID: &str = "admin";

/// Which kind of inbox a notification belongs to.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Admin,
}

impl From<UserType> for Bson {
    fn from(user_type: UserType) -> Self {
        to_bson(&user_type).expect("Serialisation is infallible")
    }
}

/// What a notification is about; drives frontend icons and navigation.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ApplicationSubmitted,
    ApplicationApproved,
    ApplicationRejected,
}

/// Core notification data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCore {
    /// Student number, or [`ADMIN_USER_ID`].
    pub user_id: String,
    /// Which kind of inbox this belongs to.
    pub user_type: UserType,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub message: String,
    /// What the notification is about.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Whether the recipient has opened it.
    pub is_read: bool,
    /// When the recipient opened it.
    #[serde(with = "opt_chrono_datetime_as_bson_datetime")]
    pub read_at: Option<DateTime<Utc>>,
    /// The application this notification concerns, if any.
    pub related_application_id: Option<Id>,
    /// When the notification was created.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl NotificationCore {
    fn new(
        user_id: String,
        user_type: UserType,
        title: &str,
        message: String,
        kind: NotificationKind,
        related_application_id: Id,
    ) -> Self {
        Self {
            user_id,
            user_type,
            title: title.to_string(),
            message,
            kind,
            is_read: false,
            read_at: None,
            related_application_id: Some(related_application_id),
            created_at: Utc::now(),
        }
    }

    /// Tell the admin team a new application has arrived.
    pub fn application_received(
        student_name: &str,
        position: &str,
        party_name: &str,
        application_id: Id,
    ) -> Self {
        Self::new(
            ADMIN_USER_ID.to_string(),
            UserType::Admin,
            "New Candidate Application",
            format!("Student {student_name} has applied for {position} as {party_name}."),
            NotificationKind::ApplicationSubmitted,
            application_id,
        )
    }

    /// Confirm to the applicant that their application went in.
    pub fn application_submitted(student_id: &str, position: &str, application_id: Id) -> Self {
        Self::new(
            student_id.to_string(),
            UserType::Student,
            "Application Submitted",
            format!("Your application for {position} has been received and is under review."),
            NotificationKind::ApplicationSubmitted,
            application_id,
        )
    }

    /// Tell the applicant their application was approved.
    pub fn application_approved(student_id: &str, position: &str, application_id: Id) -> Self {
        Self::new(
            student_id.to_string(),
            UserType::Student,
            "Application Approved!",
            format!("Congratulations! Your application for {position} has been approved."),
            NotificationKind::ApplicationApproved,
            application_id,
        )
    }

    /// Tell the applicant their application was rejected, and why.
    pub fn application_rejected(
        student_id: &str,
        position: &str,
        reason: &str,
        application_id: Id,
    ) -> Self {
        Self::new(
            student_id.to_string(),
            UserType::Student,
            "Application Decision",
            format!("Your application for {position} was not approved. Reason: {reason}"),
            NotificationKind::ApplicationRejected,
            application_id,
        )
    }
}

/// A notification without an ID.
pub type NewNotification = NotificationCore;

/// A notification from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub notification: NotificationCore,
}

impl Deref for Notification {
    type Target = NotificationCore;

    fn deref(&self) -> &Self::Target {
        &self.notification
    }
}

impl DerefMut for Notification {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.notification
    }
}

/// A notification as returned over the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: ApiId,
    pub user_id: String,
    pub user_type: UserType,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub related_application_id: Option<ApiId>,
}

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id.into(),
            user_id: notification.user_id.clone(),
            user_type: notification.user_type,
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
            is_read: notification.is_read,
            created_at: notification.created_at,
            related_application_id: notification.related_application_id.map(ApiId::from),
        }
    }
}
