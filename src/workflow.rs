//! The candidate application workflow: submission and review.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{
    account::Account,
    application::{
        ApplicationDraft, ApplicationStatus, CandidateApplication, NewApplication, ReviewDecision,
        ReviewUpdate,
    },
    id::Id,
    notification::NotificationCore,
};
use crate::policy;
use crate::store::{bounded, Store};

/// Moves candidate applications through their lifecycle.
///
/// An application is created `pending` and decided exactly once: the decision
/// write only lands against the `pending` status, so when two reviewers race,
/// the loser is told the application was already reviewed instead of silently
/// overwriting the verdict.
pub struct ApplicationWorkflow {
    store: Arc<dyn Store>,
}

impl ApplicationWorkflow {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Submit an application for candidacy on behalf of `account`.
    ///
    /// A student may hold at most one pending application at a time; earlier
    /// rejected or approved applications do not block a new submission.
    pub async fn submit(
        &self,
        account: &Account,
        draft: ApplicationDraft,
    ) -> Result<CandidateApplication> {
        policy::ensure_can_apply(account)?;

        let previous = bounded(self.store.applications_by_student(&account.student_id)).await?;
        if previous
            .iter()
            .any(|application| application.status == ApplicationStatus::Pending)
        {
            return Err(Error::BadRequest(
                "You already have a pending application".to_string(),
            ));
        }

        let application = bounded(
            self.store
                .insert_application(&NewApplication::new(account, draft)),
        )
        .await?;
        info!(
            "Application {} submitted by student {} for {}",
            application.id, application.student_id, application.position
        );

        // Notifications are best effort; the application stands regardless.
        self.notify(NotificationCore::application_received(
            &application.student_name,
            &application.position,
            &application.party_name,
            application.id,
        ))
        .await;
        self.notify(NotificationCore::application_submitted(
            &application.student_id,
            &application.position,
            application.id,
        ))
        .await;

        Ok(application)
    }

    /// Decide a pending application.
    ///
    /// A rejection must carry a non-blank reason, and that is checked before
    /// the application is even looked up.
    pub async fn review(
        &self,
        id: Id,
        decision: ReviewDecision,
        rejection_reason: Option<String>,
        reviewed_by: String,
    ) -> Result<CandidateApplication> {
        let rejection_reason = match decision {
            ReviewDecision::Rejected => match rejection_reason.as_deref().map(str::trim) {
                Some(reason) if !reason.is_empty() => Some(reason.to_string()),
                _ => return Err(Error::MissingRejectionReason),
            },
            ReviewDecision::Approved => None,
        };

        let update = ReviewUpdate::new(decision, reviewed_by, rejection_reason);
        let Some(application) = bounded(self.store.review_application(id, &update)).await? else {
            // The write refuses anything not pending, so tell a decided
            // application apart from a missing one.
            return match bounded(self.store.application(id)).await? {
                Some(_) => Err(Error::InvalidTransition(
                    "This application has already been reviewed".to_string(),
                )),
                None => Err(Error::NotFound(format!("No application found with ID {id}"))),
            };
        };
        info!(
            "Application {} {} by {}",
            application.id,
            match decision {
                ReviewDecision::Approved => "approved",
                ReviewDecision::Rejected => "rejected",
            },
            update.reviewed_by
        );

        match decision {
            ReviewDecision::Approved => {
                if let Err(e) = bounded(self.store.mark_candidate(&application.student_id)).await {
                    warn!(
                        "Failed to flag student {} as a candidate: {}",
                        application.student_id, e
                    );
                }
                self.notify(NotificationCore::application_approved(
                    &application.student_id,
                    &application.position,
                    application.id,
                ))
                .await;
            }
            ReviewDecision::Rejected => {
                self.notify(NotificationCore::application_rejected(
                    &application.student_id,
                    &application.position,
                    application.rejection_reason.as_deref().unwrap_or_default(),
                    application.id,
                ))
                .await;
            }
        }

        Ok(application)
    }

    /// Store a notification, logging instead of failing when the write is lost.
    async fn notify(&self, notification: NotificationCore) {
        if let Err(e) = bounded(self.store.insert_notification(&notification)).await {
            warn!(
                "Failed to store a {:?} notification for {}: {}",
                notification.kind, notification.user_id, e
            );
        }
    }
}
