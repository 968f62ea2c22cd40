use std::sync::Arc;

use rocket::{
    serde::json::{serde_json::json, Json, Value},
    Route, State,
};

use crate::api::common::account_from_token;
use crate::auth::{AccessLevel, AnyLevel, AuthToken, OfficerLevel};
use crate::error::{Error, Result};
use crate::model::{
    id::Id,
    notification::{NotificationResponse, UserType, ADMIN_USER_ID},
};
use crate::store::{bounded, Store};

pub fn routes() -> Vec<Route> {
    routes![notifications, unread_count, mark_read, delete_notification]
}

/// Reject the request unless the token's owner owns the inbox. The admin
/// inbox is shared by every election officer; a student inbox belongs to
/// exactly one student.
async fn ensure_inbox_access(
    token: &AuthToken<AnyLevel>,
    store: &Arc<dyn Store>,
    user_id: &str,
    user_type: UserType,
) -> Result<()> {
    match user_type {
        UserType::Admin => {
            if !OfficerLevel::permits(token.role) || user_id != ADMIN_USER_ID {
                return Err(Error::Unauthorized(
                    "Only election officers can read the admin inbox".to_string(),
                ));
            }
        }
        UserType::Student => {
            let account = account_from_token(token, store).await?;
            if account.student_id != user_id {
                return Err(Error::Unauthorized(
                    "You can only read your own notifications".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// A user's notifications, newest first.
#[get("/notifications/<user_id>?<user_type>")]
async fn notifications(
    token: AuthToken<AnyLevel>,
    user_id: &str,
    user_type: Option<UserType>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<Vec<NotificationResponse>>> {
    let user_type = user_type.unwrap_or(UserType::Student);
    ensure_inbox_access(&token, store, user_id, user_type).await?;
    let notifications = bounded(store.notifications_for(user_id, user_type)).await?;
    Ok(Json(
        notifications.iter().map(NotificationResponse::from).collect(),
    ))
}

#[get("/notifications/<user_id>/unread-count?<user_type>")]
async fn unread_count(
    token: AuthToken<AnyLevel>,
    user_id: &str,
    user_type: Option<UserType>,
    store: &State<Arc<dyn Store>>,
) -> Result<Value> {
    let user_type = user_type.unwrap_or(UserType::Student);
    ensure_inbox_access(&token, store, user_id, user_type).await?;
    let count = bounded(store.count_unread_notifications(user_id, user_type)).await?;
    Ok(json!({
        "user_id": user_id,
        "unread_count": count,
    }))
}

#[put("/notifications/<notification_id>/read")]
async fn mark_read(
    token: AuthToken<AnyLevel>,
    notification_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Value> {
    let notification = bounded(store.notification(notification_id))
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("No notification found with ID {notification_id}"))
        })?;
    ensure_inbox_access(&token, store, &notification.user_id, notification.user_type).await?;

    bounded(store.mark_notification_read(notification_id))
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("No notification found with ID {notification_id}"))
        })?;
    Ok(json!({
        "message": "Notification marked as read",
        "notification_id": notification_id.to_string(),
    }))
}

#[delete("/notifications/<notification_id>")]
async fn delete_notification(
    token: AuthToken<AnyLevel>,
    notification_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Value> {
    let notification = bounded(store.notification(notification_id))
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("No notification found with ID {notification_id}"))
        })?;
    ensure_inbox_access(&token, store, &notification.user_id, notification.user_type).await?;

    if !bounded(store.delete_notification(notification_id)).await? {
        return Err(Error::NotFound(format!(
            "No notification found with ID {notification_id}"
        )));
    }
    Ok(json!({
        "message": "Notification deleted successfully",
        "notification_id": notification_id.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use rocket::local::asynchronous::Client;
    use rocket::{
        http::{ContentType, Status},
        serde::json::serde_json::json,
    };

    use crate::model::{application::ApplicationDraft, notification::NotificationKind};
    use crate::testing::{provider, test_client};

    use super::*;

    const EMAIL: &str = "202207201@ub.ac.bw";
    const PASSWORD: &str = "S3cure,Pass";
    const STUDENT_ID: &str = "202207201";

    /// Register, verify and sign in a student, then submit an application so
    /// both inboxes have something in them.
    async fn sign_in_and_apply(client: &Client) {
        let response = client
            .post("/auth/register")
            .header(ContentType::JSON)
            .body(
                json!({
                    "full_name": "Naledi Moyo",
                    "email": EMAIL,
                    "password": PASSWORD,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let token = provider(client).issue_verification_token(EMAIL).await;
        let response = client
            .post("/auth/verify-email")
            .header(ContentType::JSON)
            .body(json!({ "token": token }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .post("/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": EMAIL, "password": PASSWORD }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .post("/candidate-applications")
            .header(ContentType::JSON)
            .body(json!(ApplicationDraft::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    /// Sign in as the demo election officer.
    async fn sign_in_officer(client: &Client) {
        let response = client
            .post("/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": "officer@ub.ac.bw", "password": "officer123" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
    }

    async fn student_inbox(client: &Client) -> Vec<NotificationResponse> {
        let response = client
            .get(format!("/notifications/{STUDENT_ID}"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    #[rocket::async_test]
    async fn a_student_reads_their_own_inbox() {
        let client = test_client().await;
        sign_in_and_apply(&client).await;

        let inbox = student_inbox(&client).await;
        assert_eq!(1, inbox.len());
        assert_eq!("Application Submitted", inbox[0].title);
        assert_eq!(NotificationKind::ApplicationSubmitted, inbox[0].kind);
        assert!(!inbox[0].is_read);
    }

    #[rocket::async_test]
    async fn the_admin_inbox_is_shared_by_officers() {
        let client = test_client().await;
        sign_in_and_apply(&client).await;

        sign_in_officer(&client).await;
        let response = client
            .get("/notifications/admin?user_type=admin")
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let inbox: Vec<NotificationResponse> = response.into_json().await.unwrap();
        assert_eq!(1, inbox.len());
        assert_eq!("New Candidate Application", inbox[0].title);
        assert!(inbox[0].message.contains("Naledi Moyo"));

        let response = client
            .get("/notifications/admin/unread-count?user_type=admin")
            .dispatch()
            .await;
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(1, body["unread_count"]);
    }

    #[rocket::async_test]
    async fn students_cannot_read_other_inboxes() {
        let client = test_client().await;
        sign_in_and_apply(&client).await;

        let response = client
            .get("/notifications/admin?user_type=admin")
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        let response = client.get("/notifications/202301234").dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[rocket::async_test]
    async fn marking_read_clears_the_unread_count() {
        let client = test_client().await;
        sign_in_and_apply(&client).await;

        let response = client
            .get(format!("/notifications/{STUDENT_ID}/unread-count"))
            .dispatch()
            .await;
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(1, body["unread_count"]);

        let inbox = student_inbox(&client).await;
        let response = client
            .put(format!("/notifications/{}/read", inbox[0].id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!("Notification marked as read", body["message"]);

        let response = client
            .get(format!("/notifications/{STUDENT_ID}/unread-count"))
            .dispatch()
            .await;
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(0, body["unread_count"]);

        let inbox = student_inbox(&client).await;
        assert!(inbox[0].is_read);
    }

    #[rocket::async_test]
    async fn deleting_a_notification_removes_it() {
        let client = test_client().await;
        sign_in_and_apply(&client).await;

        let inbox = student_inbox(&client).await;
        let response = client
            .delete(format!("/notifications/{}", inbox[0].id))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!("Notification deleted successfully", body["message"]);

        assert!(student_inbox(&client).await.is_empty());

        // A second delete finds nothing.
        let response = client
            .delete(format!("/notifications/{}", inbox[0].id))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[rocket::async_test]
    async fn an_unknown_notification_is_not_found() {
        let client = test_client().await;
        sign_in_and_apply(&client).await;

        let response = client
            .put(format!("/notifications/{}/read", Id::generate()))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[rocket::async_test]
    async fn the_inbox_requires_a_session() {
        let client = test_client().await;
        let response = client
            .get(format!("/notifications/{STUDENT_ID}"))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
