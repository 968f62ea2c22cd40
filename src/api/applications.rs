use std::sync::Arc;

use rocket::{
    serde::json::{serde_json::json, Json, Value},
    Route, State,
};
use serde::Deserialize;

use crate::api::common::{account_from_token, display_name_from_token};
use crate::auth::{AuthToken, DemoDirectory, OfficerLevel, StudentLevel};
use crate::error::{Error, Result};
use crate::model::{
    application::{ApplicationDraft, ApplicationResponse, ApplicationStatus, ReviewDecision},
    id::Id,
};
use crate::store::{bounded, Store};
use crate::workflow::ApplicationWorkflow;

pub fn routes() -> Vec<Route> {
    routes![
        submit,
        all_applications,
        my_applications,
        application,
        review,
    ]
}

#[post("/candidate-applications", data = "<draft>", format = "json")]
async fn submit(
    token: AuthToken<StudentLevel>,
    draft: Json<ApplicationDraft>,
    store: &State<Arc<dyn Store>>,
    workflow: &State<ApplicationWorkflow>,
) -> Result<Value> {
    let account = account_from_token(&token, store).await?;
    let application = workflow.submit(&account, draft.into_inner()).await?;
    Ok(json!({
        "message": "Application submitted successfully",
        "application_id": application.id.to_string(),
        "status": "pending",
    }))
}

/// All applications, for the review queue. Optionally filtered by status.
#[get("/candidate-applications?<status>")]
async fn all_applications(
    _token: AuthToken<OfficerLevel>,
    status: Option<ApplicationStatus>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<Vec<ApplicationResponse>>> {
    let applications = bounded(store.applications(status)).await?;
    Ok(Json(
        applications.iter().map(ApplicationResponse::from).collect(),
    ))
}

/// The caller's own applications.
#[get("/candidate-applications/mine")]
async fn my_applications(
    token: AuthToken<StudentLevel>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<Vec<ApplicationResponse>>> {
    let account = account_from_token(&token, store).await?;
    let applications = bounded(store.applications_by_student(&account.student_id)).await?;
    Ok(Json(
        applications.iter().map(ApplicationResponse::from).collect(),
    ))
}

#[get("/candidate-applications/<application_id>")]
async fn application(
    _token: AuthToken<OfficerLevel>,
    application_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<ApplicationResponse>> {
    let application = bounded(store.application(application_id))
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("No application found with ID {application_id}"))
        })?;
    Ok(Json(ApplicationResponse::from(&application)))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    status: ReviewDecision,
    rejection_reason: Option<String>,
}

#[put("/candidate-applications/<application_id>", data = "<request>", format = "json")]
async fn review(
    token: AuthToken<OfficerLevel>,
    application_id: Id,
    request: Json<ReviewRequest>,
    store: &State<Arc<dyn Store>>,
    demo: &State<DemoDirectory>,
    workflow: &State<ApplicationWorkflow>,
) -> Result<Value> {
    let reviewed_by = display_name_from_token(&token, store, demo).await?;
    let request = request.into_inner();
    let decided = match request.status {
        ReviewDecision::Approved => "approved",
        ReviewDecision::Rejected => "rejected",
    };

    let application = workflow
        .review(
            application_id,
            request.status,
            request.rejection_reason,
            reviewed_by,
        )
        .await?;
    Ok(json!({
        "message": format!("Application {decided} successfully"),
        "application_id": application.id.to_string(),
    }))
}
