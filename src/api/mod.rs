use rocket::{
    serde::json::{serde_json::json, Value},
    Route,
};

mod applications;
mod auth;
mod common;
mod elections;
mod notifications;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = routes![index, health];
    routes.extend(auth::routes());
    routes.extend(elections::routes());
    routes.extend(voting::routes());
    routes.extend(applications::routes());
    routes.extend(notifications::routes());
    routes
}

/// Service banner.
#[get("/")]
fn index() -> Value {
    json!({
        "message": "UB Voting System API",
        "status": "running",
    })
}

/// Liveness probe.
#[get("/health")]
fn health() -> Value {
    json!({
        "status": "healthy",
        "service": "UB Voting System",
    })
}
