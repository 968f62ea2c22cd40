use std::sync::Arc;

use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    election::{ElectionDetail, ElectionSummary},
    id::Id,
};
use crate::store::{bounded, Store};

pub fn routes() -> Vec<Route> {
    routes![elections, election]
}

/// All elections, newest first.
#[get("/elections")]
async fn elections(store: &State<Arc<dyn Store>>) -> Result<Json<Vec<ElectionSummary>>> {
    let elections = bounded(store.elections()).await?;
    Ok(Json(elections.iter().map(ElectionSummary::from).collect()))
}

/// A single election with its candidates and running totals.
#[get("/elections/<election_id>")]
async fn election(
    election_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<ElectionDetail>> {
    let election = bounded(store.election(election_id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("No election found with ID {election_id}")))?;
    let candidates = bounded(store.candidates_for(election_id)).await?;
    Ok(Json(ElectionDetail::new(&election, candidates)))
}
