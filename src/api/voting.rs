use std::sync::Arc;

use rocket::{
    serde::json::{serde_json::json, Json, Value},
    Route, State,
};
use serde::Deserialize;

use crate::api::common::account_from_token;
use crate::auth::{AnyLevel, AuthToken};
use crate::error::{Error, Result};
use crate::ledger::VoteLedger;
use crate::model::{election::Election, id::Id, vote::VoteReceipt};
use crate::policy;
use crate::store::{bounded, Store};

pub fn routes() -> Vec<Route> {
    routes![eligibility, cast_vote]
}

async fn election_by_id(id: Id, store: &Arc<dyn Store>) -> Result<Election> {
    bounded(store.election(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("No election found with ID {id}")))
}

/// Whether the caller may vote in the given election right now, and if not,
/// why not. Voting itself re-checks all of this.
#[get("/elections/<election_id>/eligibility")]
async fn eligibility(
    token: AuthToken<AnyLevel>,
    election_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Value> {
    if token.is_demo() {
        return Ok(json!({
            "eligible": false,
            "reason": Error::DemoAccountCannotVote.to_string(),
        }));
    }

    let account = account_from_token(&token, store).await?;
    let election = election_by_id(election_id, store).await?;
    Ok(match policy::ensure_can_vote(&account, &election) {
        Ok(()) => json!({ "eligible": true, "reason": null }),
        Err(e) => json!({ "eligible": false, "reason": e.to_string() }),
    })
}

#[derive(Debug, Deserialize)]
struct CastRequest {
    candidate_id: String,
}

/// Cast the caller's vote for a candidate in the given election.
#[post("/elections/<election_id>/votes", data = "<request>", format = "json")]
async fn cast_vote(
    token: AuthToken<AnyLevel>,
    election_id: Id,
    request: Json<CastRequest>,
    store: &State<Arc<dyn Store>>,
    ledger: &State<VoteLedger>,
) -> Result<Json<VoteReceipt>> {
    // Demo sessions are refused before anything is even looked up.
    if token.is_demo() {
        return Err(Error::DemoAccountCannotVote);
    }

    let candidate_id: Id = request
        .candidate_id
        .parse()
        .map_err(|_| Error::BadRequest(format!("Invalid candidate ID {:?}", request.candidate_id)))?;
    let account = account_from_token(&token, store).await?;
    let election = election_by_id(election_id, store).await?;

    let receipt = ledger.cast(&account, &election, candidate_id).await?;
    Ok(Json(receipt))
}

#[cfg(test)]
mod tests {
    use rocket::local::asynchronous::Client;
    use rocket::{
        http::{ContentType, Status},
        serde::json::serde_json::json,
    };

    use crate::model::{
        account::Account,
        election::{Candidate, CandidateCore, ElectionCore, ElectionStatus},
    };
    use crate::store::Store as _;
    use crate::testing::{provider, store, test_client};

    use super::*;

    const EMAIL: &str = "202207201@ub.ac.bw";
    const PASSWORD: &str = "S3cure,Pass";

    /// Register, verify and sign in a student, returning their account.
    async fn signed_in_student(client: &Client) -> Account {
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

        store(client)
            .account_by_email(EMAIL)
            .await
            .unwrap()
            .unwrap()
    }

    async fn seeded_election(client: &Client) -> (crate::model::election::Election, Candidate) {
        let store = store(client);
        let election = store.insert_election(&ElectionCore::example()).await.unwrap();
        let candidate = store
            .insert_candidate(&CandidateCore::example(election.id))
            .await
            .unwrap();
        (election, candidate)
    }

    #[rocket::async_test]
    async fn a_verified_student_can_vote_once() {
        let client = test_client().await;
        signed_in_student(&client).await;
        let (election, candidate) = seeded_election(&client).await;

        // Eligible before voting.
        let response = client
            .get(uri!(eligibility(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(true, body["eligible"]);

        // Cast.
        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": candidate.id.to_string() }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let receipt: VoteReceipt = response.into_json().await.unwrap();
        assert_eq!(receipt.candidate_id, candidate.id.into());

        // The tally moved.
        let candidates = store(&client).candidates_for(election.id).await.unwrap();
        assert_eq!(1, candidates[0].vote_count);

        // No longer eligible, and a second cast conflicts.
        let response = client
            .get(uri!(eligibility(election.id)))
            .dispatch()
            .await;
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(false, body["eligible"]);

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": candidate.id.to_string() }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[rocket::async_test]
    async fn demo_accounts_cannot_vote() {
        let client = test_client().await;
        let (election, candidate) = seeded_election(&client).await;

        let response = client
            .post("/auth/login")
            .header(ContentType::JSON)
            .body(json!({ "email": "officer@ub.ac.bw", "password": "officer123" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get(uri!(eligibility(election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(false, body["eligible"]);

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": candidate.id.to_string() }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        assert!(store(&client)
            .votes_for_election(election.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[rocket::async_test]
    async fn closed_elections_refuse_votes() {
        let client = test_client().await;
        signed_in_student(&client).await;

        let mut core = ElectionCore::example();
        core.status = ElectionStatus::Completed;
        let election = store(&client).insert_election(&core).await.unwrap();
        let candidate = store(&client)
            .insert_candidate(&CandidateCore::example(election.id))
            .await
            .unwrap();

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": candidate.id.to_string() }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[rocket::async_test]
    async fn malformed_candidate_ids_are_bad_requests() {
        let client = test_client().await;
        signed_in_student(&client).await;
        let (election, _candidate) = seeded_election(&client).await;

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": "not-an-id" }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[rocket::async_test]
    async fn voting_requires_a_session() {
        let client = test_client().await;
        let (election, candidate) = seeded_election(&client).await;

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .body(json!({ "candidate_id": candidate.id.to_string() }).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }
}
