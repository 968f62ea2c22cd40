#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use rocket::{Build, Rocket};

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod policy;
pub mod registry;
pub mod store;
pub mod workflow;

use config::{ConfigFairing, IdentityFairing, ServiceFairing, StorageFairing};
use logging::LoggerFairing;

/// Build the rocket, ready for ignition. All launch-time setup (config,
/// storage, identity provider, service layer) happens in the attached
/// fairings.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// Attach the fairings and mount the routes. The fairing order matters:
/// the service layer is assembled from state the earlier fairings manage.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .attach(ConfigFairing)
        .attach(StorageFairing)
        .attach(IdentityFairing)
        .attach(ServiceFairing)
        .attach(LoggerFairing)
        .mount("/", api::routes())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client;

    use crate::identity::LocalIdentityProvider;
    use crate::store::Store;

    use super::*;

    /// A rocket wired to the in-memory store and the local identity
    /// provider, with demo logins enabled.
    pub fn test_rocket() -> Rocket<Build> {
        // These tests drive the whole stack, so enable logging.
        log4rs_test_utils::test_logging::init_logging_once_for(["ubvote_backend"], None, None);

        let figment = Figment::from(rocket::Config::debug_default())
            .merge(("storage", "memory"))
            .merge(("identity", "local"))
            .merge(("demo_logins", true))
            .merge(("auth_ttl", 3600))
            .merge(("jwt_secret", "the-test-jwt-secret"));
        assemble(rocket::custom(figment))
    }

    pub async fn test_client() -> Client {
        Client::tracked(test_rocket())
            .await
            .expect("Failed to ignite the test rocket")
    }

    /// The store behind the given test client.
    pub fn store(client: &Client) -> Arc<dyn Store> {
        client
            .rocket()
            .state::<Arc<dyn Store>>()
            .expect("The store is always managed")
            .clone()
    }

    /// The identity provider behind the given test client, concretely typed
    /// so tests can mint verification tokens.
    pub fn provider(client: &Client) -> Arc<LocalIdentityProvider> {
        client
            .rocket()
            .state::<Arc<LocalIdentityProvider>>()
            .expect("Tests always run on the local identity provider")
            .clone()
    }
}
