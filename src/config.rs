use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::auth::{CredentialGate, DemoDirectory};
use crate::identity::{IdentityProvider, LocalIdentityProvider, RestIdentityProvider};
use crate::ledger::VoteLedger;
use crate::registry::IdentityRegistry;
use crate::store::{ensure_indexes_exist, MemoryStore, MongoStore, Store};
use crate::workflow::ApplicationWorkflow;

/// Application configuration, read from `Rocket.toml` and `ROCKET_*`
/// environment variables. Lives in managed state, so any endpoint can
/// consult it.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    demo_logins: bool,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// How long an auth token cookie stays valid, in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Whether the built-in demo accounts may sign in.
    pub fn demo_logins(&self) -> bool {
        self.demo_logins
    }

    /// Key used to sign auth token JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config into managed state.
/// `AdHoc::config` would do the same job; a named fairing keeps the launch
/// sequence uniform and the error reporting in our hands.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which storage backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// MongoDB, connected via `db_uri`.
    Mongo,
    /// A process-local table set; data lives only as long as the process.
    Memory,
}

/// Configuration selecting the storage backend.
#[derive(Deserialize)]
struct StorageConfig {
    storage: StorageBackend,
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that sets up the configured storage backend and places it into
/// managed state as an `Arc<dyn Store>`.
pub struct StorageFairing;

#[rocket::async_trait]
impl Fairing for StorageFairing {
    fn info(&self) -> Info {
        Info {
            name: "Storage",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StorageConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load storage config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Arc<dyn Store> = match config.storage {
            StorageBackend::Mongo => {
                let config = match rocket.figment().extract::<DbConfig>() {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to load database config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                info!("Database config loaded, connecting...");
                let client = match MongoClient::with_uri_str(config.db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name());

                // Ensure the required indexes exist.
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to ensure database indexes exist: {e}");
                    return Err(rocket);
                }
                info!("...database connection ready!");

                Arc::new(MongoStore::new(client, db))
            }
            StorageBackend::Memory => {
                info!("Using the in-memory store; data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// The database name to connect to (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "ubvote".to_string()
}

/// The database name to connect to (test version).
/// Randomised so that concurrently running tests never share a database.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Which identity provider to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityBackend {
    /// The hosted identity API, reached over HTTPS.
    Rest,
    /// A process-local provider; credentials are held in memory.
    Local,
}

/// Configuration selecting the identity provider.
#[derive(Deserialize)]
struct IdentityConfig {
    identity: IdentityBackend,
}

/// Configuration for the hosted identity API.
#[derive(Deserialize)]
struct RestIdentityConfig {
    identity_api_url: String,
    // secrets
    identity_api_key: String,
}

/// A fairing that sets up the configured identity provider and places it into
/// managed state as an `Arc<dyn IdentityProvider>`.
pub struct IdentityFairing;

#[rocket::async_trait]
impl Fairing for IdentityFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<IdentityConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load identity config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let provider: Arc<dyn IdentityProvider> = match config.identity {
            IdentityBackend::Rest => {
                let config = match rocket.figment().extract::<RestIdentityConfig>() {
                    Ok(config) => config,
                    Err(e) => {
                        error!("Failed to load identity API config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                info!("Using the hosted identity provider");
                Arc::new(RestIdentityProvider::new(
                    config.identity_api_url,
                    config.identity_api_key,
                ))
            }
            IdentityBackend::Local => {
                info!("Using the local identity provider; credentials are held in memory");
                let provider = Arc::new(LocalIdentityProvider::new());
                // The concrete provider stays managed as well, so verification
                // tokens can be minted without a real email in between.
                rocket = rocket.manage(provider.clone());
                provider
            }
        };

        // Manage the state.
        rocket = rocket.manage(provider);
        Ok(rocket)
    }
}

/// A fairing that assembles the service layer from the managed store and
/// identity provider. Must be attached after [`ConfigFairing`],
/// [`StorageFairing`] and [`IdentityFairing`].
pub struct ServiceFairing;

#[rocket::async_trait]
impl Fairing for ServiceFairing {
    fn info(&self) -> Info {
        Info {
            name: "Services",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let demo_logins = match rocket.state::<Config>() {
            Some(config) => config.demo_logins(),
            None => {
                error!("The application config must be loaded before the service layer");
                return Err(rocket);
            }
        };
        let store = match rocket.state::<Arc<dyn Store>>() {
            Some(store) => store.clone(),
            None => {
                error!("Storage must be set up before the service layer");
                return Err(rocket);
            }
        };
        let provider = match rocket.state::<Arc<dyn IdentityProvider>>() {
            Some(provider) => provider.clone(),
            None => {
                error!("The identity provider must be set up before the service layer");
                return Err(rocket);
            }
        };

        let demo = if demo_logins {
            info!("Demo logins are enabled");
            DemoDirectory::standard()
        } else {
            DemoDirectory::empty()
        };

        // Manage the state.
        rocket = rocket
            .manage(IdentityRegistry::new(store.clone(), provider, demo.clone()))
            .manage(VoteLedger::new(store.clone()))
            .manage(ApplicationWorkflow::new(store))
            .manage(CredentialGate::new())
            .manage(demo);
        Ok(rocket)
    }
}
