//! Failed-login tracking with a temporary lockout.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::Error;

/// Failed attempts allowed before an identifier is locked out.
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

const LOCKOUT_WINDOW_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy)]
struct AttemptRecord {
    count: u32,
    last_failure: DateTime<Utc>,
}

/// Tracks failed credential checks per identifier and refuses further checks
/// once the limit is hit.
///
/// A record expires once a full window passes without a failure, so a locked
/// identifier unlocks on its own. Attempts made while locked out are refused
/// before the credential check runs and do not extend the lockout. Expired
/// records are dropped whenever any attempt comes in, which keeps the map
/// bounded by the identifiers that failed within the last window.
///
/// The gate lives in Rocket managed state; its records do not survive a
/// restart.
#[derive(Debug)]
pub struct CredentialGate {
    window: Duration,
    attempts: Mutex<HashMap<String, AttemptRecord>>,
}

impl CredentialGate {
    /// A gate with the standard 15 minute window.
    pub fn new() -> Self {
        Self::with_window(Duration::minutes(LOCKOUT_WINDOW_MINUTES))
    }

    /// A gate with a custom window.
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Run a credential check through the gate.
    ///
    /// If the identifier is locked out, the check is not invoked at all and
    /// the caller gets [`Error::RateLimited`] with the minutes left. A
    /// successful check clears the identifier's history; a failed one counts
    /// against it and restarts the window.
    pub async fn attempt<T, C, F>(&self, identifier: &str, check: C) -> Result<T, Error>
    where
        C: FnOnce() -> F,
        F: Future<Output = Result<T, Error>>,
    {
        let key = identifier.trim().to_lowercase();
        {
            let mut attempts = self.attempts.lock().await;
            let now = Utc::now();
            // Sweep every stale record, not just this identifier's, so
            // one-off failures do not pile up for the life of the process.
            attempts.retain(|_, record| now - record.last_failure < self.window);
            if let Some(record) = attempts.get(&key) {
                if record.count >= MAX_FAILED_ATTEMPTS {
                    let remaining = self.window - (now - record.last_failure);
                    // Round up so the message never promises zero minutes.
                    let minutes = (remaining.num_seconds() + 59) / 60;
                    return Err(Error::RateLimited(minutes.max(1)));
                }
            }
        }

        // The lock is not held across the check, so slow credential checks
        // do not serialise unrelated logins.
        match check().await {
            Ok(value) => {
                self.attempts.lock().await.remove(&key);
                Ok(value)
            }
            Err(e) => {
                let mut attempts = self.attempts.lock().await;
                let record = attempts.entry(key).or_insert(AttemptRecord {
                    count: 0,
                    last_failure: Utc::now(),
                });
                record.count += 1;
                record.last_failure = Utc::now();
                Err(e)
            }
        }
    }
}

impl Default for CredentialGate {
    fn default() -> Self {
        Self::new()
    }
}
