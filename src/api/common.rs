use std::sync::Arc;

use crate::auth::{AccessLevel, AuthToken, DemoDirectory};
use crate::error::{Error, Result};
use crate::model::account::Account;
use crate::store::{bounded, Store};

/// Return the signed-in account from the database via its token ID.
///
/// Demo sessions have no account record and are refused here; routes that
/// serve demo sessions branch on `token.is_demo()` before calling this.
pub async fn account_from_token<L: AccessLevel>(
    token: &AuthToken<L>,
    store: &Arc<dyn Store>,
) -> Result<Account> {
    let Some(id) = token.account_id() else {
        return Err(Error::BadRequest(
            "This action is not available to demo accounts".to_string(),
        ));
    };
    bounded(store.account(id))
        .await?
        .ok_or_else(|| Error::NotFound(format!("No account found with ID {id}")))
}

/// The display name to attribute the caller's actions to, e.g. on a review.
pub async fn display_name_from_token<L: AccessLevel>(
    token: &AuthToken<L>,
    store: &Arc<dyn Store>,
    demo: &DemoDirectory,
) -> Result<String> {
    if let Some(user) = demo.by_uid(&token.sub) {
        return Ok(user.full_name.to_string());
    }
    let account = account_from_token(token, store).await?;
    Ok(account.full_name.clone())
}
