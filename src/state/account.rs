use super::AppState;
use crate::error::{RoundError, RoundResult};
use crate::types::*;

impl AppState {
    /// Look up the account for an external user, creating it on first login
    pub async fn login_account(
        &self,
        external_user_id: &str,
        display_name: Option<&str>,
    ) -> RoundResult<Account> {
        let external_user_id = external_user_id.trim();
        if external_user_id.is_empty() {
            return Err(RoundError::InvalidName(
                "external user id can't be blank".to_string(),
            ));
        }
        let display_name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from);

        let mut store = self.store.write().await;
        if let Some(account) = store
            .accounts
            .values_mut()
            .find(|a| a.external_user_id == external_user_id)
        {
            if display_name.is_some() {
                account.display_name = display_name;
            }
            return Ok(account.clone());
        }

        let account = Account {
            id: ulid::Ulid::new().to_string(),
            external_user_id: external_user_id.to_string(),
            display_name,
            provider_token: None,
        };
        store.accounts.insert(account.id.clone(), account.clone());
        tracing::info!("Created account {} for {}", account.id, external_user_id);
        Ok(account)
    }

    pub async fn get_account(&self, account_id: &str) -> RoundResult<Account> {
        self.store
            .read()
            .await
            .accounts
            .get(account_id)
            .cloned()
            .ok_or(RoundError::AccountNotFound)
    }
}
