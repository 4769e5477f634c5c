//! Cash account CRUD.

use sea_orm::{Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Account, Caller, EngineError, ResultEngine, accounts, entries, util::normalize_display};

use super::{Engine, with_tx};

impl Engine {
    /// Create a cash account; the opening balance seeds the closing balance.
    pub async fn new_account(
        &self,
        caller: &Caller,
        name: &str,
        opening_balance: i64,
        share_to_group: bool,
    ) -> ResultEngine<Account> {
        let name = normalize_display(name, "account")?;
        let group_id = self.resolve_share(caller, share_to_group, None)?;
        let account = Account::new(name, opening_balance, caller.user_id.clone(), group_id);
        accounts::ActiveModel::from(&account)
            .insert(&self.database)
            .await?;
        Ok(account)
    }

    /// Return an account visible to the caller.
    pub async fn account(&self, caller: &Caller, account_id: Uuid) -> ResultEngine<Account> {
        let model = self
            .require_account_access(&self.database, account_id, caller)
            .await?;
        Account::try_from(model)
    }

    /// Accounts visible to the caller: their own plus their group's.
    pub async fn list_accounts(&self, caller: &Caller) -> ResultEngine<Vec<Account>> {
        let mut condition =
            Condition::any().add(accounts::Column::UserId.eq(caller.user_id.clone()));
        if let Some(group_id) = &caller.group_id {
            condition = condition.add(accounts::Column::GroupId.eq(group_id.clone()));
        }
        let models = accounts::Entity::find()
            .filter(condition)
            .order_by_asc(accounts::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Account::try_from).collect()
    }

    /// Delete an account. Blocked while ledger entries still point at it:
    /// removing the account would silently break the running-balance
    /// invariant for those entries.
    pub async fn delete_account(&self, caller: &Caller, account_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = accounts::Entity::find_by_id(account_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("account".to_string()))?;
            if model.user_id != caller.user_id && !caller.privileged {
                return Err(EngineError::Unauthorized(
                    "account belongs to another owner".to_string(),
                ));
            }

            let referenced = entries::Entity::find()
                .filter(entries::Column::AccountId.eq(account_id))
                .one(&db_tx)
                .await?
                .is_some();
            if referenced {
                return Err(EngineError::Conflict(
                    "account is referenced by ledger entries".to_string(),
                ));
            }

            model.delete(&db_tx).await?;
            Ok(())
        })
    }
}
