//! Account balance synchronization.
//!
//! `closing_balance` is derived-but-stored; every mutation of an entry that
//! points at an account funnels through [`Engine::apply_delta`] so the
//! running total stays exactly consistent with the ledger. The read and the
//! write run inside a single store transaction, so two concurrent deltas
//! against the same account cannot lose an update.

use sea_orm::{ActiveValue, ConnectionTrait, TransactionTrait, prelude::*};
use tracing::debug;
use uuid::Uuid;

use crate::{EngineError, ResultEngine, accounts};

use super::{Engine, with_tx};

impl Engine {
    /// Apply a signed delta to an account's closing balance, returning the
    /// new balance.
    pub async fn apply_delta(&self, account_id: Uuid, delta: i64) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            self.apply_delta_in(&db_tx, account_id, delta).await
        })
    }

    /// Undo a previously applied delta.
    pub async fn reverse_delta(&self, account_id: Uuid, delta: i64) -> ResultEngine<i64> {
        self.apply_delta(account_id, -delta).await
    }

    pub(super) async fn apply_delta_in<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
        delta: i64,
    ) -> ResultEngine<i64> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;

        let new_balance = model.closing_balance.checked_add(delta).ok_or_else(|| {
            EngineError::Consistency(format!("balance overflow for account {account_id}"))
        })?;
        let active = accounts::ActiveModel {
            id: ActiveValue::Set(account_id),
            closing_balance: ActiveValue::Set(new_balance),
            ..Default::default()
        };
        active.update(db).await?;

        debug!(account = %account_id, delta, new_balance, "balance updated");
        Ok(new_balance)
    }
}
