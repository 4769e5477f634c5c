//! Ledger entry lifecycle: create, update, delete, read.
//!
//! Every mutating operation is an explicit sequence of independent writes
//! (header, items, balance) with compensating actions run in reverse order
//! on the first failure. There is no claimed crash-atomicity: a crash
//! mid-sequence leaves partial state for manual reconciliation, but any
//! failure detected within the call is compensated before it returns. A
//! compensation that itself fails escalates as
//! [`EngineError::Consistency`].

use sea_orm::{Condition, ConnectionTrait, QueryFilter, QueryOrder, prelude::*};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    Caller, CreateEntryCmd, EngineError, Entry, EntryItem, EntryItemInput, EntryListFilter,
    ResultEngine, ShareFilter, UpdateEntryCmd, entries, entry_items, products,
};

use super::Engine;

/// Escalate a failed compensation: the stored state no longer matches what
/// the caller saw, and nothing in this call can repair it.
fn escalate(context: &str, err: EngineError) -> EngineError {
    error!(context, %err, "compensating rollback failed; manual reconciliation required");
    EngineError::Consistency(format!("{context}: rollback failed: {err}"))
}

impl Engine {
    /// Create a ledger entry (header + optional line items), keeping any
    /// attached account's balance in sync.
    pub async fn create_entry(&self, caller: &Caller, cmd: CreateEntryCmd) -> ResultEngine<Entry> {
        entries::validate_amounts(cmd.kind, cmd.debit, cmd.credit)?;
        let mut group_id =
            self.resolve_share(caller, cmd.share_to_group, cmd.group_id.as_deref())?;

        if let Some(account_id) = cmd.account_id {
            let account = self
                .require_account_access(&self.database, account_id, caller)
                .await?;
            match (&group_id, &account.group_id) {
                (Some(entry_group), Some(account_group)) if entry_group != account_group => {
                    return Err(EngineError::Validation(
                        "entry group does not match account group".to_string(),
                    ));
                }
                // A private entry posted against a shared account inherits
                // the account's group.
                (None, Some(account_group)) => group_id = Some(account_group.clone()),
                _ => {}
            }
        }

        let entry = Entry {
            id: Uuid::new_v4(),
            kind: cmd.kind,
            debit: cmd.debit,
            credit: cmd.credit,
            account_id: cmd.account_id,
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
            user_id: caller.user_id.clone(),
            group_id,
        };
        let items = self
            .normalize_items(&self.database, &cmd.items, entry.id, entry.amount())
            .await?;

        // Step 1: header.
        entries::ActiveModel::from(&entry)
            .insert(&self.database)
            .await?;

        // Step 2: items; compensate with a header delete so no orphan header
        // remains.
        if let Err(err) = self.insert_items(&self.database, &items).await {
            warn!(entry = %entry.id, "item persistence failed; removing header");
            self.remove_entry_rows(entry.id)
                .await
                .map_err(|comp| escalate("create_entry items", comp))?;
            return Err(err);
        }

        // Step 3: balance; compensate by removing everything written in this
        // call.
        if let Some(account_id) = entry.account_id {
            if let Err(err) = self.apply_delta(account_id, entry.delta()).await {
                warn!(entry = %entry.id, account = %account_id, "balance sync failed; rolling back entry");
                self.remove_entry_rows(entry.id)
                    .await
                    .map_err(|comp| escalate("create_entry balance", comp))?;
                return Err(err);
            }
        }

        debug!(entry = %entry.id, kind = entry.kind.as_str(), "entry created");
        Ok(entry)
    }

    /// Update an entry. Unsupplied fields keep their stored values; when
    /// items are supplied they replace the old ones wholesale, otherwise the
    /// existing items must still satisfy the subtotal invariant against the
    /// new amounts.
    pub async fn update_entry(&self, caller: &Caller, cmd: UpdateEntryCmd) -> ResultEngine<Entry> {
        if cmd.clear_account && cmd.account_id.is_some() {
            return Err(EngineError::Validation(
                "clear_account and account_id are mutually exclusive".to_string(),
            ));
        }

        let old_model = self
            .require_entry_owner(&self.database, cmd.entry_id, caller)
            .await?;
        let old = Entry::try_from(old_model.clone())?;

        let mut merged = Entry {
            id: old.id,
            kind: cmd.kind.unwrap_or(old.kind),
            debit: cmd.debit.unwrap_or(old.debit),
            credit: cmd.credit.unwrap_or(old.credit),
            account_id: if cmd.clear_account {
                None
            } else {
                cmd.account_id.or(old.account_id)
            },
            description: cmd.description.clone().or_else(|| old.description.clone()),
            occurred_at: cmd.occurred_at.unwrap_or(old.occurred_at),
            user_id: old.user_id.clone(),
            group_id: old.group_id.clone(),
        };
        entries::validate_amounts(merged.kind, merged.debit, merged.credit)?;

        if merged.account_id != old.account_id
            && let Some(account_id) = merged.account_id
        {
            let account = self
                .require_account_access(&self.database, account_id, caller)
                .await?;
            match (&merged.group_id, &account.group_id) {
                (Some(entry_group), Some(account_group)) if entry_group != account_group => {
                    return Err(EngineError::Validation(
                        "entry group does not match account group".to_string(),
                    ));
                }
                (None, Some(account_group)) => merged.group_id = Some(account_group.clone()),
                _ => {}
            }
        }

        let old_items = self.items_for_entry(&self.database, old.id).await?;
        let new_items = match &cmd.items {
            Some(inputs) => Some(
                self.normalize_items(&self.database, inputs, merged.id, merged.amount())
                    .await?,
            ),
            None => {
                // Amounts changed without adjusting items is a caller error.
                if !old_items.is_empty() {
                    let sum: i64 = old_items.iter().map(|item| item.subtotal).sum();
                    if sum != merged.amount() {
                        return Err(EngineError::Validation(format!(
                            "item subtotals sum to {sum}, expected {}",
                            merged.amount()
                        )));
                    }
                }
                None
            }
        };

        // Step 1: header.
        entries::ActiveModel::from(&merged)
            .update(&self.database)
            .await?;

        // Step 2: replace items when supplied.
        if let Some(new_items) = &new_items
            && let Err(err) = self.swap_items(merged.id, new_items).await
        {
            self.undo_update(&old_model, Some(&old_items), None)
                .await
                .map_err(|comp| escalate("update_entry items", comp))?;
            return Err(err);
        }
        let items_replaced = new_items.is_some();
        let restore_items = items_replaced.then_some(old_items.as_slice());

        // Step 3: balances.
        let old_delta = old.delta();
        let new_delta = merged.delta();
        if merged.account_id == old.account_id {
            if let Some(account_id) = merged.account_id
                && new_delta != old_delta
                && let Err(err) = self.apply_delta(account_id, new_delta - old_delta).await
            {
                self.undo_update(&old_model, restore_items, None)
                    .await
                    .map_err(|comp| escalate("update_entry balance", comp))?;
                return Err(err);
            }
        } else {
            if let Some(old_account) = old.account_id
                && let Err(err) = self.reverse_delta(old_account, old_delta).await
            {
                self.undo_update(&old_model, restore_items, None)
                    .await
                    .map_err(|comp| escalate("update_entry reversal", comp))?;
                return Err(err);
            }
            if let Some(new_account) = merged.account_id
                && let Err(err) = self.apply_delta(new_account, new_delta).await
            {
                // Compensations in reverse order: re-apply the reversed
                // delta first, then items, then the header.
                let reapply = old.account_id.map(|id| (id, old_delta));
                self.undo_update(&old_model, restore_items, reapply)
                    .await
                    .map_err(|comp| escalate("update_entry reattribution", comp))?;
                return Err(err);
            }
        }

        debug!(entry = %merged.id, "entry updated");
        Ok(merged)
    }

    /// Delete an entry, reversing its balance effect first. If the reversal
    /// fails the delete does not proceed.
    pub async fn delete_entry(&self, caller: &Caller, entry_id: Uuid) -> ResultEngine<()> {
        let model = self
            .require_entry_owner(&self.database, entry_id, caller)
            .await?;
        let entry = Entry::try_from(model.clone())?;
        let items = self.items_for_entry(&self.database, entry_id).await?;

        if let Some(account_id) = entry.account_id {
            self.reverse_delta(account_id, entry.delta()).await?;
        }

        // Items reference the header, so they go first.
        if let Err(err) = entry_items::Entity::delete_many()
            .filter(entry_items::Column::EntryId.eq(entry_id))
            .exec(&self.database)
            .await
        {
            let err = EngineError::from(err);
            if let Some(account_id) = entry.account_id {
                self.apply_delta(account_id, entry.delta())
                    .await
                    .map_err(|comp| escalate("delete_entry items", comp))?;
            }
            return Err(err);
        }

        if let Err(err) = entries::Entity::delete_by_id(entry_id)
            .exec(&self.database)
            .await
        {
            let err = EngineError::from(err);
            self.undo_delete(&items, entry.account_id.map(|id| (id, entry.delta())))
                .await
                .map_err(|comp| escalate("delete_entry header", comp))?;
            return Err(err);
        }

        debug!(entry = %entry_id, "entry deleted");
        Ok(())
    }

    /// Return an entry with its items, if visible to the caller.
    pub async fn entry(
        &self,
        caller: &Caller,
        entry_id: Uuid,
    ) -> ResultEngine<(Entry, Vec<EntryItem>)> {
        let model = entries::Entity::find_by_id(entry_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("entry".to_string()))?;
        if !self.entry_visible(caller, &model) {
            return Err(EngineError::NotFound("entry".to_string()));
        }
        let items = self.items_for_entry(&self.database, entry_id).await?;
        Ok((Entry::try_from(model)?, items))
    }

    /// List entries visible to the caller, newest first.
    pub async fn list_entries(
        &self,
        caller: &Caller,
        filter: EntryListFilter,
    ) -> ResultEngine<Vec<Entry>> {
        let visibility = match &filter.share {
            ShareFilter::Own => Condition::all()
                .add(entries::Column::UserId.eq(caller.user_id.clone()))
                .add(entries::Column::GroupId.is_null()),
            ShareFilter::Group(None) => {
                let group_id = caller.group_id.clone().ok_or_else(|| {
                    EngineError::Validation("caller has no group to filter by".to_string())
                })?;
                Condition::all().add(entries::Column::GroupId.eq(group_id))
            }
            ShareFilter::Group(Some(group_id)) => {
                if !caller.privileged && caller.group_id.as_deref() != Some(group_id.as_str()) {
                    return Err(EngineError::Unauthorized(
                        "cannot list a foreign group's entries".to_string(),
                    ));
                }
                Condition::all().add(entries::Column::GroupId.eq(group_id.clone()))
            }
            ShareFilter::All => {
                let mut cond =
                    Condition::any().add(entries::Column::UserId.eq(caller.user_id.clone()));
                if let Some(group_id) = &caller.group_id {
                    cond = cond.add(entries::Column::GroupId.eq(group_id.clone()));
                }
                cond
            }
        };

        let mut query = entries::Entity::find().filter(visibility);
        if let Some(from) = filter.from {
            query = query.filter(entries::Column::OccurredAt.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(entries::Column::OccurredAt.lt(to));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(entries::Column::Kind.eq(kind.as_str()));
        }
        if let Some(account_id) = filter.account_id {
            query = query.filter(entries::Column::AccountId.eq(account_id));
        }

        let models = query
            .order_by_desc(entries::Column::OccurredAt)
            .all(&self.database)
            .await?;
        models.into_iter().map(Entry::try_from).collect()
    }

    /// Resolve caller-supplied item inputs against existing products and
    /// enforce the subtotal invariant against the entry amount.
    async fn normalize_items<C: ConnectionTrait>(
        &self,
        db: &C,
        inputs: &[EntryItemInput],
        entry_id: Uuid,
        amount: i64,
    ) -> ResultEngine<Vec<EntryItem>> {
        let mut items = Vec::with_capacity(inputs.len());
        for input in inputs {
            products::Entity::find_by_id(input.product_id)
                .one(db)
                .await?
                .ok_or_else(|| EngineError::NotFound("product".to_string()))?;
            items.push(EntryItem {
                id: Uuid::new_v4(),
                entry_id,
                product_id: input.product_id,
                quantity: input.quantity,
                subtotal: input.resolve_subtotal()?,
            });
        }

        if !items.is_empty() {
            let sum: i64 = items.iter().map(|item| item.subtotal).sum();
            if sum != amount {
                return Err(EngineError::Validation(format!(
                    "item subtotals sum to {sum}, expected {amount}"
                )));
            }
        }
        Ok(items)
    }

    async fn insert_items<C: ConnectionTrait>(
        &self,
        db: &C,
        items: &[EntryItem],
    ) -> ResultEngine<()> {
        for item in items {
            entry_items::ActiveModel::from(item).insert(db).await?;
        }
        Ok(())
    }

    async fn items_for_entry<C: ConnectionTrait>(
        &self,
        db: &C,
        entry_id: Uuid,
    ) -> ResultEngine<Vec<EntryItem>> {
        let models = entry_items::Entity::find()
            .filter(entry_items::Column::EntryId.eq(entry_id))
            .all(db)
            .await?;
        Ok(models.into_iter().map(EntryItem::from).collect())
    }

    async fn swap_items(&self, entry_id: Uuid, new_items: &[EntryItem]) -> ResultEngine<()> {
        entry_items::Entity::delete_many()
            .filter(entry_items::Column::EntryId.eq(entry_id))
            .exec(&self.database)
            .await?;
        self.insert_items(&self.database, new_items).await
    }

    /// Remove an entry's items and header, in that order.
    async fn remove_entry_rows(&self, entry_id: Uuid) -> ResultEngine<()> {
        entry_items::Entity::delete_many()
            .filter(entry_items::Column::EntryId.eq(entry_id))
            .exec(&self.database)
            .await?;
        entries::Entity::delete_by_id(entry_id)
            .exec(&self.database)
            .await?;
        Ok(())
    }

    /// Compensations for a failed header delete: put the items back, then
    /// re-apply the reversed delta.
    async fn undo_delete(
        &self,
        items: &[EntryItem],
        reapply: Option<(Uuid, i64)>,
    ) -> ResultEngine<()> {
        self.insert_items(&self.database, items).await?;
        if let Some((account_id, delta)) = reapply {
            self.apply_delta(account_id, delta).await?;
        }
        Ok(())
    }

    /// Compensations for a failed update, in reverse order of the original
    /// writes: re-apply a reversed balance delta, restore the old items,
    /// restore the old header.
    async fn undo_update(
        &self,
        old_header: &entries::Model,
        old_items: Option<&[EntryItem]>,
        reapply: Option<(Uuid, i64)>,
    ) -> ResultEngine<()> {
        if let Some((account_id, delta)) = reapply {
            self.apply_delta(account_id, delta).await?;
        }
        if let Some(old_items) = old_items {
            self.swap_items(old_header.id, old_items).await?;
        }
        let old = Entry::try_from(old_header.clone())?;
        entries::ActiveModel::from(&old).update(&self.database).await?;
        Ok(())
    }
}
