//! Ownership and sharing checks.
//!
//! Scope discipline: every record is private to one user or shared with one
//! group, nothing is implicitly global. Only privileged callers act on
//! behalf of another owner.

use sea_orm::{ConnectionTrait, prelude::*};
use uuid::Uuid;

use crate::{Caller, EngineError, ResultEngine, accounts, entries};

use super::Engine;

impl Engine {
    /// Resolve the sharing target for a new record: an explicit
    /// share-to-group flag wins over a raw group id, which wins over
    /// defaulting to private. Non-privileged callers may only name their own
    /// group.
    pub(super) fn resolve_share(
        &self,
        caller: &Caller,
        share_to_group: bool,
        group_id: Option<&str>,
    ) -> ResultEngine<Option<String>> {
        if share_to_group {
            return caller
                .group_id
                .clone()
                .map(Some)
                .ok_or_else(|| {
                    EngineError::Validation(
                        "cannot share to group: caller has no group".to_string(),
                    )
                });
        }
        if let Some(group_id) = group_id {
            if !caller.privileged && caller.group_id.as_deref() != Some(group_id) {
                return Err(EngineError::Unauthorized(
                    "cannot attribute a record to a foreign group".to_string(),
                ));
            }
            return Ok(Some(group_id.to_string()));
        }
        Ok(None)
    }

    /// Fetch an account the caller may post against: the owner, a group-mate,
    /// or a privileged caller.
    pub(super) async fn require_account_access<C: ConnectionTrait>(
        &self,
        db: &C,
        account_id: Uuid,
        caller: &Caller,
    ) -> ResultEngine<accounts::Model> {
        let model = accounts::Entity::find_by_id(account_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("account".to_string()))?;

        let group_mate = match (&model.group_id, &caller.group_id) {
            (Some(account_group), Some(caller_group)) => account_group == caller_group,
            _ => false,
        };
        if model.user_id != caller.user_id && !group_mate && !caller.privileged {
            return Err(EngineError::Unauthorized(
                "account belongs to another owner".to_string(),
            ));
        }
        Ok(model)
    }

    /// Fetch an entry the caller may mutate: the owner or a privileged
    /// caller.
    pub(super) async fn require_entry_owner<C: ConnectionTrait>(
        &self,
        db: &C,
        entry_id: Uuid,
        caller: &Caller,
    ) -> ResultEngine<entries::Model> {
        let model = entries::Entity::find_by_id(entry_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("entry".to_string()))?;
        if model.user_id != caller.user_id && !caller.privileged {
            return Err(EngineError::Unauthorized(
                "entry belongs to another owner".to_string(),
            ));
        }
        Ok(model)
    }

    /// Read visibility for an entry: owner, group-mate on a shared entry, or
    /// privileged.
    pub(super) fn entry_visible(&self, caller: &Caller, model: &entries::Model) -> bool {
        if caller.privileged || model.user_id == caller.user_id {
            return true;
        }
        match (&model.group_id, &caller.group_id) {
            (Some(entry_group), Some(caller_group)) => entry_group == caller_group,
            _ => false,
        }
    }
}
