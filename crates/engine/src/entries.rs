//! Ledger entry headers.
//!
//! An entry records money received (`inflow`, debit-positive) or spent
//! (`outflow`, credit-positive). The kind determines which side must be
//! positive; when line items exist their subtotals must sum to that amount
//! (checked in the ops layer).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Inflow,
    Outflow,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inflow => "inflow",
            Self::Outflow => "outflow",
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "inflow" => Ok(Self::Inflow),
            "outflow" => Ok(Self::Outflow),
            other => Err(EngineError::Validation(format!(
                "invalid entry kind: {other}"
            ))),
        }
    }
}

/// Ledger entry header exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub kind: EntryKind,
    pub debit: i64,
    pub credit: i64,
    pub account_id: Option<Uuid>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub user_id: String,
    pub group_id: Option<String>,
}

impl Entry {
    /// Net effect of the entry on an attached account.
    pub fn delta(&self) -> i64 {
        self.debit - self.credit
    }

    /// The positive side: debit for inflows, credit for outflows.
    pub fn amount(&self) -> i64 {
        match self.kind {
            EntryKind::Inflow => self.debit,
            EntryKind::Outflow => self.credit,
        }
    }
}

/// Exactly one of debit/credit is positive and it matches the kind
/// (`inflow` ⇒ debit>0, credit=0; `outflow` ⇒ credit>0, debit=0).
pub(crate) fn validate_amounts(kind: EntryKind, debit: i64, credit: i64) -> ResultEngine<()> {
    if debit < 0 || credit < 0 {
        return Err(EngineError::Validation(
            "amounts must not be negative".to_string(),
        ));
    }
    let ok = match kind {
        EntryKind::Inflow => debit > 0 && credit == 0,
        EntryKind::Outflow => credit > 0 && debit == 0,
    };
    if !ok {
        return Err(EngineError::Validation(format!(
            "{} entry requires {} > 0 and {} = 0",
            kind.as_str(),
            match kind {
                EntryKind::Inflow => "debit",
                EntryKind::Outflow => "credit",
            },
            match kind {
                EntryKind::Inflow => "credit",
                EntryKind::Outflow => "debit",
            },
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub debit: i64,
    pub credit: i64,
    pub account_id: Option<Uuid>,
    pub description: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub user_id: String,
    pub group_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
    #[sea_orm(has_many = "super::entry_items::Entity")]
    EntryItems,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::entry_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EntryItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Entry> for ActiveModel {
    fn from(entry: &Entry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id),
            kind: ActiveValue::Set(entry.kind.as_str().to_string()),
            debit: ActiveValue::Set(entry.debit),
            credit: ActiveValue::Set(entry.credit),
            account_id: ActiveValue::Set(entry.account_id),
            description: ActiveValue::Set(entry.description.clone()),
            occurred_at: ActiveValue::Set(entry.occurred_at),
            user_id: ActiveValue::Set(entry.user_id.clone()),
            group_id: ActiveValue::Set(entry.group_id.clone()),
        }
    }
}

impl TryFrom<Model> for Entry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            kind: EntryKind::try_from(model.kind.as_str())?,
            debit: model.debit,
            credit: model.credit,
            account_id: model.account_id,
            description: model.description,
            occurred_at: model.occurred_at,
            user_id: model.user_id,
            group_id: model.group_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_amounts_pass() {
        assert!(validate_amounts(EntryKind::Inflow, 120_000, 0).is_ok());
        assert!(validate_amounts(EntryKind::Outflow, 0, 50_000).is_ok());
    }

    #[test]
    fn mismatched_sides_are_rejected() {
        assert!(validate_amounts(EntryKind::Inflow, 0, 50_000).is_err());
        assert!(validate_amounts(EntryKind::Outflow, 120_000, 0).is_err());
        assert!(validate_amounts(EntryKind::Inflow, 100, 100).is_err());
        assert!(validate_amounts(EntryKind::Inflow, 0, 0).is_err());
        assert!(validate_amounts(EntryKind::Inflow, -1, 0).is_err());
    }
}
