//! Cash accounts with a derived-but-stored running balance.
//!
//! The central invariant of the whole core: `closing_balance` always equals
//! `opening_balance` plus the net effect (`debit − credit`) of every ledger
//! entry currently pointing at the account.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

/// Cash account exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub opening_balance: i64,
    pub closing_balance: i64,
    pub user_id: String,
    pub group_id: Option<String>,
}

impl Account {
    pub fn new(
        name: String,
        opening_balance: i64,
        user_id: String,
        group_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            opening_balance,
            // A fresh account has seen no entries yet.
            closing_balance: opening_balance,
            user_id,
            group_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub opening_balance: i64,
    pub closing_balance: i64,
    pub user_id: String,
    pub group_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::entries::Entity")]
    Entries,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id),
            name: ActiveValue::Set(account.name.clone()),
            opening_balance: ActiveValue::Set(account.opening_balance),
            closing_balance: ActiveValue::Set(account.closing_balance),
            user_id: ActiveValue::Set(account.user_id.clone()),
            group_id: ActiveValue::Set(account.group_id.clone()),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            opening_balance: model.opening_balance,
            closing_balance: model.closing_balance,
            user_id: model.user_id,
            group_id: model.group_id,
        })
    }
}
