//! Ledger line items.
//!
//! A line item freezes its subtotal at entry-creation time; no unit price is
//! persisted.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Line item exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryItem {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub subtotal: i64,
}

/// Line-item input as supplied by callers: the subtotal is either given
/// directly or derived once from `unit_price × quantity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryItemInput {
    pub product_id: Uuid,
    pub quantity: i64,
    pub subtotal: Option<i64>,
    pub unit_price: Option<i64>,
}

impl EntryItemInput {
    pub fn with_subtotal(product_id: Uuid, quantity: i64, subtotal: i64) -> Self {
        Self {
            product_id,
            quantity,
            subtotal: Some(subtotal),
            unit_price: None,
        }
    }

    pub fn with_unit_price(product_id: Uuid, quantity: i64, unit_price: i64) -> Self {
        Self {
            product_id,
            quantity,
            subtotal: None,
            unit_price: Some(unit_price),
        }
    }

    /// Resolve the frozen subtotal. A direct subtotal wins over a unit price;
    /// an item carrying neither is rejected.
    pub(crate) fn resolve_subtotal(&self) -> ResultEngine<i64> {
        if self.quantity <= 0 {
            return Err(EngineError::Validation(
                "item quantity must be > 0".to_string(),
            ));
        }
        if let Some(subtotal) = self.subtotal {
            if subtotal < 0 {
                return Err(EngineError::Validation(
                    "item subtotal must not be negative".to_string(),
                ));
            }
            return Ok(subtotal);
        }
        if let Some(unit_price) = self.unit_price {
            if unit_price < 0 {
                return Err(EngineError::Validation(
                    "item unit price must not be negative".to_string(),
                ));
            }
            return unit_price.checked_mul(self.quantity).ok_or_else(|| {
                EngineError::Validation("item subtotal overflows".to_string())
            });
        }
        Err(EngineError::Validation(
            "item requires a subtotal or a unit price".to_string(),
        ))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "entry_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub entry_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub subtotal: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::entries::Entity",
        from = "Column::EntryId",
        to = "super::entries::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Entries,
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Products,
}

impl Related<super::entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&EntryItem> for ActiveModel {
    fn from(item: &EntryItem) -> Self {
        Self {
            id: ActiveValue::Set(item.id),
            entry_id: ActiveValue::Set(item.entry_id),
            product_id: ActiveValue::Set(item.product_id),
            quantity: ActiveValue::Set(item.quantity),
            subtotal: ActiveValue::Set(item.subtotal),
        }
    }
}

impl From<Model> for EntryItem {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            entry_id: model.entry_id,
            product_id: model.product_id,
            quantity: model.quantity,
            subtotal: model.subtotal,
        }
    }
}
