//! Bookkeeping category registry.
//!
//! Inflow/outflow categories occupy a stable slot in the sequence-code
//! taxonomy (see [`crate::buckets`]); product/market categories never carry a
//! code.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Bucket, EngineError, Scope, buckets};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Inflow,
    Outflow,
    Product,
    Market,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inflow => "inflow",
            Self::Outflow => "outflow",
            Self::Product => "product",
            Self::Market => "market",
        }
    }

    /// Only bookkeeping kinds participate in sequence-code allocation.
    pub fn is_bookkeeping(self) -> bool {
        matches!(self, Self::Inflow | Self::Outflow)
    }
}

impl TryFrom<&str> for CategoryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "inflow" => Ok(Self::Inflow),
            "outflow" => Ok(Self::Outflow),
            "product" => Ok(Self::Product),
            "market" => Ok(Self::Market),
            other => Err(EngineError::Validation(format!(
                "invalid category kind: {other}"
            ))),
        }
    }
}

/// Category exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    pub subgroup: Option<Bucket>,
    pub sequence_code: Option<i32>,
    pub user_id: String,
    pub group_id: Option<String>,
}

impl Category {
    /// Effective bucket: explicit subgroup first, sequence code second.
    pub fn bucket(&self) -> Option<Bucket> {
        buckets::classify(self.subgroup, self.sequence_code)
    }

    pub fn scope(&self) -> Scope {
        match &self.group_id {
            Some(group_id) => Scope::Group(group_id.clone()),
            None => Scope::User(self.user_id.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub name_key: String,
    pub kind: String,
    pub subgroup: Option<String>,
    pub sequence_code: Option<i32>,
    pub user_id: String,
    pub group_id: Option<String>,
    /// Denormalized scope discriminator backing the per-scope unique indexes
    /// on `name_key` and `sequence_code`.
    pub scope_key: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::products::Entity")]
    Products,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id),
            name: ActiveValue::Set(category.name.clone()),
            name_key: ActiveValue::Set(crate::util::normalize_key(&category.name)),
            kind: ActiveValue::Set(category.kind.as_str().to_string()),
            subgroup: ActiveValue::Set(category.subgroup.map(|b| b.as_str().to_string())),
            sequence_code: ActiveValue::Set(category.sequence_code),
            user_id: ActiveValue::Set(category.user_id.clone()),
            group_id: ActiveValue::Set(category.group_id.clone()),
            scope_key: ActiveValue::Set(category.scope().key()),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            kind: CategoryKind::try_from(model.kind.as_str())?,
            subgroup: model
                .subgroup
                .as_deref()
                .map(Bucket::try_from)
                .transpose()?,
            sequence_code: model.sequence_code,
            user_id: model.user_id,
            group_id: model.group_id,
        })
    }
}
