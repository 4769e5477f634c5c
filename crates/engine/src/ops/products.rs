//! Product CRUD, including category auto-classification on creation.

use sea_orm::{Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Caller, CategoryKind, EngineError, NewProductCmd, Product, ResultEngine, categories, products,
    util::{normalize_display, normalize_key},
};

use super::{Engine, with_tx};

impl Engine {
    /// Create a product. The category is resolved in priority order: an
    /// explicit category id, a category name resolved-or-created through the
    /// rule table, or none at all.
    pub async fn new_product(&self, caller: &Caller, cmd: NewProductCmd) -> ResultEngine<Product> {
        let name = normalize_display(&cmd.name, "product")?;
        let group_id = self.resolve_share(caller, cmd.share_to_group, None)?;

        with_tx!(self, |db_tx| {
            let category_id = match (cmd.category_id, &cmd.category_name) {
                (Some(category_id), _) => {
                    categories::Entity::find_by_id(category_id)
                        .one(&db_tx)
                        .await?
                        .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
                    Some(category_id)
                }
                (None, Some(category_name)) => {
                    // Auto-classification: the product name participates in
                    // the rule text.
                    let category = self
                        .resolve_or_create_category_in(
                            &db_tx,
                            caller,
                            category_name,
                            CategoryKind::Outflow,
                            None,
                            group_id.clone(),
                            Some(&name),
                        )
                        .await?;
                    Some(category.id)
                }
                (None, None) => None,
            };

            let product = Product {
                id: Uuid::new_v4(),
                name: name.clone(),
                category_id,
                user_id: caller.user_id.clone(),
                group_id: group_id.clone(),
            };
            products::ActiveModel::from(&product).insert(&db_tx).await?;
            Ok(product)
        })
    }

    /// Return a product by id.
    pub async fn product(&self, product_id: Uuid) -> ResultEngine<Product> {
        let model = products::Entity::find_by_id(product_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound("product".to_string()))?;
        Product::try_from(model)
    }

    /// Look up a product by case-insensitive exact name within the caller's
    /// visibility.
    pub async fn product_by_name(
        &self,
        caller: &Caller,
        name: &str,
    ) -> ResultEngine<Option<Product>> {
        let name_key = normalize_key(name);
        let mut condition =
            Condition::any().add(products::Column::UserId.eq(caller.user_id.clone()));
        if let Some(group_id) = &caller.group_id {
            condition = condition.add(products::Column::GroupId.eq(group_id.clone()));
        }
        let model = products::Entity::find()
            .filter(products::Column::NameKey.eq(name_key))
            .filter(condition)
            .one(&self.database)
            .await?;
        model.map(Product::try_from).transpose()
    }

    /// Products visible to the caller.
    pub async fn list_products(&self, caller: &Caller) -> ResultEngine<Vec<Product>> {
        let mut condition =
            Condition::any().add(products::Column::UserId.eq(caller.user_id.clone()));
        if let Some(group_id) = &caller.group_id {
            condition = condition.add(products::Column::GroupId.eq(group_id.clone()));
        }
        let models = products::Entity::find()
            .filter(condition)
            .order_by_asc(products::Column::Name)
            .all(&self.database)
            .await?;
        models.into_iter().map(Product::try_from).collect()
    }

    /// Delete a product. A leaf operation with no cascading balance effects,
    /// but blocked while line items still reference it.
    pub async fn delete_product(&self, caller: &Caller, product_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = products::Entity::find_by_id(product_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("product".to_string()))?;
            if model.user_id != caller.user_id && !caller.privileged {
                return Err(EngineError::Unauthorized(
                    "product belongs to another owner".to_string(),
                ));
            }
            if self.product_referenced(&db_tx, product_id).await? {
                return Err(EngineError::Conflict(
                    "product is referenced by ledger line items".to_string(),
                ));
            }
            model.delete(&db_tx).await?;
            Ok(())
        })
    }
}
