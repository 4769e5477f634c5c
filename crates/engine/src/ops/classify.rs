//! Category classification and sequence-code allocation.

use sea_orm::{
    Condition, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    Bucket, Caller, Category, CategoryKind, ClassifyRule, EngineError, NewCategoryCmd,
    ResultEngine, RuleScope, Scope, categories, entry_items, products, rules,
    util::{normalize_display, normalize_key},
};

use super::{Engine, with_tx};

impl Engine {
    /// Next free sequence code for a (scope, bucket) pair: the current
    /// maximum plus one, or the range minimum when the scope has none yet.
    /// Fails with [`EngineError::RangeExhausted`] past the range maximum;
    /// allocation never wraps.
    pub async fn next_sequence_code(&self, scope: &Scope, bucket: Bucket) -> ResultEngine<i32> {
        self.next_sequence_code_in(&self.database, scope, bucket)
            .await
    }

    pub(super) async fn next_sequence_code_in<C: ConnectionTrait>(
        &self,
        db: &C,
        scope: &Scope,
        bucket: Bucket,
    ) -> ResultEngine<i32> {
        let range = bucket.range();
        let max_code: Option<i32> = categories::Entity::find()
            .select_only()
            .column_as(categories::Column::SequenceCode.max(), "max_code")
            .filter(categories::Column::ScopeKey.eq(scope.key()))
            .filter(categories::Column::SequenceCode.gte(range.min))
            .filter(categories::Column::SequenceCode.lte(range.max))
            .into_tuple()
            .one(db)
            .await?
            .flatten();

        let next = match max_code {
            Some(max) => max + 1,
            None => range.min,
        };
        if next > range.max {
            return Err(EngineError::RangeExhausted(format!(
                "{} [{}..{}]",
                bucket.as_str(),
                range.min,
                range.max
            )));
        }
        Ok(next)
    }

    /// Look up a category by case-insensitive exact name within the caller's
    /// scope; create it when absent, inferring the bucket from the rule
    /// table unless an explicit hint is given.
    ///
    /// A duplicate-key race during allocation is retried exactly once: the
    /// retry first re-resolves the name (a concurrent create of the same name
    /// wins) and otherwise re-reads the sequence code. A second collision
    /// surfaces as [`EngineError::Conflict`].
    pub async fn resolve_or_create_category(
        &self,
        caller: &Caller,
        cmd: NewCategoryCmd,
    ) -> ResultEngine<Category> {
        let group_id = self.resolve_share(caller, cmd.share_to_group, None)?;
        self.resolve_or_create_category_in(
            &self.database,
            caller,
            &cmd.name,
            cmd.kind,
            cmd.subgroup,
            group_id,
            None,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) async fn resolve_or_create_category_in<C: ConnectionTrait>(
        &self,
        db: &C,
        caller: &Caller,
        name: &str,
        kind: CategoryKind,
        hint: Option<Bucket>,
        group_id: Option<String>,
        extra_text: Option<&str>,
    ) -> ResultEngine<Category> {
        let display = normalize_display(name, "category")?;
        let name_key = normalize_key(&display);
        let scope = match &group_id {
            Some(group_id) => Scope::Group(group_id.clone()),
            None => Scope::User(caller.user_id.clone()),
        };

        if let Some(model) = categories::Entity::find()
            .filter(categories::Column::ScopeKey.eq(scope.key()))
            .filter(categories::Column::NameKey.eq(name_key.clone()))
            .one(db)
            .await?
        {
            return Category::try_from(model);
        }

        // Bucket resolution: explicit hint, then the ordered rule table over
        // the combined category+product text. Product/market categories never
        // classify.
        let bucket = if kind.is_bookkeeping() {
            let resolved = match hint {
                Some(bucket) => Some(bucket),
                None => {
                    let rule_set = self.load_rules_in(db, caller).await?;
                    let text = match extra_text {
                        Some(extra) => format!("{display} {extra}"),
                        None => display.clone(),
                    };
                    rules::match_bucket(&rule_set, caller, &text)
                }
            };
            Some(resolved.ok_or_else(|| {
                EngineError::Validation(format!(
                    "no classification rule matched category '{display}'"
                ))
            })?)
        } else {
            None
        };

        let mut attempts = 0;
        loop {
            let sequence_code = match bucket {
                Some(bucket) => Some(self.next_sequence_code_in(db, &scope, bucket).await?),
                None => None,
            };
            let category = Category {
                id: Uuid::new_v4(),
                name: display.clone(),
                kind,
                subgroup: bucket,
                sequence_code,
                user_id: caller.user_id.clone(),
                group_id: group_id.clone(),
            };

            match categories::ActiveModel::from(&category).insert(db).await {
                Ok(_) => {
                    debug!(
                        category = %category.id,
                        code = ?sequence_code,
                        "category created"
                    );
                    return Ok(category);
                }
                Err(err) => {
                    let err = EngineError::from(err);
                    if !err.is_unique_violation() {
                        return Err(err);
                    }
                    if attempts > 0 {
                        return Err(EngineError::Conflict(format!(
                            "sequence allocation collided twice for '{display}'"
                        )));
                    }
                    attempts += 1;
                    // A concurrent writer may have won with the same name; in
                    // that case resolve to their row instead of re-allocating.
                    if let Some(model) = categories::Entity::find()
                        .filter(categories::Column::ScopeKey.eq(scope.key()))
                        .filter(categories::Column::NameKey.eq(name_key.clone()))
                        .one(db)
                        .await?
                    {
                        return Category::try_from(model);
                    }
                }
            }
        }
    }

    /// Categories visible to the caller: their own plus their group's.
    pub async fn list_categories(&self, caller: &Caller) -> ResultEngine<Vec<Category>> {
        let mut scope_keys = vec![Scope::User(caller.user_id.clone()).key()];
        if let Some(group_id) = &caller.group_id {
            scope_keys.push(Scope::Group(group_id.clone()).key());
        }
        let models = categories::Entity::find()
            .filter(categories::Column::ScopeKey.is_in(scope_keys))
            .order_by_asc(categories::Column::SequenceCode)
            .all(&self.database)
            .await?;
        models.into_iter().map(Category::try_from).collect()
    }

    /// Delete a category. Blocked while any product references it.
    pub async fn delete_category(&self, caller: &Caller, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = categories::Entity::find_by_id(category_id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound("category".to_string()))?;
            if model.user_id != caller.user_id && !caller.privileged {
                return Err(EngineError::Unauthorized(
                    "category belongs to another owner".to_string(),
                ));
            }

            let referenced = products::Entity::find()
                .filter(products::Column::CategoryId.eq(category_id))
                .one(&db_tx)
                .await?
                .is_some();
            if referenced {
                return Err(EngineError::Conflict(
                    "category is referenced by products".to_string(),
                ));
            }

            model.delete(&db_tx).await?;
            Ok(())
        })
    }

    /// Insert a classification rule. Global rules require a privileged
    /// caller; user/group rules must target the caller's own scope.
    pub async fn new_rule(
        &self,
        caller: &Caller,
        pattern: &str,
        target: Bucket,
        priority: i32,
        scope: RuleScope,
    ) -> ResultEngine<ClassifyRule> {
        let pattern = normalize_display(pattern, "rule pattern")?;
        match &scope {
            RuleScope::Global if !caller.privileged => {
                return Err(EngineError::Unauthorized(
                    "global rules require a privileged caller".to_string(),
                ));
            }
            RuleScope::User(user_id) if *user_id != caller.user_id && !caller.privileged => {
                return Err(EngineError::Unauthorized(
                    "cannot create rules for another user".to_string(),
                ));
            }
            RuleScope::Group(group_id)
                if caller.group_id.as_deref() != Some(group_id.as_str())
                    && !caller.privileged =>
            {
                return Err(EngineError::Unauthorized(
                    "cannot create rules for a foreign group".to_string(),
                ));
            }
            _ => {}
        }

        let rule = ClassifyRule {
            id: Uuid::new_v4(),
            pattern,
            target,
            priority,
            scope,
        };
        rules::ActiveModel::from(&rule).insert(&self.database).await?;
        Ok(rule)
    }

    /// Rules applicable to the caller, global ones included.
    pub async fn list_rules(&self, caller: &Caller) -> ResultEngine<Vec<ClassifyRule>> {
        self.load_rules_in(&self.database, caller).await
    }

    pub(super) async fn load_rules_in<C: ConnectionTrait>(
        &self,
        db: &C,
        caller: &Caller,
    ) -> ResultEngine<Vec<ClassifyRule>> {
        let mut condition = Condition::any()
            .add(
                Condition::all()
                    .add(rules::Column::UserId.is_null())
                    .add(rules::Column::GroupId.is_null()),
            )
            .add(rules::Column::UserId.eq(caller.user_id.clone()));
        if let Some(group_id) = &caller.group_id {
            condition = condition.add(rules::Column::GroupId.eq(group_id.clone()));
        }

        let models = rules::Entity::find()
            .filter(condition)
            .order_by_asc(rules::Column::Priority)
            .all(db)
            .await?;
        models.into_iter().map(ClassifyRule::try_from).collect()
    }

    /// True when any line item still references the product.
    pub(super) async fn product_referenced<C: ConnectionTrait>(
        &self,
        db: &C,
        product_id: Uuid,
    ) -> ResultEngine<bool> {
        Ok(entry_items::Entity::find()
            .filter(entry_items::Column::ProductId.eq(product_id))
            .one(db)
            .await?
            .is_some())
    }
}
