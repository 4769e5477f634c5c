//! Data-driven classification rules.
//!
//! Subgroup inference is a pure function over an ordered rule list: a rule
//! applies when its keyword pattern occurs in the normalized category/product
//! text, a rule scoped to the exact user outranks one scoped to the user's
//! group, which outranks a global rule, and within the same scope rank the
//! lower numeric priority wins. No implicit global state.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Bucket, Caller, EngineError, util::normalize_key};

/// Visibility of a classification rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    User(String),
    Group(String),
    Global,
}

impl RuleScope {
    /// Lower rank is more specific and wins ties.
    fn rank(&self) -> u8 {
        match self {
            Self::User(_) => 0,
            Self::Group(_) => 1,
            Self::Global => 2,
        }
    }

    fn applies_to(&self, caller: &Caller) -> bool {
        match self {
            Self::User(user_id) => *user_id == caller.user_id,
            Self::Group(group_id) => caller.group_id.as_deref() == Some(group_id.as_str()),
            Self::Global => true,
        }
    }
}

/// Classification rule exposed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRule {
    pub id: Uuid,
    pub pattern: String,
    pub target: Bucket,
    pub priority: i32,
    pub scope: RuleScope,
}

/// Infer the bucket for `text` from the applicable rules. `None` when no rule
/// matches.
pub fn match_bucket(rules: &[ClassifyRule], caller: &Caller, text: &str) -> Option<Bucket> {
    let haystack = normalize_key(text);
    rules
        .iter()
        .filter(|rule| rule.scope.applies_to(caller))
        .filter(|rule| haystack.contains(&normalize_key(&rule.pattern)))
        .min_by_key(|rule| (rule.scope.rank(), rule.priority))
        .map(|rule| rule.target)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "classify_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pattern: String,
    pub target: String,
    pub priority: i32,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ClassifyRule> for ActiveModel {
    fn from(rule: &ClassifyRule) -> Self {
        let (user_id, group_id) = match &rule.scope {
            RuleScope::User(user_id) => (Some(user_id.clone()), None),
            RuleScope::Group(group_id) => (None, Some(group_id.clone())),
            RuleScope::Global => (None, None),
        };
        Self {
            id: ActiveValue::Set(rule.id),
            pattern: ActiveValue::Set(rule.pattern.clone()),
            target: ActiveValue::Set(rule.target.as_str().to_string()),
            priority: ActiveValue::Set(rule.priority),
            user_id: ActiveValue::Set(user_id),
            group_id: ActiveValue::Set(group_id),
        }
    }
}

impl TryFrom<Model> for ClassifyRule {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let scope = match (model.user_id, model.group_id) {
            (Some(user_id), _) => RuleScope::User(user_id),
            (None, Some(group_id)) => RuleScope::Group(group_id),
            (None, None) => RuleScope::Global,
        };
        Ok(Self {
            id: model.id,
            pattern: model.pattern,
            target: Bucket::try_from(model.target.as_str())?,
            priority: model.priority,
            scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, target: Bucket, priority: i32, scope: RuleScope) -> ClassifyRule {
        ClassifyRule {
            id: Uuid::new_v4(),
            pattern: pattern.to_string(),
            target,
            priority,
            scope,
        }
    }

    fn caller() -> Caller {
        Caller::new("alice").group("warung")
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let rules = vec![rule("kas", Bucket::AssetCurrent, 10, RuleScope::Global)];
        assert_eq!(
            match_bucket(&rules, &caller(), "KAS Kecil"),
            Some(Bucket::AssetCurrent)
        );
        assert_eq!(match_bucket(&rules, &caller(), "Peralatan"), None);
    }

    #[test]
    fn user_scope_outranks_group_and_global() {
        let rules = vec![
            rule("hutang", Bucket::LiabilityLongterm, 0, RuleScope::Global),
            rule(
                "hutang",
                Bucket::LiabilityCurrent,
                5,
                RuleScope::Group("warung".to_string()),
            ),
            rule(
                "hutang",
                Bucket::AssetFixed,
                9,
                RuleScope::User("alice".to_string()),
            ),
        ];
        assert_eq!(
            match_bucket(&rules, &caller(), "Hutang dagang"),
            Some(Bucket::AssetFixed)
        );
    }

    #[test]
    fn lower_priority_wins_within_a_scope_rank() {
        let rules = vec![
            rule("mesin", Bucket::AssetCurrent, 20, RuleScope::Global),
            rule("mesin", Bucket::AssetFixed, 1, RuleScope::Global),
        ];
        assert_eq!(
            match_bucket(&rules, &caller(), "Mesin jahit"),
            Some(Bucket::AssetFixed)
        );
    }

    #[test]
    fn foreign_scopes_do_not_apply() {
        let rules = vec![
            rule(
                "kas",
                Bucket::LiabilityCurrent,
                0,
                RuleScope::User("bob".to_string()),
            ),
            rule(
                "kas",
                Bucket::LiabilityLongterm,
                0,
                RuleScope::Group("toko".to_string()),
            ),
        ];
        assert_eq!(match_bucket(&rules, &caller(), "kas"), None);
    }
}
