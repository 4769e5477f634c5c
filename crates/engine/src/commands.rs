//! Caller context and command structs for engine operations.
//!
//! Command types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists. The request layer (out of
//! scope here) authenticates and supplies a [`Caller`] for every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Bucket, CategoryKind, EntryItemInput, EntryKind};

/// Authenticated caller context: user id, optional group membership, and
/// whether the caller may act on behalf of other owners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub group_id: Option<String>,
    pub privileged: bool,
}

impl Caller {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            group_id: None,
            privileged: false,
        }
    }

    #[must_use]
    pub fn group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

/// Visibility boundary for categories, accounts and entries: private to one
/// user, or shared with one group. Sharing is all-or-nothing per record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    User(String),
    Group(String),
}

impl Scope {
    /// Stable discriminator backing per-scope unique indexes.
    pub fn key(&self) -> String {
        match self {
            Self::User(user_id) => format!("user:{user_id}"),
            Self::Group(group_id) => format!("group:{group_id}"),
        }
    }
}

/// Row filter by sharing mode, applied before listing or aggregation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ShareFilter {
    /// Only records with no group attribution.
    Own,
    /// Only records shared with a group, optionally one specific group.
    Group(Option<String>),
    /// Everything visible to the caller.
    #[default]
    All,
}

/// Create a ledger entry (header + optional line items).
#[derive(Clone, Debug)]
pub struct CreateEntryCmd {
    pub kind: EntryKind,
    pub debit: i64,
    pub credit: i64,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub account_id: Option<Uuid>,
    /// Takes priority over `group_id`: share with the caller's own group.
    pub share_to_group: bool,
    /// Explicit target group; non-privileged callers may only name their own.
    pub group_id: Option<String>,
    pub items: Vec<EntryItemInput>,
}

impl CreateEntryCmd {
    #[must_use]
    pub fn new(kind: EntryKind, debit: i64, credit: i64, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            debit,
            credit,
            description: None,
            occurred_at,
            account_id: None,
            share_to_group: false,
            group_id: None,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub fn inflow(debit: i64, occurred_at: DateTime<Utc>) -> Self {
        Self::new(EntryKind::Inflow, debit, 0, occurred_at)
    }

    #[must_use]
    pub fn outflow(credit: i64, occurred_at: DateTime<Utc>) -> Self {
        Self::new(EntryKind::Outflow, 0, credit, occurred_at)
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn share_to_group(mut self) -> Self {
        self.share_to_group = true;
        self
    }

    #[must_use]
    pub fn group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    #[must_use]
    pub fn item(mut self, item: EntryItemInput) -> Self {
        self.items.push(item);
        self
    }

    #[must_use]
    pub fn items(mut self, items: Vec<EntryItemInput>) -> Self {
        self.items = items;
        self
    }
}

/// Update an existing entry. Unsupplied fields keep their stored values;
/// `items: Some(..)` replaces the line items wholesale.
#[derive(Clone, Debug)]
pub struct UpdateEntryCmd {
    pub entry_id: Uuid,
    pub kind: Option<EntryKind>,
    pub debit: Option<i64>,
    pub credit: Option<i64>,
    pub description: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub account_id: Option<Uuid>,
    /// Detach the entry from its account; mutually exclusive with
    /// `account_id`.
    pub clear_account: bool,
    pub items: Option<Vec<EntryItemInput>>,
}

impl UpdateEntryCmd {
    #[must_use]
    pub fn new(entry_id: Uuid) -> Self {
        Self {
            entry_id,
            kind: None,
            debit: None,
            credit: None,
            description: None,
            occurred_at: None,
            account_id: None,
            clear_account: false,
            items: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn debit(mut self, debit: i64) -> Self {
        self.debit = Some(debit);
        self
    }

    #[must_use]
    pub fn credit(mut self, credit: i64) -> Self {
        self.credit = Some(credit);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn clear_account(mut self) -> Self {
        self.clear_account = true;
        self
    }

    #[must_use]
    pub fn items(mut self, items: Vec<EntryItemInput>) -> Self {
        self.items = Some(items);
        self
    }
}

/// Create a category, optionally with an explicit bucket hint that bypasses
/// rule inference.
#[derive(Clone, Debug)]
pub struct NewCategoryCmd {
    pub name: String,
    pub kind: CategoryKind,
    pub subgroup: Option<Bucket>,
    pub share_to_group: bool,
}

impl NewCategoryCmd {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            name: name.into(),
            kind,
            subgroup: None,
            share_to_group: false,
        }
    }

    #[must_use]
    pub fn subgroup(mut self, subgroup: Bucket) -> Self {
        self.subgroup = Some(subgroup);
        self
    }

    #[must_use]
    pub fn share_to_group(mut self) -> Self {
        self.share_to_group = true;
        self
    }
}

/// Create a product, with an explicit category, an auto-classified category
/// name, or no category at all.
#[derive(Clone, Debug)]
pub struct NewProductCmd {
    pub name: String,
    pub category_id: Option<Uuid>,
    /// Resolve-or-create a category by this name when no id is given.
    pub category_name: Option<String>,
    pub share_to_group: bool,
}

impl NewProductCmd {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category_id: None,
            category_name: None,
            share_to_group: false,
        }
    }

    #[must_use]
    pub fn category_id(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn category_name(mut self, name: impl Into<String>) -> Self {
        self.category_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn share_to_group(mut self) -> Self {
        self.share_to_group = true;
        self
    }
}

/// Filters for listing ledger entries.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
#[derive(Clone, Debug, Default)]
pub struct EntryListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub kind: Option<EntryKind>,
    pub account_id: Option<Uuid>,
    pub share: ShareFilter,
}

impl EntryListFilter {
    #[must_use]
    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    #[must_use]
    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: EntryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn account_id(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn share(mut self, share: ShareFilter) -> Self {
        self.share = share;
        self
    }
}
