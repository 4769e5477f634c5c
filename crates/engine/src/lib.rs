//! Bookkeeping engine: ledger entries, derived account balances, a
//! sequence-coded category taxonomy and balance-sheet aggregation.
//!
//! The [`Engine`] owns a database connection and exposes request-scoped
//! operations; the domain modules hold the types and the pure logic.

pub mod accounts;
pub mod buckets;
pub mod categories;
pub mod commands;
pub mod entries;
pub mod entry_items;
pub mod error;
pub mod ops;
pub mod products;
pub mod reports;
pub mod rules;
pub(crate) mod util;

pub use accounts::Account;
pub use buckets::{BUCKET_RANGES, Bucket, BucketRange};
pub use categories::{Category, CategoryKind};
pub use commands::{
    Caller, CreateEntryCmd, EntryListFilter, NewCategoryCmd, NewProductCmd, Scope, ShareFilter,
    UpdateEntryCmd,
};
pub use entries::{Entry, EntryKind};
pub use entry_items::{EntryItem, EntryItemInput};
pub use error::EngineError;
pub use ops::{Engine, EngineBuilder, ReportParams, ReportScope};
pub use products::Product;
pub use reports::{
    AggregateMode, BalanceSheetSummary, BucketReport, CategoryNode, NestedProduct, NestedReport,
    NodeTotals, ProductBreakdown, ProductBucketTotals, ProductKey, ProductTotals, ReportRow,
};
pub use rules::{ClassifyRule, RuleScope};

pub type ResultEngine<T> = Result<T, EngineError>;
