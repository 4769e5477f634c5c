//! Balance-sheet aggregation over expanded ledger rows.
//!
//! The aggregator is a set of pure functions folding a flattened row stream
//! (entries ⨝ line items ⨝ products ⨝ categories) into bucketed, signed
//! report structures. It never mutates stored state; the ops layer produces
//! the rows (see [`crate::ops`]) and hands them here.
//!
//! Two accumulation modes exist:
//!
//! - **Gross** keeps debit/credit separate: every contribution uses the
//!   absolute subtotal, attributed by entry kind, and `saldo = debit − credit`.
//! - **Directional** folds each row into one signed total per node: asset
//!   buckets count inflow positive and outflow negative, liability buckets
//!   the other way around.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Bucket, EntryKind, ShareFilter,
    buckets::{self, BUCKET_RANGES},
};

/// One expanded ledger row, as produced by the store join for a scope and
/// optional date range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub kind: EntryKind,
    pub subtotal: i64,
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
    pub category_id: Uuid,
    pub category_name: String,
    pub subgroup: Option<Bucket>,
    pub sequence_code: Option<i32>,
    pub group_id: Option<String>,
    pub user_id: String,
}

impl ReportRow {
    /// Bucket assignment: explicit subgroup first, sequence code second.
    pub fn bucket(&self) -> Option<Bucket> {
        buckets::classify(self.subgroup, self.sequence_code)
    }
}

/// How contributions are accumulated, see the module docs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMode {
    Gross,
    Directional,
}

/// Keep only the rows matching the sharing mode. Must run before
/// aggregation, not after.
pub fn filter_rows(rows: Vec<ReportRow>, share: &ShareFilter) -> Vec<ReportRow> {
    rows.into_iter()
        .filter(|row| match share {
            ShareFilter::Own => row.group_id.is_none(),
            ShareFilter::Group(None) => row.group_id.is_some(),
            ShareFilter::Group(Some(group_id)) => {
                row.group_id.as_deref() == Some(group_id.as_str())
            }
            ShareFilter::All => true,
        })
        .collect()
}

/// Signed per-row value used by directional mode.
fn directional_value(bucket: Bucket, kind: EntryKind, subtotal: i64) -> i64 {
    let magnitude = subtotal.abs();
    let positive = match (bucket.is_asset(), kind) {
        (true, EntryKind::Inflow) | (false, EntryKind::Outflow) => true,
        (true, EntryKind::Outflow) | (false, EntryKind::Inflow) => false,
    };
    if positive { magnitude } else { -magnitude }
}

/// Running totals for one report node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTotals {
    pub debit: i64,
    pub credit: i64,
    /// Signed running total; only fed in directional mode.
    pub total: i64,
}

impl NodeTotals {
    fn add(&mut self, mode: AggregateMode, bucket: Bucket, kind: EntryKind, subtotal: i64) {
        match mode {
            AggregateMode::Gross => match kind {
                EntryKind::Inflow => self.debit += subtotal.abs(),
                EntryKind::Outflow => self.credit += subtotal.abs(),
            },
            AggregateMode::Directional => {
                self.total += directional_value(bucket, kind, subtotal);
            }
        }
    }

    /// Net value of the node under the given mode.
    pub fn saldo(&self, mode: AggregateMode) -> i64 {
        match mode {
            AggregateMode::Gross => self.debit - self.credit,
            AggregateMode::Directional => self.total,
        }
    }
}

/// Identity a contribution is grouped under: a real product, or a synthetic
/// "unknown" node keyed by category for rows without one.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductKey {
    Product(Uuid),
    Unknown(Uuid),
}

/// Per-product totals inside one bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTotals {
    pub key: ProductKey,
    pub name: String,
    pub totals: NodeTotals,
}

/// One of the four buckets with its overall and per-product totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketReport {
    pub bucket: Bucket,
    pub totals: NodeTotals,
    pub products: Vec<ProductTotals>,
}

/// Aggregated balance sheet for one scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheetSummary {
    pub mode: AggregateMode,
    /// Always four reports, in range-table order; unclassifiable rows are
    /// dropped.
    pub buckets: Vec<BucketReport>,
    pub total_asset: i64,
    pub total_liability: i64,
    pub total: i64,
    /// `total_asset − total_liability`.
    pub selisih: i64,
}

impl BalanceSheetSummary {
    pub fn bucket(&self, bucket: Bucket) -> &BucketReport {
        // `buckets` is constructed total over the enum.
        &self.buckets[BUCKET_RANGES
            .iter()
            .position(|range| range.bucket == bucket)
            .unwrap_or(0)]
    }
}

fn row_key(row: &ReportRow) -> (ProductKey, String) {
    match row.product_id {
        Some(product_id) => (
            ProductKey::Product(product_id),
            row.product_name
                .clone()
                .unwrap_or_else(|| row.category_name.clone()),
        ),
        None => (
            ProductKey::Unknown(row.category_id),
            row.category_name.clone(),
        ),
    }
}

/// Fold rows into the four-bucket balance sheet.
pub fn aggregate_summary(rows: &[ReportRow], mode: AggregateMode) -> BalanceSheetSummary {
    let mut totals: BTreeMap<Bucket, NodeTotals> = BTreeMap::new();
    let mut products: BTreeMap<Bucket, BTreeMap<ProductKey, ProductTotals>> = BTreeMap::new();

    for row in rows {
        let Some(bucket) = row.bucket() else { continue };
        totals
            .entry(bucket)
            .or_default()
            .add(mode, bucket, row.kind, row.subtotal);

        let (key, name) = row_key(row);
        products
            .entry(bucket)
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| ProductTotals {
                key,
                name,
                totals: NodeTotals::default(),
            })
            .totals
            .add(mode, bucket, row.kind, row.subtotal);
    }

    let buckets: Vec<BucketReport> = BUCKET_RANGES
        .iter()
        .map(|range| BucketReport {
            bucket: range.bucket,
            totals: totals.get(&range.bucket).copied().unwrap_or_default(),
            products: products
                .remove(&range.bucket)
                .map(|by_key| by_key.into_values().collect())
                .unwrap_or_default(),
        })
        .collect();

    let saldo_of = |bucket: Bucket| -> i64 {
        totals.get(&bucket).map(|t| t.saldo(mode)).unwrap_or(0)
    };
    let total_asset = saldo_of(Bucket::AssetCurrent) + saldo_of(Bucket::AssetFixed);
    let total_liability =
        saldo_of(Bucket::LiabilityCurrent) + saldo_of(Bucket::LiabilityLongterm);

    BalanceSheetSummary {
        mode,
        buckets,
        total_asset,
        total_liability,
        total: total_asset + total_liability,
        selisih: total_asset - total_liability,
    }
}

/// Per-bucket debit/credit pair inside a product breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBucketTotals {
    pub bucket: Bucket,
    pub debit: i64,
    pub credit: i64,
}

/// Cross-bucket totals for one product identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductBreakdown {
    pub key: ProductKey,
    pub name: String,
    pub buckets: Vec<ProductBucketTotals>,
    pub debit: i64,
    pub credit: i64,
    pub saldo: i64,
}

/// Group rows by product identity across bucket boundaries. Gross
/// attribution only; unclassifiable rows are dropped.
pub fn aggregate_by_product(rows: &[ReportRow]) -> Vec<ProductBreakdown> {
    let mut grouped: BTreeMap<ProductKey, (String, BTreeMap<Bucket, (i64, i64)>)> =
        BTreeMap::new();

    for row in rows {
        let Some(bucket) = row.bucket() else { continue };
        let (key, name) = row_key(row);
        let (_, per_bucket) = grouped.entry(key).or_insert_with(|| (name, BTreeMap::new()));
        let slot = per_bucket.entry(bucket).or_insert((0, 0));
        match row.kind {
            EntryKind::Inflow => slot.0 += row.subtotal.abs(),
            EntryKind::Outflow => slot.1 += row.subtotal.abs(),
        }
    }

    let mut out: Vec<ProductBreakdown> = grouped
        .into_iter()
        .map(|(key, (name, per_bucket))| {
            let buckets: Vec<ProductBucketTotals> = per_bucket
                .into_iter()
                .map(|(bucket, (debit, credit))| ProductBucketTotals {
                    bucket,
                    debit,
                    credit,
                })
                .collect();
            let debit: i64 = buckets.iter().map(|b| b.debit).sum();
            let credit: i64 = buckets.iter().map(|b| b.credit).sum();
            ProductBreakdown {
                key,
                name,
                buckets,
                debit,
                credit,
                saldo: debit - credit,
            }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.key.cmp(&b.key)));
    out
}

/// Product leaf in the nested category tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedProduct {
    pub key: ProductKey,
    pub name: String,
    pub total: i64,
}

/// Category node in the nested tree, carrying its sequence code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub category_id: Uuid,
    pub code: i32,
    pub name: String,
    pub total: i64,
    pub products: Vec<NestedProduct>,
}

/// Nested category tree split into assets and liabilities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedReport {
    pub mode: AggregateMode,
    /// Sorted by `code` ascending; products by descending total.
    pub assets: Vec<CategoryNode>,
    pub liabilities: Vec<CategoryNode>,
    pub total_asset: i64,
    pub total_liability: i64,
}

/// Group rows by category (not product) into the nested tree. The top-level
/// asset/liability cut is the same range table the buckets use; rows without
/// a sequence code cannot be placed and are dropped.
pub fn aggregate_nested_by_category(rows: &[ReportRow], mode: AggregateMode) -> NestedReport {
    struct Node {
        name: String,
        total: i64,
        products: BTreeMap<ProductKey, (String, i64)>,
    }

    let mut by_category: BTreeMap<(i32, Uuid), Node> = BTreeMap::new();

    for row in rows {
        let Some(code) = row.sequence_code else { continue };
        let Some(bucket) = buckets::classify_code(code) else {
            continue;
        };
        let value = match mode {
            AggregateMode::Gross => match row.kind {
                EntryKind::Inflow => row.subtotal.abs(),
                EntryKind::Outflow => -row.subtotal.abs(),
            },
            AggregateMode::Directional => directional_value(bucket, row.kind, row.subtotal),
        };

        let node = by_category
            .entry((code, row.category_id))
            .or_insert_with(|| Node {
                name: row.category_name.clone(),
                total: 0,
                products: BTreeMap::new(),
            });
        node.total += value;

        let (key, name) = row_key(row);
        let slot = node.products.entry(key).or_insert((name, 0));
        slot.1 += value;
    }

    let mut assets = Vec::new();
    let mut liabilities = Vec::new();
    for ((code, category_id), node) in by_category {
        let mut products: Vec<NestedProduct> = node
            .products
            .into_iter()
            .map(|(key, (name, total))| NestedProduct { key, name, total })
            .collect();
        products.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.name.cmp(&b.name)));

        let out = CategoryNode {
            category_id,
            code,
            name: node.name,
            total: node.total,
            products,
        };
        // BTreeMap iteration keeps the code-ascending order.
        if buckets::classify_code(code).is_some_and(Bucket::is_asset) {
            assets.push(out);
        } else {
            liabilities.push(out);
        }
    }

    let total_asset = assets.iter().map(|n| n.total).sum();
    let total_liability = liabilities.iter().map(|n| n.total).sum();
    NestedReport {
        mode,
        assets,
        liabilities,
        total_asset,
        total_liability,
    }
}
