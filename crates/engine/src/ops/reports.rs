//! Report row production and the balance-sheet endpoints.
//!
//! The store join flattens entries, line items, products and categories into
//! [`ReportRow`]s; the pure aggregators in [`crate::reports`] do the rest.
//! Entries without line items carry no category and never appear in reports.

use chrono::{DateTime, Utc};
use sea_orm::{FromQueryResult, Statement, Value, prelude::*};
use tracing::debug;

use crate::{
    AggregateMode, BalanceSheetSummary, Bucket, Caller, EngineError, EntryKind, NestedReport,
    ProductBreakdown, ReportRow, ResultEngine, ShareFilter,
    reports::{aggregate_by_product, aggregate_nested_by_category, aggregate_summary, filter_rows},
};

use super::Engine;

/// Whose ledger a report covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportScope {
    User(String),
    Group(String),
}

/// Parameters shared by the report endpoints. Date bounds are half-open:
/// `from` inclusive, `to` exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportParams {
    pub scope: ReportScope,
    pub mode: AggregateMode,
    pub share: ShareFilter,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReportParams {
    pub fn new(scope: ReportScope, mode: AggregateMode) -> Self {
        Self {
            scope,
            mode,
            share: ShareFilter::All,
            from: None,
            to: None,
        }
    }

    #[must_use]
    pub fn share(mut self, share: ShareFilter) -> Self {
        self.share = share;
        self
    }

    #[must_use]
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

#[derive(Debug, FromQueryResult)]
struct RawRow {
    kind: String,
    subtotal: i64,
    product_id: Uuid,
    product_name: String,
    category_id: Uuid,
    category_name: String,
    subgroup: Option<String>,
    sequence_code: Option<i32>,
    group_id: Option<String>,
    user_id: String,
}

impl TryFrom<RawRow> for ReportRow {
    type Error = EngineError;

    fn try_from(raw: RawRow) -> Result<Self, Self::Error> {
        let subgroup = raw
            .subgroup
            .as_deref()
            .map(Bucket::try_from)
            .transpose()?;
        Ok(Self {
            kind: EntryKind::try_from(raw.kind.as_str())?,
            subtotal: raw.subtotal,
            product_id: Some(raw.product_id),
            product_name: Some(raw.product_name),
            category_id: raw.category_id,
            category_name: raw.category_name,
            subgroup,
            sequence_code: raw.sequence_code,
            group_id: raw.group_id,
            user_id: raw.user_id,
        })
    }
}

impl Engine {
    /// Four-bucket balance sheet for a scope.
    pub async fn balance_sheet_summary(
        &self,
        caller: &Caller,
        params: &ReportParams,
    ) -> ResultEngine<BalanceSheetSummary> {
        let rows = self.scoped_rows(caller, params).await?;
        Ok(aggregate_summary(&rows, params.mode))
    }

    /// Per-product totals across bucket boundaries. Always gross.
    pub async fn product_breakdown(
        &self,
        caller: &Caller,
        params: &ReportParams,
    ) -> ResultEngine<Vec<ProductBreakdown>> {
        let rows = self.scoped_rows(caller, params).await?;
        Ok(aggregate_by_product(&rows))
    }

    /// Category tree split into assets and liabilities, products nested
    /// under their category.
    pub async fn nested_by_category(
        &self,
        caller: &Caller,
        params: &ReportParams,
    ) -> ResultEngine<NestedReport> {
        let rows = self.scoped_rows(caller, params).await?;
        Ok(aggregate_nested_by_category(&rows, params.mode))
    }

    /// Expanded ledger rows for a scope and optional date range, before any
    /// share filtering.
    pub async fn report_rows(
        &self,
        caller: &Caller,
        scope: &ReportScope,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> ResultEngine<Vec<ReportRow>> {
        self.authorize_scope(caller, scope)?;

        let mut sql = String::from(
            "SELECT e.kind AS kind, i.subtotal AS subtotal, \
                    p.id AS product_id, p.name AS product_name, \
                    c.id AS category_id, c.name AS category_name, \
                    c.subgroup AS subgroup, c.sequence_code AS sequence_code, \
                    e.group_id AS group_id, e.user_id AS user_id \
             FROM entries e \
             JOIN entry_items i ON i.entry_id = e.id \
             JOIN products p ON p.id = i.product_id \
             JOIN categories c ON c.id = p.category_id \
             WHERE ",
        );
        let mut values: Vec<Value> = Vec::new();
        match scope {
            ReportScope::User(user_id) => {
                sql.push_str("e.user_id = ?");
                values.push(user_id.clone().into());
            }
            ReportScope::Group(group_id) => {
                sql.push_str("e.group_id = ?");
                values.push(group_id.clone().into());
            }
        }
        if let Some(from) = from {
            sql.push_str(" AND e.occurred_at >= ?");
            values.push(from.into());
        }
        if let Some(to) = to {
            sql.push_str(" AND e.occurred_at < ?");
            values.push(to.into());
        }
        sql.push_str(" ORDER BY e.occurred_at");

        let statement =
            Statement::from_sql_and_values(self.database.get_database_backend(), sql, values);
        let raw = RawRow::find_by_statement(statement)
            .all(&self.database)
            .await?;
        debug!(rows = raw.len(), "report rows loaded");
        raw.into_iter().map(ReportRow::try_from).collect()
    }

    async fn scoped_rows(
        &self,
        caller: &Caller,
        params: &ReportParams,
    ) -> ResultEngine<Vec<ReportRow>> {
        let rows = self
            .report_rows(caller, &params.scope, params.from, params.to)
            .await?;
        Ok(filter_rows(rows, &params.share))
    }

    fn authorize_scope(&self, caller: &Caller, scope: &ReportScope) -> ResultEngine<()> {
        let allowed = caller.privileged
            || match scope {
                ReportScope::User(user_id) => *user_id == caller.user_id,
                ReportScope::Group(group_id) => {
                    caller.group_id.as_deref() == Some(group_id.as_str())
                }
            };
        if allowed {
            Ok(())
        } else {
            Err(EngineError::Unauthorized(
                "report scope outside the caller's visibility".to_string(),
            ))
        }
    }
}
