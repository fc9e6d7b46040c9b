//! Profitability transform strategies.
//!
//! A transform maps the current contents of the base tables to the rows of
//! `account_profitability`. The SQL strategy lives in `profitlens-db`;
//! [`RollupTransform`] computes the same rows in process from any `Store`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use profitlens_shared::{PipelineError, PipelineResult};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::catalog::{ACCOUNTS, INVOICES, PROFITABILITY_COLUMNS, SUPPORT_COSTS, USAGE_METRICS};
use crate::rows::{RowSet, Value};
use crate::store::Store;

/// Produces the derived profitability rows.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produces the row set for the derived table from the current base tables.
    async fn produce(&self, store: &dyn Store) -> PipelineResult<RowSet>;
}

/// In-process aggregation over invoices, support costs and usage.
///
/// One row per account with at least one invoice:
/// - `revenue`: sum of `amount_billed`
/// - `support_cost`: sum of `cost`, 0 when none
/// - `profit`: `revenue - support_cost`
/// - `margin`: `profit / revenue` rounded to 4 places, 0 when revenue is 0
/// - `active_users`: monthly average rounded to 2 places
/// - `api_calls`, `feature_events`: sums
#[derive(Debug, Clone, Copy, Default)]
pub struct RollupTransform;

#[derive(Debug)]
struct Billing {
    period_start: NaiveDate,
    period_end: NaiveDate,
    revenue: Decimal,
}

#[derive(Debug, Default)]
struct Usage {
    active_users: Decimal,
    months: i64,
    api_calls: i64,
    feature_events: i64,
}

fn required(rows: &RowSet, table: &str, column: &str) -> PipelineResult<usize> {
    rows.column_index(column).ok_or_else(|| {
        PipelineError::Validation(format!("{table} has no column `{column}`"))
    })
}

fn bad_value(table: &str, column: &str, value: &Value) -> PipelineError {
    PipelineError::Validation(format!(
        "{table}.{column} has unexpected value {value:?}"
    ))
}

fn round_half_up(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

impl RollupTransform {
    fn billing(invoices: &RowSet) -> PipelineResult<BTreeMap<i64, Billing>> {
        let table = INVOICES.name;
        let account = required(invoices, table, "account_id")?;
        let month = required(invoices, table, "billing_month")?;
        let amount = required(invoices, table, "amount_billed")?;

        let mut billing: BTreeMap<i64, Billing> = BTreeMap::new();
        for row in invoices.rows() {
            let id = row[account]
                .as_i64()
                .ok_or_else(|| bad_value(table, "account_id", &row[account]))?;
            let date = row[month]
                .as_date()
                .ok_or_else(|| bad_value(table, "billing_month", &row[month]))?;
            // SUM ignores NULL amounts; the invoice still counts toward the period
            let billed = if row[amount].is_null() {
                Decimal::ZERO
            } else {
                row[amount]
                    .as_decimal()
                    .ok_or_else(|| bad_value(table, "amount_billed", &row[amount]))?
            };

            billing
                .entry(id)
                .and_modify(|b| {
                    b.period_start = b.period_start.min(date);
                    b.period_end = b.period_end.max(date);
                    b.revenue += billed;
                })
                .or_insert(Billing {
                    period_start: date,
                    period_end: date,
                    revenue: billed,
                });
        }
        Ok(billing)
    }

    fn support(support_costs: &RowSet) -> PipelineResult<BTreeMap<i64, Decimal>> {
        let table = SUPPORT_COSTS.name;
        let account = required(support_costs, table, "account_id")?;
        let cost = required(support_costs, table, "cost")?;

        let mut support: BTreeMap<i64, Decimal> = BTreeMap::new();
        for row in support_costs.rows() {
            let id = row[account]
                .as_i64()
                .ok_or_else(|| bad_value(table, "account_id", &row[account]))?;
            // SUM ignores NULL cost
            if let Some(amount) = row[cost].as_decimal() {
                *support.entry(id).or_default() += amount;
            }
        }
        Ok(support)
    }

    fn usage(usage_metrics: &RowSet) -> PipelineResult<BTreeMap<i64, Usage>> {
        let table = USAGE_METRICS.name;
        let account = required(usage_metrics, table, "account_id")?;
        let users = required(usage_metrics, table, "active_users")?;
        let calls = required(usage_metrics, table, "api_calls")?;
        let events = required(usage_metrics, table, "feature_events")?;

        let mut usage: BTreeMap<i64, Usage> = BTreeMap::new();
        for row in usage_metrics.rows() {
            let id = row[account]
                .as_i64()
                .ok_or_else(|| bad_value(table, "account_id", &row[account]))?;
            let entry = usage.entry(id).or_default();
            if let Some(v) = row[users].as_decimal() {
                entry.active_users += v;
                entry.months += 1;
            }
            entry.api_calls += row[calls].as_i64().unwrap_or(0);
            entry.feature_events += row[events].as_i64().unwrap_or(0);
        }
        Ok(usage)
    }
}

#[async_trait]
impl Transform for RollupTransform {
    fn name(&self) -> &str {
        "rollup"
    }

    async fn produce(&self, store: &dyn Store) -> PipelineResult<RowSet> {
        let accounts = store.fetch(ACCOUNTS.name).await?;
        let account_idx = required(&accounts, ACCOUNTS.name, "account_id")?;
        let known: BTreeSet<i64> = accounts
            .rows()
            .iter()
            .filter_map(|row| row[account_idx].as_i64())
            .collect();

        let billing = Self::billing(&store.fetch(INVOICES.name).await?)?;
        let support = Self::support(&store.fetch(SUPPORT_COSTS.name).await?)?;
        let usage = Self::usage(&store.fetch(USAGE_METRICS.name).await?)?;

        let mut rows = RowSet::new(PROFITABILITY_COLUMNS);
        for (account_id, bill) in billing.iter().filter(|(id, _)| known.contains(id)) {
            let support_cost = support.get(account_id).copied().unwrap_or_default();
            let profit = bill.revenue - support_cost;
            let margin = if bill.revenue.is_zero() {
                Decimal::ZERO
            } else {
                round_half_up(profit / bill.revenue, 4)
            };

            let account_usage = usage.get(account_id);
            let active_users = account_usage
                .filter(|u| u.months > 0)
                .map_or(Decimal::ZERO, |u| {
                    round_half_up(u.active_users / Decimal::from(u.months), 2)
                });

            rows.push(vec![
                Value::Int(*account_id),
                Value::Date(bill.period_start),
                Value::Date(bill.period_end),
                Value::Decimal(bill.revenue),
                Value::Decimal(support_cost),
                Value::Decimal(profit),
                Value::Decimal(margin),
                Value::Decimal(active_users),
                Value::Int(account_usage.map_or(0, |u| u.api_calls)),
                Value::Int(account_usage.map_or(0, |u| u.feature_events)),
            ])?;
        }

        Ok(rows)
    }
}
