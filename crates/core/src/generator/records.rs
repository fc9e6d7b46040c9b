//! CSV record types written by the generator.
//!
//! Field order is the CSV header order, which matches the catalog columns.

#![allow(missing_docs)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

fn iso_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format("%Y-%m-%d"))
}

fn iso_date_opt<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
    match date {
        Some(date) => iso_date(date, serializer),
        None => serializer.serialize_str(""),
    }
}

/// A customer account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountRecord {
    pub account_id: i64,
    pub account_name: String,
    pub industry: &'static str,
    pub company_size: i64,
    pub region: &'static str,
    pub contract_type: &'static str,
    #[serde(serialize_with = "iso_date")]
    pub signup_date: NaiveDate,
    pub status: &'static str,
}

/// A pricing plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRecord {
    pub plan_id: i64,
    pub plan_name: &'static str,
    pub base_price: i64,
    pub included_users: i64,
    pub overage_price: i64,
}

/// The single subscription of an account.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRecord {
    pub subscription_id: i64,
    pub account_id: i64,
    pub plan_id: i64,
    pub discount_pct: Decimal,
    #[serde(serialize_with = "iso_date")]
    pub start_date: NaiveDate,
    #[serde(serialize_with = "iso_date_opt")]
    pub end_date: Option<NaiveDate>,
    pub status: &'static str,
}

/// A monthly invoice.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceRecord {
    pub invoice_id: i64,
    pub account_id: i64,
    #[serde(serialize_with = "iso_date")]
    pub billing_month: NaiveDate,
    pub amount_billed: Decimal,
}

/// Monthly product usage of an account.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub account_id: i64,
    #[serde(serialize_with = "iso_date")]
    pub usage_month: NaiveDate,
    pub active_users: i64,
    pub api_calls: i64,
    pub feature_events: i64,
}

/// Monthly support load of an account.
#[derive(Debug, Clone, Serialize)]
pub struct SupportRecord {
    pub account_id: i64,
    #[serde(serialize_with = "iso_date")]
    pub support_month: NaiveDate,
    pub tickets: i64,
    pub support_hours: Decimal,
    pub cost: Decimal,
}
