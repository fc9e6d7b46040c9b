//! Synthetic SaaS dataset.
//!
//! Produces the six source tables for a configurable number of accounts over
//! a range of billing months. Output is a pure function of the config: the
//! same seed yields byte-identical CSV files.

#![allow(
    clippy::float_arithmetic,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]

mod records;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Months, NaiveDate};
use profitlens_shared::PipelineError;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::{Normal, Poisson};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::catalog::{ACCOUNTS, INVOICES, PLANS, SUBSCRIPTIONS, SUPPORT_COSTS, USAGE_METRICS};

pub use records::{
    AccountRecord, InvoiceRecord, PlanRecord, SubscriptionRecord, SupportRecord, UsageRecord,
};

const INDUSTRIES: [&str; 5] = [
    "Manufacturing",
    "Logistics",
    "Retail",
    "Healthcare",
    "Technology",
];
const REGIONS: [&str; 3] = ["North America", "Europe", "APAC"];
const CONTRACT_TYPES: [&str; 2] = ["monthly", "annual"];

/// Support load multipliers and their probabilities.
const SUPPORT_INTENSITY: [(f64, f64); 3] = [(0.5, 0.5), (1.0, 0.3), (2.0, 0.2)];

/// Support labour rate per hour.
const SUPPORT_HOURLY_RATE: f64 = 60.0;

/// Errors raised while generating or writing the dataset.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The configuration cannot produce a dataset.
    #[error("invalid generator config: {0}")]
    InvalidConfig(String),

    /// A sampling distribution rejected its parameters.
    #[error("invalid distribution parameters: {0}")]
    Distribution(String),

    /// An output file or directory could not be written.
    #[error("cannot write {path}: {source}")]
    Io {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// CSV serialization failed.
    #[error("cannot write CSV {path}: {source}")]
    Csv {
        /// Output path.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
}

impl From<GeneratorError> for PipelineError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::InvalidConfig(_) | GeneratorError::Distribution(_) => {
                Self::Config(err.to_string())
            }
            GeneratorError::Io { .. } | GeneratorError::Csv { .. } => {
                Self::Source(err.to_string())
            }
        }
    }
}

/// Generator parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Number of accounts.
    pub accounts: usize,
    /// First billing month.
    pub start_month: NaiveDate,
    /// Last billing month, inclusive.
    pub end_month: NaiveDate,
    /// RNG seed.
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            accounts: 200,
            start_month: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
            end_month: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap_or_default(),
            seed: 42,
        }
    }
}

impl GeneratorConfig {
    /// First day of every month from `start_month` to `end_month`, inclusive.
    #[must_use]
    pub fn months(&self) -> Vec<NaiveDate> {
        let mut months = Vec::new();
        let mut month = self.start_month.with_day0(0).unwrap_or(self.start_month);
        while month <= self.end_month {
            months.push(month);
            match month.checked_add_months(Months::new(1)) {
                Some(next) => month = next,
                None => break,
            }
        }
        months
    }
}

/// The six generated tables.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// `accounts.csv`
    pub accounts: Vec<AccountRecord>,
    /// `plans.csv`
    pub plans: Vec<PlanRecord>,
    /// `subscriptions.csv`
    pub subscriptions: Vec<SubscriptionRecord>,
    /// `invoices.csv`
    pub invoices: Vec<InvoiceRecord>,
    /// `usage_metrics.csv`
    pub usage_metrics: Vec<UsageRecord>,
    /// `support_costs.csv`
    pub support_costs: Vec<SupportRecord>,
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>, GeneratorError> {
    Normal::new(mean, std_dev).map_err(|e| GeneratorError::Distribution(e.to_string()))
}

fn round2(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

fn standard_plans() -> Vec<PlanRecord> {
    [
        (1, "Basic", 500, 10, 20),
        (2, "Pro", 1200, 25, 18),
        (3, "Enterprise", 3000, 75, 15),
    ]
    .into_iter()
    .map(
        |(plan_id, plan_name, base_price, included_users, overage_price)| PlanRecord {
            plan_id,
            plan_name,
            base_price,
            included_users,
            overage_price,
        },
    )
    .collect()
}

/// Generates the dataset.
///
/// # Errors
///
/// Returns an error if the config has no accounts or an empty month range.
pub fn generate(config: &GeneratorConfig) -> Result<Dataset, GeneratorError> {
    if config.accounts == 0 {
        return Err(GeneratorError::InvalidConfig(
            "at least one account is required".into(),
        ));
    }
    let months = config.months();
    if months.is_empty() {
        return Err(GeneratorError::InvalidConfig(format!(
            "no months between {} and {}",
            config.start_month, config.end_month
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let signup_origin = NaiveDate::from_ymd_opt(2022, 1, 1)
        .ok_or_else(|| GeneratorError::InvalidConfig("bad signup origin".into()))?;

    let mut dataset = Dataset {
        plans: standard_plans(),
        ..Dataset::default()
    };

    for i in 1..=config.accounts as i64 {
        let industry = INDUSTRIES.choose(&mut rng).copied().unwrap_or_default();
        let company_size = rng.gen_range(20..=500);
        let region = REGIONS.choose(&mut rng).copied().unwrap_or_default();
        let contract_type = CONTRACT_TYPES.choose(&mut rng).copied().unwrap_or_default();
        let signup_date = signup_origin + chrono::Duration::days(rng.gen_range(0..=365));

        dataset.accounts.push(AccountRecord {
            account_id: i,
            account_name: format!("Account_{i}"),
            industry,
            company_size,
            region,
            contract_type,
            signup_date,
            status: "active",
        });
    }

    let discount = normal(10.0, 10.0)?;
    for account in &dataset.accounts {
        let plan_id = dataset
            .plans
            .choose(&mut rng)
            .map_or(1, |plan| plan.plan_id);
        let discount_pct = discount.sample(&mut rng).clamp(0.0, 40.0);

        dataset.subscriptions.push(SubscriptionRecord {
            subscription_id: account.account_id,
            account_id: account.account_id,
            plan_id,
            discount_pct: round2(discount_pct),
            start_date: account.signup_date,
            end_date: None,
            status: "active",
        });
    }

    let price_noise = normal(0.0, 50.0)?;
    for subscription in &dataset.subscriptions {
        let base_price = dataset
            .plans
            .iter()
            .find(|plan| plan.plan_id == subscription.plan_id)
            .map_or(0.0, |plan| plan.base_price as f64);
        let discount_pct = f64::try_from(subscription.discount_pct).unwrap_or(0.0);
        let discounted = base_price * (1.0 - discount_pct / 100.0);

        for month in &months {
            let amount = (discounted + price_noise.sample(&mut rng)).max(100.0);
            dataset.invoices.push(InvoiceRecord {
                invoice_id: dataset.invoices.len() as i64 + 1,
                account_id: subscription.account_id,
                billing_month: *month,
                amount_billed: round2(amount),
            });
        }
    }

    let api_calls = normal(10_000.0, 3_000.0)?;
    let feature_events = normal(5_000.0, 1_200.0)?;
    for account in &dataset.accounts {
        let base_users = f64::from(rng.gen_range(5_i32..=80));
        let users = normal(base_users, 5.0)?;

        for month in &months {
            dataset.usage_metrics.push(UsageRecord {
                account_id: account.account_id,
                usage_month: *month,
                active_users: (users.sample(&mut rng) as i64).max(1),
                api_calls: api_calls.sample(&mut rng) as i64,
                feature_events: feature_events.sample(&mut rng) as i64,
            });
        }
    }

    let intensity_index =
        WeightedIndex::new(SUPPORT_INTENSITY.iter().map(|(_, weight)| *weight))
            .map_err(|e| GeneratorError::Distribution(e.to_string()))?;
    for account in &dataset.accounts {
        let intensity = SUPPORT_INTENSITY[intensity_index.sample(&mut rng)].0;
        let tickets_dist = Poisson::new(3.0 * intensity)
            .map_err(|e| GeneratorError::Distribution(e.to_string()))?;

        for month in &months {
            let tickets: f64 = tickets_dist.sample(&mut rng);
            let hours = tickets * rng.gen_range(0.5..1.5);
            dataset.support_costs.push(SupportRecord {
                account_id: account.account_id,
                support_month: *month,
                tickets: tickets as i64,
                support_hours: round2(hours),
                cost: round2(hours * SUPPORT_HOURLY_RATE),
            });
        }
    }

    info!(
        accounts = dataset.accounts.len(),
        months = months.len(),
        invoices = dataset.invoices.len(),
        "Generated dataset"
    );
    Ok(dataset)
}

fn write_table<T: Serialize>(path: &Path, records: &[T]) -> Result<(), GeneratorError> {
    let csv_error = |source| GeneratorError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for record in records {
        writer.serialize(record).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl Dataset {
    /// Writes the six CSV files into `dir`, creating it if needed.
    ///
    /// Returns the written paths in catalog order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a file cannot be written.
    pub fn write_csv(&self, dir: &Path) -> Result<Vec<PathBuf>, GeneratorError> {
        fs::create_dir_all(dir).map_err(|source| GeneratorError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = |file: &str| dir.join(file);
        let files = [
            path(ACCOUNTS.source_file),
            path(PLANS.source_file),
            path(SUBSCRIPTIONS.source_file),
            path(INVOICES.source_file),
            path(USAGE_METRICS.source_file),
            path(SUPPORT_COSTS.source_file),
        ];

        write_table(&files[0], &self.accounts)?;
        write_table(&files[1], &self.plans)?;
        write_table(&files[2], &self.subscriptions)?;
        write_table(&files[3], &self.invoices)?;
        write_table(&files[4], &self.usage_metrics)?;
        write_table(&files[5], &self.support_costs)?;

        info!(dir = %dir.display(), "Wrote synthetic data");
        Ok(files.to_vec())
    }
}
