//! Generator tests.

use std::fs;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::source::read_csv;

fn small() -> GeneratorConfig {
    GeneratorConfig {
        accounts: 10,
        ..GeneratorConfig::default()
    }
}

#[test]
fn test_default_month_range() {
    let months = GeneratorConfig::default().months();
    assert_eq!(months.len(), 24);
    assert_eq!(months[0], NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    assert_eq!(months[23], NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
}

#[test]
fn test_row_counts() {
    let data = generate(&small()).unwrap();

    assert_eq!(data.accounts.len(), 10);
    assert_eq!(data.plans.len(), 3);
    assert_eq!(data.subscriptions.len(), 10);
    assert_eq!(data.invoices.len(), 240);
    assert_eq!(data.usage_metrics.len(), 240);
    assert_eq!(data.support_costs.len(), 240);
}

#[test]
fn test_same_seed_same_data() {
    let a = generate(&small()).unwrap();
    let b = generate(&small()).unwrap();

    let amounts = |d: &Dataset| d.invoices.iter().map(|i| i.amount_billed).collect::<Vec<_>>();
    assert_eq!(amounts(&a), amounts(&b));

    let other = generate(&GeneratorConfig {
        seed: 7,
        ..small()
    })
    .unwrap();
    assert_ne!(amounts(&a), amounts(&other));
}

#[test]
fn test_values_stay_in_range() {
    let data = generate(&small()).unwrap();

    for account in &data.accounts {
        assert!((20..=500).contains(&account.company_size));
        assert!(INDUSTRIES.contains(&account.industry));
    }
    for sub in &data.subscriptions {
        assert!(sub.discount_pct >= Decimal::ZERO && sub.discount_pct <= dec!(40));
        assert!(sub.end_date.is_none());
        assert!((1..=3).contains(&sub.plan_id));
    }
    for invoice in &data.invoices {
        assert!(invoice.amount_billed >= dec!(100));
    }
    for usage in &data.usage_metrics {
        assert!(usage.active_users >= 1);
    }
    for support in &data.support_costs {
        assert!(support.tickets >= 0);
        // both rounded from the same unrounded hours
        assert!((support.cost - support.support_hours * dec!(60)).abs() <= dec!(0.31));
    }
}

#[test]
fn test_invoice_ids_are_sequential() {
    let data = generate(&small()).unwrap();
    for (i, invoice) in data.invoices.iter().enumerate() {
        assert_eq!(invoice.invoice_id, i as i64 + 1);
    }
}

#[test]
fn test_zero_accounts_rejected() {
    let err = generate(&GeneratorConfig {
        accounts: 0,
        ..GeneratorConfig::default()
    })
    .unwrap_err();
    assert!(matches!(err, GeneratorError::InvalidConfig(_)));
}

#[test]
fn test_written_files_read_back() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("raw");
    let data = generate(&small()).unwrap();

    let files = data.write_csv(&out).unwrap();
    assert_eq!(files.len(), 6);

    for spec in &crate::catalog::BASE_TABLES {
        let rows = read_csv(&out.join(spec.source_file), spec.date_columns).unwrap();
        assert_eq!(rows.columns(), spec.columns, "{}", spec.name);
    }

    let subscriptions = read_csv(&out.join("subscriptions.csv"), &["start_date", "end_date"]).unwrap();
    assert_eq!(subscriptions.len(), 10);
    assert!(subscriptions.value(0, "end_date").unwrap().is_null());
}

#[test]
fn test_output_is_byte_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    generate(&small()).unwrap().write_csv(&dir.path().join("a")).unwrap();
    generate(&small()).unwrap().write_csv(&dir.path().join("b")).unwrap();

    for file in ["accounts.csv", "invoices.csv", "support_costs.csv"] {
        assert_eq!(
            fs::read(dir.path().join("a").join(file)).unwrap(),
            fs::read(dir.path().join("b").join(file)).unwrap()
        );
    }
}
