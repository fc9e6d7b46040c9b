//! Pipeline stage tests against the in-memory store.

use std::fs;

use profitlens_shared::{ErrorCategory, PipelineError};
use tempfile::TempDir;

use super::*;
use crate::catalog::BASE_TABLES;
use crate::store::{FailPoint, MemoryStore};
use crate::transform::RollupTransform;

const FIXTURES: [(&str, &str); 6] = [
    (
        "accounts.csv",
        "account_id,account_name,industry,company_size,region,contract_type,signup_date,status
1,Account_1,SaaS,SMB,NA,Monthly,2022-01-10,active
2,Account_2,Fintech,Enterprise,EU,Annual,2022-02-11 00:00:00,active
",
    ),
    (
        "plans.csv",
        "plan_id,plan_name,base_price,included_users,overage_price
1,Basic,500,10,20
",
    ),
    (
        "subscriptions.csv",
        "subscription_id,account_id,plan_id,discount_pct,start_date,end_date,status
1,1,1,10.0,2022-01-10,,active
2,2,1,0.0,2022-02-11,,active
",
    ),
    (
        "invoices.csv",
        "invoice_id,account_id,billing_month,amount_billed
1,1,2024-01-01,450.00
2,2,2024-01-01,500.00
",
    ),
    (
        "usage_metrics.csv",
        "account_id,usage_month,active_users,api_calls,feature_events
1,2024-01-01,12,9000,4000
2,2024-01-01,30,11000,5200
",
    ),
    (
        "support_costs.csv",
        "account_id,support_month,tickets,support_hours,cost
1,2024-01-01,3,2.5,150.0
2,2024-01-01,1,0.75,45.0
",
    ),
];

fn fixture_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, body) in FIXTURES {
        fs::write(dir.path().join(name), body).unwrap();
    }
    dir
}

async fn counts(store: &MemoryStore) -> Vec<u64> {
    let mut counts = Vec::new();
    for spec in &BASE_TABLES {
        counts.push(store.count(spec.name).await.unwrap());
    }
    counts.push(store.count(DERIVED_TABLE).await.unwrap());
    counts
}

#[tokio::test]
async fn test_load_table_returns_rows_read() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();

    let rows = load_table(
        &store,
        "accounts",
        &dir.path().join("accounts.csv"),
        &["signup_date"],
    )
    .await
    .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(store.count("accounts").await.unwrap(), 2);
}

#[tokio::test]
async fn test_load_table_missing_file_is_source_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::with_catalog();

    let err = load_table(&store, "accounts", &dir.path().join("accounts.csv"), &[])
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Source);
    assert!(err.to_string().contains("accounts.csv"));
}

#[tokio::test]
async fn test_load_all_follows_plan_order() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();
    let plan = LoadPlan::standard().unwrap();

    let summary = load_all(&store, &plan, dir.path()).await.unwrap();

    let order: Vec<&str> = summary.tables.iter().map(|load| load.table).collect();
    assert_eq!(order, plan.order());
    assert_eq!(summary.rows_for("plans"), Some(1));
    assert_eq!(summary.total_rows(), 11);
}

#[tokio::test]
async fn test_load_all_stops_at_first_failure() {
    let dir = fixture_dir();
    fs::remove_file(dir.path().join("invoices.csv")).unwrap();
    let store = MemoryStore::with_catalog();
    let plan = LoadPlan::standard().unwrap();

    let err = load_all(&store, &plan, dir.path()).await.unwrap_err();

    assert_eq!(err.stage(), Some("load invoices"));
    assert_eq!(store.count("subscriptions").await.unwrap(), 2);
    assert_eq!(store.count("usage_metrics").await.unwrap(), 0);
}

#[tokio::test]
async fn test_bad_date_aborts_with_source_error() {
    let dir = fixture_dir();
    fs::write(
        dir.path().join("invoices.csv"),
        "invoice_id,account_id,billing_month,amount_billed\n1,1,January,450.00\n",
    )
    .unwrap();
    let store = MemoryStore::with_catalog();
    let plan = LoadPlan::standard().unwrap();

    let err = load_all(&store, &plan, dir.path()).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Source);
    assert!(err.to_string().contains("billing_month"));
    assert_eq!(store.count("invoices").await.unwrap(), 0);
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();
    let pipeline = Pipeline::new(
        &store,
        &RollupTransform,
        LoadPlan::standard().unwrap(),
        dir.path(),
    );
    pipeline.run().await.unwrap();

    reset(&store, pipeline.plan()).await.unwrap();

    assert!(counts(&store).await.iter().all(|c| *c == 0));
    assert_eq!(store.identity_restarts("accounts").unwrap(), 2);
}

#[tokio::test]
async fn test_reset_failure_leaves_tables_untouched() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();
    let plan = LoadPlan::standard().unwrap();
    Pipeline::new(&store, &RollupTransform, plan.clone(), dir.path())
        .run()
        .await
        .unwrap();
    let before = counts(&store).await;

    store.inject_failure(FailPoint::Truncate).unwrap();
    let err = reset(&store, &plan).await.unwrap_err();

    assert_eq!(err.stage(), Some("reset"));
    assert_eq!(err.category(), ErrorCategory::Store);
    assert_eq!(counts(&store).await, before);
}

#[tokio::test]
async fn test_empty_transform_leaves_derived_table_empty() {
    let dir = fixture_dir();
    fs::write(
        dir.path().join("invoices.csv"),
        "invoice_id,account_id,billing_month,amount_billed\n",
    )
    .unwrap();
    let store = MemoryStore::with_catalog();

    let err = Pipeline::new(
        &store,
        &RollupTransform,
        LoadPlan::standard().unwrap(),
        dir.path(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Some("transform"));
    assert!(matches!(err.root(), PipelineError::EmptyTransform));
    assert_eq!(store.count(DERIVED_TABLE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_append_leaves_derived_table_empty() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();
    store
        .inject_failure(FailPoint::Append(DERIVED_TABLE.into()))
        .unwrap();

    let err = Pipeline::new(
        &store,
        &RollupTransform,
        LoadPlan::standard().unwrap(),
        dir.path(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Some("transform"));
    assert_eq!(store.count(DERIVED_TABLE).await.unwrap(), 0);
    assert_eq!(store.count("invoices").await.unwrap(), 2);
}

#[tokio::test]
async fn test_failed_fetch_stops_at_transform() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();
    store
        .inject_failure(FailPoint::Fetch("invoices".into()))
        .unwrap();

    let err = Pipeline::new(
        &store,
        &RollupTransform,
        LoadPlan::standard().unwrap(),
        dir.path(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Some("transform"));
    assert!(matches!(err.root(), PipelineError::Store(_)));
    assert_eq!(store.count(DERIVED_TABLE).await.unwrap(), 0);
    assert_eq!(store.count("invoices").await.unwrap(), 2);
}

#[tokio::test]
async fn test_run_summary() {
    let dir = fixture_dir();
    let store = MemoryStore::with_catalog();

    let summary = Pipeline::new(
        &store,
        &RollupTransform,
        LoadPlan::standard().unwrap(),
        dir.path(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(summary.profitability_rows, 2);
    assert_eq!(summary.load.rows_for("accounts"), Some(2));
    let rendered = summary.to_string();
    assert!(rendered.contains("account_profitability"));
    assert_eq!(rendered.lines().count(), 7);
}
