//! Integration tests against PostgreSQL in a container.
//!
//! Run with: cargo test -p profitlens-db --test postgres_test -- --ignored
//!
//! Each test starts its own PostgreSQL container, applies the migrations and
//! exercises the store, the SQL transform and the training view.

use std::fs;
use std::path::{Path, PathBuf};

use profitlens_core::catalog::{BASE_TABLES, DERIVED_TABLE, PROFITABILITY_COLUMNS, TRAINING_VIEW};
use profitlens_core::pipeline::{build_profitability, load_table, reset};
use profitlens_core::{LoadPlan, Pipeline, RollupTransform, Store, Transform, Value};
use profitlens_db::migration::{Migrator, MigratorTrait};
use profitlens_db::{PostgresStore, SqlTransform, connect, load_training_data};
use profitlens_shared::{DatabaseConfig, PipelineError};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tempfile::TempDir;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::ContainerAsync;
use testcontainers_modules::testcontainers::runners::AsyncRunner;

const FIXTURE: [(&str, &str); 6] = [
    (
        "accounts.csv",
        "account_id,account_name,industry,company_size,region,contract_type,signup_date,status
1,Account_1,Retail,120,Europe,monthly,2022-03-04,active
2,Account_2,Logistics,45,APAC,annual,2022-05-17,active
3,Account_3,Healthcare,300,North America,monthly,2022-09-30,active
",
    ),
    (
        "plans.csv",
        "plan_id,plan_name,base_price,included_users,overage_price
1,Basic,500,10,20
2,Pro,1200,25,18
3,Enterprise,3000,75,15
",
    ),
    (
        "subscriptions.csv",
        "subscription_id,account_id,plan_id,discount_pct,start_date,end_date,status
1,1,1,12.5,2022-03-04,,active
2,2,2,0.0,2022-05-17,,active
3,3,3,30.25,2022-09-30,,active
",
    ),
    (
        "invoices.csv",
        "invoice_id,account_id,billing_month,amount_billed
1,1,2024-01-01,437.50
2,1,2024-02-01,452.10
3,2,2024-01-01,1200.00
4,2,2024-02-01,1188.35
5,3,2024-01-01,2092.50
6,3,2024-02-01,2101.00
",
    ),
    (
        "usage_metrics.csv",
        "account_id,usage_month,active_users,api_calls,feature_events
1,2024-01-01,12,9800,5100
1,2024-02-01,11,10200,4900
2,2024-01-01,30,12000,6100
2,2024-02-01,28,11500,5800
3,2024-01-01,70,8000,4000
3,2024-02-01,73,8300,4200
",
    ),
    (
        "support_costs.csv",
        "account_id,support_month,tickets,support_hours,cost
1,2024-01-01,2,1.5,90.0
1,2024-02-01,0,0.0,0.0
2,2024-01-01,4,5.25,315.0
2,2024-02-01,3,2.0,120.0
3,2024-01-01,6,7.5,450.0
3,2024-02-01,5,4.0,240.0
",
    ),
];

struct TestDb {
    _container: ContainerAsync<Postgres>,
    db: DatabaseConnection,
}

/// Starts PostgreSQL, connects through the crate's own config path and
/// applies every migration.
async fn start_postgres() -> TestDb {
    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start postgres container");
    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get mapped port");

    let config = DatabaseConfig {
        host: host.to_string(),
        port,
        name: "postgres".to_string(),
        user: "postgres".to_string(),
        password: "postgres".to_string(),
        max_connections: 5,
    };
    let db = connect(&config).await.expect("Failed to connect");
    Migrator::up(&db, None).await.expect("Failed to migrate");

    TestDb {
        _container: container,
        db,
    }
}

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (file, body) in FIXTURE {
        fs::write(dir.path().join(file), body).unwrap();
    }
    dir
}

fn transform_sql() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../sql/transforms.sql")
}

async fn run_pipeline(db: &DatabaseConnection, data_dir: &Path) -> PostgresStore {
    let store = PostgresStore::new(db.clone());
    let transform = SqlTransform::from_file(db.clone(), &transform_sql()).unwrap();
    Pipeline::new(&store, &transform, LoadPlan::standard().unwrap(), data_dir)
        .run()
        .await
        .unwrap();
    store
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_migrations_create_empty_schema() {
    let test = start_postgres().await;
    let store = PostgresStore::new(test.db.clone());

    for spec in &BASE_TABLES {
        assert_eq!(store.count(spec.name).await.unwrap(), 0, "{}", spec.name);
        let empty = store.fetch(spec.name).await.unwrap();
        let columns: Vec<&str> = empty.columns().iter().map(String::as_str).collect();
        assert_eq!(columns, spec.columns, "{}", spec.name);
    }

    let derived = store.fetch(DERIVED_TABLE).await.unwrap();
    assert_eq!(derived.columns(), PROFITABILITY_COLUMNS);
    assert_eq!(store.fetch(TRAINING_VIEW).await.unwrap().columns().len(), 9);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_migrations_roll_back_and_reapply() {
    let test = start_postgres().await;

    Migrator::down(&test.db, None).await.unwrap();
    let store = PostgresStore::new(test.db.clone());
    assert!(store.count("accounts").await.is_err());

    Migrator::up(&test.db, None).await.unwrap();
    assert_eq!(store.count("accounts").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_end_to_end_counts_and_rerun() {
    let test = start_postgres().await;
    let dir = fixture();

    let store = run_pipeline(&test.db, dir.path()).await;
    let expected = [
        ("accounts", 3),
        ("plans", 3),
        ("subscriptions", 3),
        ("invoices", 6),
        ("usage_metrics", 6),
        ("support_costs", 6),
        (DERIVED_TABLE, 3),
    ];
    for (table, rows) in expected {
        assert_eq!(store.count(table).await.unwrap(), rows, "{table}");
    }
    let first = store.fetch(DERIVED_TABLE).await.unwrap();
    for column in ["revenue", "support_cost", "profit", "margin"] {
        assert!(first.column(column).unwrap().all(|v| !v.is_null()));
    }

    // second run starts from a clean slate
    let store = run_pipeline(&test.db, dir.path()).await;
    for (table, rows) in expected {
        assert_eq!(store.count(table).await.unwrap(), rows, "{table}");
    }
    assert_eq!(store.fetch(DERIVED_TABLE).await.unwrap(), first);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_sql_transform_matches_rollup() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;

    let sql = SqlTransform::from_file(test.db.clone(), &transform_sql()).unwrap();
    let from_sql = sql.produce(&store).await.unwrap();
    let from_rollup = RollupTransform.produce(&store).await.unwrap();

    assert_eq!(from_sql, from_rollup);
    assert_eq!(
        from_sql.value(0, "margin").and_then(Value::as_decimal),
        Some(rust_decimal_macros::dec!(0.8988))
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_children_before_parents_is_rejected() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = PostgresStore::new(test.db.clone());
    reset(&store, &LoadPlan::standard().unwrap()).await.unwrap();

    let err = load_table(
        &store,
        "invoices",
        &dir.path().join("invoices.csv"),
        &["billing_month"],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, PipelineError::Store(_)));
    assert!(err.to_string().contains("foreign key"));
    assert_eq!(store.count("invoices").await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_failed_truncate_leaves_tables_untouched() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;

    let err = store
        .truncate_all(&["invoices", "no_such_table"])
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Store(_)));
    assert_eq!(store.count("invoices").await.unwrap(), 6);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_empty_transform_leaves_derived_table_empty() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;
    assert_eq!(store.count(DERIVED_TABLE).await.unwrap(), 3);

    let sql = fs::read_to_string(transform_sql()).unwrap();
    let filtered = sql.replace("ORDER BY a.account_id", "WHERE FALSE ORDER BY a.account_id");
    let transform = SqlTransform::new(test.db.clone(), filtered);

    let err = build_profitability(&store, &transform).await.unwrap_err();
    assert!(matches!(err.root(), PipelineError::EmptyTransform));
    assert_eq!(err.stage(), Some("transform"));
    assert_eq!(store.count(DERIVED_TABLE).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_training_view_labels_next_month() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;

    let rows = load_training_data(&test.db).await.unwrap();
    // two months per account, only the first has a following month
    assert_eq!(rows.len(), 3);
    assert!(
        rows.column("deteriorating_label")
            .unwrap()
            .all(|v| *v == Value::Int(0))
    );

    // account 1 loses most of its February revenue
    execute(&test.db, "UPDATE invoices SET amount_billed = 100 WHERE invoice_id = 2").await;
    let rows = store.fetch(TRAINING_VIEW).await.unwrap();
    let labels: Vec<_> = rows.column("deteriorating_label").unwrap().cloned().collect();
    assert_eq!(labels.iter().filter(|v| **v == Value::Int(1)).count(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_training_view_shrinking_loss_is_not_deteriorating() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;

    // account 1: -200 in January, -190 in February
    set_support_cost(&test.db, 1, "2024-01-01", "637.50").await;
    set_support_cost(&test.db, 1, "2024-02-01", "642.10").await;

    assert_eq!(label_for(&store, 1).await, Value::Int(0));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_training_view_growing_loss_is_deteriorating() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;

    // account 1: -200 in January, -300 in February
    set_support_cost(&test.db, 1, "2024-01-01", "637.50").await;
    set_support_cost(&test.db, 1, "2024-02-01", "752.10").await;

    assert_eq!(label_for(&store, 1).await, Value::Int(1));
    assert_eq!(label_for(&store, 2).await, Value::Int(0));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_training_view_user_drop_with_steady_profit_is_deteriorating() {
    let test = start_postgres().await;
    let dir = fixture();
    let store = run_pipeline(&test.db, dir.path()).await;
    assert_eq!(label_for(&store, 3).await, Value::Int(0));

    // account 3 keeps its profit but loses a third of its users
    execute(
        &test.db,
        "UPDATE usage_metrics SET active_users = 50 \
         WHERE account_id = 3 AND usage_month = '2024-02-01'",
    )
    .await;

    assert_eq!(label_for(&store, 3).await, Value::Int(1));
}

async fn label_for(store: &PostgresStore, account_id: i64) -> Value {
    let rows = store.fetch(TRAINING_VIEW).await.unwrap();
    let row = (0..rows.len())
        .find(|&i| rows.value(i, "account_id") == Some(&Value::Int(account_id)))
        .expect("account missing from training view");
    rows.value(row, "deteriorating_label").unwrap().clone()
}

async fn set_support_cost(db: &DatabaseConnection, account_id: i64, month: &str, cost: &str) {
    execute(
        db,
        &format!(
            "UPDATE support_costs SET cost = {cost} \
             WHERE account_id = {account_id} AND support_month = '{month}'"
        ),
    )
    .await;
}

async fn execute(db: &DatabaseConnection, sql: &str) {
    db.execute_unprepared(sql).await.unwrap();
}
