//! Initial schema.
//!
//! Creates the six base tables, the `account_profitability` fact table and
//! the `ml_account_training_data` feature view.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: REFERENCE TABLES
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(PLANS_SQL).await?;

        // ============================================================
        // PART 2: BILLING AND ACTIVITY
        // ============================================================
        db.execute_unprepared(SUBSCRIPTIONS_SQL).await?;
        db.execute_unprepared(INVOICES_SQL).await?;
        db.execute_unprepared(USAGE_METRICS_SQL).await?;
        db.execute_unprepared(SUPPORT_COSTS_SQL).await?;

        // ============================================================
        // PART 3: DERIVED
        // ============================================================
        db.execute_unprepared(ACCOUNT_PROFITABILITY_SQL).await?;
        db.execute_unprepared(TRAINING_VIEW_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    account_id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    account_name TEXT NOT NULL,
    industry TEXT,
    company_size INTEGER,
    region TEXT,
    contract_type TEXT,
    signup_date DATE,
    status TEXT
);
";

const PLANS_SQL: &str = r"
CREATE TABLE plans (
    plan_id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    plan_name TEXT NOT NULL,
    base_price NUMERIC(12, 2) NOT NULL,
    included_users INTEGER NOT NULL,
    overage_price NUMERIC(12, 2) NOT NULL
);
";

const SUBSCRIPTIONS_SQL: &str = r"
CREATE TABLE subscriptions (
    subscription_id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    plan_id INTEGER NOT NULL REFERENCES plans(plan_id),
    discount_pct NUMERIC(5, 2) NOT NULL DEFAULT 0,
    start_date DATE,
    end_date DATE,
    status TEXT
);

CREATE INDEX idx_subscriptions_account ON subscriptions(account_id);
";

const INVOICES_SQL: &str = r"
CREATE TABLE invoices (
    invoice_id INTEGER GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    billing_month DATE NOT NULL,
    amount_billed NUMERIC(12, 2) NOT NULL
);

CREATE INDEX idx_invoices_account_month ON invoices(account_id, billing_month);
";

const USAGE_METRICS_SQL: &str = r"
CREATE TABLE usage_metrics (
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    usage_month DATE NOT NULL,
    active_users INTEGER,
    api_calls BIGINT,
    feature_events BIGINT,
    PRIMARY KEY (account_id, usage_month)
);
";

const SUPPORT_COSTS_SQL: &str = r"
CREATE TABLE support_costs (
    account_id INTEGER NOT NULL REFERENCES accounts(account_id),
    support_month DATE NOT NULL,
    tickets INTEGER,
    support_hours NUMERIC(8, 2),
    cost NUMERIC(12, 2),
    PRIMARY KEY (account_id, support_month)
);
";

const ACCOUNT_PROFITABILITY_SQL: &str = r"
CREATE TABLE account_profitability (
    account_id INTEGER PRIMARY KEY REFERENCES accounts(account_id),
    period_start DATE NOT NULL,
    period_end DATE NOT NULL,
    revenue NUMERIC(14, 2) NOT NULL,
    support_cost NUMERIC(14, 2) NOT NULL,
    profit NUMERIC(14, 2) NOT NULL,
    margin NUMERIC(10, 4) NOT NULL,
    active_users NUMERIC(10, 2) NOT NULL,
    api_calls BIGINT NOT NULL,
    feature_events BIGINT NOT NULL
);
";

/// One row per account and month that has a following month. The label
/// flags a drop of more than 10% in profit or active users next month.
const TRAINING_VIEW_SQL: &str = r"
CREATE VIEW ml_account_training_data AS
WITH revenue_by_month AS (
    SELECT account_id, billing_month AS month, SUM(amount_billed) AS revenue
    FROM invoices
    GROUP BY account_id, billing_month
),
support_by_month AS (
    SELECT account_id, support_month AS month, SUM(cost) AS support_cost
    FROM support_costs
    GROUP BY account_id, support_month
),
usage_by_month AS (
    SELECT
        account_id,
        usage_month AS month,
        SUM(active_users)::BIGINT AS active_users,
        SUM(api_calls)::BIGINT AS api_calls
    FROM usage_metrics
    GROUP BY account_id, usage_month
),
monthly AS (
    SELECT
        r.account_id,
        r.month,
        r.revenue,
        COALESCE(s.support_cost, 0) AS support_cost,
        r.revenue - COALESCE(s.support_cost, 0) AS profit,
        CASE
            WHEN r.revenue = 0 THEN 0
            ELSE ROUND((r.revenue - COALESCE(s.support_cost, 0)) / r.revenue, 4)
        END AS margin,
        u.active_users,
        u.api_calls
    FROM revenue_by_month r
    LEFT JOIN support_by_month s ON s.account_id = r.account_id AND s.month = r.month
    LEFT JOIN usage_by_month u ON u.account_id = r.account_id AND u.month = r.month
),
with_next AS (
    SELECT
        m.*,
        LEAD(m.profit) OVER w AS next_profit,
        LEAD(m.active_users) OVER w AS next_active_users
    FROM monthly m
    WINDOW w AS (PARTITION BY m.account_id ORDER BY m.month)
)
SELECT
    account_id,
    month,
    revenue,
    profit,
    support_cost,
    margin,
    active_users,
    api_calls,
    CASE
        WHEN next_profit < profit - 0.1 * ABS(profit) THEN 1
        WHEN next_active_users < active_users * 0.9 THEN 1
        ELSE 0
    END::INTEGER AS deteriorating_label
FROM with_next
WHERE next_profit IS NOT NULL;
";

const DROP_ALL_SQL: &str = r"
DROP VIEW IF EXISTS ml_account_training_data;
DROP TABLE IF EXISTS account_profitability CASCADE;
DROP TABLE IF EXISTS support_costs CASCADE;
DROP TABLE IF EXISTS usage_metrics CASCADE;
DROP TABLE IF EXISTS invoices CASCADE;
DROP TABLE IF EXISTS subscriptions CASCADE;
DROP TABLE IF EXISTS plans CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
";
