//! Table catalog for the SaaS dataset.
//!
//! Each base table names its CSV source, its column order (which is also the
//! CSV header and the target schema), the columns coerced to dates, the
//! tables it must be loaded after, and its foreign keys.

/// A foreign key from one column to a column of a parent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing column.
    pub column: &'static str,
    /// Parent table.
    pub references: &'static str,
    /// Referenced column in the parent table.
    pub referenced_column: &'static str,
}

/// Static description of one base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    /// Table name in the store.
    pub name: &'static str,
    /// CSV file name inside the data directory.
    pub source_file: &'static str,
    /// Columns in header order.
    pub columns: &'static [&'static str],
    /// Columns parsed as dates.
    pub date_columns: &'static [&'static str],
    /// Tables that must be loaded before this one.
    pub depends_on: &'static [&'static str],
    /// Foreign keys enforced by the store.
    pub foreign_keys: &'static [ForeignKey],
}

const fn account_fk() -> ForeignKey {
    ForeignKey {
        column: "account_id",
        references: "accounts",
        referenced_column: "account_id",
    }
}

/// Accounts.
pub const ACCOUNTS: TableSpec = TableSpec {
    name: "accounts",
    source_file: "accounts.csv",
    columns: &[
        "account_id",
        "account_name",
        "industry",
        "company_size",
        "region",
        "contract_type",
        "signup_date",
        "status",
    ],
    date_columns: &["signup_date"],
    depends_on: &[],
    foreign_keys: &[],
};

/// Plans.
pub const PLANS: TableSpec = TableSpec {
    name: "plans",
    source_file: "plans.csv",
    columns: &[
        "plan_id",
        "plan_name",
        "base_price",
        "included_users",
        "overage_price",
    ],
    date_columns: &[],
    depends_on: &[],
    foreign_keys: &[],
};

/// Subscriptions, one per account.
pub const SUBSCRIPTIONS: TableSpec = TableSpec {
    name: "subscriptions",
    source_file: "subscriptions.csv",
    columns: &[
        "subscription_id",
        "account_id",
        "plan_id",
        "discount_pct",
        "start_date",
        "end_date",
        "status",
    ],
    date_columns: &["start_date", "end_date"],
    depends_on: &["accounts", "plans"],
    foreign_keys: &[
        account_fk(),
        ForeignKey {
            column: "plan_id",
            references: "plans",
            referenced_column: "plan_id",
        },
    ],
};

/// Monthly invoices.
pub const INVOICES: TableSpec = TableSpec {
    name: "invoices",
    source_file: "invoices.csv",
    columns: &["invoice_id", "account_id", "billing_month", "amount_billed"],
    date_columns: &["billing_month"],
    depends_on: &["accounts", "subscriptions"],
    foreign_keys: &[account_fk()],
};

/// Monthly product usage.
pub const USAGE_METRICS: TableSpec = TableSpec {
    name: "usage_metrics",
    source_file: "usage_metrics.csv",
    columns: &[
        "account_id",
        "usage_month",
        "active_users",
        "api_calls",
        "feature_events",
    ],
    date_columns: &["usage_month"],
    depends_on: &["accounts", "subscriptions"],
    foreign_keys: &[account_fk()],
};

/// Monthly support cost.
pub const SUPPORT_COSTS: TableSpec = TableSpec {
    name: "support_costs",
    source_file: "support_costs.csv",
    columns: &[
        "account_id",
        "support_month",
        "tickets",
        "support_hours",
        "cost",
    ],
    date_columns: &["support_month"],
    depends_on: &["accounts", "subscriptions"],
    foreign_keys: &[account_fk()],
};

/// The six base tables in declaration order.
pub const BASE_TABLES: [TableSpec; 6] = [
    ACCOUNTS,
    PLANS,
    SUBSCRIPTIONS,
    INVOICES,
    USAGE_METRICS,
    SUPPORT_COSTS,
];

/// Derived profitability fact table.
pub const DERIVED_TABLE: &str = "account_profitability";

/// Columns of the derived table, in the order the transform must produce them.
pub const PROFITABILITY_COLUMNS: [&str; 10] = [
    "account_id",
    "period_start",
    "period_end",
    "revenue",
    "support_cost",
    "profit",
    "margin",
    "active_users",
    "api_calls",
    "feature_events",
];

/// Foreign keys of the derived table.
pub const PROFITABILITY_FOREIGN_KEYS: [ForeignKey; 1] = [account_fk()];

/// Feature view read by the training step.
pub const TRAINING_VIEW: &str = "ml_account_training_data";

/// Looks up a base table by name.
#[must_use]
pub fn base_table(name: &str) -> Option<&'static TableSpec> {
    BASE_TABLES.iter().find(|spec| spec.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_columns_are_declared_columns() {
        for spec in &BASE_TABLES {
            for col in spec.date_columns {
                assert!(
                    spec.columns.contains(col),
                    "{}.{col} is not a column",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_foreign_keys_reference_dependencies() {
        for spec in &BASE_TABLES {
            for fk in spec.foreign_keys {
                assert!(
                    spec.depends_on.contains(&fk.references),
                    "{} references {} without depending on it",
                    spec.name,
                    fk.references
                );
                let parent = base_table(fk.references).unwrap();
                assert!(parent.columns.contains(&fk.referenced_column));
                assert!(spec.columns.contains(&fk.column));
            }
        }
    }

    #[test]
    fn test_base_table_lookup() {
        assert_eq!(base_table("plans"), Some(&PLANS));
        assert!(base_table(DERIVED_TABLE).is_none());
    }
}
