//! Provisioning configuration and plans for the table and bucket.

mod config;
mod planning;

pub use config::{
    default_cors_rule, robostore_bucket_config, robostore_table_config, AttributeType,
    BillingMode, BucketConfig, CorsRule, GsiConfig, KeyAttribute, ProjectionType, TableConfig,
};
pub use planning::{
    calculate_bucket_plan, calculate_cors_plan, calculate_table_plan, format_bucket_plan,
    format_cors_plan, format_table_plan, BucketPlan, CorsPlan, GsiState, GsiStatus, TablePlan,
    TableState, TableStatus,
};
