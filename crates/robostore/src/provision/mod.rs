//! Idempotent provisioning of the table and the artifact bucket.
//!
//! Each resource is handled in two steps: read the live state and compute a
//! plan with the pure functions in `robostore_core::admin`, then execute the
//! plan. The `ensure_*` functions do both; the CLI splits them so it can show
//! the plan and ask for confirmation in between.

mod bucket;
mod error;
mod table;

pub use bucket::{
    bucket_exists, ensure_bucket, ensure_bucket_cors, execute_bucket_plan, execute_cors_plan,
    get_bucket_cors, plan_bucket, plan_bucket_cors,
};
pub use error::{ProvisionError, Result};
pub use table::{ensure_table, execute_table_plan, get_table_state, plan_table};
