//! Pure functions for calculating provisioning plans (Functional Core).

use super::config::{BucketConfig, CorsRule, GsiConfig, TableConfig};

/// Represents the current state of a table.
#[derive(Debug, Clone)]
pub struct TableState {
    pub status: TableStatus,
    pub gsis: Vec<GsiState>,
}

impl TableState {
    /// Returns true once the table and every index accept traffic.
    pub fn is_ready(&self) -> bool {
        self.status == TableStatus::Active && self.gsis.iter().all(|g| g.status == GsiStatus::Active)
    }
}

/// Table status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// GSI state.
#[derive(Debug, Clone)]
pub struct GsiState {
    pub name: String,
    pub status: GsiStatus,
}

/// GSI status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// Planned changes for the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePlan {
    /// Table doesn't exist, needs to be created.
    CreateTable { config: TableConfig },
    /// Table exists, GSIs need to be added.
    AddGsis {
        table_name: String,
        gsis_to_add: Vec<GsiConfig>,
    },
    /// Table is up to date, no changes needed.
    NoChanges { table_name: String },
}

/// Planned changes for the bucket itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketPlan {
    CreateBucket { bucket_name: String, region: String },
    NoChanges { bucket_name: String },
}

/// Planned changes for the bucket's CORS rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPlan {
    /// Live rules are missing or differ from the desired rules.
    Apply {
        bucket_name: String,
        rules: Vec<CorsRule>,
    },
    NoChanges { bucket_name: String },
}

/// Pure function: Calculate what changes are needed to reach desired state.
pub fn calculate_table_plan(current: Option<&TableState>, desired: &TableConfig) -> TablePlan {
    match current {
        None => TablePlan::CreateTable {
            config: desired.clone(),
        },
        Some(state) => {
            let existing_gsi_names: Vec<&str> =
                state.gsis.iter().map(|g| g.name.as_str()).collect();

            let gsis_to_add: Vec<GsiConfig> = desired
                .gsis
                .iter()
                .filter(|gsi| !existing_gsi_names.contains(&gsi.name.as_str()))
                .cloned()
                .collect();

            if gsis_to_add.is_empty() {
                TablePlan::NoChanges {
                    table_name: desired.table_name.clone(),
                }
            } else {
                TablePlan::AddGsis {
                    table_name: desired.table_name.clone(),
                    gsis_to_add,
                }
            }
        }
    }
}

/// Pure function: Calculate whether the bucket must be created.
pub fn calculate_bucket_plan(exists: bool, desired: &BucketConfig) -> BucketPlan {
    if exists {
        BucketPlan::NoChanges {
            bucket_name: desired.bucket_name.clone(),
        }
    } else {
        BucketPlan::CreateBucket {
            bucket_name: desired.bucket_name.clone(),
            region: desired.region.clone(),
        }
    }
}

/// Pure function: Compare live CORS rules with the desired ones.
///
/// `current` is `None` when the bucket has no CORS configuration. Rule
/// and list order are ignored.
pub fn calculate_cors_plan(current: Option<&[CorsRule]>, desired: &BucketConfig) -> CorsPlan {
    let normalize = |rules: &[CorsRule]| {
        let mut rules: Vec<CorsRule> = rules.iter().map(CorsRule::normalized).collect();
        rules.sort_by(|a, b| a.allowed_origins.cmp(&b.allowed_origins));
        rules
    };

    let in_sync = current.is_some_and(|live| normalize(live) == normalize(&desired.cors_rules));

    if in_sync {
        CorsPlan::NoChanges {
            bucket_name: desired.bucket_name.clone(),
        }
    } else {
        CorsPlan::Apply {
            bucket_name: desired.bucket_name.clone(),
            rules: desired.cors_rules.clone(),
        }
    }
}

/// Pure function: Format a table plan for display.
pub fn format_table_plan(plan: &TablePlan) -> Vec<String> {
    match plan {
        TablePlan::CreateTable { config } => {
            let mut lines = vec![
                format!("+ Create table: {}", config.table_name),
                format!("  Partition key: {} (S)", config.partition_key.name),
            ];
            for gsi in &config.gsis {
                lines.push(format!("  + GSI: {}", gsi.name));
                lines.push(format!("    Partition key: {} (S)", gsi.partition_key.name));
            }
            lines.push("  Billing: PAY_PER_REQUEST".to_string());
            lines
        }
        TablePlan::AddGsis {
            table_name,
            gsis_to_add,
        } => {
            let mut lines = vec![format!("~ Update table: {}", table_name)];
            for gsi in gsis_to_add {
                lines.push(format!("  + Add GSI: {}", gsi.name));
            }
            lines
        }
        TablePlan::NoChanges { table_name } => {
            vec![format!("= Table '{}' is up to date", table_name)]
        }
    }
}

/// Pure function: Format a bucket plan for display.
pub fn format_bucket_plan(plan: &BucketPlan) -> Vec<String> {
    match plan {
        BucketPlan::CreateBucket {
            bucket_name,
            region,
        } => vec![format!("+ Create bucket: {} ({})", bucket_name, region)],
        BucketPlan::NoChanges { bucket_name } => {
            vec![format!("= Bucket '{}' exists", bucket_name)]
        }
    }
}

/// Pure function: Format a CORS plan for display.
pub fn format_cors_plan(plan: &CorsPlan) -> Vec<String> {
    match plan {
        CorsPlan::Apply { bucket_name, rules } => {
            let mut lines = vec![format!("~ Apply CORS rules: {}", bucket_name)];
            for rule in rules {
                lines.push(format!(
                    "  + {} from {}",
                    rule.allowed_methods.join(", "),
                    rule.allowed_origins.join(", ")
                ));
            }
            lines
        }
        CorsPlan::NoChanges { bucket_name } => {
            vec![format!("= CORS rules on '{}' are up to date", bucket_name)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::config::{default_cors_rule, robostore_bucket_config, robostore_table_config};

    fn active_state(gsi_names: &[&str]) -> TableState {
        TableState {
            status: TableStatus::Active,
            gsis: gsi_names
                .iter()
                .map(|name| GsiState {
                    name: name.to_string(),
                    status: GsiStatus::Active,
                })
                .collect(),
        }
    }

    fn origins() -> Vec<String> {
        vec!["https://app.example".to_string()]
    }

    #[test]
    fn test_missing_table_is_created() {
        let config = robostore_table_config();

        let plan = calculate_table_plan(None, &config);

        assert_eq!(plan, TablePlan::CreateTable { config });
    }

    #[test]
    fn test_missing_gsis_are_added() {
        let config = robostore_table_config();
        let state = active_state(&["type_index", "user_id_index", "listing_id_index"]);

        match calculate_table_plan(Some(&state), &config) {
            TablePlan::AddGsis { gsis_to_add, .. } => {
                let names: Vec<&str> = gsis_to_add.iter().map(|g| g.name.as_str()).collect();
                assert_eq!(names, vec!["email_index", "username_index"]);
            }
            other => panic!("expected AddGsis, got {other:?}"),
        }
    }

    #[test]
    fn test_complete_table_needs_no_changes() {
        let config = robostore_table_config();
        let state = active_state(&[
            "type_index",
            "user_id_index",
            "listing_id_index",
            "email_index",
            "username_index",
        ]);

        assert!(matches!(
            calculate_table_plan(Some(&state), &config),
            TablePlan::NoChanges { .. }
        ));
    }

    #[test]
    fn test_table_readiness_requires_active_indexes() {
        let mut state = active_state(&["type_index"]);
        assert!(state.is_ready());

        state.gsis[0].status = GsiStatus::Creating;
        assert!(!state.is_ready());
    }

    #[test]
    fn test_bucket_plan() {
        let config = robostore_bucket_config("artifacts", "us-west-2", &origins());

        assert_eq!(
            calculate_bucket_plan(false, &config),
            BucketPlan::CreateBucket {
                bucket_name: "artifacts".to_string(),
                region: "us-west-2".to_string()
            }
        );
        assert!(matches!(
            calculate_bucket_plan(true, &config),
            BucketPlan::NoChanges { .. }
        ));
    }

    #[test]
    fn test_cors_applied_when_missing() {
        let config = robostore_bucket_config("artifacts", "us-east-1", &origins());

        assert!(matches!(
            calculate_cors_plan(None, &config),
            CorsPlan::Apply { .. }
        ));
    }

    #[test]
    fn test_cors_in_sync_ignores_order() {
        let config = robostore_bucket_config("artifacts", "us-east-1", &origins());
        let mut live = default_cors_rule(&origins());
        live.allowed_methods.reverse();

        assert!(matches!(
            calculate_cors_plan(Some(&[live]), &config),
            CorsPlan::NoChanges { .. }
        ));
    }

    #[test]
    fn test_cors_drift_is_reapplied() {
        let config = robostore_bucket_config("artifacts", "us-east-1", &origins());
        let drifted = default_cors_rule(&["https://old.example".to_string()]);

        match calculate_cors_plan(Some(&[drifted]), &config) {
            CorsPlan::Apply { rules, .. } => assert_eq!(rules, config.cors_rules),
            other => panic!("expected Apply, got {other:?}"),
        }
    }

    #[test]
    fn test_format_plans() {
        let config = robostore_table_config();
        let lines = format_table_plan(&TablePlan::CreateTable {
            config: config.clone(),
        });
        assert_eq!(lines[0], "+ Create table: robostore");
        assert!(lines.contains(&"  + GSI: email_index".to_string()));

        let lines = format_cors_plan(&CorsPlan::NoChanges {
            bucket_name: "artifacts".to_string(),
        });
        assert_eq!(lines, vec!["= CORS rules on 'artifacts' are up to date"]);
    }
}
