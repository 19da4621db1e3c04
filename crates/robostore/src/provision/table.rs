//! Table provisioning (Imperative Shell).

use std::time::Duration;

use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode as SdkBillingMode, CreateGlobalSecondaryIndexAction,
    GlobalSecondaryIndex, GlobalSecondaryIndexUpdate, IndexStatus, KeySchemaElement, KeyType,
    Projection, ProjectionType as SdkProjectionType, ScalarAttributeType,
    TableStatus as SdkTableStatus,
};
use aws_sdk_dynamodb::Client;
use tracing::{debug, info};

use robostore_core::admin::{
    calculate_table_plan, AttributeType, BillingMode, GsiConfig, GsiState, GsiStatus,
    KeyAttribute, ProjectionType, TableConfig, TablePlan, TableState, TableStatus,
};

use super::error::{ProvisionError, Result};

const ACTIVATION_ATTEMPTS: usize = 60;
const ACTIVATION_DELAY: Duration = Duration::from_secs(2);

/// Fetches current table state, returns None if the table doesn't exist.
pub async fn get_table_state(client: &Client, table_name: &str) -> Result<Option<TableState>> {
    let response = match client.describe_table().table_name(table_name).send().await {
        Ok(response) => response,
        Err(err) => {
            if matches!(
                err.as_service_error(),
                Some(DescribeTableError::ResourceNotFoundException(_))
            ) {
                return Ok(None);
            }
            return Err(ProvisionError::AwsSdk(err.to_string()));
        }
    };

    let Some(table) = response.table() else {
        return Ok(None);
    };

    let gsis = table
        .global_secondary_indexes()
        .iter()
        .map(|gsi| GsiState {
            name: gsi.index_name().unwrap_or_default().to_string(),
            status: gsi_status(gsi.index_status()),
        })
        .collect();

    Ok(Some(TableState {
        status: table_status(table.table_status()),
        gsis,
    }))
}

/// Reads the live table and computes the plan to reach `config`.
pub async fn plan_table(client: &Client, config: &TableConfig) -> Result<TablePlan> {
    let current = get_table_state(client, &config.table_name).await?;
    Ok(calculate_table_plan(current.as_ref(), config))
}

/// Creates the table or adds missing indexes, then waits until active.
pub async fn ensure_table(client: &Client, config: &TableConfig) -> Result<TablePlan> {
    let plan = plan_table(client, config).await?;
    execute_table_plan(client, &plan).await?;
    Ok(plan)
}

/// Execute a table plan.
pub async fn execute_table_plan(client: &Client, plan: &TablePlan) -> Result<()> {
    match plan {
        TablePlan::CreateTable { config } => {
            if create_table(client, config).await? {
                info!(table = %config.table_name, "table created");
            } else {
                // Someone else created it between planning and now; it may
                // predate some of our indexes.
                info!(table = %config.table_name, "table already exists");
                let current = get_table_state(client, &config.table_name).await?;
                if let TablePlan::AddGsis { gsis_to_add, .. } =
                    calculate_table_plan(current.as_ref(), config)
                {
                    add_gsis(client, &config.table_name, &gsis_to_add).await?;
                }
            }
            wait_for_table_active(client, &config.table_name).await?;
        }
        TablePlan::AddGsis {
            table_name,
            gsis_to_add,
        } => {
            add_gsis(client, table_name, gsis_to_add).await?;
        }
        TablePlan::NoChanges { .. } => {}
    }
    Ok(())
}

/// Returns false when the table already existed.
async fn create_table(client: &Client, config: &TableConfig) -> Result<bool> {
    let mut request = client
        .create_table()
        .table_name(&config.table_name)
        .key_schema(hash_key(&config.partition_key)?)
        .set_attribute_definitions(Some(attribute_definitions(config)?))
        .billing_mode(to_billing_mode(config.billing_mode));

    for gsi in &config.gsis {
        request = request.global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name(&gsi.name)
                .key_schema(hash_key(&gsi.partition_key)?)
                .projection(projection(gsi.projection))
                .build()
                .map_err(|e| ProvisionError::AwsSdk(e.to_string()))?,
        );
    }

    debug!(table = %config.table_name, gsis = config.gsis.len(), "CreateTable");
    match request.send().await {
        Ok(_) => Ok(true),
        Err(err)
            if matches!(
                err.as_service_error(),
                Some(CreateTableError::ResourceInUseException(_))
            ) =>
        {
            Ok(false)
        }
        Err(err) => Err(ProvisionError::AwsSdk(err.to_string())),
    }
}

/// One remote action while adding indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GsiStep<'a> {
    WaitActive,
    Add(&'a GsiConfig),
}

/// DynamoDB accepts one index creation per UpdateTable call, and only while
/// the table and every index are ACTIVE.
fn gsi_steps(gsis: &[GsiConfig]) -> Vec<GsiStep<'_>> {
    let mut steps = vec![GsiStep::WaitActive];
    for gsi in gsis {
        steps.push(GsiStep::Add(gsi));
        steps.push(GsiStep::WaitActive);
    }
    steps
}

async fn add_gsis(client: &Client, table_name: &str, gsis: &[GsiConfig]) -> Result<()> {
    for step in gsi_steps(gsis) {
        match step {
            GsiStep::WaitActive => wait_for_table_active(client, table_name).await?,
            GsiStep::Add(gsi) => {
                add_gsi(client, table_name, gsi).await?;
                info!(table = table_name, index = %gsi.name, "index added");
            }
        }
    }
    Ok(())
}

async fn add_gsi(client: &Client, table_name: &str, gsi: &GsiConfig) -> Result<()> {
    debug!(table = table_name, index = %gsi.name, "UpdateTable");
    client
        .update_table()
        .table_name(table_name)
        .attribute_definitions(attribute_definition(&gsi.partition_key)?)
        .global_secondary_index_updates(
            GlobalSecondaryIndexUpdate::builder()
                .create(
                    CreateGlobalSecondaryIndexAction::builder()
                        .index_name(&gsi.name)
                        .key_schema(hash_key(&gsi.partition_key)?)
                        .projection(projection(gsi.projection))
                        .build()
                        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))?,
                )
                .build(),
        )
        .send()
        .await
        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))?;

    Ok(())
}

async fn wait_for_table_active(client: &Client, table_name: &str) -> Result<()> {
    for _ in 0..ACTIVATION_ATTEMPTS {
        if let Some(state) = get_table_state(client, table_name).await? {
            if state.is_ready() {
                return Ok(());
            }
        }
        tokio::time::sleep(ACTIVATION_DELAY).await;
    }

    Err(ProvisionError::TableActivationTimeout {
        table_name: table_name.to_string(),
    })
}

/// Key and index attribute definitions, each attribute declared once.
fn attribute_definitions(config: &TableConfig) -> Result<Vec<AttributeDefinition>> {
    let mut keys: Vec<&KeyAttribute> = vec![&config.partition_key];
    for gsi in &config.gsis {
        if !keys.iter().any(|k| k.name == gsi.partition_key.name) {
            keys.push(&gsi.partition_key);
        }
    }
    keys.into_iter().map(attribute_definition).collect()
}

fn attribute_definition(key: &KeyAttribute) -> Result<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(&key.name)
        .attribute_type(to_scalar_type(key.attribute_type))
        .build()
        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))
}

fn hash_key(key: &KeyAttribute) -> Result<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(&key.name)
        .key_type(KeyType::Hash)
        .build()
        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))
}

fn projection(projection_type: ProjectionType) -> Projection {
    let projection_type = match projection_type {
        ProjectionType::All => SdkProjectionType::All,
    };
    Projection::builder().projection_type(projection_type).build()
}

fn to_scalar_type(attr_type: AttributeType) -> ScalarAttributeType {
    match attr_type {
        AttributeType::String => ScalarAttributeType::S,
    }
}

fn to_billing_mode(mode: BillingMode) -> SdkBillingMode {
    match mode {
        BillingMode::PayPerRequest => SdkBillingMode::PayPerRequest,
    }
}

fn table_status(status: Option<&SdkTableStatus>) -> TableStatus {
    match status {
        Some(SdkTableStatus::Creating) => TableStatus::Creating,
        Some(SdkTableStatus::Updating) => TableStatus::Updating,
        Some(SdkTableStatus::Deleting) => TableStatus::Deleting,
        _ => TableStatus::Active,
    }
}

fn gsi_status(status: Option<&IndexStatus>) -> GsiStatus {
    match status {
        Some(IndexStatus::Creating) => GsiStatus::Creating,
        Some(IndexStatus::Updating) => GsiStatus::Updating,
        Some(IndexStatus::Deleting) => GsiStatus::Deleting,
        _ => GsiStatus::Active,
    }
}
