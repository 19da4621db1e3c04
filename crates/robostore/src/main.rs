//! Admin CLI for the robostore table and artifact bucket.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dialoguer::Confirm;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use robostore::aws::{create_dynamodb_client, create_s3_client};
use robostore::provision::{self, ProvisionError};
use robostore::storage::{DynamoDbTable, S3ObjectStore};
use robostore::store::ItemStore;
use robostore::Config;
use robostore_core::admin::{
    format_bucket_plan, format_cors_plan, format_table_plan, robostore_bucket_config,
    robostore_table_config, BucketPlan, CorsPlan, TablePlan,
};
use robostore_core::item::Item;
use robostore_core::models::{ApiKey, Artifact, Listing, Order, Robot, User};
use robostore_core::objects::{ObjectStore, PresignRequest};
use robostore_core::storage::{TableBackend, TextFilter};

mod prelude;

use prelude::*;

/// Administration tasks for a robostore deployment
#[derive(Debug, Parser)]
#[command(name = "robostore")]
#[command(about = "Administration tasks for robostore", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: Global,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Silence the command output
    #[clap(long, global = true)]
    pub silent: bool,

    /// Enable verbose output
    #[clap(long, global = true)]
    pub verbose: bool,

    /// Table name to use.
    #[arg(long, global = true, env = "ROBOSTORE_TABLE_NAME")]
    pub table_name: Option<String>,

    /// Bucket name to use.
    #[arg(long, global = true, env = "ROBOSTORE_BUCKET_NAME")]
    pub bucket_name: Option<String>,
}

impl Global {
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(table_name) = &self.table_name {
            config.table_name = table_name.clone();
        }
        if let Some(bucket_name) = &self.bucket_name {
            config.bucket_name = bucket_name.clone();
        }
        config
    }
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Create or update the table, bucket and CORS rules
    Provision(ProvisionCommand),

    /// Count stored items of one type
    Count(CountCommand),

    /// Print the raw record stored under an id
    Inspect(InspectCommand),

    /// Create a presigned URL for an object key
    Presign(PresignCommand),
}

#[derive(Debug, clap::Parser)]
#[command(long_about = "Create or update the robostore infrastructure.

Creates the table with its Global Secondary Indexes (GSIs), adds any
missing GSIs to an existing table, creates the artifact bucket and
applies its CORS rules. Every step is idempotent and CORS rules are
checked on every run.

The command shows a plan of changes before applying and asks for confirmation.

Environment variables:
  AWS_ENDPOINT_URL        - Use a local endpoint (e.g., http://localhost:4566)
  AWS_REGION              - AWS region (defaults to us-east-1)
  AWS_PROFILE             - AWS profile to use for credentials
  ROBOSTORE_CORS_ORIGINS  - Comma-separated origins allowed by CORS")]
struct ProvisionCommand {
    /// Skip confirmation prompts.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, clap::Parser)]
struct CountCommand {
    /// Item type to count.
    #[arg(value_enum)]
    item_type: ItemKind,

    /// Only count items whose searchable fields contain this text.
    #[arg(long)]
    text: Option<String>,
}

#[derive(Debug, clap::Parser)]
struct InspectCommand {
    /// Item id.
    id: String,
}

#[derive(Debug, clap::Parser)]
struct PresignCommand {
    /// Object key in the artifact bucket.
    key: String,

    /// Presign an upload instead of a download.
    #[arg(long)]
    upload: bool,

    /// Content type the upload must be sent with.
    #[arg(long, default_value = "application/octet-stream", requires = "upload")]
    content_type: String,

    /// URL lifetime in seconds (defaults to ROBOSTORE_PRESIGN_EXPIRY_SECONDS).
    #[arg(long, value_name = "SECS")]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ItemKind {
    User,
    Listing,
    Robot,
    Order,
    Artifact,
    ApiKey,
}

impl ItemKind {
    fn type_name(self) -> &'static str {
        match self {
            ItemKind::User => User::TYPE,
            ItemKind::Listing => Listing::TYPE,
            ItemKind::Robot => Robot::TYPE,
            ItemKind::Order => Order::TYPE,
            ItemKind::Artifact => Artifact::TYPE,
            ItemKind::ApiKey => ApiKey::TYPE,
        }
    }

    fn search_fields(self) -> &'static [&'static str] {
        match self {
            ItemKind::User => User::SEARCH_FIELDS,
            ItemKind::Listing => Listing::SEARCH_FIELDS,
            ItemKind::Robot => Robot::SEARCH_FIELDS,
            ItemKind::Order => Order::SEARCH_FIELDS,
            ItemKind::Artifact => Artifact::SEARCH_FIELDS,
            ItemKind::ApiKey => ApiKey::SEARCH_FIELDS,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.global.is_verbose() {
        "robostore=debug"
    } else if cli.global.is_silent() {
        "robostore=warn"
    } else {
        "robostore=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.global.config();

    match cli.command {
        Commands::Provision(cmd) => run_provision(cmd, &cli.global, &config).await?,
        Commands::Count(cmd) => run_count(cmd, &config).await?,
        Commands::Inspect(cmd) => run_inspect(cmd, &config).await?,
        Commands::Presign(cmd) => run_presign(cmd, &config).await?,
    }

    Ok(())
}

async fn run_provision(cmd: ProvisionCommand, global: &Global, config: &Config) -> anyhow::Result<()> {
    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), config.aws.target_display());
        aprintln!();
    }

    let dynamo_client = create_dynamodb_client(&config.aws).await;
    let s3_client = create_s3_client(&config.aws).await;

    let table_config = robostore_table_config().with_table_name(&config.table_name);
    let bucket_config =
        robostore_bucket_config(&config.bucket_name, &config.aws.region, &config.cors_origins);

    let table_plan = provision::plan_table(&dynamo_client, &table_config).await?;
    let bucket_plan = provision::plan_bucket(&s3_client, &bucket_config).await?;
    let cors_plan = provision::plan_bucket_cors(&s3_client, &bucket_config).await?;

    if !global.is_silent() {
        let mut lines = format_table_plan(&table_plan);
        lines.extend(format_bucket_plan(&bucket_plan));
        lines.extend(format_cors_plan(&cors_plan));
        print_plan("Provision Plan:", &lines);
    }

    let up_to_date = matches!(table_plan, TablePlan::NoChanges { .. })
        && matches!(bucket_plan, BucketPlan::NoChanges { .. })
        && matches!(cors_plan, CorsPlan::NoChanges { .. });
    if up_to_date {
        if !global.is_silent() {
            aprintln!("{}", p_g("Infrastructure is up to date."));
        }
        return Ok(());
    }

    if !cmd.force {
        let confirmed = Confirm::new()
            .with_prompt("Apply these changes?")
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            return Err(ProvisionError::UserCancelled.into());
        }
    }

    if !global.is_silent() {
        aprintln!("{}", p_b("Applying changes..."));
    }

    provision::execute_table_plan(&dynamo_client, &table_plan).await?;
    provision::execute_bucket_plan(&s3_client, &bucket_plan).await?;
    provision::execute_cors_plan(&s3_client, &cors_plan).await?;

    if !global.is_silent() {
        aprintln!("{}", p_g("Infrastructure provisioned successfully."));
    }
    Ok(())
}

async fn item_store(config: &Config) -> ItemStore<DynamoDbTable> {
    let client = create_dynamodb_client(&config.aws).await;
    ItemStore::new(DynamoDbTable::new(client, &config.table_name))
        .with_chunk_size(config.batch_chunk_size)
}

async fn run_count(cmd: CountCommand, config: &Config) -> anyhow::Result<()> {
    let store = item_store(config).await;
    let filter = cmd
        .text
        .and_then(|text| TextFilter::new(text, cmd.item_type.search_fields()));

    let count = store
        .count_by_type(cmd.item_type.type_name(), filter.as_ref())
        .await?;
    aprintln!("{} {}", p_b(&format!("{}:", cmd.item_type.type_name())), count);
    Ok(())
}

async fn run_inspect(cmd: InspectCommand, config: &Config) -> anyhow::Result<()> {
    let store = item_store(config).await;
    let record = store.backend().get_record(&cmd.id).await?;

    match record {
        Some(record) => aprintln!("{}", serde_json::to_string_pretty(&record)?),
        None => aprintln!("{}", p_y(&format!("No item with id '{}'", cmd.id))),
    }
    Ok(())
}

async fn run_presign(cmd: PresignCommand, config: &Config) -> anyhow::Result<()> {
    let client = create_s3_client(&config.aws).await;
    let objects = S3ObjectStore::new(client, &config.bucket_name);

    let request = if cmd.upload {
        PresignRequest::upload(cmd.content_type)
    } else {
        PresignRequest::download()
    };
    let expires_in = cmd
        .expires_in
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.presign_expiry());

    let presigned = objects.presign(&cmd.key, &request, expires_in).await?;

    aprintln!("{} {}", p_b("Method:"), presigned.method);
    aprintln!("{} {}", p_b("Expires:"), presigned.expires_at.to_rfc3339());
    for (name, value) in &presigned.headers {
        aprintln!("{} {}: {}", p_b("Header:"), name, value);
    }
    aprintln!("{}", presigned.url);
    Ok(())
}
