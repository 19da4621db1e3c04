//! Bucket and CORS provisioning (Imperative Shell).
//!
//! CORS is a separate step from bucket creation. It is evaluated on every
//! run, so rules edited by hand or left over from an older release are put
//! back in line even when the bucket already exists.

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CorsConfiguration, CorsRule as S3CorsRule, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use robostore_core::admin::{
    calculate_bucket_plan, calculate_cors_plan, BucketConfig, BucketPlan, CorsPlan, CorsRule,
};

use super::error::{ProvisionError, Result};

/// Region where S3 rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Returns true if the bucket exists and is reachable with our credentials.
pub async fn bucket_exists(client: &Client, bucket_name: &str) -> Result<bool> {
    match client.head_bucket().bucket(bucket_name).send().await {
        Ok(_) => Ok(true),
        Err(err) if matches!(err.as_service_error(), Some(HeadBucketError::NotFound(_))) => {
            Ok(false)
        }
        Err(err) => Err(ProvisionError::AwsSdk(err.to_string())),
    }
}

/// Fetches the live CORS rules, `None` when the bucket has none.
pub async fn get_bucket_cors(client: &Client, bucket_name: &str) -> Result<Option<Vec<CorsRule>>> {
    match client.get_bucket_cors().bucket(bucket_name).send().await {
        Ok(output) => Ok(Some(output.cors_rules().iter().map(from_s3_rule).collect())),
        Err(err) if err.code() == Some("NoSuchCORSConfiguration") => Ok(None),
        Err(err) => Err(ProvisionError::AwsSdk(err.to_string())),
    }
}

pub async fn plan_bucket(client: &Client, config: &BucketConfig) -> Result<BucketPlan> {
    let exists = bucket_exists(client, &config.bucket_name).await?;
    Ok(calculate_bucket_plan(exists, config))
}

/// Plans the CORS step. A bucket that does not exist yet has no rules.
pub async fn plan_bucket_cors(client: &Client, config: &BucketConfig) -> Result<CorsPlan> {
    let current = if bucket_exists(client, &config.bucket_name).await? {
        get_bucket_cors(client, &config.bucket_name).await?
    } else {
        None
    };
    Ok(calculate_cors_plan(current.as_deref(), config))
}

/// Creates the bucket unless it already exists.
pub async fn ensure_bucket(client: &Client, config: &BucketConfig) -> Result<BucketPlan> {
    let plan = plan_bucket(client, config).await?;
    execute_bucket_plan(client, &plan).await?;
    Ok(plan)
}

/// Applies the desired CORS rules when the live ones are missing or differ.
pub async fn ensure_bucket_cors(client: &Client, config: &BucketConfig) -> Result<CorsPlan> {
    let plan = plan_bucket_cors(client, config).await?;
    execute_cors_plan(client, &plan).await?;
    Ok(plan)
}

pub async fn execute_bucket_plan(client: &Client, plan: &BucketPlan) -> Result<()> {
    match plan {
        BucketPlan::CreateBucket {
            bucket_name,
            region,
        } => create_bucket(client, bucket_name, region).await,
        BucketPlan::NoChanges { .. } => Ok(()),
    }
}

pub async fn execute_cors_plan(client: &Client, plan: &CorsPlan) -> Result<()> {
    match plan {
        CorsPlan::Apply { bucket_name, rules } => put_bucket_cors(client, bucket_name, rules).await,
        CorsPlan::NoChanges { .. } => Ok(()),
    }
}

async fn create_bucket(client: &Client, bucket_name: &str, region: &str) -> Result<()> {
    debug!(bucket = bucket_name, region, "CreateBucket");
    let result = client
        .create_bucket()
        .bucket(bucket_name)
        .set_create_bucket_configuration(bucket_configuration(region))
        .send()
        .await;

    match result {
        Ok(_) => {
            info!(bucket = bucket_name, region, "bucket created");
            Ok(())
        }
        Err(err) => match err.as_service_error() {
            Some(CreateBucketError::BucketAlreadyOwnedByYou(_)) => {
                info!(bucket = bucket_name, "bucket already owned by this account");
                Ok(())
            }
            Some(CreateBucketError::BucketAlreadyExists(_)) => {
                Err(ProvisionError::BucketOwnedElsewhere {
                    bucket_name: bucket_name.to_string(),
                })
            }
            _ => Err(ProvisionError::AwsSdk(err.to_string())),
        },
    }
}

async fn put_bucket_cors(client: &Client, bucket_name: &str, rules: &[CorsRule]) -> Result<()> {
    let rules = rules.iter().map(to_s3_rule).collect::<Result<Vec<_>>>()?;
    let configuration = CorsConfiguration::builder()
        .set_cors_rules(Some(rules))
        .build()
        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))?;

    client
        .put_bucket_cors()
        .bucket(bucket_name)
        .cors_configuration(configuration)
        .send()
        .await
        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))?;

    info!(bucket = bucket_name, "CORS rules applied");
    Ok(())
}

fn bucket_configuration(region: &str) -> Option<CreateBucketConfiguration> {
    (region != DEFAULT_REGION).then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    })
}

fn to_s3_rule(rule: &CorsRule) -> Result<S3CorsRule> {
    S3CorsRule::builder()
        .set_allowed_origins(Some(rule.allowed_origins.clone()))
        .set_allowed_methods(Some(rule.allowed_methods.clone()))
        .set_allowed_headers(Some(rule.allowed_headers.clone()))
        .set_expose_headers(Some(rule.expose_headers.clone()))
        .set_max_age_seconds(rule.max_age_seconds)
        .build()
        .map_err(|e| ProvisionError::AwsSdk(e.to_string()))
}

fn from_s3_rule(rule: &S3CorsRule) -> CorsRule {
    CorsRule {
        allowed_origins: rule.allowed_origins().to_vec(),
        allowed_methods: rule.allowed_methods().to_vec(),
        allowed_headers: rule.allowed_headers().to_vec(),
        expose_headers: rule.expose_headers().to_vec(),
        max_age_seconds: rule.max_age_seconds(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robostore_core::admin::robostore_bucket_config;

    #[test]
    fn test_us_east_1_has_no_location_constraint() {
        assert!(bucket_configuration("us-east-1").is_none());

        let configuration = bucket_configuration("eu-west-1").unwrap();
        assert_eq!(
            configuration.location_constraint(),
            Some(&BucketLocationConstraint::EuWest1)
        );
    }

    #[test]
    fn test_live_rules_compare_equal_to_desired() {
        let config = robostore_bucket_config("artifacts", "us-east-1", &["*".to_string()]);
        let live: Vec<CorsRule> = config
            .cors_rules
            .iter()
            .map(|rule| from_s3_rule(&to_s3_rule(rule).unwrap()))
            .collect();

        assert_eq!(
            calculate_cors_plan(Some(live.as_slice()), &config),
            CorsPlan::NoChanges {
                bucket_name: "artifacts".to_string()
            }
        );
    }
}
