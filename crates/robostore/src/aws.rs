//! AWS SDK client setup.

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::config::AwsConfig;

async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let mut sdk_config_loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        sdk_config_loader = sdk_config_loader.endpoint_url(endpoint);
    }

    sdk_config_loader.load().await
}

/// Creates a DynamoDB client with the given configuration.
pub async fn create_dynamodb_client(config: &AwsConfig) -> aws_sdk_dynamodb::Client {
    aws_sdk_dynamodb::Client::new(&load_sdk_config(config).await)
}

/// Creates an S3 client with the given configuration.
///
/// Custom endpoints (MinIO, LocalStack) get path-style addressing since
/// they rarely resolve bucket subdomains.
pub async fn create_s3_client(config: &AwsConfig) -> aws_sdk_s3::Client {
    let sdk_config = load_sdk_config(config).await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
