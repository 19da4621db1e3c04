use std::{env, time::Duration};

use robostore_core::storage::MAX_BATCH_SIZE;

/// Connection settings shared by the DynamoDB and S3 clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    /// Custom endpoint URL (for local DynamoDB or an S3-compatible store).
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
}

impl AwsConfig {
    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local endpoint ({})", url),
            None => format!("AWS (region: {})", self.region),
        }
    }
}

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the shared table (default: "robostore")
    pub table_name: String,
    /// Name of the artifact bucket (default: "robostore-artifacts")
    pub bucket_name: String,
    pub aws: AwsConfig,
    /// Keys per multi-get request (default: 100, clamped to 1..=100)
    pub batch_chunk_size: usize,
    /// Lifetime of presigned URLs in seconds (default: 3600)
    pub presign_expiry_seconds: u64,
    /// Origins allowed to use presigned URLs from a browser (default: "*")
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ROBOSTORE_TABLE_NAME` - Table name (default: "robostore")
    /// - `ROBOSTORE_BUCKET_NAME` - Bucket name (default: "robostore-artifacts")
    /// - `AWS_ENDPOINT_URL` - Custom endpoint (default: none)
    /// - `AWS_REGION` - Region (default: "us-east-1")
    /// - `ROBOSTORE_BATCH_CHUNK_SIZE` - Multi-get chunk size (default: 100)
    /// - `ROBOSTORE_PRESIGN_EXPIRY_SECONDS` - Presigned URL lifetime (default: 3600)
    /// - `ROBOSTORE_CORS_ORIGINS` - Comma-separated origins (default: "*")
    pub fn from_env() -> Self {
        Self {
            table_name: env::var("ROBOSTORE_TABLE_NAME").unwrap_or_else(|_| "robostore".to_string()),
            bucket_name: env::var("ROBOSTORE_BUCKET_NAME")
                .unwrap_or_else(|_| "robostore-artifacts".to_string()),
            aws: AwsConfig {
                endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
                region: env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            },
            batch_chunk_size: env::var("ROBOSTORE_BATCH_CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_BATCH_SIZE),
            presign_expiry_seconds: env::var("ROBOSTORE_PRESIGN_EXPIRY_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            cors_origins: parse_origins(
                &env::var("ROBOSTORE_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()),
            ),
        }
    }

    /// Get presigned URL lifetime as a Duration.
    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presign_expiry_conversion() {
        let config = Config {
            table_name: "robostore".to_string(),
            bucket_name: "robostore-artifacts".to_string(),
            aws: AwsConfig {
                endpoint_url: None,
                region: "us-east-1".to_string(),
            },
            batch_chunk_size: 100,
            presign_expiry_seconds: 600,
            cors_origins: vec!["*".to_string()],
        };

        assert_eq!(config.presign_expiry(), Duration::from_secs(600));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(parse_origins(" , "), vec!["*".to_string()]);
    }

    #[test]
    fn test_target_display() {
        let local = AwsConfig {
            endpoint_url: Some("http://localhost:8000".to_string()),
            region: "us-east-1".to_string(),
        };
        assert_eq!(local.target_display(), "Local endpoint (http://localhost:8000)");

        let remote = AwsConfig {
            endpoint_url: None,
            region: "eu-west-1".to_string(),
        };
        assert_eq!(remote.target_display(), "AWS (region: eu-west-1)");
    }
}
