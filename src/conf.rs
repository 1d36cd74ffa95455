//! Defines configuration as read from the environment.

use anyhow::{anyhow, Context, Result};
use aws_config::{from_env, SdkConfig};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer};
use std::env;

/// The exporter runs fixed reports against a warehouse table and
/// pushes the resulting CSV files to a bucket. The configuration must
/// be given as environment variables.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// The project (data catalog) that qualifies the reports' table
    /// reference.
    pub project: String,

    /// The bucket that receives the report files.
    #[serde(alias = "bucketname")]
    pub bucket_name: String,

    /// The Athena workgroup the queries run under. Omitting this
    /// uses the account's primary workgroup.
    #[serde(default, deserialize_with = "non_empty")]
    pub athena_workgroup: Option<String>,

    /// An `s3://` location where Athena keeps its own copy of query
    /// results. Required by Athena unless the workgroup defines one.
    #[serde(default, deserialize_with = "non_empty")]
    pub athena_output_location: Option<String>,
}

/// Treat an empty variable as an absent one.
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|value| !value.is_empty()))
}

impl Settings {
    /// Read the settings from the process environment.
    pub fn from_env() -> Result<Self> {
        envy::from_env().context("Failed to read settings from the environment")
    }
}

/// Process-wide AWS configuration, shared by the clients built on
/// each invocation.
static AWS_CONFIG: OnceCell<SdkConfig> = OnceCell::new();

/// Load the AWS configuration from the environment. An
/// `AWS_ENDPOINT_URL` variable overrides the endpoint of every
/// service, to allow running against local stacks.
pub async fn init() -> Result<()> {
    let sdk_config = if let Ok(endpoint_url) = env::var("AWS_ENDPOINT_URL") {
        from_env()
            .endpoint_url(
                if endpoint_url.starts_with("http://") || endpoint_url.starts_with("https://") {
                    endpoint_url
                } else {
                    format!("https://{}", endpoint_url)
                },
            )
            .region("us-east-1") // should be OK since the endpoint was overridden
            .load()
    } else {
        from_env().load()
    }
    .await;
    AWS_CONFIG
        .set(sdk_config)
        .map_err(|_| anyhow!("conf::AWS_CONFIG was already initialized"))
}

/// Get the AWS configuration, or fail if it hasn't been loaded.
pub fn aws_service_config() -> Result<&'static SdkConfig> {
    AWS_CONFIG
        .get()
        .ok_or_else(|| anyhow!("AWS configuration is not initialized"))
}
