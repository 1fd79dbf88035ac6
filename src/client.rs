//! Builds the storage service clients and wraps the object calls.

use anyhow::{Context, Result};
use aws_config::{from_env, SdkConfig};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::Client;
use tracing::instrument;

/// Name reported for credentials taken from the settings.
const CREDENTIALS_PROVIDER: &str = "StorageAccount";

/// Loads the shared SDK configuration. `connection` overrides the
/// service endpoint, and `account` replaces the default credentials
/// chain with a static key pair.
pub async fn sdk_config(connection: Option<&str>, account: Option<(&str, &str)>) -> SdkConfig {
    let mut loader = from_env();
    if let Some(endpoint_url) = connection {
        loader = loader
            .endpoint_url(
                if endpoint_url.starts_with("http://") || endpoint_url.starts_with("https://") {
                    String::from(endpoint_url)
                } else {
                    format!("https://{}", endpoint_url)
                },
            )
            .region("us-east-1"); // should be OK since the endpoint was overridden
    }
    if let Some((name, key)) = account {
        loader = loader.credentials_provider(Credentials::new(
            name,
            key,
            None,
            None,
            CREDENTIALS_PROVIDER,
        ));
    }
    loader.load().await
}

/// Reads a whole object from storage into memory.
#[instrument(skip(client))]
pub async fn fetch_object(client: &Client, bucket: &str, key: &str) -> Result<Vec<u8>> {
    let response = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .with_context(|| {
            format!(
                "Failed to download object {:?} from bucket {:?}",
                key, bucket
            )
        })?;
    let contents = response.body.collect().await.with_context(|| {
        format!(
            "Failed to read the contents of object {:?} from bucket {:?}",
            key, bucket
        )
    })?;
    Ok(contents.into_bytes().to_vec())
}
