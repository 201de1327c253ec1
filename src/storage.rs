use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;

use crate::config::AppConfig;

const MAX_DELETE_BATCH: usize = 1000;

/// A single bucket. Keys are bucket-relative.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: Option<String>)
        -> Result<()>;

    /// Presigned GET. `content_disposition` overrides the response header so
    /// download grants save to disk while view grants render inline.
    async fn presign_get_object(
        &self,
        key: &str,
        expires_in: Duration,
        content_disposition: Option<String>,
    ) -> Result<String>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.delete_object(key).await?;
        }
        Ok(())
    }
}

pub async fn build_s3_client(config: &AppConfig) -> Result<S3Client> {
    let region = Region::new(config.aws_region.clone());
    let region_provider = RegionProviderChain::first_try(Some(region))
        .or_default_provider()
        .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);

    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");
        loader = loader.credentials_provider(credentials);
    }

    let base_config = loader.load().await;
    let s3_config = S3ConfigBuilder::from(&base_config)
        .force_path_style(true)
        .build();

    Ok(S3Client::from_conf(s3_config))
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .with_context(|| format!("failed to upload object to bucket {}", self.bucket))?;

        Ok(())
    }

    async fn presign_get_object(
        &self,
        key: &str,
        expires_in: Duration,
        content_disposition: Option<String>,
    ) -> Result<String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .context("failed to build S3 presigning config")?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(disposition) = content_disposition {
            request = request.response_content_disposition(disposition);
        }

        let presigned = request
            .presigned(presign_config)
            .await
            .context("failed to generate presigned URL")?;

        Ok(presigned.uri().to_string())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to delete object from bucket {}", self.bucket))?;
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        let mut failed = Vec::new();

        for batch in delete_batches(keys) {
            let objects = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .context("failed to build object identifiers")?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .context("failed to build delete request")?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .with_context(|| format!("failed to delete objects from bucket {}", self.bucket))?;

            failed.extend(output.errors().iter().map(|err| {
                format!(
                    "{} ({})",
                    err.key().unwrap_or("<unknown key>"),
                    err.message().or(err.code()).unwrap_or("unknown error")
                )
            }));
        }

        if !failed.is_empty() {
            bail!(
                "bucket {} kept {} object(s): {}",
                self.bucket,
                failed.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }
}

/// Splits keys into request-sized groups; `DeleteObjects` takes at most
/// [`MAX_DELETE_BATCH`] keys per call.
fn delete_batches(keys: &[String]) -> std::slice::Chunks<'_, String> {
    keys.chunks(MAX_DELETE_BATCH)
}

/// `Content-Disposition` value with an RFC 5987 encoded fallback.
pub fn content_disposition(kind: &str, filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "{kind}; filename=\"{sanitized}\"; filename*=UTF-8''{encoded}"
    ))
}
