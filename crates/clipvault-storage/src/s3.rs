use crate::traits::{ListPage, ObjectHead, ObjectStore, StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTime as S3DateTime};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use clipvault_core::{SourceObject, StorageSettings};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// S3-compatible object store (AWS S3, Backblaze B2, MinIO, R2, ...)
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore from settings.
    ///
    /// Requires `S3_BUCKET`, `S3_REGION` (or `AWS_REGION`) and the access key pair.
    /// A custom `S3_ENDPOINT` switches to path-style addressing, which
    /// S3-compatible providers expect. Automatic retries are disabled: failures
    /// surface to the caller unchanged.
    pub fn new(settings: &StorageSettings) -> StorageResult<Self> {
        let bucket = settings.bucket()?.to_string();
        let region = settings.region()?.to_string();
        let credentials = Credentials::new(
            settings.access_key_id()?,
            settings.secret_access_key()?,
            None,
            None,
            "clipvault-config",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());

        if let Some(ref endpoint) = settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(S3ObjectStore {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }
}

fn transfer_error<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(String::from);
    let message = err
        .message()
        .map(String::from)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    StorageError::Transfer {
        operation,
        status,
        code,
        message,
    }
}

fn to_chrono(ts: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_page(
        &self,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> StorageResult<ListPage> {
        let start = std::time::Instant::now();

        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(String::from))
            .set_continuation_token(continuation_token.map(String::from))
            .send()
            .await
            .map_err(|e| {
                let err = transfer_error("list", e);
                tracing::error!(
                    error = %err,
                    bucket = %self.bucket,
                    prefix = ?prefix,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 list failed"
                );
                err
            })?;

        let objects: Vec<SourceObject> = output
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| SourceObject {
                    key: key.to_string(),
                    last_modified: object.last_modified().and_then(to_chrono),
                    size: object.size().and_then(|s| u64::try_from(s).ok()),
                })
            })
            .collect();

        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(String::from)
        } else {
            None
        };

        tracing::debug!(
            bucket = %self.bucket,
            prefix = ?prefix,
            count = objects.len(),
            truncated = next_token.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list page"
        );

        Ok(ListPage {
            objects,
            next_token,
        })
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => Ok(ObjectHead {
                size: output.content_length().and_then(|s| u64::try_from(s).ok()),
                last_modified: output.last_modified().and_then(to_chrono),
                content_type: output.content_type().map(String::from),
            }),
            Err(e) => {
                let not_found = matches!(
                    &e,
                    SdkError::ServiceError(service_err)
                        if matches!(service_err.err(), HeadObjectError::NotFound(_))
                );
                if not_found {
                    Err(StorageError::NotFound(key.to_string()))
                } else {
                    Err(transfer_error("head", e))
                }
            }
        }
    }

    async fn download_to_path(&self, key: &str, destination: &Path) -> StorageResult<u64> {
        let start = std::time::Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let not_found = matches!(
                    &e,
                    SdkError::ServiceError(service_err)
                        if matches!(service_err.err(), GetObjectError::NoSuchKey(_))
                );
                if not_found {
                    return StorageError::NotFound(key.to_string());
                }
                let err = transfer_error("download", e);
                tracing::error!(
                    error = %err,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                err
            })?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(destination).await?;
        let mut size = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::transfer("download", e.to_string()))?
        {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(size)
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> StorageResult<()> {
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .set_cache_control(cache_control.map(String::from))
            .send()
            .await
            .map_err(|e| {
                let err = transfer_error("put", e);
                tracing::error!(
                    error = %err,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                err
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let presigned_request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning_config)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(&e).to_string()))?;

        Ok(presigned_request.uri().to_string())
    }

    async fn probe(&self) -> StorageResult<()> {
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| transfer_error("probe", e))?;
        Ok(())
    }
}
