//! S3-compatible [`ObjectStore`] backed by `aws-sdk-s3`.
//!
//! Works against AWS S3 and against S3-compatible services such as Tencent
//! COS by pointing `endpoint` at the provider.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tokio::io::AsyncReadExt;

use crate::error::{io_err, transport_err, StoreError};
use crate::store::ObjectStore;

// Unreserved characters plus `/`; everything else in a copy-source key is escaped.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Bucket name; for COS this includes the `-appid` suffix.
    pub bucket: String,
    /// Provider region, e.g. `ap-guangzhou`.
    pub region: String,
    /// Custom endpoint; `None` uses the SDK default for `region`.
    pub endpoint: Option<String>,
    /// Access key id / secret pair; `None` falls back to the default provider chain.
    pub credentials: Option<(String, String)>,
    /// Address the bucket in the path instead of the host name.
    pub force_path_style: bool,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl StoreSettings {
    /// Settings with no endpoint or credentials override.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            credentials: None,
            force_path_style: false,
        }
    }

    /// Tencent COS endpoint for `region`.
    pub fn cos_endpoint(region: &str) -> String {
        format!("https://cos.{region}.myqcloud.com")
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.bucket.is_empty() {
            return Err(StoreError::InvalidInput("bucket must not be empty".into()));
        }
        if self.region.is_empty() {
            return Err(StoreError::InvalidInput("region must not be empty".into()));
        }
        Ok(())
    }
}

/// [`ObjectStore`] over one S3-compatible bucket.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from `settings`, loading anything not given explicitly
    /// from the environment.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        settings.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some((id, secret)) = &settings.credentials {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "cosync",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::debug!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = ?settings.endpoint,
            "object store client ready",
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    async fn put_single(&self, key: &str, local_path: &Path) -> Result<(), StoreError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| transport_err("put", key, e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_err("put", key, e))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        local_path: &Path,
        part_size: u64,
    ) -> Result<(), StoreError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_err("create_multipart_upload", key, e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| transport_err("create_multipart_upload", key, "no upload id returned"))?
            .to_owned();

        let result = self
            .upload_parts(key, &upload_id, local_path, part_size)
            .await;
        let parts = match result {
            Ok(parts) => parts,
            Err(err) => {
                self.abort_multipart(key, &upload_id).await;
                return Err(err);
            }
        };

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;
        if let Err(e) = completed {
            self.abort_multipart(key, &upload_id).await;
            return Err(sdk_err("complete_multipart_upload", key, e));
        }
        Ok(())
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        local_path: &Path,
        part_size: u64,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let mut file = tokio::fs::File::open(local_path)
            .await
            .map_err(|e| io_err(local_path, e))?;
        let mut parts = Vec::new();
        let mut part_number: i32 = 1;

        loop {
            let mut chunk = Vec::with_capacity(part_size as usize);
            (&mut file)
                .take(part_size)
                .read_to_end(&mut chunk)
                .await
                .map_err(|e| io_err(local_path, e))?;
            if chunk.is_empty() {
                break;
            }

            let uploaded = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| sdk_err("upload_part", key, e))?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_owned))
                    .part_number(part_number)
                    .build(),
            );
            tracing::debug!(key = %key, part = part_number, "uploaded part");
            part_number += 1;
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        let aborted = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = aborted {
            tracing::warn!(
                key = %key,
                error = %DisplayErrorContext(&e),
                "abort multipart upload failed"
            );
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_file(
        &self,
        key: &str,
        local_path: &Path,
        part_size: u64,
    ) -> Result<(), StoreError> {
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| io_err(local_path, e))?
            .len();
        if size > part_size {
            self.put_multipart(key, local_path, part_size).await
        } else {
            self.put_single(key, local_path).await
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_err("delete", key, e))?;
        Ok(())
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> Result<(), StoreError> {
        let source = copy_source(&self.bucket, from_key);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(source)
            .key(to_key)
            .send()
            .await
            .map_err(|e| sdk_err("copy", from_key, e))?;
        Ok(())
    }
}

/// `bucket/key` with the key percent-encoded, as the copy-source header
/// requires. The key is taken literally: `.` segments are kept.
pub(crate) fn copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE))
}

fn sdk_err<E>(op: &'static str, key: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let not_found = err
        .raw_response()
        .is_some_and(|r| r.status().as_u16() == 404);
    if not_found {
        return StoreError::NotFound {
            key: key.to_owned(),
        };
    }
    tracing::warn!(
        op,
        key = %key,
        error = %DisplayErrorContext(&err),
        "object store request failed"
    );
    transport_err(op, key, error_summary(&err))
}

/// One-line description of `err` for reports: the service's code and message
/// when it answered, otherwise the error and its immediate cause.
fn error_summary<E>(err: &SdkError<E, HttpResponse>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_owned(),
        (None, Some(message)) => message.to_owned(),
        (None, None) => match std::error::Error::source(err) {
            Some(cause) => format!("{err}: {cause}"),
            None => err.to_string(),
        },
    }
}
