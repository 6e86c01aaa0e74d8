//! AWS S3 backend. Transfer threads are plain OS threads; each call drives the async SDK on a
//! shared tokio runtime with `block_on`.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use log::{debug, warn};
use std::fs::File;
use std::io::{self, Read};
use tokio::runtime::Runtime;

use super::{SseCustomerKey, UploadError, UploadRequest, Uploader};
use crate::utils::config::S3Consts;

pub struct S3Uploader {
    runtime: Runtime,
    client: Client,
    bucket: String,
}

impl S3Uploader {
    /// Build the runtime and client for `bucket` in `region`. Errors here abort the run.
    pub fn connect(bucket: &str, region: &str) -> Result<Self, UploadError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name(format!("{}-io", env!("CARGO_PKG_NAME")))
            .build()
            .map_err(|e| UploadError::Misconfigured(format!("start I/O runtime: {e}")))?;
        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .load(),
        );
        debug!("S3 client ready for bucket {} in {}", bucket, region);
        Ok(Self {
            runtime,
            client: Client::new(&config),
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_single(
        &self,
        key: &str,
        body: File,
        sse: Option<&SseCustomerKey>,
    ) -> Result<(), UploadError> {
        let body = ByteStream::read_from()
            .file(tokio::fs::File::from_std(body))
            .build()
            .await
            .map_err(|e| UploadError::Io(io::Error::other(e)))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .set_sse_customer_algorithm(sse.map(|k| k.algorithm().to_string()))
            .set_sse_customer_key(sse.map(SseCustomerKey::key_base64))
            .set_sse_customer_key_md5(sse.map(SseCustomerKey::key_md5_base64))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        key: &str,
        mut body: File,
        sse: Option<&SseCustomerKey>,
    ) -> Result<(), UploadError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_sse_customer_algorithm(sse.map(|k| k.algorithm().to_string()))
            .set_sse_customer_key(sse.map(SseCustomerKey::key_base64))
            .set_sse_customer_key_md5(sse.map(SseCustomerKey::key_md5_base64))
            .send()
            .await
            .map_err(classify)?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| UploadError::Rejected("no upload id returned".to_string()))?
            .to_string();

        let parts = match self.put_parts(key, &upload_id, &mut body, sse).await {
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
            .await
            .map_err(classify);
        if let Err(err) = completed {
            self.abort_multipart(key, &upload_id).await;
            return Err(err);
        }
        Ok(())
    }

    async fn put_parts(
        &self,
        key: &str,
        upload_id: &str,
        body: &mut File,
        sse: Option<&SseCustomerKey>,
    ) -> Result<Vec<CompletedPart>, UploadError> {
        let mut parts = Vec::new();
        let mut buf = vec![0u8; S3Consts::PART_SIZE];
        let mut part_number: i32 = 1;
        loop {
            let n = read_part(body, &mut buf)?;
            if n == 0 {
                break;
            }
            let out = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(buf[..n].to_vec()))
                .set_sse_customer_algorithm(sse.map(|k| k.algorithm().to_string()))
                .set_sse_customer_key(sse.map(SseCustomerKey::key_base64))
                .set_sse_customer_key_md5(sse.map(SseCustomerKey::key_md5_base64))
                .send()
                .await
                .map_err(classify)?;
            parts.push(
                CompletedPart::builder()
                    .set_e_tag(out.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
        }
        if parts.is_empty() {
            return Err(UploadError::Rejected(format!(
                "{key}: source was empty when read for multipart upload"
            )));
        }
        Ok(parts)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(err) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(
                "could not abort multipart upload {} for {}: {}",
                upload_id,
                key,
                DisplayErrorContext(&err)
            );
        }
    }
}

impl Uploader for S3Uploader {
    fn upload(&self, request: UploadRequest<'_>) -> Result<String, UploadError> {
        let UploadRequest {
            body,
            key,
            size_hint,
            encryption,
        } = request;
        let key = key.replace('\\', "/");
        self.runtime.block_on(async {
            if size_hint > S3Consts::MULTIPART_THRESHOLD {
                self.put_multipart(&key, body, encryption).await
            } else {
                self.put_single(&key, body, encryption).await
            }
        })?;
        Ok(format!("s3://{}/{}", self.bucket, key))
    }
}

/// Request construction failures (no credentials, bad endpoint) affect every item alike.
fn classify<E, R>(err: SdkError<E, R>) -> UploadError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let msg = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::ConstructionFailure(_) => UploadError::Misconfigured(msg),
        _ => UploadError::Rejected(msg),
    }
}

/// Fill `buf` from `body`; short only at end of file.
fn read_part(body: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match body.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
