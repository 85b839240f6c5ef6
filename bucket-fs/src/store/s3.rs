/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Amazon S3 implementation of the store seams.
//!
//! S3 has no separate metadata version, so both [`Generation`] and [`Metageneration`] map
//! onto the object's ETag:
//!
//! * generation guards are sent as `If-Match` on `PutObject` and `DeleteObject`
//! * does-not-exist guards are sent as `If-None-Match: *` on `PutObject`
//! * metadata updates are an in-place `CopyObject` guarded by `x-amz-copy-source-if-match`
//!
//! A conditional copy cannot be expressed with `CopyObject`, so it is carried out as a
//! `GetObject` followed by a conditional `PutObject` of the same body and metadata.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region, SharedCredentialsProvider};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::{HeadObjectError, HeadObjectOutput};
use aws_sdk_s3::operation::list_objects_v2::{ListObjectsV2Error, ListObjectsV2Output};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::MetadataDirective;
use aws_smithy_async::future::pagination_stream::PaginationStream;
use aws_smithy_runtime_api::http::Response;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::Instrument;

use crate::store::{ByteChunks, Connector, ObjectAttrsStream, ObjectClient, StoreError};
use crate::types::{AttrsUpdate, Conditions, Generation, Metageneration, ObjectAttrs};
use crate::Config;

type ListPages = PaginationStream<Result<ListObjectsV2Output, SdkError<ListObjectsV2Error, Response>>>;

/// Opens [`S3Client`] sessions.
///
/// Credentials are never looked up implicitly: either inject a provider through
/// [`S3Connector::builder`], or have the owner opt into environment discovery with
/// [`S3Connector::from_env`].
#[derive(Debug, Clone)]
pub struct S3Connector {
    config: aws_sdk_s3::Config,
}

impl S3Connector {
    /// Create a new `S3Connector` builder
    pub fn builder() -> S3ConnectorBuilder {
        S3ConnectorBuilder::default()
    }

    /// Build a connector from credentials, region and endpoint discovered from the environment.
    pub async fn from_env() -> Self {
        let shared_config = aws_config::from_env().load().await;
        Self::from_sdk_config(&shared_config)
    }

    /// Build a connector from an already loaded shared SDK configuration.
    pub fn from_sdk_config(sdk_config: &aws_types::SdkConfig) -> Self {
        Self {
            config: aws_sdk_s3::Config::from(sdk_config),
        }
    }

    /// Build a connector from an explicit S3 client configuration.
    pub fn from_conf(config: aws_sdk_s3::Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for S3Connector {
    async fn connect(&self, config: &Config) -> Result<Arc<dyn ObjectClient>, StoreError> {
        let client = aws_sdk_s3::Client::from_conf(self.config.clone());
        client
            .head_bucket()
            .bucket(config.bucket_name())
            .send()
            .instrument(tracing::debug_span!("send-head-bucket"))
            .await
            .map_err(StoreError::connect)?;
        Ok(Arc::new(S3Client::new(client)))
    }
}

/// Fluent style builder for [S3Connector]
#[derive(Debug, Clone, Default)]
pub struct S3ConnectorBuilder {
    region: Option<Region>,
    credentials_provider: Option<SharedCredentialsProvider>,
    endpoint_url: Option<String>,
    force_path_style: bool,
}

impl S3ConnectorBuilder {
    /// The region requests are signed for.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(Region::new(region.into()));
        self
    }

    /// The credentials used to sign requests.
    pub fn credentials_provider(mut self, provider: SharedCredentialsProvider) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// Send requests to a custom endpoint, e.g. an S3 compatible store.
    pub fn endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Address buckets as part of the path rather than the host name.
    pub fn force_path_style(mut self, force_path_style: bool) -> Self {
        self.force_path_style = force_path_style;
        self
    }

    /// Consumes the builder and constructs an [`S3Connector`]
    pub fn build(self) -> S3Connector {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .force_path_style(self.force_path_style);
        builder
            .set_region(self.region)
            .set_credentials_provider(self.credentials_provider)
            .set_endpoint_url(self.endpoint_url);
        S3Connector {
            config: builder.build(),
        }
    }
}

/// A session against Amazon S3.
#[derive(Debug)]
pub struct S3Client {
    client: aws_sdk_s3::Client,
    closed: AtomicBool,
}

impl S3Client {
    /// Wrap an S3 client.
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        metadata: Option<HashMap<String, String>>,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        let content_length = i64::try_from(body.len()).map_err(StoreError::request)?;
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .set_metadata(metadata);
        if conditions.if_does_not_exist() {
            request = request.if_none_match("*");
        }
        if let Some(generation) = conditions.if_generation_match() {
            request = request.if_match(generation.as_str());
        }
        request
            .send()
            .instrument(tracing::debug_span!("send-put-object", key))
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl ObjectClient for S3Client {
    async fn attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs, StoreError> {
        self.ensure_open()?;
        head(&self.client, bucket, key).await
    }

    async fn new_reader(&self, bucket: &str, key: &str) -> Result<ByteChunks, StoreError> {
        self.ensure_open()?;
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .instrument(tracing::debug_span!("send-get-object", key))
            .await
            .map_err(classify_get)?;

        let chunks = stream::unfold(output.body, |mut body| async move {
            body.next()
                .await
                .map(|chunk| (chunk.map_err(StoreError::request), body))
        });
        Ok(chunks.boxed())
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.put(bucket, key, body, None, conditions).await
    }

    async fn copy(
        &self,
        bucket: &str,
        src: &str,
        dst: &str,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        if conditions.is_empty() {
            self.client
                .copy_object()
                .bucket(bucket)
                .key(dst)
                .copy_source(copy_source(bucket, src))
                .send()
                .instrument(tracing::debug_span!("send-copy-object", dst))
                .await
                .map_err(classify)?;
            return Ok(());
        }

        let source = self
            .client
            .get_object()
            .bucket(bucket)
            .key(src)
            .send()
            .instrument(tracing::debug_span!("send-get-object", key = src))
            .await
            .map_err(classify_get)?;
        let metadata = source.metadata().cloned();
        let body = source
            .body
            .collect()
            .await
            .map_err(StoreError::request)?
            .into_bytes();
        self.put(bucket, dst, body, metadata, conditions).await
    }

    async fn update(
        &self,
        bucket: &str,
        key: &str,
        update: AttrsUpdate,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut request = self
            .client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(copy_source(bucket, key))
            .metadata_directive(MetadataDirective::Replace)
            .set_metadata(Some(update.metadata));
        if let Some(metageneration) = conditions.if_metageneration_match() {
            request = request.copy_source_if_match(metageneration.as_str());
        }
        request
            .send()
            .instrument(tracing::debug_span!("send-copy-object-metadata", key))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete(
        &self,
        bucket: &str,
        key: &str,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut request = self.client.delete_object().bucket(bucket).key(key);
        if let Some(generation) = conditions.if_generation_match() {
            request = request.if_match(generation.as_str());
        }
        request
            .send()
            .instrument(tracing::debug_span!("send-delete-object", key))
            .await
            .map_err(classify)?;
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> ObjectAttrsStream {
        if let Err(err) = self.ensure_open() {
            return stream::once(async move { Err(err) }).boxed();
        }

        let pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();
        let listing = Listing {
            client: self.client.clone(),
            bucket: bucket.to_owned(),
            pages,
            pending: VecDeque::new(),
        };
        stream::unfold(Some(listing), |listing| async move {
            let mut listing = listing?;
            match listing.next().await {
                Some(Ok(attrs)) => Some((Ok(attrs), Some(listing))),
                // end the listing after the first failure
                Some(Err(err)) => Some((Err(err), None)),
                None => None,
            }
        })
        .boxed()
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

/// Pages through `ListObjectsV2`, fetching the full attributes of every listed key.
struct Listing {
    client: aws_sdk_s3::Client,
    bucket: String,
    pages: ListPages,
    pending: VecDeque<String>,
}

impl fmt::Debug for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listing")
            .field("bucket", &self.bucket)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Listing {
    async fn next(&mut self) -> Option<Result<ObjectAttrs, StoreError>> {
        loop {
            if let Some(key) = self.pending.pop_front() {
                return Some(head(&self.client, &self.bucket, &key).await);
            }

            let page = match self.pages.next().await? {
                Ok(page) => page,
                Err(err) => return Some(Err(classify(err))),
            };
            tracing::trace!("listed {} keys", page.contents().len());
            self.pending
                .extend(page.contents().iter().filter_map(|object| object.key().map(str::to_owned)));
        }
    }
}

async fn head(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
) -> Result<ObjectAttrs, StoreError> {
    let output = client
        .head_object()
        .bucket(bucket)
        .key(key)
        .send()
        .instrument(tracing::debug_span!("send-head-object", key))
        .await
        .map_err(|err| match err.as_service_error() {
            Some(HeadObjectError::NotFound(_)) => StoreError::NotFound,
            _ => classify(err),
        })?;
    Ok(attrs_from_head(bucket, key, &output))
}

fn attrs_from_head(bucket: &str, key: &str, output: &HeadObjectOutput) -> ObjectAttrs {
    let e_tag = output.e_tag().unwrap_or_default();
    let updated = output
        .last_modified()
        .and_then(|last_modified| SystemTime::try_from(*last_modified).ok())
        .unwrap_or(SystemTime::UNIX_EPOCH);

    ObjectAttrs {
        bucket: bucket.to_owned(),
        name: key.to_owned(),
        size: output
            .content_length()
            .and_then(|length| u64::try_from(length).ok())
            .unwrap_or_default(),
        md5: md5_from_e_tag(e_tag),
        generation: Generation::new(e_tag),
        metageneration: Metageneration::new(e_tag),
        // S3 does not track creation separately from the last write
        created: updated,
        updated,
        metadata: output.metadata().cloned().unwrap_or_default(),
    }
}

/// The ETag of an object uploaded in a single part is the hex MD5 of its content.
fn md5_from_e_tag(e_tag: &str) -> Option<[u8; 16]> {
    let digest = e_tag.trim_matches('"');
    if digest.len() != 32 {
        return None;
    }
    hex::decode(digest).ok()?.try_into().ok()
}

/// Characters left as-is in a copy source, besides ASCII alphanumerics.
const COPY_SOURCE_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Value of `x-amz-copy-source`: the bucket and the URL-encoded key, `/` kept as separator.
fn copy_source(bucket: &str, key: &str) -> String {
    let key = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, COPY_SOURCE_UNRESERVED).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{key}")
}

fn classify_get(err: SdkError<GetObjectError, Response>) -> StoreError {
    match err.as_service_error() {
        Some(GetObjectError::NoSuchKey(_)) => StoreError::NotFound,
        _ => classify(err),
    }
}

fn classify<E>(err: SdkError<E, Response>) -> StoreError
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
{
    match err.code() {
        Some("NotFound" | "NoSuchKey") => return StoreError::NotFound,
        Some("PreconditionFailed" | "ConditionalRequestConflict") => {
            return StoreError::PreconditionFailed
        }
        _ => {}
    }
    match err.raw_response().map(|response| response.status().as_u16()) {
        Some(404) => StoreError::NotFound,
        Some(412) => StoreError::PreconditionFailed,
        _ => StoreError::request(err),
    }
}
