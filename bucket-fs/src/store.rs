/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */
//! Object store seams.
//!
//! The file system never talks to a store SDK directly. It consumes the [`ObjectClient`]
//! trait, which exposes the primitives every supported store offers: attribute lookup,
//! whole-object reads and writes, server-side copy, metadata update, delete and prefix
//! listing, each optionally guarded by [`Conditions`]. Sessions are opened by a
//! [`Connector`], which carries whatever credentials the owner injected into it.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::error::BoxError;
use crate::types::{AttrsUpdate, Conditions, ObjectAttrs};
use crate::Config;

pub mod in_memory;
pub mod s3;

/// Stream of body chunks returned by [`ObjectClient::new_reader`].
pub type ByteChunks = BoxStream<'static, Result<Bytes, StoreError>>;

/// Lazy sequence of attribute records returned by [`ObjectClient::list`].
pub type ObjectAttrsStream = BoxStream<'static, Result<ObjectAttrs, StoreError>>;

/// Error type reported by store implementations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The object (or bucket) does not exist.
    #[error("no such object")]
    NotFound,

    /// A condition attached to the request did not hold.
    #[error("precondition failed")]
    PreconditionFailed,

    /// The session was closed.
    #[error("session closed")]
    Closed,

    /// The session could not be established.
    #[error("failed to open session: {0}")]
    Connect(#[source] BoxError),

    /// Any other request failure.
    #[error("request failed: {0}")]
    Request(#[source] BoxError),
}

impl StoreError {
    /// Wrap an arbitrary error as a session establishment failure.
    pub fn connect<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Connect(err.into())
    }

    /// Wrap an arbitrary error as a request failure.
    pub fn request<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        StoreError::Request(err.into())
    }
}

/// An open session against an object store.
///
/// Implementations must be safe to share between concurrent operations and must apply the
/// [`Conditions`] of a request atomically with the mutation they guard.
#[async_trait]
pub trait ObjectClient: Send + Sync + Debug {
    /// Fetch the attributes of an object.
    async fn attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs, StoreError>;

    /// Open a reader over the whole body of an object.
    async fn new_reader(&self, bucket: &str, key: &str) -> Result<ByteChunks, StoreError>;

    /// Store `body` as the complete content of `key` in a single request.
    async fn write(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        conditions: &Conditions,
    ) -> Result<(), StoreError>;

    /// Copy `src` to `dst`. `conditions` apply to the destination.
    async fn copy(
        &self,
        bucket: &str,
        src: &str,
        dst: &str,
        conditions: &Conditions,
    ) -> Result<(), StoreError>;

    /// Replace the user metadata of an object.
    async fn update(
        &self,
        bucket: &str,
        key: &str,
        update: AttrsUpdate,
        conditions: &Conditions,
    ) -> Result<(), StoreError>;

    /// Delete an object.
    async fn delete(
        &self,
        bucket: &str,
        key: &str,
        conditions: &Conditions,
    ) -> Result<(), StoreError>;

    /// Enumerate the attributes of every object whose key starts with `prefix`.
    fn list(&self, bucket: &str, prefix: &str) -> ObjectAttrsStream;

    /// Release the session. Every later call fails with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}

/// Opens store sessions for a [`Config`].
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// Open one session able to serve `config.bucket_name()`.
    async fn connect(&self, config: &Config) -> Result<Arc<dyn ObjectClient>, StoreError>;
}
