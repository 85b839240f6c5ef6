/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::Instrument;

use crate::error::{self, Operation};
use crate::metadata::{FileMetadata, UserMetadata};
use crate::operation::copy::CopyFile;
use crate::operation::delete::Delete;
use crate::operation::list::List;
use crate::operation::read::Read;
use crate::operation::rename::Rename;
use crate::operation::stat::Stat;
use crate::operation::write::Write;
use crate::store::{Connector, ObjectClient};
use crate::Config;

/// Filesystem-style client for a single object storage bucket.
///
/// Cloning is cheap; every clone shares the same store session.
#[derive(Debug, Clone)]
pub struct FileSystem {
    pub(crate) handle: Arc<Handle>,
}

/// Configuration and the open store session every operation runs against
#[derive(Debug)]
pub(crate) struct Handle {
    pub(crate) config: Config,
    pub(crate) session: Arc<dyn ObjectClient>,
    closed: AtomicBool,
}

impl Handle {
    pub(crate) fn bucket(&self) -> &str {
        self.config.bucket_name()
    }

    /// Full object key for a caller-relative path.
    pub(crate) fn resolve(&self, path: &str) -> Result<String, error::Error> {
        crate::path::resolve(self.config.parent_folder(), path)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            tracing::debug!(
                "file system for bucket `{}` dropped without teardown; the store session was left open",
                self.config.bucket_name()
            );
        }
    }
}

impl FileSystem {
    /// Validate `config` and open a store session through `connector`.
    ///
    /// Invalid configuration fails with [`ErrorKind::ConfigInvalid`](error::ErrorKind::ConfigInvalid)
    /// before the connector is called. Exactly one session is opened and held until
    /// [`teardown`](Self::teardown).
    pub async fn connect<C>(config: Config, connector: &C) -> Result<FileSystem, error::Error>
    where
        C: Connector + ?Sized,
    {
        config
            .validate()
            .map_err(|err| err.with_operation(Operation::Connect))?;

        let session = connector
            .connect(&config)
            .instrument(tracing::debug_span!("connect", bucket = config.bucket_name()))
            .await
            .map_err(|err| {
                error::Error::from(err)
                    .with_kind(error::ErrorKind::ConnectionFailed)
                    .with_operation(Operation::Connect)
                    .with_key(config.bucket_name())
            })?;

        tracing::debug!(
            "connected to bucket `{}` under `{}`",
            config.bucket_name(),
            config.parent_folder()
        );
        let handle = Arc::new(Handle {
            config,
            session,
            closed: AtomicBool::new(false),
        });
        Ok(FileSystem { handle })
    }

    /// Returns the file system's configuration
    pub fn config(&self) -> &Config {
        &self.handle.config
    }

    /// Fetch the metadata of the object at `path`.
    pub async fn stat(&self, path: &str) -> Result<FileMetadata, error::Error> {
        Stat::orchestrate(&self.handle, path).await
    }

    /// Delete the object at `path`.
    ///
    /// Only the version of the object observed by the initial lookup is deleted. If the
    /// object is replaced concurrently the delete fails with
    /// [`ErrorKind::PreconditionFailed`](error::ErrorKind::PreconditionFailed) and the newer
    /// version is kept.
    pub async fn delete(&self, path: &str) -> Result<(), error::Error> {
        Delete::orchestrate(&self.handle, path).await
    }

    /// Copy the object at `from` to `to`.
    ///
    /// An existing object at `to` is never overwritten: the copy fails with
    /// [`ErrorKind::AlreadyExists`](error::ErrorKind::AlreadyExists) instead. Copying an
    /// object onto itself fails with [`ErrorKind::SamePath`](error::ErrorKind::SamePath)
    /// without contacting the store.
    pub async fn copy(&self, from: &str, to: &str) -> Result<(), error::Error> {
        CopyFile::orchestrate(&self.handle, from, to).await
    }

    /// Move the object at `from` to `to`.
    ///
    /// A move is a [`copy`](Self::copy) followed by a [`delete`](Self::delete) of the source
    /// and is not atomic. When the delete fails after the copy succeeded both objects exist
    /// and the returned error reports [`is_partial_failure`](error::Error::is_partial_failure);
    /// deleting `from` completes the move.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), error::Error> {
        Rename::orchestrate(&self.handle, from, to).await
    }

    /// Upload `data` to `path` and attach `metadata` to it.
    ///
    /// The body is sent as a single request. Non-empty `metadata` is applied by a second,
    /// conditional update after the upload. The returned metadata reflects the object
    /// after both steps.
    ///
    /// A failure after the body was uploaded leaves the new body in place and is reported
    /// as a partial failure.
    pub async fn write(
        &self,
        data: impl Into<Bytes>,
        path: &str,
        metadata: UserMetadata,
    ) -> Result<FileMetadata, error::Error> {
        Write::orchestrate(&self.handle, data.into(), path, metadata).await
    }

    /// Download the object at `path` together with its metadata.
    pub async fn read(&self, path: &str) -> Result<(Bytes, FileMetadata), error::Error> {
        Read::orchestrate(&self.handle, path).await
    }

    /// Enumerate every object whose key starts with `prefix`, keyed by full object key.
    pub async fn list(&self, prefix: &str) -> Result<HashMap<String, FileMetadata>, error::Error> {
        List::orchestrate(&self.handle, prefix).await
    }

    /// Close the store session.
    ///
    /// Operations issued through any remaining clone fail with
    /// [`ErrorKind::SessionClosed`](error::ErrorKind::SessionClosed) afterwards.
    pub async fn teardown(self) -> Result<(), error::Error> {
        let handle = self.handle;
        handle.closed.store(true, Ordering::SeqCst);
        handle
            .session
            .close()
            .instrument(tracing::debug_span!("teardown", bucket = handle.bucket()))
            .await
            .map_err(|err| {
                error::Error::from(err)
                    .with_operation(Operation::Teardown)
                    .with_key(handle.bucket())
            })
    }
}
