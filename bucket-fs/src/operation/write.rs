/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::Bytes;
use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Operation, Stage};
use crate::metadata::{FileMetadata, UserMetadata};
use crate::operation::OperationContext;
use crate::types::{AttrsUpdate, Conditions};
use crate::{METADATA_TIMEOUT, TRANSFER_TIMEOUT};

/// Operation struct for single object upload
#[derive(Clone, Default, Debug)]
pub(crate) struct Write;

impl Write {
    /// Execute a single `Write` operation
    pub(crate) async fn orchestrate(
        handle: &Handle,
        data: Bytes,
        path: &str,
        metadata: UserMetadata,
    ) -> Result<FileMetadata, error::Error> {
        let ctx = OperationContext::new(Operation::Write, TRANSFER_TIMEOUT);
        if data.is_empty() {
            let err = error::empty_input("length of data is 0, nothing to write");
            return Err(ctx.reject(err, path));
        }
        if path.trim().is_empty() {
            let err = error::empty_input("path is empty, nowhere to write");
            return Err(ctx.reject(err, path));
        }
        let key = handle.resolve(path).map_err(|err| ctx.reject(err, path))?;

        write_object(handle, &ctx, &key, data, metadata)
            .instrument(tracing::debug_span!("write", key = key.as_str()))
            .await
    }
}

async fn write_object(
    handle: &Handle,
    ctx: &OperationContext,
    key: &str,
    data: Bytes,
    metadata: UserMetadata,
) -> Result<FileMetadata, error::Error> {
    let content_length = data.len();
    ctx.call(
        Stage::Upload,
        key,
        handle
            .session
            .write(handle.bucket(), key, data, &Conditions::none()),
    )
    .await?;
    tracing::trace!("uploaded {content_length} bytes to `{key}`");

    if metadata.is_empty() {
        tracing::trace!("no user metadata supplied, skipping metadata update");
    } else {
        let ctx = ctx.narrowed(METADATA_TIMEOUT);
        let attrs = ctx
            .call(
                Stage::MetadataWrite,
                key,
                handle.session.attrs(handle.bucket(), key),
            )
            .await?;
        let conditions = Conditions::metageneration_match(attrs.metageneration);
        ctx.call(
            Stage::MetadataWrite,
            key,
            handle.session.update(
                handle.bucket(),
                key,
                AttrsUpdate { metadata },
                &conditions,
            ),
        )
        .await?;
    }

    let attrs = ctx
        .call(
            Stage::AttrsFetch,
            key,
            handle.session.attrs(handle.bucket(), key),
        )
        .await?;
    Ok(attrs.into())
}
