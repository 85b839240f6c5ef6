/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Operation, Stage};
use crate::metadata::FileMetadata;
use crate::operation::OperationContext;
use crate::store::ByteChunks;
use crate::TRANSFER_TIMEOUT;

/// Operation struct for single object download
#[derive(Clone, Default, Debug)]
pub(crate) struct Read;

impl Read {
    /// Execute a single `Read` operation
    pub(crate) async fn orchestrate(
        handle: &Handle,
        path: &str,
    ) -> Result<(Bytes, FileMetadata), error::Error> {
        let ctx = OperationContext::new(Operation::Read, TRANSFER_TIMEOUT);
        let key = handle.resolve(path).map_err(|err| ctx.reject(err, path))?;

        read_object(handle, &ctx, &key)
            .instrument(tracing::debug_span!("read", key = key.as_str()))
            .await
    }
}

async fn read_object(
    handle: &Handle,
    ctx: &OperationContext,
    key: &str,
) -> Result<(Bytes, FileMetadata), error::Error> {
    let reader = ctx
        .call(
            Stage::Read,
            key,
            handle.session.new_reader(handle.bucket(), key),
        )
        .await?;
    let data = ctx.call(Stage::Drain, key, drain(reader)).await?;
    tracing::trace!("read {} bytes from `{key}`", data.len());

    let attrs = ctx
        .call(
            Stage::AttrsFetch,
            key,
            handle.session.attrs(handle.bucket(), key),
        )
        .await?;
    Ok((data, attrs.into()))
}

async fn drain(reader: ByteChunks) -> Result<Bytes, crate::store::StoreError> {
    let body = reader
        .try_fold(BytesMut::new(), |mut body, chunk| async move {
            body.extend_from_slice(&chunk);
            Ok(body)
        })
        .await?;
    Ok(body.freeze())
}
