/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Operation, Stage};
use crate::operation::OperationContext;
use crate::types::Conditions;
use crate::METADATA_TIMEOUT;

/// Operation struct for single object delete
#[derive(Clone, Default, Debug)]
pub(crate) struct Delete;

impl Delete {
    /// Execute a single `Delete` operation
    pub(crate) async fn orchestrate(handle: &Handle, path: &str) -> Result<(), error::Error> {
        let ctx = OperationContext::new(Operation::Delete, METADATA_TIMEOUT);
        let key = handle.resolve(path).map_err(|err| ctx.reject(err, path))?;

        delete_object(handle, &ctx, &key)
            .instrument(tracing::debug_span!("delete", key = key.as_str()))
            .await
    }
}

/// Delete `key`, guarded by the generation observed when looking it up.
///
/// A concurrent writer that replaces the object between the lookup and the delete makes
/// the delete fail with a precondition failure rather than remove the newer version.
pub(super) async fn delete_object(
    handle: &Handle,
    ctx: &OperationContext,
    key: &str,
) -> Result<(), error::Error> {
    let attrs = ctx
        .call(Stage::Lookup, key, handle.session.attrs(handle.bucket(), key))
        .await?;

    let conditions = Conditions::generation_match(attrs.generation);
    ctx.call(
        Stage::Delete,
        key,
        handle.session.delete(handle.bucket(), key, &conditions),
    )
    .await?;

    tracing::trace!("deleted `{key}`");
    Ok(())
}
