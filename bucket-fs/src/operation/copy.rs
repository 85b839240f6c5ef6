/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, ErrorKind, Operation, Stage};
use crate::operation::OperationContext;
use crate::types::Conditions;
use crate::METADATA_TIMEOUT;

/// Operation struct for copying a single object
#[derive(Clone, Default, Debug)]
pub(crate) struct CopyFile;

impl CopyFile {
    /// Execute a single `Copy` operation
    pub(crate) async fn orchestrate(
        handle: &Handle,
        from: &str,
        to: &str,
    ) -> Result<(), error::Error> {
        let ctx = OperationContext::new(Operation::Copy, METADATA_TIMEOUT);
        let (src, dst) = resolve_pair(handle, &ctx, from, to)?;

        copy_object(handle, &ctx, &src, &dst)
            .instrument(tracing::debug_span!(
                "copy",
                src = src.as_str(),
                dst = dst.as_str()
            ))
            .await
    }
}

/// Resolve the source and destination keys, rejecting a pair that names the same object.
pub(super) fn resolve_pair(
    handle: &Handle,
    ctx: &OperationContext,
    from: &str,
    to: &str,
) -> Result<(String, String), error::Error> {
    let src = handle.resolve(from).map_err(|err| ctx.reject(err, from))?;
    let dst = handle.resolve(to).map_err(|err| ctx.reject(err, to))?;
    if src == dst {
        let err = error::same_path(format!("`{from}` and `{to}` both resolve to `{src}`"));
        return Err(ctx.reject(err, &src));
    }
    Ok((src, dst))
}

/// Copy `src` to `dst` unless `dst` already exists.
pub(super) async fn copy_object(
    handle: &Handle,
    ctx: &OperationContext,
    src: &str,
    dst: &str,
) -> Result<(), error::Error> {
    let pair = format!("{src} -> {dst}");
    ctx.call(
        Stage::Copy,
        &pair,
        handle
            .session
            .copy(handle.bucket(), src, dst, &Conditions::does_not_exist()),
    )
    .await
    .map_err(|err| match err.kind() {
        ErrorKind::PreconditionFailed => err.with_kind(ErrorKind::AlreadyExists),
        _ => err,
    })?;

    tracing::trace!("copied `{src}` to `{dst}`");
    Ok(())
}
