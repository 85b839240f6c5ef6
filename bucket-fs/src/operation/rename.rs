/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Operation};
use crate::operation::copy::{copy_object, resolve_pair};
use crate::operation::delete::delete_object;
use crate::operation::OperationContext;
use crate::METADATA_TIMEOUT;

/// Operation struct for moving a single object
#[derive(Clone, Default, Debug)]
pub(crate) struct Rename;

impl Rename {
    /// Execute a single `Move` operation
    ///
    /// The copy and the delete each get their own budget.
    pub(crate) async fn orchestrate(
        handle: &Handle,
        from: &str,
        to: &str,
    ) -> Result<(), error::Error> {
        let span = tracing::debug_span!("rename", from, to);
        async {
            let ctx = OperationContext::new(Operation::Move, METADATA_TIMEOUT);
            let (src, dst) = resolve_pair(handle, &ctx, from, to)?;
            copy_object(handle, &ctx, &src, &dst).await?;

            let ctx = OperationContext::new(Operation::Move, METADATA_TIMEOUT);
            if let Err(err) = delete_object(handle, &ctx, &src).await {
                tracing::warn!(
                    "copied `{src}` to `{dst}` but failed to delete the source; both objects exist: {err}"
                );
                return Err(err);
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}
