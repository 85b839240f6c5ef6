/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Operation, Stage};
use crate::metadata::FileMetadata;
use crate::operation::OperationContext;
use crate::METADATA_TIMEOUT;

/// Operation struct for single object metadata lookup
#[derive(Clone, Default, Debug)]
pub(crate) struct Stat;

impl Stat {
    /// Execute a single `Stat` operation
    pub(crate) async fn orchestrate(
        handle: &Handle,
        path: &str,
    ) -> Result<FileMetadata, error::Error> {
        let ctx = OperationContext::new(Operation::Stat, METADATA_TIMEOUT);
        let key = handle.resolve(path).map_err(|err| ctx.reject(err, path))?;

        let attrs = ctx
            .call(
                Stage::Lookup,
                &key,
                handle.session.attrs(handle.bucket(), &key),
            )
            .instrument(tracing::debug_span!("stat", key = key.as_str()))
            .await?;
        Ok(attrs.into())
    }
}
