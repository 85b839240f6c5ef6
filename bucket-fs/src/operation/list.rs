/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;

use futures_util::TryStreamExt;
use tracing::Instrument;

use crate::client::Handle;
use crate::error::{self, Operation, Stage};
use crate::metadata::FileMetadata;
use crate::operation::OperationContext;
use crate::METADATA_TIMEOUT;

/// Operation struct for enumerating the objects under a prefix
#[derive(Clone, Default, Debug)]
pub(crate) struct List;

impl List {
    /// Execute a single `List` operation
    ///
    /// The whole enumeration shares one deadline, listings too large to finish within it
    /// fail with a timeout.
    pub(crate) async fn orchestrate(
        handle: &Handle,
        prefix: &str,
    ) -> Result<HashMap<String, FileMetadata>, error::Error> {
        let ctx = OperationContext::new(Operation::List, METADATA_TIMEOUT);
        let mut prefix = handle
            .resolve(prefix)
            .map_err(|err| ctx.reject(err, prefix))?;
        // listing the parent folder itself must not match sibling keys sharing its name
        if !prefix.ends_with('/') && prefix == handle.resolve("")? {
            prefix.push('/');
        }

        let listing = handle
            .session
            .list(handle.bucket(), &prefix)
            .map_ok(|attrs| (attrs.name.clone(), FileMetadata::from(attrs)))
            .try_collect::<HashMap<_, _>>();
        let files = ctx
            .call(Stage::List, &prefix, listing)
            .instrument(tracing::debug_span!("list", prefix = prefix.as_str()))
            .await?;

        tracing::trace!("listed {} objects under `{prefix}`", files.len());
        Ok(files)
    }
}
