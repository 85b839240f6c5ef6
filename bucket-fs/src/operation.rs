/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Error, Operation, Stage};
use crate::store::StoreError;

/// Single object metadata lookup
pub(crate) mod stat;

/// Conditional single object delete
pub(crate) mod delete;

/// Non-clobbering copy
pub(crate) mod copy;

/// Copy followed by delete
pub(crate) mod rename;

/// Single-shot upload with user metadata
pub(crate) mod write;

/// Whole object download
pub(crate) mod read;

/// Prefix enumeration
pub(crate) mod list;

/// Deadline and error context shared by every store call made on behalf of one operation.
#[derive(Debug, Clone)]
pub(crate) struct OperationContext {
    operation: Operation,
    deadline: Instant,
}

impl OperationContext {
    /// Start the clock for `operation`, which must finish within `budget`.
    pub(crate) fn new(operation: Operation, budget: Duration) -> Self {
        Self {
            operation,
            deadline: Instant::now() + budget,
        }
    }

    /// A context for a nested stage that must finish within `budget`.
    ///
    /// The narrowed deadline never extends past the current one.
    pub(crate) fn narrowed(&self, budget: Duration) -> Self {
        Self {
            operation: self.operation,
            deadline: self.deadline.min(Instant::now() + budget),
        }
    }

    /// Run one store call under this context's deadline, attaching the stage and key to
    /// any failure.
    pub(crate) async fn call<T, F>(&self, stage: Stage, key: &str, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let result = match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result.map_err(Error::from),
            Err(elapsed) => {
                tracing::debug!("{} `{key}` exceeded its deadline at {stage}", self.operation);
                Err(Error::from(elapsed))
            }
        };
        result.map_err(|err| {
            err.with_operation(self.operation)
                .at_stage(stage)
                .with_key(key)
        })
    }

    /// Attach this context to an error raised before any store call was made.
    pub(crate) fn reject(&self, err: Error, key: &str) -> Error {
        err.with_operation(self.operation).with_key(key)
    }
}
