/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error;

/// Configuration for a [`FileSystem`](crate::client::FileSystem)
#[derive(Debug, Clone)]
pub struct Config {
    bucket_name: String,
    parent_folder: String,
}

impl Config {
    /// Create a new `Config` builder
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// The bucket every operation targets.
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// The key prefix applied to every path handed to the file system.
    pub fn parent_folder(&self) -> &str {
        &self.parent_folder
    }

    /// Check the configuration before any connection is attempted.
    pub(crate) fn validate(&self) -> Result<(), error::Error> {
        if self.bucket_name.trim().is_empty() {
            return Err(error::invalid_config("bucket name cannot be empty"));
        }
        if self.parent_folder.trim().is_empty() {
            return Err(error::invalid_config("parent folder cannot be empty"));
        }
        if self.parent_folder.split('/').any(|segment| segment == "..") {
            return Err(error::invalid_config(format!(
                "parent folder `{}` cannot contain `..` segments",
                self.parent_folder
            )));
        }
        Ok(())
    }
}

/// Fluent style builder for [Config]
#[derive(Debug, Clone, Default)]
pub struct Builder {
    bucket_name: String,
    parent_folder: String,
}

impl Builder {
    /// Set the bucket every operation targets.
    pub fn bucket_name(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = bucket_name.into();
        self
    }

    /// Set the key prefix applied to every path.
    ///
    /// Paths handed to the file system are joined onto this folder, e.g. `write(.., "a/b.txt", ..)`
    /// with a parent folder of `reports` stores the object `reports/a/b.txt`.
    pub fn parent_folder(mut self, parent_folder: impl Into<String>) -> Self {
        self.parent_folder = parent_folder.into();
        self
    }

    /// Consumes the builder and constructs a [`Config`]
    ///
    /// NOTE: The configuration is validated when the file system is connected.
    pub fn build(self) -> Config {
        Config {
            bucket_name: self.bucket_name,
            parent_folder: self.parent_folder,
        }
    }
}
