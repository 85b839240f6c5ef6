/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::ObjectAttrs;

/// User-defined key/value metadata attached to an object.
pub type UserMetadata = HashMap<String, String>;

/// Metadata of a stored file as seen by callers of [`FileSystem`](crate::FileSystem).
///
/// Produced from the store's attributes after every successful stat, read, write or list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    bucket: String,
    object_key: String,
    md5: String,
    user_metadata: UserMetadata,
    size: u64,
    created_at: SystemTime,
    updated_at: SystemTime,
}

impl FileMetadata {
    /// Bucket holding the object
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full object key, including the parent folder
    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    /// Hex encoded MD5 digest of the content, empty when the store did not compute one
    pub fn md5(&self) -> &str {
        &self.md5
    }

    /// User-defined metadata
    pub fn user_metadata(&self) -> &UserMetadata {
        &self.user_metadata
    }

    /// Content length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Creation time
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Last time the content or metadata changed
    pub fn updated_at(&self) -> SystemTime {
        self.updated_at
    }
}

impl From<ObjectAttrs> for FileMetadata {
    fn from(value: ObjectAttrs) -> Self {
        Self {
            md5: value.md5.map(hex::encode).unwrap_or_default(),
            bucket: value.bucket,
            object_key: value.name,
            user_metadata: value.metadata,
            size: value.size,
            created_at: value.created,
            updated_at: value.updated,
        }
    }
}

impl From<&ObjectAttrs> for FileMetadata {
    fn from(value: &ObjectAttrs) -> Self {
        value.clone().into()
    }
}
