/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

//! Filesystem-style access to a single object storage bucket.
//!
//! A [`FileSystem`] scopes every operation to a parent folder inside one bucket and maps
//! filesystem verbs onto the store's native primitives: immutable objects guarded by
//! generation and metageneration tokens and atomic conditional writes.
//!
//! # Examples
//!
//! Write and read back an object using the in-memory store:
//!
//! ```no_run
//! # async fn example() -> Result<(), bucket_fs::error::Error> {
//! use std::collections::HashMap;
//! use bucket_fs::store::in_memory::InMemoryStore;
//!
//! let store = InMemoryStore::with_buckets(["my-bucket"]);
//! let config = bucket_fs::Config::builder()
//!     .bucket_name("my-bucket")
//!     .parent_folder("team/reports")
//!     .build();
//! let fs = bucket_fs::FileSystem::connect(config, &store).await?;
//!
//! let metadata = HashMap::from([("owner".to_owned(), "ops".to_owned())]);
//! fs.write(&b"quarterly numbers"[..], "2024/q1.csv", metadata).await?;
//! let (data, meta) = fs.read("2024/q1.csv").await?;
//! assert_eq!(meta.user_metadata()["owner"], "ops");
//! # let _ = data;
//! fs.teardown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! See the documentation for each operation for its consistency contract:
//!
//! * [`stat`](crate::FileSystem::stat) - fetch the metadata of one object
//! * [`write`](crate::FileSystem::write) - upload an object and attach user metadata
//! * [`read`](crate::FileSystem::read) - download an object and its metadata
//! * [`list`](crate::FileSystem::list) - enumerate every object under a prefix
//! * [`copy`](crate::FileSystem::copy) - copy without clobbering an existing object
//! * [`rename`](crate::FileSystem::rename) - move an object (copy then delete)
//! * [`delete`](crate::FileSystem::delete) - delete the version of an object that was observed

use std::time::Duration;

/// Budget for operations that only touch object metadata.
pub(crate) const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for operations that move object bodies.
pub(crate) const TRANSFER_TIMEOUT: Duration = Duration::from_secs(50);

/// Error types emitted by `bucket-fs`
pub mod error;

/// Common types shared between the adapter and store implementations
pub mod types;

/// File metadata and its translation from store attributes
pub mod metadata;

/// Object store seams and the bundled store implementations
pub mod store;

/// File system client
pub mod client;

/// File system configuration
pub mod config;

/// File system operations
pub(crate) mod operation;

/// Object key resolution
pub(crate) mod path;

pub use self::client::FileSystem;
pub use self::config::Config;
pub use self::metadata::{FileMetadata, UserMetadata};
