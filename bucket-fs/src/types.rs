/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::collections::HashMap;
use std::fmt;
use std::time::SystemTime;

/// Version token tied to the content of an object.
///
/// Every write of an object body produces a new generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Generation(String);

impl Generation {
    /// Wrap a store-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token as issued by the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Generation {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Version token tied to the metadata of an object.
///
/// Metadata updates produce a new metageneration without changing the [`Generation`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Metageneration(String);

impl Metageneration {
    /// Wrap a store-issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token as issued by the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for Metageneration {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Metageneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Preconditions attached to a store request.
///
/// The store rejects the request with a precondition failure when any of them does not hold
/// at the time the request is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    generation_match: Option<Generation>,
    metageneration_match: Option<Metageneration>,
    does_not_exist: bool,
}

impl Conditions {
    /// No preconditions.
    pub fn none() -> Self {
        Self::default()
    }

    /// The target object must not exist.
    pub fn does_not_exist() -> Self {
        Self {
            does_not_exist: true,
            ..Default::default()
        }
    }

    /// The target object must currently be at `generation`.
    pub fn generation_match(generation: Generation) -> Self {
        Self {
            generation_match: Some(generation),
            ..Default::default()
        }
    }

    /// The target object's metadata must currently be at `metageneration`.
    pub fn metageneration_match(metageneration: Metageneration) -> Self {
        Self {
            metageneration_match: Some(metageneration),
            ..Default::default()
        }
    }

    /// Required generation, if any.
    pub fn if_generation_match(&self) -> Option<&Generation> {
        self.generation_match.as_ref()
    }

    /// Required metageneration, if any.
    pub fn if_metageneration_match(&self) -> Option<&Metageneration> {
        self.metageneration_match.as_ref()
    }

    /// Whether the target object must be absent.
    pub fn if_does_not_exist(&self) -> bool {
        self.does_not_exist
    }

    /// True when no precondition is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Attributes of a stored object as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAttrs {
    /// Bucket holding the object
    pub bucket: String,
    /// Full object key
    pub name: String,
    /// Content length in bytes
    pub size: u64,
    /// MD5 digest of the content, when the store computed one
    pub md5: Option<[u8; 16]>,
    /// Content version token
    pub generation: Generation,
    /// Metadata version token
    pub metageneration: Metageneration,
    /// Creation time of the object
    pub created: SystemTime,
    /// Last time the object or its metadata changed
    pub updated: SystemTime,
    /// User-defined metadata
    pub metadata: HashMap<String, String>,
}

/// Attribute changes applied by [`ObjectClient::update`](crate::store::ObjectClient::update).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttrsUpdate {
    /// Replacement user metadata
    pub metadata: HashMap<String, String>,
}
