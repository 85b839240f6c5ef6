/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use std::fmt;

use crate::store::StoreError;

/// A boxed error that is `Send` and `Sync`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by this library
///
/// Besides its [`ErrorKind`], an error records the [`Operation`] and [`Stage`] it was raised
/// in and the object key involved, so it can be diagnosed without a backtrace.
///
/// NOTE: Walk [`std::error::Error::source`] to display the entire cause chain.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    operation: Option<Operation>,
    stage: Option<Stage>,
    key: Option<String>,
    source: BoxError,
}

/// General categories of file system errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The configuration failed validation, no connection was attempted
    ConfigInvalid,

    /// The store session could not be established
    ConnectionFailed,

    /// Required input was empty (e.g. no data or no path to write)
    EmptyInput,

    /// The path cannot be resolved to an object key (e.g. it escapes the parent folder)
    InvalidPath,

    /// Source and destination resolve to the same object
    SamePath,

    /// The object does not exist
    NotFound,

    /// A conditional request was rejected because the object changed concurrently
    PreconditionFailed,

    /// The destination of a copy already exists
    AlreadyExists,

    /// The operation did not complete within its time budget
    Timeout,

    /// The session was torn down
    SessionClosed,

    /// Any other failure reported by the store
    StoreFailure,
}

/// The file system operation an error was raised by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Operation {
    /// Opening the store session
    Connect,
    /// Closing the store session
    Teardown,
    /// [`FileSystem::stat`](crate::FileSystem::stat)
    Stat,
    /// [`FileSystem::delete`](crate::FileSystem::delete)
    Delete,
    /// [`FileSystem::copy`](crate::FileSystem::copy)
    Copy,
    /// [`FileSystem::rename`](crate::FileSystem::rename)
    Move,
    /// [`FileSystem::write`](crate::FileSystem::write)
    Write,
    /// [`FileSystem::read`](crate::FileSystem::read)
    Read,
    /// [`FileSystem::list`](crate::FileSystem::list)
    List,
}

/// The store call within an operation that failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Stage {
    /// Looking up the current attributes (and version tokens) of an object
    Lookup,
    /// Conditional delete of an object
    Delete,
    /// Conditional copy into the destination
    Copy,
    /// Uploading an object body
    Upload,
    /// Patching user metadata onto an uploaded object
    MetadataWrite,
    /// Re-fetching attributes after the data transfer finished
    AttrsFetch,
    /// Opening a reader for an object body
    Read,
    /// Draining an object body into memory
    Drain,
    /// Enumerating objects under a prefix
    List,
}

impl Error {
    /// Creates a new [`Error`] from a known kind of error as well as an arbitrary error
    /// source.
    pub fn new<E>(kind: ErrorKind, err: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            kind,
            operation: None,
            stage: None,
            key: None,
            source: err.into(),
        }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the operation this error was raised by, if known.
    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    /// Returns the store call that failed, if the error came from the store.
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Returns the full object key (or `from -> to` pair) involved, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns true when the operation committed some of its effects before failing.
    ///
    /// * a move that copied the object but failed to delete the source leaves both objects
    ///   in place; retrying only the delete completes it
    /// * a write that uploaded the body but failed to patch metadata or re-fetch attributes
    ///   leaves the new body in place
    pub fn is_partial_failure(&self) -> bool {
        matches!(
            (self.operation, self.stage),
            (Some(Operation::Move), Some(Stage::Lookup | Stage::Delete))
                | (
                    Some(Operation::Write),
                    Some(Stage::MetadataWrite | Stage::AttrsFetch)
                )
        )
    }

    pub(crate) fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub(crate) fn at_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::ConnectionFailed => write!(f, "connection failed"),
            ErrorKind::EmptyInput => write!(f, "empty input"),
            ErrorKind::InvalidPath => write!(f, "invalid path"),
            ErrorKind::SamePath => write!(f, "source and destination are the same object"),
            ErrorKind::NotFound => write!(f, "object not found"),
            ErrorKind::PreconditionFailed => write!(f, "object was modified concurrently"),
            ErrorKind::AlreadyExists => write!(f, "destination already exists"),
            ErrorKind::Timeout => write!(f, "operation timed out"),
            ErrorKind::SessionClosed => write!(f, "session closed"),
            ErrorKind::StoreFailure => write!(f, "object store request failed"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Connect => "connect",
            Operation::Teardown => "teardown",
            Operation::Stat => "stat",
            Operation::Delete => "delete",
            Operation::Copy => "copy",
            Operation::Move => "move",
            Operation::Write => "write",
            Operation::Read => "read",
            Operation::List => "list",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lookup => "lookup",
            Stage::Delete => "delete",
            Stage::Copy => "copy",
            Stage::Upload => "upload",
            Stage::MetadataWrite => "metadata write",
            Stage::AttrsFetch => "attributes fetch",
            Stage::Read => "read",
            Stage::Drain => "drain",
            Stage::List => "list",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(operation) = self.operation {
            write!(f, "{operation}")?;
            if let Some(key) = &self.key {
                write!(f, " `{key}`")?;
            }
            match self.stage {
                Some(stage) => write!(f, " failed at {stage}: ")?,
                None => write!(f, " failed: ")?,
            }
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        let kind = match &value {
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::PreconditionFailed => ErrorKind::PreconditionFailed,
            StoreError::Closed => ErrorKind::SessionClosed,
            StoreError::Connect(_) => ErrorKind::ConnectionFailed,
            StoreError::Request(_) => ErrorKind::StoreFailure,
        };
        Error::new(kind, value)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(value: tokio::time::error::Elapsed) -> Self {
        Self::new(ErrorKind::Timeout, value)
    }
}

pub(crate) fn invalid_config<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::ConfigInvalid, err)
}

pub(crate) fn empty_input<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::EmptyInput, err)
}

pub(crate) fn invalid_path<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::InvalidPath, err)
}

pub(crate) fn same_path<E>(err: E) -> Error
where
    E: Into<BoxError>,
{
    Error::new(ErrorKind::SamePath, err)
}

#[cfg(test)]
mod test {
    use super::{Error, ErrorKind, Operation, Stage};
    use crate::store::StoreError;

    #[test]
    fn test_display_includes_operation_key_and_stage() {
        let err = Error::from(StoreError::NotFound)
            .with_operation(Operation::Read)
            .at_stage(Stage::Read)
            .with_key("reports/q1.csv");

        assert_eq!(
            "read `reports/q1.csv` failed at read: object not found",
            err.to_string()
        );
    }

    #[test]
    fn test_display_without_context() {
        let err = super::empty_input("length of data is 0, nothing to write");
        assert_eq!("empty input", err.to_string());
        assert_eq!(
            "length of data is 0, nothing to write",
            std::error::Error::source(&err).unwrap().to_string()
        );
    }

    #[test]
    fn test_store_error_kinds() {
        let cases = [
            (StoreError::NotFound, ErrorKind::NotFound),
            (StoreError::PreconditionFailed, ErrorKind::PreconditionFailed),
            (StoreError::Closed, ErrorKind::SessionClosed),
            (StoreError::connect("refused"), ErrorKind::ConnectionFailed),
            (StoreError::request("503 slow down"), ErrorKind::StoreFailure),
        ];
        for (store_err, expected) in cases {
            assert_eq!(&expected, Error::from(store_err).kind());
        }
    }

    #[test]
    fn test_partial_failure() {
        let move_delete = Error::from(StoreError::PreconditionFailed)
            .with_operation(Operation::Move)
            .at_stage(Stage::Delete);
        assert!(move_delete.is_partial_failure());

        let move_copy = Error::from(StoreError::PreconditionFailed)
            .with_operation(Operation::Move)
            .at_stage(Stage::Copy);
        assert!(!move_copy.is_partial_failure());

        let write_meta = Error::from(StoreError::request("boom"))
            .with_operation(Operation::Write)
            .at_stage(Stage::MetadataWrite);
        assert!(write_meta.is_partial_failure());

        let write_upload = Error::from(StoreError::request("boom"))
            .with_operation(Operation::Write)
            .at_stage(Stage::Upload);
        assert!(!write_upload.is_partial_failure());

        let delete_lookup = Error::from(StoreError::NotFound)
            .with_operation(Operation::Delete)
            .at_stage(Stage::Lookup);
        assert!(!delete_lookup.is_partial_failure());
    }
}
