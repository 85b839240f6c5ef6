/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! In-memory implementation of the store seams.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use tokio::sync::RwLock;

use crate::store::{ByteChunks, Connector, ObjectAttrsStream, ObjectClient, StoreError};
use crate::types::{AttrsUpdate, Conditions, Generation, Metageneration, ObjectAttrs};
use crate::Config;

/// Size of the chunks a reader yields
const READ_CHUNK_SIZE: usize = 64 * 1024;

// bucket -> (key -> object)
type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

/// An object store that keeps every bucket in memory.
///
/// Objects carry generation and metageneration tokens and every conditional request is
/// checked and applied under a single write lock, so the store gives the same atomicity
/// guarantees as a remote store. Cloning is cheap; clones share the same buckets.
///
/// The store is also a [`Connector`]: each connect opens a new session over the shared
/// buckets, which makes session bookkeeping observable in tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    buckets: RwLock<Buckets>,
    last_generation: AtomicI64,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    md5: [u8; 16],
    generation: i64,
    metageneration: i64,
    created: SystemTime,
    updated: SystemTime,
    metadata: HashMap<String, String>,
}

impl StoredObject {
    fn new(data: Bytes, generation: i64, metadata: HashMap<String, String>) -> Self {
        let now = SystemTime::now();
        Self {
            md5: md5::compute(&data).0,
            data,
            generation,
            metageneration: 1,
            created: now,
            updated: now,
            metadata,
        }
    }

    fn attrs(&self, bucket: &str, name: &str) -> ObjectAttrs {
        ObjectAttrs {
            bucket: bucket.to_owned(),
            name: name.to_owned(),
            size: self.data.len() as u64,
            md5: Some(self.md5),
            generation: Generation::from(self.generation),
            metageneration: Metageneration::from(self.metageneration),
            created: self.created,
            updated: self.updated,
            metadata: self.metadata.clone(),
        }
    }
}

impl InMemoryStore {
    /// Create a new store without any buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new store holding the given (empty) buckets.
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buckets = buckets
            .into_iter()
            .map(|name| (name.into(), BTreeMap::new()))
            .collect();
        Self {
            shared: Arc::new(Shared {
                buckets: RwLock::new(buckets),
                ..Default::default()
            }),
        }
    }

    /// Create an empty bucket if it does not exist yet.
    pub async fn create_bucket(&self, name: impl Into<String>) {
        let mut buckets = self.shared.buckets.write().await;
        buckets.entry(name.into()).or_default();
    }

    /// The current content of an object, if it exists.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        let buckets = self.shared.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
    }

    /// Number of objects in a bucket.
    pub async fn object_count(&self, bucket: &str) -> usize {
        let buckets = self.shared.buckets.read().await;
        buckets.get(bucket).map_or(0, BTreeMap::len)
    }

    /// Total number of sessions opened through [`Connector::connect`].
    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions_opened.load(Ordering::SeqCst)
    }

    /// Total number of sessions released through [`ObjectClient::close`].
    pub fn sessions_closed(&self) -> usize {
        self.shared.sessions_closed.load(Ordering::SeqCst)
    }

    fn next_generation(&self) -> i64 {
        self.shared.last_generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Connector for InMemoryStore {
    async fn connect(&self, config: &Config) -> Result<Arc<dyn ObjectClient>, StoreError> {
        let buckets = self.shared.buckets.read().await;
        if !buckets.contains_key(config.bucket_name()) {
            return Err(StoreError::connect(format!(
                "bucket `{}` does not exist",
                config.bucket_name()
            )));
        }
        self.shared.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(InMemorySession {
            store: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A session over an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemorySession {
    store: InMemoryStore,
    closed: AtomicBool,
}

impl InMemorySession {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

/// Check the conditions that guard a write to a (possibly absent) destination object.
fn check_destination(
    existing: Option<&StoredObject>,
    conditions: &Conditions,
) -> Result<(), StoreError> {
    if conditions.if_does_not_exist() && existing.is_some() {
        return Err(StoreError::PreconditionFailed);
    }
    check_existing(existing, conditions)
}

fn check_existing(
    existing: Option<&StoredObject>,
    conditions: &Conditions,
) -> Result<(), StoreError> {
    if let Some(expected) = conditions.if_generation_match() {
        match existing {
            Some(object) if &Generation::from(object.generation) == expected => {}
            _ => return Err(StoreError::PreconditionFailed),
        }
    }
    if let Some(expected) = conditions.if_metageneration_match() {
        match existing {
            Some(object) if &Metageneration::from(object.metageneration) == expected => {}
            _ => return Err(StoreError::PreconditionFailed),
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectClient for InMemorySession {
    async fn attrs(&self, bucket: &str, key: &str) -> Result<ObjectAttrs, StoreError> {
        self.ensure_open()?;
        let buckets = self.store.shared.buckets.read().await;
        let object = buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or(StoreError::NotFound)?;
        Ok(object.attrs(bucket, key))
    }

    async fn new_reader(&self, bucket: &str, key: &str) -> Result<ByteChunks, StoreError> {
        self.ensure_open()?;
        let data = self
            .store
            .object(bucket, key)
            .await
            .ok_or(StoreError::NotFound)?;

        let chunks = (0..data.len())
            .step_by(READ_CHUNK_SIZE)
            .map(|start| {
                let end = usize::min(start + READ_CHUNK_SIZE, data.len());
                Ok(data.slice(start..end))
            })
            .collect::<Vec<_>>();
        Ok(stream::iter(chunks).boxed())
    }

    async fn write(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut buckets = self.store.shared.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or(StoreError::NotFound)?;
        check_destination(objects.get(key), conditions)?;

        let generation = self.store.next_generation();
        tracing::trace!("stored `{key}` at generation {generation}");
        objects.insert(
            key.to_owned(),
            StoredObject::new(body, generation, HashMap::new()),
        );
        Ok(())
    }

    async fn copy(
        &self,
        bucket: &str,
        src: &str,
        dst: &str,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut buckets = self.store.shared.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or(StoreError::NotFound)?;
        let source = objects.get(src).ok_or(StoreError::NotFound)?;
        let (data, metadata) = (source.data.clone(), source.metadata.clone());
        check_destination(objects.get(dst), conditions)?;

        let generation = self.store.next_generation();
        objects.insert(
            dst.to_owned(),
            StoredObject::new(data, generation, metadata),
        );
        Ok(())
    }

    async fn update(
        &self,
        bucket: &str,
        key: &str,
        update: AttrsUpdate,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut buckets = self.store.shared.buckets.write().await;
        let object = buckets
            .get_mut(bucket)
            .and_then(|objects| objects.get_mut(key))
            .ok_or(StoreError::NotFound)?;
        check_existing(Some(&*object), conditions)?;

        object.metadata = update.metadata;
        object.metageneration += 1;
        object.updated = SystemTime::now();
        Ok(())
    }

    async fn delete(
        &self,
        bucket: &str,
        key: &str,
        conditions: &Conditions,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut buckets = self.store.shared.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or(StoreError::NotFound)?;
        let object = objects.get(key).ok_or(StoreError::NotFound)?;
        check_existing(Some(object), conditions)?;

        objects.remove(key);
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> ObjectAttrsStream {
        if let Err(err) = self.ensure_open() {
            return stream::once(async move { Err(err) }).boxed();
        }

        let store = self.store.clone();
        let bucket = bucket.to_owned();
        let prefix = prefix.to_owned();
        stream::once(async move {
            let buckets = store.shared.buckets.read().await;
            let entries = match buckets.get(&bucket) {
                Some(objects) => objects
                    .range(prefix.clone()..)
                    .take_while(|(name, _)| name.starts_with(&prefix))
                    .map(|(name, object)| Ok(object.attrs(&bucket, name)))
                    .collect::<Vec<_>>(),
                None => vec![Err(StoreError::NotFound)],
            };
            stream::iter(entries)
        })
        .flatten()
        .boxed()
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        self.store
            .shared
            .sessions_closed
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use bytes::Bytes;
    use futures_util::StreamExt;

    use super::*;

    const BUCKET: &str = "test-bucket";

    async fn session(store: &InMemoryStore) -> Arc<dyn ObjectClient> {
        let config = Config::builder()
            .bucket_name(BUCKET)
            .parent_folder("root")
            .build();
        store.connect(&config).await.unwrap()
    }

    async fn drain(reader: ByteChunks) -> Bytes {
        let chunks = reader
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await;
        chunks.concat().into()
    }

    #[tokio::test]
    async fn test_put_and_get_object() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;
        let content = Bytes::from("test content");

        session
            .write(BUCKET, "test-key", content.clone(), &Conditions::none())
            .await
            .unwrap();

        let reader = session.new_reader(BUCKET, "test-key").await.unwrap();
        assert_eq!(content, drain(reader).await);

        let attrs = session.attrs(BUCKET, "test-key").await.unwrap();
        assert_eq!(12, attrs.size);
        assert_eq!(Some(md5::compute(&content).0), attrs.md5);
        assert_eq!(Metageneration::from(1), attrs.metageneration);
    }

    #[tokio::test]
    async fn test_reader_yields_chunks() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;
        let content = Bytes::from(vec![7u8; READ_CHUNK_SIZE * 2 + 10]);
        session
            .write(BUCKET, "big", content.clone(), &Conditions::none())
            .await
            .unwrap();

        let reader = session.new_reader(BUCKET, "big").await.unwrap();
        let sizes = reader
            .map(|chunk| chunk.unwrap().len())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(vec![READ_CHUNK_SIZE, READ_CHUNK_SIZE, 10], sizes);
    }

    #[tokio::test]
    async fn test_every_write_creates_a_new_generation() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;

        session
            .write(BUCKET, "k", Bytes::from("v1"), &Conditions::none())
            .await
            .unwrap();
        let first = session.attrs(BUCKET, "k").await.unwrap().generation;
        session
            .write(BUCKET, "k", Bytes::from("v2"), &Conditions::none())
            .await
            .unwrap();
        let second = session.attrs(BUCKET, "k").await.unwrap().generation;
        assert_ne!(first, second);

        // writing against the stale generation is rejected
        let result = session
            .write(
                BUCKET,
                "k",
                Bytes::from("v3"),
                &Conditions::generation_match(first),
            )
            .await;
        assert!(matches!(result.unwrap_err(), StoreError::PreconditionFailed));
        assert_eq!(Some(Bytes::from("v2")), store.object(BUCKET, "k").await);
    }

    #[tokio::test]
    async fn test_does_not_exist_condition() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;

        session
            .write(BUCKET, "k", Bytes::from("v1"), &Conditions::does_not_exist())
            .await
            .unwrap();
        let result = session
            .write(BUCKET, "k", Bytes::from("v2"), &Conditions::does_not_exist())
            .await;
        assert!(matches!(result.unwrap_err(), StoreError::PreconditionFailed));

        let result = session
            .copy(BUCKET, "k", "k", &Conditions::does_not_exist())
            .await;
        assert!(matches!(result.unwrap_err(), StoreError::PreconditionFailed));
        assert_eq!(Some(Bytes::from("v1")), store.object(BUCKET, "k").await);
    }

    #[tokio::test]
    async fn test_copy_carries_metadata() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;
        session
            .write(BUCKET, "src", Bytes::from("data"), &Conditions::none())
            .await
            .unwrap();
        let update = AttrsUpdate {
            metadata: HashMap::from([("k".to_owned(), "v".to_owned())]),
        };
        session
            .update(BUCKET, "src", update, &Conditions::none())
            .await
            .unwrap();

        session
            .copy(BUCKET, "src", "dst", &Conditions::does_not_exist())
            .await
            .unwrap();
        let attrs = session.attrs(BUCKET, "dst").await.unwrap();
        assert_eq!("v", attrs.metadata["k"]);
        assert_eq!(Metageneration::from(1), attrs.metageneration);

        let result = session
            .copy(BUCKET, "missing", "other", &Conditions::none())
            .await;
        assert!(matches!(result.unwrap_err(), StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_update_bumps_metageneration_only() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;
        session
            .write(BUCKET, "k", Bytes::from("data"), &Conditions::none())
            .await
            .unwrap();
        let before = session.attrs(BUCKET, "k").await.unwrap();

        let update = AttrsUpdate {
            metadata: HashMap::from([("k".to_owned(), "v".to_owned())]),
        };
        session
            .update(
                BUCKET,
                "k",
                update.clone(),
                &Conditions::metageneration_match(before.metageneration.clone()),
            )
            .await
            .unwrap();
        let after = session.attrs(BUCKET, "k").await.unwrap();
        assert_eq!(before.generation, after.generation);
        assert_ne!(before.metageneration, after.metageneration);

        // the token observed before the first update is now stale
        let result = session
            .update(
                BUCKET,
                "k",
                update,
                &Conditions::metageneration_match(before.metageneration),
            )
            .await;
        assert!(matches!(result.unwrap_err(), StoreError::PreconditionFailed));
    }

    #[tokio::test]
    async fn test_delete_object() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;
        session
            .write(BUCKET, "k", Bytes::from("data"), &Conditions::none())
            .await
            .unwrap();
        let attrs = session.attrs(BUCKET, "k").await.unwrap();

        let stale_generation = Generation::from(attrs_generation_value(&attrs) + 100);
        let stale = Conditions::generation_match(stale_generation);
        let result = session.delete(BUCKET, "k", &stale).await;
        assert!(matches!(result.unwrap_err(), StoreError::PreconditionFailed));

        session
            .delete(BUCKET, "k", &Conditions::generation_match(attrs.generation))
            .await
            .unwrap();
        let result = session.delete(BUCKET, "k", &Conditions::none()).await;
        assert!(matches!(result.unwrap_err(), StoreError::NotFound));
        assert_eq!(0, store.object_count(BUCKET).await);
    }

    fn attrs_generation_value(attrs: &ObjectAttrs) -> i64 {
        attrs.generation.as_str().parse().unwrap()
    }

    #[tokio::test]
    async fn test_list_objects_with_prefix() {
        let store = InMemoryStore::with_buckets([BUCKET]);
        let session = session(&store).await;
        for key in ["root/dir/a", "root/dir/b", "root/dirx", "root/other/c", "zzz"] {
            session
                .write(BUCKET, key, Bytes::from(key.to_owned()), &Conditions::none())
                .await
                .unwrap();
        }

        let names = session
            .list(BUCKET, "root/dir")
            .map(|attrs| attrs.unwrap().name)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(vec!["root/dir/a", "root/dir/b", "root/dirx"], names);

        let missing = session
            .list("no-such-bucket", "")
            .collect::<Vec<_>>()
            .await;
        assert!(matches!(missing[0], Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_connect_and_close_sessions() {
        let store = InMemoryStore::new();
        let config = Config::builder()
            .bucket_name(BUCKET)
            .parent_folder("root")
            .build();
        let result = store.connect(&config).await;
        assert!(matches!(result.unwrap_err(), StoreError::Connect(_)));
        assert_eq!(0, store.sessions_opened());

        store.create_bucket(BUCKET).await;
        let session = store.connect(&config).await.unwrap();
        assert_eq!(1, store.sessions_opened());

        session.close().await.unwrap();
        assert_eq!(1, store.sessions_closed());
        assert!(matches!(
            session.attrs(BUCKET, "k").await.unwrap_err(),
            StoreError::Closed
        ));
        assert!(matches!(session.close().await.unwrap_err(), StoreError::Closed));
        assert_eq!(1, store.sessions_closed());
    }
}
