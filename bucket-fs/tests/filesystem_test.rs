/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */


use std::collections::HashMap;

use bucket_fs::error::{ErrorKind, Operation, Stage};
use bucket_fs::store::in_memory::InMemoryStore;
use bucket_fs::{Config, FileSystem, UserMetadata};
use bytes::Bytes;
use test_utils::{config, random_bytes, setup, setup_faulty, Call, Fault, BUCKET};

fn user_metadata(pairs: &[(&str, &str)]) -> UserMetadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_connect_rejects_invalid_config_without_session() {
    let store = InMemoryStore::with_buckets([BUCKET]);
    let configs = [
        Config::builder().parent_folder("root").build(),
        Config::builder().bucket_name(BUCKET).build(),
        Config::builder()
            .bucket_name(BUCKET)
            .parent_folder("root/../other")
            .build(),
    ];

    for config in configs {
        let err = FileSystem::connect(config, &store).await.unwrap_err();
        assert_eq!(&ErrorKind::ConfigInvalid, err.kind());
        assert_eq!(Some(Operation::Connect), err.operation());
    }
    assert_eq!(0, store.sessions_opened());
}

#[tokio::test]
async fn test_connect_unknown_bucket() {
    let store = InMemoryStore::new();
    let err = FileSystem::connect(config(), &store).await.unwrap_err();
    assert_eq!(&ErrorKind::ConnectionFailed, err.kind());
    assert_eq!(Some(BUCKET), err.key());
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (store, fs) = setup().await;
    let clone = fs.clone();
    assert_eq!(1, store.sessions_opened());

    fs.teardown().await.unwrap();
    assert_eq!(1, store.sessions_closed());

    let err = clone.stat("a.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::SessionClosed, err.kind());
    assert_eq!(Some(Operation::Stat), err.operation());

    let err = clone.teardown().await.unwrap_err();
    assert_eq!(&ErrorKind::SessionClosed, err.kind());
    assert_eq!(1, store.sessions_closed());
}

#[tokio::test]
async fn test_write_read_round_trip() {
    let (store, fs) = setup().await;
    let data = random_bytes(200 * 1024);
    let metadata = user_metadata(&[("owner", "ops"), ("stage", "raw")]);

    let written = fs
        .write(data.clone(), "dir/a.bin", metadata.clone())
        .await
        .unwrap();
    assert_eq!(BUCKET, written.bucket());
    assert_eq!("root/dir/a.bin", written.object_key());
    assert_eq!(data.len() as u64, written.size());
    assert_eq!(hex::encode(md5::compute(&data).0), written.md5());
    assert_eq!(&metadata, written.user_metadata());

    let (read, meta) = fs.read("dir/a.bin").await.unwrap();
    assert_eq!(data, read);
    assert_eq!(written, meta);
    assert_eq!(Some(data), store.object(BUCKET, "root/dir/a.bin").await);
}

#[tokio::test]
async fn test_write_without_metadata_skips_update() {
    let (_store, client, fs) = setup_faulty().await;

    let meta = fs
        .write(&b"hello world"[..], "a.txt", HashMap::new())
        .await
        .unwrap();
    assert!(meta.user_metadata().is_empty());
    assert_eq!(vec![Call::Write, Call::Attrs], client.calls());
}

#[tokio::test]
async fn test_write_with_metadata_patches_after_upload() {
    let (_store, client, fs) = setup_faulty().await;

    fs.write(&b"hello world"[..], "a.txt", user_metadata(&[("k", "v")]))
        .await
        .unwrap();
    assert_eq!(
        vec![Call::Write, Call::Attrs, Call::Update, Call::Attrs],
        client.calls()
    );
}

#[tokio::test]
async fn test_write_preconditions_checked_before_io() {
    let (store, client, fs) = setup_faulty().await;

    let err = fs
        .write(Bytes::new(), "a.txt", HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::EmptyInput, err.kind());
    assert_eq!(Some(Operation::Write), err.operation());
    assert_eq!(None, err.stage());

    let err = fs
        .write(&b"data"[..], "", HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::EmptyInput, err.kind());

    let err = fs
        .write(&b"data"[..], "../escape.txt", HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(&ErrorKind::InvalidPath, err.kind());

    assert!(client.calls().is_empty());
    assert_eq!(0, store.object_count(BUCKET).await);
}

#[tokio::test]
async fn test_overwrite_replaces_content() {
    let (_store, fs) = setup().await;
    fs.write(&b"first"[..], "a.txt", user_metadata(&[("v", "1")]))
        .await
        .unwrap();
    let meta = fs
        .write(&b"second"[..], "a.txt", HashMap::new())
        .await
        .unwrap();

    assert_eq!(6, meta.size());
    assert!(meta.user_metadata().is_empty());
    let (data, _) = fs.read("a.txt").await.unwrap();
    assert_eq!(Bytes::from_static(b"second"), data);
}

#[tokio::test]
async fn test_stat() {
    let (_store, fs) = setup().await;
    let written = fs
        .write(&b"hello"[..], "a.txt", user_metadata(&[("k", "v")]))
        .await
        .unwrap();

    assert_eq!(written, fs.stat("./a.txt").await.unwrap());

    let err = fs.stat("missing.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::NotFound, err.kind());
    assert_eq!(Some(Stage::Lookup), err.stage());
    assert_eq!(Some("root/missing.txt"), err.key());
}

#[tokio::test]
async fn test_read_missing() {
    let (_store, fs) = setup().await;
    let err = fs.read("missing.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::NotFound, err.kind());
    assert_eq!(Some(Operation::Read), err.operation());
    assert_eq!(Some(Stage::Read), err.stage());
}

#[tokio::test]
async fn test_list() {
    let (_store, fs) = setup().await;
    fs.write(&b"first"[..], "dir/a", HashMap::new())
        .await
        .unwrap();
    fs.write(&b"second!"[..], "dir/b", user_metadata(&[("k", "v")]))
        .await
        .unwrap();
    fs.write(&b"elsewhere"[..], "other/c", HashMap::new())
        .await
        .unwrap();

    let listed = fs.list("dir").await.unwrap();
    assert_eq!(2, listed.len());
    assert_eq!(5, listed["root/dir/a"].size());
    assert_eq!(7, listed["root/dir/b"].size());
    assert_eq!("v", listed["root/dir/b"].user_metadata()["k"]);

    assert_eq!(3, fs.list("").await.unwrap().len());
    assert!(fs.list("nothing-here").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_parent_folder_excludes_sibling_folders() {
    let (store, fs) = setup().await;
    let sibling_config = Config::builder()
        .bucket_name(BUCKET)
        .parent_folder("root-archive")
        .build();
    let sibling = FileSystem::connect(sibling_config, &store).await.unwrap();
    sibling
        .write(&b"archived"[..], "x", HashMap::new())
        .await
        .unwrap();
    fs.write(&b"current"[..], "a", HashMap::new())
        .await
        .unwrap();

    for prefix in ["", "/", "."] {
        let listed = fs.list(prefix).await.unwrap();
        let keys = listed.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(vec!["root/a"], keys, "prefix {prefix:?}");
    }
    // the sibling folder only sees its own object
    assert_eq!(1, sibling.list("").await.unwrap().len());
    assert_eq!(2, store.object_count(BUCKET).await);
}

#[tokio::test]
async fn test_copy() {
    let (_store, fs) = setup().await;
    fs.write(&b"payload"[..], "a.txt", user_metadata(&[("k", "v")]))
        .await
        .unwrap();

    fs.copy("a.txt", "b.txt").await.unwrap();

    let (data, meta) = fs.read("b.txt").await.unwrap();
    assert_eq!(Bytes::from_static(b"payload"), data);
    assert_eq!("root/b.txt", meta.object_key());
    assert_eq!("v", meta.user_metadata()["k"]);
    // the source is untouched
    fs.stat("a.txt").await.unwrap();
}

#[tokio::test]
async fn test_copy_same_path_makes_no_store_calls() {
    let (_store, client, fs) = setup_faulty().await;

    for (from, to) in [("a.txt", "a.txt"), ("a.txt", "./a.txt"), ("dir//a", "dir/a/")] {
        let err = fs.copy(from, to).await.unwrap_err();
        assert_eq!(&ErrorKind::SamePath, err.kind(), "{from} -> {to}");
        assert_eq!(Some(Operation::Copy), err.operation());
    }
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_copy_never_overwrites() {
    let (store, fs) = setup().await;
    fs.write(&b"source"[..], "a.txt", HashMap::new())
        .await
        .unwrap();
    fs.write(&b"destination"[..], "b.txt", HashMap::new())
        .await
        .unwrap();

    let err = fs.copy("a.txt", "b.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::AlreadyExists, err.kind());
    assert_eq!(Some(Stage::Copy), err.stage());
    assert_eq!(Some("root/a.txt -> root/b.txt"), err.key());
    assert_eq!(
        Some(Bytes::from_static(b"destination")),
        store.object(BUCKET, "root/b.txt").await
    );
}

#[tokio::test]
async fn test_copy_missing_source() {
    let (_store, fs) = setup().await;
    let err = fs.copy("missing.txt", "b.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::NotFound, err.kind());
    assert_eq!(Some(Stage::Copy), err.stage());
}

#[tokio::test]
async fn test_delete() {
    let (store, fs) = setup().await;
    fs.write(&b"data"[..], "a.txt", HashMap::new())
        .await
        .unwrap();

    fs.delete("a.txt").await.unwrap();
    assert_eq!(0, store.object_count(BUCKET).await);

    let err = fs.delete("a.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::NotFound, err.kind());
    assert_eq!(Some(Operation::Delete), err.operation());
    assert_eq!(Some(Stage::Lookup), err.stage());
}

#[tokio::test]
async fn test_delete_keeps_concurrently_replaced_object() {
    let (store, client, fs) = setup_faulty().await;
    fs.write(&b"observed"[..], "a.txt", HashMap::new())
        .await
        .unwrap();
    client.fault(
        Call::Delete,
        1,
        Fault::Overwrite(Bytes::from_static(b"replaced")),
    );

    let err = fs.delete("a.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::PreconditionFailed, err.kind());
    assert_eq!(Some(Stage::Delete), err.stage());
    assert_eq!(
        Some(Bytes::from_static(b"replaced")),
        store.object(BUCKET, "root/a.txt").await
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_deletes() {
    let (_store, fs) = setup().await;

    for i in 0..20 {
        let path = format!("race-{i}.txt");
        fs.write(random_bytes(64), &path, HashMap::new())
            .await
            .unwrap();

        let first = tokio::spawn({
            let (fs, path) = (fs.clone(), path.clone());
            async move { fs.delete(&path).await }
        });
        let second = tokio::spawn({
            let (fs, path) = (fs.clone(), path.clone());
            async move { fs.delete(&path).await }
        });
        let results = [first.await.unwrap(), second.await.unwrap()];

        assert_eq!(1, results.iter().filter(|r| r.is_ok()).count());
        let err = results.into_iter().find_map(Result::err).unwrap();
        assert!(
            matches!(
                err.kind(),
                ErrorKind::NotFound | ErrorKind::PreconditionFailed
            ),
            "unexpected error: {err}"
        );
    }
}

#[tokio::test]
async fn test_rename() {
    let (store, fs) = setup().await;
    let data = random_bytes(1024);
    fs.write(data.clone(), "a.bin", user_metadata(&[("k", "v")]))
        .await
        .unwrap();

    fs.rename("a.bin", "moved/b.bin").await.unwrap();

    let (read, meta) = fs.read("moved/b.bin").await.unwrap();
    assert_eq!(data, read);
    assert_eq!("root/moved/b.bin", meta.object_key());
    assert_eq!("v", meta.user_metadata()["k"]);
    let err = fs.read("a.bin").await.unwrap_err();
    assert_eq!(&ErrorKind::NotFound, err.kind());
    assert_eq!(Some("root/a.bin"), err.key());
    assert_eq!(1, store.object_count(BUCKET).await);
}

#[tokio::test]
async fn test_rename_onto_existing() {
    let (store, fs) = setup().await;
    fs.write(&b"source"[..], "a.txt", HashMap::new())
        .await
        .unwrap();
    fs.write(&b"destination"[..], "b.txt", HashMap::new())
        .await
        .unwrap();

    let err = fs.rename("a.txt", "b.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::AlreadyExists, err.kind());
    assert_eq!(Some(Operation::Move), err.operation());
    assert!(!err.is_partial_failure());
    assert_eq!(2, store.object_count(BUCKET).await);

    let err = fs.rename("a.txt", "./a.txt").await.unwrap_err();
    assert_eq!(&ErrorKind::SamePath, err.kind());
}
