use std::collections::BTreeSet;

use bytes::Bytes;
use file_storage::{
    Content,
    CustomMetadata,
    DownloadOptions,
    FilesystemConfig,
    ListOptions,
    LocalAdapter,
    StorageAdapter,
    StorageError,
    UploadOptions,
};
use futures::stream;
use tempfile::TempDir;

fn adapter(dir: &TempDir, base_path: Option<&str>) -> LocalAdapter {
    LocalAdapter::new(FilesystemConfig {
        root_dir: dir.path().to_path_buf(),
        base_path: base_path.map(str::to_string),
        base_url: None,
    })
    .unwrap()
}

#[tokio::test]
async fn upload_then_download_returns_same_bytes() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, Some("uploads/"));

    let uploaded = store
        .upload("docs/hello.txt", Content::from("hello"), UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(uploaded.size_in_bytes, 5);

    let file = store
        .download("docs/hello.txt", DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(file.content, Bytes::from_static(b"hello"));
    assert_eq!(file.metadata.name, "hello.txt");
    assert_eq!(file.metadata.mime_type, "text/plain");
    assert_eq!(file.metadata.size_in_bytes, 5);
}

#[tokio::test]
async fn every_content_shape_is_normalized() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);

    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"ab")),
        Ok(Bytes::from_static(b"cd")),
    ];
    let streamed = store
        .upload(
            "stream.bin",
            Content::from_stream(stream::iter(chunks)),
            UploadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(streamed.size_in_bytes, 4);

    let source = dir.path().join("source.dat");
    tokio::fs::write(&source, vec![7u8; 1024]).await.unwrap();
    let file = tokio::fs::File::open(&source).await.unwrap();
    let read = store
        .upload("reader.bin", Content::from_file(file), UploadOptions::default())
        .await
        .unwrap();
    assert_eq!(read.size_in_bytes, 1024);

    let downloaded = store
        .download("stream.bin", DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(downloaded.content, Bytes::from_static(b"abcd"));
}

#[tokio::test]
async fn failing_stream_aborts_upload() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);

    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"ab")),
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
    ];
    let err = store
        .upload(
            "broken.bin",
            Content::from_stream(stream::iter(chunks)),
            UploadOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert!(!store.exists("broken.bin").await.unwrap());
}

#[tokio::test]
async fn upload_replaces_existing_file() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("a.txt", Content::from("first version"), UploadOptions::default())
        .await
        .unwrap();
    store
        .upload("a.txt", Content::from("second"), UploadOptions::default())
        .await
        .unwrap();

    let file = store.download("a.txt", DownloadOptions::default()).await.unwrap();
    assert_eq!(file.content, Bytes::from_static(b"second"));
    assert_eq!(file.metadata.size_in_bytes, 6);
}

#[tokio::test]
async fn custom_metadata_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    let mut custom = CustomMetadata::new();
    custom.insert("Owner".to_string(), serde_json::json!("alice"));
    custom.insert("pages".to_string(), serde_json::json!(12));

    store
        .upload(
            "report.pdf",
            Content::from(vec![1u8, 2, 3]),
            UploadOptions {
                content_type: Some("application/x-custom".to_string()),
                metadata: Some(custom.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let meta = store.get_metadata("report.pdf").await.unwrap().unwrap();
    assert_eq!(meta.mime_type, "application/x-custom");
    assert_eq!(meta.custom_metadata, Some(custom));
}

#[tokio::test]
async fn missing_files() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);

    let err = store
        .download("missing.txt", DownloadOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.get_metadata("missing.txt").await.unwrap().is_none());
    assert!(!store.exists("missing.txt").await.unwrap());
    assert!(!store.delete("missing.txt").await.unwrap());

    let err = store.copy("missing.txt", "b.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn delete_removes_file_and_sidecar() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("a.txt", Content::from("x"), UploadOptions::default())
        .await
        .unwrap();

    assert!(store.delete("a.txt").await.unwrap());
    assert!(!store.exists("a.txt").await.unwrap());
    assert!(!dir.path().join("a.txt.metadata.json").exists());
    assert!(!store.delete("a.txt").await.unwrap());
}

#[tokio::test]
async fn byte_ranges_are_inclusive_and_clamped() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("digits.txt", Content::from("0123456789"), UploadOptions::default())
        .await
        .unwrap();

    store
        .upload("hello.txt", Content::from("hello world"), UploadOptions::default())
        .await
        .unwrap();
    let hello = store
        .download("hello.txt", DownloadOptions::range(0, 4))
        .await
        .unwrap();
    assert_eq!(hello.content, Bytes::from_static(b"hello"));

    let head = store
        .download("digits.txt", DownloadOptions::range(0, 4))
        .await
        .unwrap();
    assert_eq!(head.content, Bytes::from_static(b"01234"));
    assert_eq!(head.metadata.size_in_bytes, 5);

    let tail = store
        .download("digits.txt", DownloadOptions::range(7, 100))
        .await
        .unwrap();
    assert_eq!(tail.content, Bytes::from_static(b"789"));

    let single = store
        .download("digits.txt", DownloadOptions::range(3, 3))
        .await
        .unwrap();
    assert_eq!(single.content, Bytes::from_static(b"3"));

    let err = store
        .download("digits.txt", DownloadOptions::range(5, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidRange { .. }));

    let err = store
        .download("digits.txt", DownloadOptions::range(10, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidRange { .. }));
}

#[tokio::test]
async fn open_ended_ranges_read_to_the_end() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("hello.txt", Content::from("hello world"), UploadOptions::default())
        .await
        .unwrap();

    let whole = store
        .download("hello.txt", DownloadOptions::range(0, u64::MAX))
        .await
        .unwrap();
    assert_eq!(whole.content, Bytes::from_static(b"hello world"));
    assert_eq!(whole.metadata.size_in_bytes, 11);

    let tail = store
        .download("hello.txt", DownloadOptions::range(6, u64::MAX))
        .await
        .unwrap();
    assert_eq!(tail.content, Bytes::from_static(b"world"));
}

#[tokio::test]
async fn empty_file_has_no_satisfiable_range() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("empty.bin", Content::from(Vec::new()), UploadOptions::default())
        .await
        .unwrap();

    let file = store
        .download("empty.bin", DownloadOptions::default())
        .await
        .unwrap();
    assert!(file.content.is_empty());

    for (start, end) in [(0, 0), (0, 10), (0, u64::MAX)] {
        let err = store
            .download("empty.bin", DownloadOptions::range(start, end))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRange { .. }), "{start}-{end}: {err}");
    }
}

#[tokio::test]
async fn listing_pages_through_every_file_once() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, Some("tenant"));
    let mut expected = BTreeSet::new();
    for i in 0..7 {
        let key = format!("dir{}/file-{i}.txt", i % 3);
        store
            .upload(&key, Content::from(format!("{i}")), UploadOptions::default())
            .await
            .unwrap();
        expected.insert(key);
    }

    let mut seen = BTreeSet::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = store
            .list(ListOptions::default().with_limit(3).with_cursor(cursor))
            .await
            .unwrap();
        pages += 1;
        assert!(page.files.len() <= 3);
        for file in &page.files {
            assert!(seen.insert(file.key.clone()), "duplicate {}", file.key);
        }
        if !page.has_more {
            assert!(page.next_cursor.is_none());
            break;
        }
        cursor = page.next_cursor;
        assert!(cursor.is_some());
    }
    assert_eq!(pages, 3);
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn listed_keys_feed_back_into_operations() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, Some("/a/b/"));
    store
        .upload("nested/x.json", Content::from("{}"), UploadOptions::default())
        .await
        .unwrap();

    let listed = store
        .list(ListOptions::default().with_prefix("nested/"))
        .await
        .unwrap();
    assert_eq!(listed.files.len(), 1);
    let key = listed.files[0].key.clone();
    assert_eq!(key, "nested/x.json");
    assert_eq!(listed.files[0].mime_type, "application/json");

    let file = store.download(&key, DownloadOptions::default()).await.unwrap();
    assert_eq!(file.content, Bytes::from_static(b"{}"));
    assert!(store.delete(&key).await.unwrap());
}

#[tokio::test]
async fn copy_and_move() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("a.txt", Content::from("data"), UploadOptions::default())
        .await
        .unwrap();

    let copied = store.copy("a.txt", "copies/b.txt").await.unwrap();
    assert_eq!(copied.key, "copies/b.txt");
    for key in ["a.txt", "copies/b.txt"] {
        let file = store.download(key, DownloadOptions::default()).await.unwrap();
        assert_eq!(file.content, Bytes::from_static(b"data"));
    }

    let moved = store.move_object("a.txt", "moved/c.txt").await.unwrap();
    assert_eq!(moved.name, "c.txt");
    assert_eq!(moved.size_in_bytes, 4);
    assert!(!store.exists("a.txt").await.unwrap());
    let file = store
        .download("moved/c.txt", DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(file.content, Bytes::from_static(b"data"));

    let err = store.move_object("a.txt", "d.txt").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!store.exists("d.txt").await.unwrap());
}

#[tokio::test]
async fn move_onto_same_file_keeps_it() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, Some("tenant"));
    store
        .upload("a.txt", Content::from("keep me"), UploadOptions::default())
        .await
        .unwrap();

    for destination in ["a.txt", "./a.txt", "/a.txt", "a.txt/"] {
        let moved = store.move_object("a.txt", destination).await.unwrap();
        assert_eq!(moved.name, "a.txt");
        assert_eq!(moved.size_in_bytes, 7);
        let file = store.download("a.txt", DownloadOptions::default()).await.unwrap();
        assert_eq!(file.content, Bytes::from_static(b"keep me"));
    }

    let err = store.move_object("gone.txt", "./gone.txt").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn copy_onto_same_file_keeps_it() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    store
        .upload("a.txt", Content::from("keep me"), UploadOptions::default())
        .await
        .unwrap();

    let copied = store.copy("a.txt", "./a.txt").await.unwrap();
    assert_eq!(copied.size_in_bytes, 7);
    let file = store.download("a.txt", DownloadOptions::default()).await.unwrap();
    assert_eq!(file.content, Bytes::from_static(b"keep me"));
    assert!(store.exists("a.txt").await.unwrap());
}

#[tokio::test]
async fn empty_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let store = adapter(&dir, None);
    let err = store
        .upload("", Content::from("x"), UploadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey { .. }));
}
