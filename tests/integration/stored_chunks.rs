//! Chunker → store → joiner pipelines over both store backends.

use std::sync::Arc;

use bytes::Bytes;
use sliver_cas::{AccessError, CasError, ChunkAccessor, join_to_writer};
use sliver_integration_tests::{
    join_in_memory, split_into_store, store_descriptors, test_data, test_data_seeded,
};
use sliver_store::{ChunkStore, FileStore, MemoryStore};
use sliver_types::Checksum;

/// Store wrapper whose reads fail for one index.
struct FlakyStore {
    inner: MemoryStore,
    broken: u64,
}

#[async_trait::async_trait]
impl ChunkAccessor for FlakyStore {
    async fn fetch(&self, index: u64) -> Result<Option<Bytes>, AccessError> {
        if index == self.broken {
            return Err("disk unplugged".into());
        }
        self.inner.fetch(index).await
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_memory_store_pipeline() {
    let data = test_data(100_000);
    let store = Arc::new(MemoryStore::new(u64::MAX));
    let manifest = split_into_store(store.as_ref(), &data, 4096).await;

    assert_eq!(manifest.total_size, 100_000);
    assert_eq!(manifest.chunks.len(), 25);
    assert_eq!(store.list().await.unwrap().len(), 25);
    assert_eq!(store.used_bytes(), 100_000);

    let joined = join_in_memory(manifest.checksum, store_descriptors(&manifest, store))
        .await
        .unwrap();
    assert_eq!(joined.data, data);
    assert_eq!(joined.manifest, manifest.chunks);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_file_store_pipeline_with_persisted_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let data = test_data(50_001);

    {
        let store = FileStore::new(dir.path()).unwrap();
        let manifest = split_into_store(&store, &data, 10_000).await;
        store.write_manifest(&manifest).await.unwrap();
    }

    // Reopen as a fresh store: everything comes from disk.
    let store = Arc::new(FileStore::new(dir.path()).unwrap());
    let manifest = store.read_manifest().await.unwrap();
    assert_eq!(manifest.chunks.len(), 6);
    for record in &manifest.chunks {
        assert!(store.verify(record.index, &record.checksum).await.unwrap());
    }

    let mut output = Vec::new();
    let summary = join_to_writer(
        manifest.checksum,
        store_descriptors(&manifest, store),
        &mut output,
    )
    .await
    .unwrap();
    assert_eq!(output, data);
    assert_eq!(summary.bytes_written, 50_001);
    assert_eq!(summary.checksum, Checksum::from_data(&data));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_tampered_chunk_file_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let data = test_data(30_000);
    let store = Arc::new(FileStore::new(dir.path()).unwrap());
    let manifest = split_into_store(store.as_ref(), &data, 10_000).await;

    let mut tampered = store.get(1).await.unwrap().unwrap().to_vec();
    tampered[0] ^= 0xFF;
    store.put(1, Bytes::from(tampered)).await.unwrap();

    let mut output = Vec::new();
    let err = join_to_writer(
        manifest.checksum,
        store_descriptors(&manifest, store),
        &mut output,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CasError::InvalidChecksum { index: 1, .. }));
    // Only the chunk before the tampered one reached the writer.
    assert_eq!(output, &data[..10_000]);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_deleted_chunk_is_reported_missing() {
    let data = test_data(9_000);
    let store = Arc::new(MemoryStore::new(u64::MAX));
    let manifest = split_into_store(store.as_ref(), &data, 2_000).await;
    store.delete(3).await.unwrap();

    let err = join_in_memory(manifest.checksum, store_descriptors(&manifest, store))
        .await
        .unwrap_err();
    assert!(matches!(err, CasError::MissingChunk { index: 3 }));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_accessor_failure_is_not_reported_as_missing() {
    let data = test_data(9_000);
    let inner = MemoryStore::new(u64::MAX);
    let manifest = split_into_store(&inner, &data, 2_000).await;
    let store = Arc::new(FlakyStore { inner, broken: 2 });

    let err = join_in_memory(manifest.checksum, store_descriptors(&manifest, store))
        .await
        .unwrap_err();
    match err {
        CasError::Access { index, source } => {
            assert_eq!(index, 2);
            assert_eq!(source.to_string(), "disk unplugged");
        }
        other => panic!("expected access error, got {other:?}"),
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_chunks_swapped_between_files_fail_whole_file_check() {
    // Two files whose chunk sets are mixed together: every chunk is valid
    // on its own, so only the whole-file checksum catches it.
    let a = test_data_seeded(4_000, 1);
    let b = test_data_seeded(4_000, 2);
    let store_a = MemoryStore::new(u64::MAX);
    let store_b = MemoryStore::new(u64::MAX);
    let manifest_a = split_into_store(&store_a, &a, 1_000).await;
    let manifest_b = split_into_store(&store_b, &b, 1_000).await;

    let mixed = MemoryStore::new(u64::MAX);
    let mut mixed_manifest = manifest_a.clone();
    for record in &manifest_a.chunks {
        let (source, chunk) = if record.index == 1 {
            (&store_b, &manifest_b.chunks[1])
        } else {
            (&store_a, record)
        };
        mixed
            .put(record.index, source.get(record.index).await.unwrap().unwrap())
            .await
            .unwrap();
        mixed_manifest.chunks[record.index as usize] = *chunk;
    }

    let err = join_in_memory(
        manifest_a.checksum,
        store_descriptors(&mixed_manifest, Arc::new(mixed)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CasError::InvalidFinalChecksum { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(30000)]
async fn test_concurrent_joins_share_one_store() {
    let data = test_data(200_000);
    let store = Arc::new(MemoryStore::new(u64::MAX));
    let manifest = split_into_store(store.as_ref(), &data, 8_192).await;
    let data = Arc::new(data);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let descriptors = store_descriptors(&manifest, store.clone());
        let expected = manifest.checksum;
        let data = data.clone();
        handles.push(tokio::spawn(async move {
            let joined = join_in_memory(expected, descriptors).await.unwrap();
            assert_eq!(joined.data, *data);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}
