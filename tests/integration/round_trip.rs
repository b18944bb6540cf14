//! Chunk-then-join round trips entirely in memory.
//!
//! Every chunker record, the final remainder included, is fed back to the
//! joiner as one chunk, which must reproduce the input and its checksum.

use futures::StreamExt;
use rand::seq::SliceRandom;
use sliver_cas::{CasError, ChunkDescriptor, JoinResult, join};
use sliver_integration_tests::{chunk_in_memory, join_in_memory, test_data, test_data_seeded};
use sliver_types::Checksum;

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_round_trip_across_sizes() {
    for &(size, chunk_size) in &[
        (0usize, 1u32),
        (1, 1),
        (999, 1000),
        (1000, 1000),
        (1001, 1000),
        (2500, 1000),
        (65_537, 4096),
        (300_000, 65_536),
    ] {
        let data = test_data(size);
        let chunked = chunk_in_memory(&data, chunk_size).await;
        assert_eq!(chunked.checksum, Checksum::from_data(&data));

        let joined = join_in_memory(chunked.checksum, chunked.descriptors)
            .await
            .unwrap_or_else(|e| panic!("size {size}, chunk {chunk_size}: {e}"));
        assert_eq!(joined.data, data, "size {size}, chunk {chunk_size}");
        assert_eq!(joined.checksum, chunked.checksum);
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_chunk_counts_follow_window_size() {
    let data = test_data(2500);
    let chunked = chunk_in_memory(&data, 1000).await;
    let sizes: Vec<usize> = chunked.chunks.iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);

    // Exact multiple: the final remainder is empty but still a record.
    let data = test_data(3000);
    let chunked = chunk_in_memory(&data, 1000).await;
    let sizes: Vec<usize> = chunked.chunks.iter().map(|c| c.len()).collect();
    assert_eq!(sizes, vec![1000, 1000, 1000, 0]);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_empty_input_round_trips_as_single_empty_chunk() {
    let chunked = chunk_in_memory(b"", 1000).await;
    assert_eq!(chunked.descriptors.len(), 1);
    assert_eq!(chunked.checksum, Checksum::from_data(b""));

    let joined = join_in_memory(chunked.checksum, chunked.descriptors)
        .await
        .unwrap();
    assert!(joined.data.is_empty());
    assert_eq!(joined.manifest.len(), 1);
    assert_eq!(joined.manifest[0].size, 0);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_shuffled_descriptors_join_identically() {
    let data = test_data_seeded(50_000, 7);
    let chunked = chunk_in_memory(&data, 1024).await;

    let mut shuffled: Vec<ChunkDescriptor> = chunked.descriptors.clone();
    shuffled.shuffle(&mut rand::rng());

    let ordered = join_in_memory(chunked.checksum, chunked.descriptors)
        .await
        .unwrap();
    let reordered = join_in_memory(chunked.checksum, shuffled).await.unwrap();
    assert_eq!(ordered.data, data);
    assert_eq!(reordered.data, data);
    assert_eq!(ordered.manifest, reordered.manifest);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_joined_manifest_matches_chunks() {
    let data = test_data(10_000);
    let chunked = chunk_in_memory(&data, 3000).await;
    let expected: Vec<(u64, Checksum, u64)> = chunked
        .chunks
        .iter()
        .enumerate()
        .map(|(i, c)| (i as u64, Checksum::from_data(c), c.len() as u64))
        .collect();

    let joined = join_in_memory(chunked.checksum, chunked.descriptors)
        .await
        .unwrap();
    let actual: Vec<(u64, Checksum, u64)> = joined
        .manifest
        .iter()
        .map(|r| (r.index, r.checksum, r.size))
        .collect();
    assert_eq!(actual, expected);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_dropped_chunk_is_rejected_before_any_output() {
    let data = test_data(5000);
    let mut chunked = chunk_in_memory(&data, 1000).await;
    chunked.descriptors.remove(2);

    let mut stream = join(chunked.checksum, chunked.descriptors);
    let first = stream.next().await.expect("one item");
    assert!(matches!(
        first,
        Err(CasError::InvalidChunk {
            expected: 2,
            found: 3
        })
    ));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_wrong_file_checksum_emits_all_chunks_then_fails() {
    let data = test_data(4500);
    let chunked = chunk_in_memory(&data, 1000).await;
    let count = chunked.descriptors.len();

    let mut stream = join(Checksum::from_data(b"some other file"), chunked.descriptors);
    let mut emitted = 0;
    let mut outcome = None;
    while let Some(result) = stream.next().await {
        match result {
            Ok(JoinResult::Intermediate { .. }) => emitted += 1,
            Ok(JoinResult::Final { .. }) => panic!("final must not be emitted"),
            Err(e) => outcome = Some(e),
        }
    }

    assert_eq!(emitted, count);
    assert!(matches!(
        outcome,
        Some(CasError::InvalidFinalChecksum { .. })
    ));
}
