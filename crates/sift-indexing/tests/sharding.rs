//! Per-collection ordering and cross-collection parallelism.

mod common;

use std::time::Duration;

use sift_indexing::router::shard_for_collection;
use sift_types::RoutePath;

use common::*;

const NUM_SHARDS: usize = 4;

/// Find two collection names that hash to different shards.
fn distinct_shard_collections() -> (String, String) {
    let first = "coll0".to_string();
    let first_shard = shard_for_collection(&first, NUM_SHARDS);
    for i in 1..64 {
        let candidate = format!("coll{i}");
        if shard_for_collection(&candidate, NUM_SHARDS) != first_shard {
            return (first, candidate);
        }
    }
    unreachable!("xxh3 cannot map 64 names to one of {NUM_SHARDS} shards");
}

#[test]
fn collections_serialize_internally_and_overlap_across_shards() {
    let (coll_x, coll_y) = distinct_shard_collections();

    let server = MockFrontend::new();
    let log = CallLog::new();
    let hash = server.register(RoutePath::new(
        "POST",
        DOCUMENTS_ROUTE,
        recording_handler(log.clone(), Duration::from_millis(100)),
        false,
    ));
    let (_dir, store) = open_store();
    let indexer = new_indexer(server, store, NUM_SHARDS);
    let handle = start(&indexer);

    // Alternate complete requests between the two collections, ids in
    // arrival order.
    let mut next_id = 1000u64;
    for round in 0..3 {
        for coll in [&coll_x, &coll_y] {
            let body = format!("{coll}-{round}");
            let (req, res) = write_request(next_id, hash, coll, &body, true);
            indexer.enqueue(req, res).unwrap();
            next_id += 1;
        }
    }

    assert!(wait_until(Duration::from_secs(10), || log.len() == 6));

    // Within one collection, completion order matches enqueue order.
    assert_eq!(
        log.bodies_for(&coll_x),
        vec![
            format!("{coll_x}-0"),
            format!("{coll_x}-1"),
            format!("{coll_x}-2")
        ]
    );
    assert_eq!(
        log.bodies_for(&coll_y),
        vec![
            format!("{coll_y}-0"),
            format!("{coll_y}-1"),
            format!("{coll_y}-2")
        ]
    );

    // Distinct shards run on distinct workers: with 100 ms of handler
    // latency, at least one x/y pair must overlap in time.
    let calls = log.calls();
    let overlapped = calls
        .iter()
        .filter(|call| call.collection == coll_x)
        .any(|x| {
            calls
                .iter()
                .filter(|call| call.collection == coll_y)
                .any(|y| x.started < y.finished && y.started < x.finished)
        });
    assert!(overlapped, "expected overlapping handler executions");

    stop(&indexer, handle);
}
