mod common;

use std::sync::Arc;
use std::time::Duration;

use common::cache_over;
use common::get_line;
use common::ranges;
use common::sorted;
use common::LineSource;
use region_cache::prelude::*;
use region_cache::test::line;
use tokio::task::JoinSet;

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn concurrent_overlapping_gets_fetch_once() {
    let source = Arc::new(LineSource::new(1..=100).gated());
    let cache = cache_over(&source);

    let mut callers = JoinSet::new();
    for i in 0..8 {
        let cache = Arc::clone(&cache);
        callers.spawn(async move {
            // All of them fall within the first caller's range.
            let (lo, hi) = if i == 0 { (10, 20) } else { (10 + i, 20 - i / 2) };
            let cancel = CancellationToken::new();
            (lo, hi, cache.get(vec![line(lo, hi)], &cancel).await)
        });
    }

    source.wait_for_calls(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Plenty of permits: a duplicate fetch must show up in the call count rather than hang the test.
    source.release(100);

    while let Some(joined) = callers.join_next().await {
        let (lo, hi, result) = joined.expect("caller task");
        assert_eq!(sorted(result.expect("records")), (lo..=hi).collect::<Vec<_>>());
    }

    cache.settle().await;
    // The first caller is not guaranteed to be the one that reached the ledger first, so the very first fetch may
    // cover a narrower range; what matters is that no region was fetched twice.
    let fetched: Vec<(i64, i64)> = source.calls().iter().flat_map(|call| ranges(call)).collect();
    let mut covered: Vec<i64> = fetched.iter().flat_map(|&(lo, hi)| lo..=hi).collect();
    let total = covered.len();
    covered.sort();
    covered.dedup();
    assert_eq!(covered.len(), total, "some keys were fetched more than once: {fetched:?}");
    assert!(cache.uncovered_records().await.is_empty());
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn identical_concurrent_gets_trigger_one_fetch() {
    let source = Arc::new(LineSource::new(1..=100).gated());
    let cache = cache_over(&source);

    let mut callers = JoinSet::new();
    for _ in 0..16 {
        let cache = Arc::clone(&cache);
        callers.spawn(async move { get_line(&cache, 30, 40).await });
    }

    source.wait_for_calls(1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    source.release(100);

    while let Some(joined) = callers.join_next().await {
        assert_eq!(joined.expect("caller task").expect("records"), (30..=40).collect::<Vec<_>>());
    }

    assert_eq!(source.call_count(), 1);
}

#[test_log::test(tokio::test)]
async fn repeated_get_is_served_from_cache() {
    let source = Arc::new(LineSource::new(1..=100));
    let cache = cache_over(&source);

    assert_eq!(get_line(&cache, 1, 5).await.unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(get_line(&cache, 1, 5).await.unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(get_line(&cache, 2, 3).await.unwrap(), vec![2, 3]);

    assert_eq!(source.call_count(), 1);
    assert_eq!(cache.len(), 5);
    assert_eq!(cache.request_count().await, 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn overlapping_get_fetches_only_the_missing_part() {
    let source = Arc::new(LineSource::new(1..=10).gated());
    let cache = cache_over(&source);

    let first = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { get_line(&cache, 1, 5).await })
    };
    source.wait_for_calls(1).await;

    let second = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { get_line(&cache, 3, 7).await })
    };
    source.wait_for_calls(2).await;

    let calls = source.calls();
    assert_eq!(ranges(&calls[0]), vec![(1, 5)]);
    assert_eq!(ranges(&calls[1]), vec![(6, 7)]);

    // The second caller waits for both fetches.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!second.is_finished());

    source.release(2);
    assert_eq!(first.await.unwrap().unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(second.await.unwrap().unwrap(), vec![3, 4, 5, 6, 7]);
    assert_eq!(source.call_count(), 2);
}

#[test_log::test(tokio::test)]
async fn several_arguments_in_one_get() {
    let source = Arc::new(LineSource::new(1..=100));
    let cache = cache_over(&source);

    get_line(&cache, 10, 20).await.unwrap();

    let records = cache
        .get(vec![line(5, 12), line(18, 25), line(40, 39)], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        sorted(records),
        (5..=12).chain(18..=25).collect::<Vec<_>>()
    );

    let calls = source.calls();
    assert_eq!(calls.len(), 2);
    // One fetch for every missing piece of the second request, empty argument ignored.
    assert_eq!(ranges(&calls[1]), vec![(5, 9), (21, 25)]);
}

#[test_log::test(tokio::test)]
async fn overlapping_arguments_are_fetched_once() {
    let source = Arc::new(LineSource::new(1..=100).per_argument());
    let cache = cache_over(&source);

    let records = cache
        .get(vec![line(1, 5), line(3, 7)], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(sorted(records), (1..=7).collect::<Vec<_>>());
    assert_eq!(cache.len(), 7);

    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(ranges(&calls[0]), vec![(1, 5), (6, 7)]);
    assert!(cache.uncovered_records().await.is_empty());
}

#[test_log::test(tokio::test)]
async fn over_fetched_records_are_dropped() {
    let source = Arc::new(LineSource::new(1..=100).over_fetching());
    let cache = cache_over(&source);

    assert_eq!(get_line(&cache, 1, 5).await.unwrap(), vec![1, 2, 3, 4, 5]);
    assert_eq!(cache.len(), 5);
    assert_eq!(get_line(&cache, 4, 8).await.unwrap(), vec![4, 5, 6, 7, 8]);
    assert_eq!(cache.len(), 8);
}

#[test_log::test(tokio::test)]
async fn empty_request() {
    let source = Arc::new(LineSource::new(1..=100));
    let cache = cache_over(&source);

    assert!(cache.get(vec![], &CancellationToken::new()).await.unwrap().is_empty());
    assert!(get_line(&cache, 5, 4).await.unwrap().is_empty());
    assert_eq!(source.call_count(), 0);
    assert_eq!(cache.request_count().await, 0);
}
