#![allow(dead_code)]

use std::sync::Arc;

use region_cache::prelude::*;
use region_cache::test::line;
use region_cache::test::Line;
use region_cache::test::TestError;
use region_cache::test::TestSource;

pub type LineSource = TestSource<Line, i64>;

pub fn cache_over<DS: DataSource>(source: &Arc<DS>) -> Arc<Cache<DS>> {
    Cache::builder()
        .data_source(Arc::clone(source))
        .name("test")
        .build()
        .expect("cache is built")
}

/// Flattened ranges of 1-dimensional arguments, sorted.
pub fn ranges(arguments: &[Line]) -> Vec<(i64, i64)> {
    let mut out: Vec<_> = arguments
        .iter()
        .flat_map(|arg| arg.region().dims().0.ranges().to_vec())
        .collect();
    out.sort();
    out
}

pub fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values
}

pub async fn get_line(cache: &Cache<LineSource>, lo: i64, hi: i64) -> Result<Vec<i64>, CacheError<TestError>> {
    cache
        .get(vec![line(lo, hi)], &CancellationToken::new())
        .await
        .map(sorted)
}
