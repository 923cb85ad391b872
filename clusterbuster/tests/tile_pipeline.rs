//! Integration tests for the tile pipeline.
//!
//! These tests drive `TileServer` end to end with a stub executor standing
//! in for PostGIS:
//! - compressed output round-trips to the executor's payload
//! - cache hits skip execution, cache outages degrade to recomputation
//! - invalid coordinates fail before anything runs
//! - the scenarios from the clustering design produce the expected plans
//!
//! Run with: `cargo test --test tile_pipeline`

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clusterbuster::cache::{
    BoxFuture, CacheError, CacheKey, CacheKind, CacheTtl, KeyValueStore, MemoryCacheProvider,
    RemoteCacheProvider, TileCache, TileCacheService,
};
use clusterbuster::config::{CacheConfig, TileServerConfig};
use clusterbuster::coord::TileCoord;
use clusterbuster::pipeline::{gunzip, ExecutorError, TileQueryExecutor};
use clusterbuster::query::{
    ClusterSpec, CompiledQuery, FilterClause, PlanBranch, QueryCompiler, QueryTarget,
};
use clusterbuster::server::{QueryParams, TileError, TileRequest, TileServer};

// ============================================================================
// Helpers
// ============================================================================

const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

/// Executor answering every statement with a payload derived from its
/// parameters, counting calls.
#[derive(Default)]
struct StubExecutor {
    calls: AtomicUsize,
    statements: Mutex<Vec<String>>,
}

impl StubExecutor {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn payload_for(query: &CompiledQuery) -> Vec<u8> {
        let mut payload = b"\x1a\x0bmvt-stub".to_vec();
        for value in &query.params {
            payload.extend_from_slice(value.to_string().as_bytes());
        }
        payload
    }
}

impl TileQueryExecutor for StubExecutor {
    fn execute<'a>(
        &'a self,
        query: &'a CompiledQuery,
    ) -> BoxFuture<'a, Result<Vec<u8>, ExecutorError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.statements.lock().unwrap().push(query.sql.clone());
            Ok(Self::payload_for(query))
        })
    }
}

/// Cache backend that is always down.
struct UnreachableCache {
    attempts: AtomicUsize,
}

impl TileCache for UnreachableCache {
    fn kind(&self) -> CacheKind {
        CacheKind::Remote
    }

    fn supports_ttl(&self) -> bool {
        true
    }

    fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(CacheError::Backend("connection refused".into())) })
    }

    fn set(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Option<Duration>,
    ) -> BoxFuture<'_, Result<(), CacheError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(CacheError::Backend("connection refused".into())) })
    }

    fn invalidate_prefix(&self, _prefix: &str) -> BoxFuture<'_, Result<u64, CacheError>> {
        Box::pin(async { Err(CacheError::Backend("connection refused".into())) })
    }
}

/// Remote store recording the TTL of every write.
#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<(String, Option<u64>)>>,
    entries: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl KeyValueStore for RecordingStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, CacheError>> {
        let value = self.entries.lock().unwrap().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: Option<u64>,
    ) -> BoxFuture<'_, Result<(), CacheError>> {
        self.writes.lock().unwrap().push((key.to_string(), ttl_secs));
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn keys_with_prefix(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, CacheError>> {
        let keys = self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Box::pin(async move { Ok(keys) })
    }

    fn delete(&self, keys: Vec<String>) -> BoxFuture<'_, Result<u64, CacheError>> {
        let mut entries = self.entries.lock().unwrap();
        let removed = keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64;
        Box::pin(async move { Ok(removed) })
    }
}

fn stations_config() -> TileServerConfig {
    TileServerConfig::default()
        .with_max_zoom_level(10)
        .with_radius(15.0)
        .with_table("public.stations")
}

fn memory_cache() -> TileCacheService {
    TileCacheService::new(Arc::new(MemoryCacheProvider::new(10_000_000, None)))
}

// ============================================================================
// Round trip
// ============================================================================

#[tokio::test]
async fn test_compressed_tile_round_trips_to_executor_payload() {
    let executor = Arc::new(StubExecutor::default());
    let server: TileServer = TileServer::new(
        stations_config(),
        TileCacheService::disabled(),
        executor.clone(),
    );

    for (z, x, y) in [(0, 0, 0), (1, 0, 1), (9, 100, 200), (15, 16000, 11000)] {
        let tile = server.render(&TileRequest::new(z, x, y)).await.unwrap();
        let coord = TileCoord::new(z, x, y).unwrap();
        let expected = StubExecutor::payload_for(
            &QueryCompiler::new()
                .compile(
                    coord,
                    &ClusterSpec::new(10, 15.0),
                    &QueryTarget::new("public.stations"),
                    &[],
                )
                .unwrap()
                .render(),
        );
        assert_eq!(gunzip(&tile).unwrap(), expected);
    }
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn test_cache_hit_skips_executor() {
    let executor = Arc::new(StubExecutor::default());
    let server: TileServer = TileServer::new(stations_config(), memory_cache(), executor.clone());

    let first = server.render(&TileRequest::new(4, 8, 5)).await.unwrap();
    let second = server.render(&TileRequest::new(4, 8, 5)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_filter_order_shares_cache_entry() {
    let executor = Arc::new(StubExecutor::default());
    let server: TileServer = TileServer::new(stations_config(), memory_cache(), executor.clone())
        .with_filters(|params: &QueryParams| {
            let mut clauses: Vec<FilterClause> = ["status", "kind"]
                .iter()
                .filter_map(|column| {
                    params
                        .get(*column)
                        .map(|value| FilterClause::new(format!("{} = '{}'", column, value)))
                })
                .collect();
            if params.get("order").map(String::as_str) == Some("reverse") {
                clauses.reverse();
            }
            clauses
        });

    let forward = QueryParams::from([
        ("status".to_string(), "free".to_string()),
        ("kind".to_string(), "fast".to_string()),
    ]);
    let mut reversed = forward.clone();
    reversed.insert("order".to_string(), "reverse".to_string());

    let a = server
        .render(&TileRequest::new(3, 1, 1).with_query_params(forward))
        .await
        .unwrap();
    let b = server
        .render(&TileRequest::new(3, 1, 1).with_query_params(reversed))
        .await
        .unwrap();

    assert_eq!(a, b);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_disabled_cache_always_executes() {
    let executor = Arc::new(StubExecutor::default());
    let config = stations_config().with_cache(CacheConfig::Disabled);
    let server: TileServer = TileServer::start(config, executor.clone()).await.unwrap();
    assert_eq!(server.cache().kind(), CacheKind::Disabled);

    for _ in 0..3 {
        server.render(&TileRequest::new(2, 1, 1)).await.unwrap();
    }
    assert_eq!(executor.calls(), 3);
}

#[tokio::test]
async fn test_unreachable_cache_degrades_to_recompute() {
    let executor = Arc::new(StubExecutor::default());
    let cache = Arc::new(UnreachableCache {
        attempts: AtomicUsize::new(0),
    });
    let server: TileServer = TileServer::new(
        stations_config(),
        TileCacheService::new(cache.clone()),
        executor.clone(),
    );

    let a = server.render(&TileRequest::new(6, 10, 20)).await.unwrap();
    let b = server.render(&TileRequest::new(6, 10, 20)).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(executor.calls(), 2);
    // get + set per request
    assert_eq!(cache.attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_remote_cache_receives_resolved_ttl() {
    let store = Arc::new(RecordingStore::default());
    let cache = TileCacheService::new(Arc::new(RemoteCacheProvider::new(
        store.clone(),
        Duration::from_secs(86_400),
    )));
    let server: TileServer = TileServer::new(
        stations_config(),
        cache,
        Arc::new(StubExecutor::default()),
    );

    server.render(&TileRequest::new(1, 0, 1)).await.unwrap();
    server
        .render(&TileRequest::new(2, 0, 1).with_cache_ttl(CacheTtl::per_zoom(|zoom| 60 * u64::from(zoom))))
        .await
        .unwrap();

    let writes = store.writes.lock().unwrap().clone();
    assert_eq!(
        writes,
        vec![
            (format!("public.stations-1-0-1-{}", EMPTY_SHA1), Some(86_400)),
            (format!("public.stations-2-0-1-{}", EMPTY_SHA1), Some(120)),
        ]
    );
}

#[tokio::test]
async fn test_memory_cache_from_config() {
    let executor = Arc::new(StubExecutor::default());
    let config = stations_config().with_cache(CacheConfig::memory());
    let server: TileServer = TileServer::start(config, executor.clone()).await.unwrap();

    server.render(&TileRequest::new(7, 1, 1)).await.unwrap();
    server.render(&TileRequest::new(7, 1, 1)).await.unwrap();

    assert_eq!(server.cache().kind(), CacheKind::Memory);
    assert_eq!(executor.calls(), 1);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_invalid_coordinates_fail_before_execution() {
    let executor = Arc::new(StubExecutor::default());
    let server: TileServer = TileServer::new(stations_config(), memory_cache(), executor.clone());

    for (z, x, y) in [
        ("a", "0", "0"),
        ("1", "0.5", "0"),
        ("1", "0", ""),
        ("-1", "0", "0"),
        ("25", "0", "0"),
        ("1", "2", "0"),
        ("3", "0", "8"),
    ] {
        let err = server.render(&TileRequest::new(z, x, y)).await.unwrap_err();
        assert!(
            matches!(err, TileError::InvalidCoordinate(_)),
            "{}/{}/{} should be rejected, got {:?}",
            z,
            x,
            y,
            err
        );
    }
    assert_eq!(executor.calls(), 0);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_scenario_low_zoom_plan_and_key() {
    let tile = TileCoord::new(1, 0, 1).unwrap();
    let plan = QueryCompiler::new()
        .compile(
            tile,
            &ClusterSpec::new(10, 15.0),
            &QueryTarget::new("public.stations"),
            &[],
        )
        .unwrap();

    assert_eq!(plan.branch(), PlanBranch::Clustered);
    assert_eq!(plan.levels(), (1..=9).rev().collect::<Vec<u8>>());
    assert_eq!(
        CacheKey::derive("public.stations", tile, &[]).as_str(),
        format!("public.stations-1-0-1-{}", EMPTY_SHA1)
    );
}

#[test]
fn test_scenario_above_max_zoom_is_unclustered() {
    let plan = QueryCompiler::new()
        .compile(
            TileCoord::new(15, 0, 0).unwrap(),
            &ClusterSpec::new(10, 15.0),
            &QueryTarget::new("public.stations"),
            &[],
        )
        .unwrap();

    assert_eq!(plan.branch(), PlanBranch::Unclustered);
    assert_eq!(plan.level_count(), 0);
    assert_eq!(plan.stages().len(), 2);
}

#[tokio::test]
async fn test_identical_filters_from_different_call_sites_share_key() {
    let cache = memory_cache();
    let tile = TileCoord::new(5, 3, 3).unwrap();
    let status = "free";

    let literal = cache.derive_key("public.stations", tile, &[FilterClause::new("status = 'free'")]);
    let built = cache.derive_key(
        "public.stations",
        tile,
        &[FilterClause::from(format!("status = '{}'", status))],
    );

    assert!(literal.is_some());
    assert_eq!(literal, built);
}

#[tokio::test]
async fn test_concurrent_requests_are_independent() {
    let executor = Arc::new(StubExecutor::default());
    let handler = TileServer::<QueryParams>::new(stations_config(), memory_cache(), executor.clone())
        .into_handler();

    let mut handles = Vec::new();
    for x in 0..8i64 {
        let handler = handler.clone();
        handles.push(tokio::spawn(async move {
            handler(TileRequest::new(3, x, 0).with_request_id(format!("req-{}", x))).await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(executor.calls(), 8);
    assert_eq!(executor.statements.lock().unwrap().len(), 8);
}
