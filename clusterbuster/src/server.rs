//! Tile server: the request pipeline and its public entry point.
//!
//! A [`TileServer`] is built once with its configuration, cache backend and
//! query executor, then renders any number of independent requests:
//!
//! ```text
//! validate coordinate → derive key → cache lookup ─hit─→ return
//!                                        │ miss
//!                                        ▼
//!              compile → execute → compress → cache store → return
//! ```
//!
//! Cache failures never fail a request. Invalid coordinates fail before any
//! statement is built. Compilation, execution and compression failures are
//! reported as [`TileError::Generation`] and nothing is cached.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::cache::{BoxFuture, CacheError, CacheTtl, TileCacheService};
use crate::config::TileServerConfig;
use crate::coord::{CoordError, TileCoord};
use crate::pipeline::stages::{check_cache, store_cache};
use crate::pipeline::{compress_tile, ExecutorError, TileQueryExecutor};
use crate::query::{
    BaseQueryFn, BoundingBox, ClusterSpec, CompileError, DistanceFn, FilterClause, QueryCompiler,
    QueryTarget,
};

/// Query parameters of a typical HTTP request.
pub type QueryParams = HashMap<String, String>;

/// Errors returned to the caller of [`TileServer::render`].
#[derive(Debug, Error)]
pub enum TileError {
    /// The tile address is not a valid `z/x/y`.
    #[error("invalid tile coordinate: {0}")]
    InvalidCoordinate(#[from] CoordError),

    /// The tile could not be produced.
    ///
    /// `statement` holds the rendered SQL when the server runs in debug mode
    /// and a statement had been rendered.
    #[error("tile generation failed: {source}")]
    Generation {
        #[source]
        source: GenerationError,
        statement: Option<String>,
    },
}

impl TileError {
    /// The attempted statement, when available.
    pub fn statement(&self) -> Option<&str> {
        match self {
            TileError::Generation { statement, .. } => statement.as_deref(),
            TileError::InvalidCoordinate(_) => None,
        }
    }
}

/// Cause of a generation failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("query compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("query execution failed: {0}")]
    Execution(#[from] ExecutorError),

    #[error("tile compression failed: {0}")]
    Compression(#[from] io::Error),
}

/// Translates a request's query parameters into filter clauses.
///
/// Implemented for any `Fn(&P) -> Vec<FilterClause>`.
pub trait FiltersToPredicates<P>: Send + Sync {
    fn to_predicates(&self, params: &P) -> Vec<FilterClause>;
}

impl<P, F> FiltersToPredicates<P> for F
where
    F: Fn(&P) -> Vec<FilterClause> + Send + Sync,
{
    fn to_predicates(&self, params: &P) -> Vec<FilterClause> {
        self(params)
    }
}

/// One tile request.
///
/// Coordinates are kept as received and validated by the server. Every
/// `Option` falls back to the server configuration.
#[derive(Debug, Clone)]
pub struct TileRequest<P = QueryParams> {
    pub z: String,
    pub x: String,
    pub y: String,
    pub table: Option<String>,
    pub geometry_column: Option<String>,
    pub source_layer: Option<String>,
    pub query_params: P,
    /// Correlation id carried on every log line of this request.
    pub request_id: String,
    pub max_zoom_level: Option<u8>,
    pub cache_ttl: Option<CacheTtl>,
    pub zoom_to_distance: Option<DistanceFn>,
    pub base_query: Option<BaseQueryFn>,
    pub radius: Option<f64>,
    pub extent: Option<u32>,
    pub buffer_size: Option<u32>,
}

impl<P: Default> TileRequest<P> {
    /// Request tile `z/x/y`. Accepts numbers or raw path segments.
    pub fn new(z: impl ToString, x: impl ToString, y: impl ToString) -> Self {
        Self {
            z: z.to_string(),
            x: x.to_string(),
            y: y.to_string(),
            table: None,
            geometry_column: None,
            source_layer: None,
            query_params: P::default(),
            request_id: String::new(),
            max_zoom_level: None,
            cache_ttl: None,
            zoom_to_distance: None,
            base_query: None,
            radius: None,
            extent: None,
            buffer_size: None,
        }
    }
}

impl<P> TileRequest<P> {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_geometry_column(mut self, column: impl Into<String>) -> Self {
        self.geometry_column = Some(column.into());
        self
    }

    pub fn with_source_layer(mut self, layer: impl Into<String>) -> Self {
        self.source_layer = Some(layer.into());
        self
    }

    pub fn with_query_params(mut self, params: P) -> Self {
        self.query_params = params;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_max_zoom_level(mut self, max_zoom_level: u8) -> Self {
        self.max_zoom_level = Some(max_zoom_level);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: impl Into<CacheTtl>) -> Self {
        self.cache_ttl = Some(ttl.into());
        self
    }

    pub fn with_zoom_to_distance(mut self, zoom_to_distance: DistanceFn) -> Self {
        self.zoom_to_distance = Some(zoom_to_distance);
        self
    }

    pub fn with_base_query(mut self, base_query: BaseQueryFn) -> Self {
        self.base_query = Some(base_query);
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }
}

/// Serves compressed, pre-clustered vector tiles.
pub struct TileServer<P = QueryParams> {
    config: TileServerConfig,
    cache: TileCacheService,
    executor: Arc<dyn TileQueryExecutor>,
    filters: Option<Arc<dyn FiltersToPredicates<P>>>,
    compiler: QueryCompiler,
}

impl<P> TileServer<P> {
    /// Build a server around an already constructed cache.
    pub fn new(
        config: TileServerConfig,
        cache: TileCacheService,
        executor: Arc<dyn TileQueryExecutor>,
    ) -> Self {
        let bounding_box = if config.widen_bounding_box {
            BoundingBox::Widened
        } else {
            BoundingBox::Exact
        };
        Self {
            compiler: QueryCompiler::new().with_clustered_bounding_box(bounding_box),
            config,
            cache,
            executor,
            filters: None,
        }
    }

    /// Build a server and the cache backend its configuration names.
    pub async fn start(
        config: TileServerConfig,
        executor: Arc<dyn TileQueryExecutor>,
    ) -> Result<Self, CacheError> {
        let cache = TileCacheService::from_config(&config.cache).await?;
        Ok(Self::new(config, cache, executor))
    }

    /// Install the translator from query parameters to filter clauses.
    pub fn with_filters<F>(mut self, filters: F) -> Self
    where
        F: FiltersToPredicates<P> + 'static,
    {
        self.filters = Some(Arc::new(filters));
        self
    }

    pub fn config(&self) -> &TileServerConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileCacheService {
        &self.cache
    }

    fn target_for(&self, request: &TileRequest<P>) -> QueryTarget {
        QueryTarget::new(request.table.as_deref().unwrap_or(&self.config.table))
            .with_geometry_column(
                request
                    .geometry_column
                    .as_deref()
                    .unwrap_or(&self.config.geometry_column),
            )
            .with_source_layer(
                request
                    .source_layer
                    .as_deref()
                    .unwrap_or(&self.config.source_layer),
            )
            .with_extent(request.extent.unwrap_or(self.config.extent))
            .with_buffer_size(request.buffer_size.unwrap_or(self.config.buffer_size))
            .with_attributes(self.config.attributes.clone())
            .with_base_query(
                request
                    .base_query
                    .clone()
                    .unwrap_or_else(|| self.config.base_query.clone()),
            )
    }

    fn cluster_for(&self, request: &TileRequest<P>) -> ClusterSpec {
        let spec = ClusterSpec::new(
            request.max_zoom_level.unwrap_or(self.config.max_zoom_level),
            request.radius.unwrap_or(self.config.radius),
        );
        match &request.zoom_to_distance {
            Some(distance) => spec.with_zoom_to_distance(distance.clone()),
            None => spec,
        }
    }

    fn generation_error(&self, source: impl Into<GenerationError>, statement: Option<&str>) -> TileError {
        let source = source.into();
        warn!(error = %source, "Tile generation failed");
        TileError::Generation {
            source,
            statement: statement
                .filter(|_| self.config.debug)
                .map(str::to_string),
        }
    }
}

impl<P: Send + Sync> TileServer<P> {
    /// Render one tile, returning the gzip-compressed vector tile.
    ///
    /// # Errors
    ///
    /// - `TileError::InvalidCoordinate` when `z/x/y` are not integers in range
    /// - `TileError::Generation` when compiling, executing or compressing fails
    #[instrument(
        skip(self, request),
        fields(request_id = %request.request_id, z = %request.z, x = %request.x, y = %request.y)
    )]
    pub async fn render(&self, request: &TileRequest<P>) -> Result<Vec<u8>, TileError> {
        let started = Instant::now();
        let tile = TileCoord::parse(&request.z, &request.x, &request.y)?;

        let filters = self
            .filters
            .as_ref()
            .map(|translator| translator.to_predicates(&request.query_params))
            .unwrap_or_default();
        let target = self.target_for(request);

        let key = self.cache.derive_key(&target.table, tile, &filters);
        if let Some(hit) = check_cache(&request.request_id, key.as_ref(), &self.cache).await {
            debug!(
                tile = %tile,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Served tile from cache"
            );
            return Ok(hit);
        }

        let plan = self
            .compiler
            .compile(tile, &self.cluster_for(request), &target, &filters)
            .map_err(|e| {
                if self.config.debug {
                    let clauses: Vec<String> = filters.iter().map(FilterClause::cache_text).collect();
                    debug!(
                        tile = %tile,
                        table = %target.table,
                        geometry = %target.geometry_column,
                        attributes = ?target.attributes.names(),
                        filters = ?clauses,
                        "Tile request rejected before a statement was rendered"
                    );
                }
                self.generation_error(e, None)
            })?;
        let query = plan.render();
        if self.config.debug {
            debug!(tile = %tile, statement = %query, "Compiled tile statement");
        }

        let raw = self
            .executor
            .execute(&query)
            .await
            .map_err(|e| self.generation_error(e, Some(&query.sql)))?;
        let raw_len = raw.len();

        let compressed = compress_tile(raw)
            .await
            .map_err(|e| self.generation_error(e, Some(&query.sql)))?;

        if key.is_some() {
            let ttl_secs = self
                .cache
                .resolve_ttl(tile.z(), request.cache_ttl.as_ref())
                .await;
            store_cache(
                &request.request_id,
                key.as_ref(),
                &compressed,
                ttl_secs,
                &self.cache,
            )
            .await;
        }

        info!(
            tile = %tile,
            branch = ?plan.branch(),
            levels = plan.level_count(),
            raw_bytes = raw_len,
            compressed_bytes = compressed.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rendered tile"
        );
        Ok(compressed)
    }
}

impl<P: Send + Sync + 'static> TileServer<P> {
    /// Turn the server into a cloneable per-request tile function.
    pub fn into_handler(
        self,
    ) -> impl Fn(TileRequest<P>) -> BoxFuture<'static, Result<Vec<u8>, TileError>> + Clone + Send + Sync
    {
        let server = Arc::new(self);
        move |request| {
            let server = Arc::clone(&server);
            Box::pin(async move { server.render(&request).await })
        }
    }
}
