//! Server configuration and INI file loading.
//!
//! [`TileServerConfig`] carries everything fixed for the lifetime of a
//! [`TileServer`](crate::server::TileServer). It can be built in code with
//! the `with_*` builders or read from an INI file:
//!
//! ```ini
//! [tiles]
//! max_zoom = 12
//! radius = 15
//! extent = 4096
//! buffer = 256
//! attributes = status, operator
//! table = public.stations
//! geometry = wkb_geometry
//! source_layer = stations
//! debug = false
//! widen_bounding_box = false
//!
//! [cache]
//! type = memory        ; none | memory | redis
//! max_size = 64MB      ; memory only
//! ttl = 3600           ; seconds
//! url = redis://localhost:6379
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::{DEFAULT_MEMORY_CACHE_BYTES, DEFAULT_MEMORY_CACHE_TTL, DEFAULT_REMOTE_TTL_SECS};
use crate::coord::MAX_ZOOM;
use crate::query::target::{
    DEFAULT_BUFFER_SIZE, DEFAULT_EXTENT, DEFAULT_GEOMETRY, DEFAULT_MAX_ZOOM_LEVEL,
    DEFAULT_SOURCE_LAYER, DEFAULT_TABLE,
};
use crate::query::{AttributeList, BaseQueryFn, DEFAULT_RADIUS};

/// Environment variable consulted when a remote cache has no `url`.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("invalid value {value:?} for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("[{section}] {key} is required")]
    MissingValue {
        section: &'static str,
        key: &'static str,
    },

    #[error("could not determine home directory")]
    NoHomeDirectory,
}

/// Cache backend selection, fixed when the server is built.
///
/// Defaults to the bounded in-memory cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheConfig {
    /// No caching; every request recomputes.
    Disabled,
    /// Bounded in-process cache. Entries expire after `time_to_live`.
    Memory {
        max_size_bytes: u64,
        time_to_live: Option<Duration>,
    },
    /// Shared remote store. `ttl_secs` applies when a request has no override.
    Remote { url: String, ttl_secs: u64 },
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::memory()
    }
}

impl CacheConfig {
    /// In-memory cache with default bounds.
    pub fn memory() -> Self {
        CacheConfig::Memory {
            max_size_bytes: DEFAULT_MEMORY_CACHE_BYTES,
            time_to_live: Some(DEFAULT_MEMORY_CACHE_TTL),
        }
    }

    /// Remote cache at `url` with the default TTL.
    pub fn remote(url: impl Into<String>) -> Self {
        CacheConfig::Remote {
            url: url.into(),
            ttl_secs: DEFAULT_REMOTE_TTL_SECS,
        }
    }
}

/// Settings fixed for the lifetime of a tile server.
#[derive(Debug, Clone, PartialEq)]
pub struct TileServerConfig {
    /// Zoom level at and above which points are served unclustered.
    pub max_zoom_level: u8,
    /// Cluster radius fed to the distance function.
    pub radius: f64,
    pub extent: u32,
    pub buffer_size: u32,
    /// Columns carried through clustering into each feature.
    pub attributes: AttributeList,
    /// Log compiled statements and attach them to generation errors.
    pub debug: bool,
    /// Select the clustered base stage with a box twice the tile size.
    pub widen_bounding_box: bool,
    /// Table used when a request names none.
    pub table: String,
    /// Geometry column used when a request names none.
    pub geometry_column: String,
    /// Layer name used when a request names none.
    pub source_layer: String,
    /// Builder of each plan's seeding statement.
    pub base_query: BaseQueryFn,
    pub cache: CacheConfig,
}

impl Default for TileServerConfig {
    fn default() -> Self {
        Self {
            max_zoom_level: DEFAULT_MAX_ZOOM_LEVEL,
            radius: DEFAULT_RADIUS,
            extent: DEFAULT_EXTENT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            attributes: AttributeList::default(),
            debug: false,
            widen_bounding_box: false,
            table: DEFAULT_TABLE.to_string(),
            geometry_column: DEFAULT_GEOMETRY.to_string(),
            source_layer: DEFAULT_SOURCE_LAYER.to_string(),
            base_query: BaseQueryFn::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl TileServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_zoom_level(mut self, max_zoom_level: u8) -> Self {
        self.max_zoom_level = max_zoom_level;
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeList) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_widened_bounding_box(mut self, widen: bool) -> Self {
        self.widen_bounding_box = widen;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_geometry_column(mut self, column: impl Into<String>) -> Self {
        self.geometry_column = column.into();
        self
    }

    pub fn with_source_layer(mut self, layer: impl Into<String>) -> Self {
        self.source_layer = layer.into();
        self
    }

    pub fn with_base_query(mut self, base_query: BaseQueryFn) -> Self {
        self.base_query = base_query;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// Configuration loaded from an INI file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub server: TileServerConfig,
}

impl ConfigFile {
    /// Default location: `~/.clusterbuster/config.ini`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".clusterbuster").join("config.ini"))
            .ok_or(ConfigError::NoHomeDirectory)
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini, |name| std::env::var(name).ok())
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini, |name| std::env::var(name).ok())
    }

    fn from_ini(ini: &Ini, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut server = TileServerConfig::default();

        if let Some(tiles) = ini.section(Some("tiles")) {
            let get = |key: &'static str| tiles.get(key).map(str::trim);

            if let Some(value) = get("max_zoom") {
                let zoom: u8 = parse_value("tiles", "max_zoom", value)?;
                if zoom > MAX_ZOOM {
                    return Err(invalid("tiles", "max_zoom", value, format!("must be <= {}", MAX_ZOOM)));
                }
                server.max_zoom_level = zoom;
            }
            if let Some(value) = get("radius") {
                let radius: f64 = parse_value("tiles", "radius", value)?;
                if !radius.is_finite() || radius < 0.0 {
                    return Err(invalid("tiles", "radius", value, "must be a non-negative number".into()));
                }
                server.radius = radius;
            }
            if let Some(value) = get("extent") {
                server.extent = parse_value("tiles", "extent", value)?;
            }
            if let Some(value) = get("buffer") {
                server.buffer_size = parse_value("tiles", "buffer", value)?;
            }
            if let Some(value) = get("attributes") {
                server.attributes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            if let Some(value) = get("debug") {
                server.debug = parse_bool("tiles", "debug", value)?;
            }
            if let Some(value) = get("widen_bounding_box") {
                server.widen_bounding_box = parse_bool("tiles", "widen_bounding_box", value)?;
            }
            if let Some(value) = get("table") {
                server.table = value.to_string();
            }
            if let Some(value) = get("geometry") {
                server.geometry_column = value.to_string();
            }
            if let Some(value) = get("source_layer") {
                server.source_layer = value.to_string();
            }
        }

        if let Some(cache) = ini.section(Some("cache")) {
            let get = |key: &'static str| cache.get(key).map(str::trim);
            let kind = get("type").unwrap_or("memory").to_ascii_lowercase();

            server.cache = match kind.as_str() {
                "none" | "disabled" | "off" => CacheConfig::Disabled,
                "memory" | "lru" => {
                    let max_size_bytes = match get("max_size") {
                        Some(value) => parse_size(value)
                            .ok_or_else(|| invalid("cache", "max_size", value, "expected a size like 64MB".into()))?,
                        None => DEFAULT_MEMORY_CACHE_BYTES,
                    };
                    let time_to_live = match get("ttl") {
                        Some(value) => {
                            let secs: u64 = parse_value("cache", "ttl", value)?;
                            (secs > 0).then(|| Duration::from_secs(secs))
                        }
                        None => Some(DEFAULT_MEMORY_CACHE_TTL),
                    };
                    CacheConfig::Memory {
                        max_size_bytes,
                        time_to_live,
                    }
                }
                "redis" | "remote" => {
                    let url = get("url")
                        .map(str::to_string)
                        .or_else(|| env(REDIS_URL_ENV))
                        .ok_or(ConfigError::MissingValue {
                            section: "cache",
                            key: "url",
                        })?;
                    let ttl_secs = match get("ttl") {
                        Some(value) => parse_value("cache", "ttl", value)?,
                        None => DEFAULT_REMOTE_TTL_SECS,
                    };
                    CacheConfig::Remote { url, ttl_secs }
                }
                other => {
                    return Err(invalid(
                        "cache",
                        "type",
                        other,
                        "expected none, memory or redis".into(),
                    ))
                }
            };
        }

        Ok(Self { server })
    }
}

fn invalid(section: &'static str, key: &'static str, value: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason,
    }
}

fn parse_value<T>(section: &'static str, key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(section, key, value, e.to_string()))
}

fn parse_bool(section: &'static str, key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(section, key, value, "expected true or false".into())),
    }
}

/// Parse a byte size such as `1048576`, `512KB`, `64MB` or `2GB`.
pub fn parse_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let number: u64 = digits.parse().ok()?;

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    number.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse_without_env(text: &str) -> Result<ConfigFile, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        ConfigFile::from_ini(&ini, |_| None)
    }

    #[test]
    fn test_defaults() {
        let config = TileServerConfig::default();
        assert_eq!(config.max_zoom_level, 12);
        assert_eq!(config.radius, 15.0);
        assert_eq!(config.extent, 4096);
        assert_eq!(config.buffer_size, 256);
        assert!(config.attributes.is_empty());
        assert!(!config.debug);
        assert!(!config.widen_bounding_box);
        assert_eq!(config.table, "public.points");
        assert_eq!(config.geometry_column, "wkb_geometry");
        assert_eq!(config.source_layer, "points");
        assert_eq!(
            config.cache,
            CacheConfig::Memory {
                max_size_bytes: 64 * 1024 * 1024,
                time_to_live: Some(Duration::from_secs(3600)),
            }
        );
    }

    #[test]
    fn test_builders() {
        let config = TileServerConfig::new()
            .with_max_zoom_level(10)
            .with_radius(40.0)
            .with_extent(512)
            .with_buffer_size(32)
            .with_debug(true)
            .with_widened_bounding_box(true)
            .with_table("public.stations")
            .with_cache(CacheConfig::memory());

        assert_eq!(config.max_zoom_level, 10);
        assert_eq!(config.radius, 40.0);
        assert_eq!(config.extent, 512);
        assert_eq!(config.buffer_size, 32);
        assert!(config.debug);
        assert!(config.widen_bounding_box);
        assert_eq!(config.table, "public.stations");
        assert_eq!(
            config.cache,
            CacheConfig::Memory {
                max_size_bytes: 64 * 1024 * 1024,
                time_to_live: Some(Duration::from_secs(3600)),
            }
        );
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse_without_env("").unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.server.cache, CacheConfig::memory());
    }

    #[test]
    fn test_cache_section_without_type_is_memory() {
        let config = parse_without_env("[cache]\nmax_size = 1MB\n").unwrap();
        assert!(matches!(
            config.server.cache,
            CacheConfig::Memory { max_size_bytes: 1_048_576, .. }
        ));
        let config = parse_without_env("[cache]\ntype = none\n").unwrap();
        assert_eq!(config.server.cache, CacheConfig::Disabled);
    }

    #[test]
    fn test_parse_tiles_section() {
        let config = parse_without_env(
            "[tiles]\n\
             max_zoom = 10\n\
             radius = 20.5\n\
             extent = 512\n\
             buffer = 64\n\
             attributes = status, operator\n\
             debug = yes\n\
             widen_bounding_box = true\n\
             table = public.stations\n\
             geometry = location\n\
             source_layer = stations\n",
        )
        .unwrap()
        .server;

        assert_eq!(config.max_zoom_level, 10);
        assert_eq!(config.radius, 20.5);
        assert_eq!(config.extent, 512);
        assert_eq!(config.buffer_size, 64);
        assert_eq!(
            config.attributes.names(),
            ["status".to_string(), "operator".to_string()]
        );
        assert!(config.debug);
        assert!(config.widen_bounding_box);
        assert_eq!(config.table, "public.stations");
        assert_eq!(config.geometry_column, "location");
        assert_eq!(config.source_layer, "stations");
    }

    #[test]
    fn test_parse_memory_cache() {
        let config = parse_without_env("[cache]\ntype = memory\nmax_size = 16MB\nttl = 600\n").unwrap();
        assert_eq!(
            config.server.cache,
            CacheConfig::Memory {
                max_size_bytes: 16 * 1024 * 1024,
                time_to_live: Some(Duration::from_secs(600)),
            }
        );
    }

    #[test]
    fn test_memory_cache_zero_ttl_disables_expiry() {
        let config = parse_without_env("[cache]\ntype = memory\nttl = 0\n").unwrap();
        assert!(matches!(
            config.server.cache,
            CacheConfig::Memory {
                time_to_live: None,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_remote_cache() {
        let config =
            parse_without_env("[cache]\ntype = redis\nurl = redis://cache:6379\nttl = 1800\n").unwrap();
        assert_eq!(
            config.server.cache,
            CacheConfig::Remote {
                url: "redis://cache:6379".to_string(),
                ttl_secs: 1800,
            }
        );
    }

    #[test]
    fn test_remote_url_falls_back_to_env() {
        let ini = Ini::load_from_str("[cache]\ntype = redis\n").unwrap();
        let config = ConfigFile::from_ini(&ini, |name| {
            (name == REDIS_URL_ENV).then(|| "redis://env:6379".to_string())
        })
        .unwrap();

        assert_eq!(config.server.cache, CacheConfig::remote("redis://env:6379"));
    }

    #[test]
    fn test_remote_without_url_is_error() {
        let err = parse_without_env("[cache]\ntype = redis\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingValue {
                section: "cache",
                key: "url"
            }
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse_without_env("[tiles]\nmax_zoom = twelve\n"),
            Err(ConfigError::InvalidValue { key: "max_zoom", .. })
        ));
        assert!(matches!(
            parse_without_env("[tiles]\nmax_zoom = 30\n"),
            Err(ConfigError::InvalidValue { key: "max_zoom", .. })
        ));
        assert!(matches!(
            parse_without_env("[tiles]\nradius = -1\n"),
            Err(ConfigError::InvalidValue { key: "radius", .. })
        ));
        assert!(matches!(
            parse_without_env("[tiles]\ndebug = maybe\n"),
            Err(ConfigError::InvalidValue { key: "debug", .. })
        ));
        assert!(matches!(
            parse_without_env("[cache]\ntype = disk\n"),
            Err(ConfigError::InvalidValue { key: "type", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[tiles]\nmax_zoom = 8\n[cache]\ntype = none").unwrap();

        let config = ConfigFile::load_from(file.path()).unwrap();
        assert_eq!(config.server.max_zoom_level, 8);
        assert_eq!(config.server.cache, CacheConfig::Disabled);
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigFile::load_from(&dir.path().join("absent.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1048576"), Some(1_048_576));
        assert_eq!(parse_size("512KB"), Some(512 * 1024));
        assert_eq!(parse_size("64 MB"), Some(64 * 1024 * 1024));
        assert_eq!(parse_size("2gb"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("lots"), None);
        assert_eq!(parse_size("10TB"), None);
    }
}
