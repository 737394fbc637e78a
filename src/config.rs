use std::path::PathBuf;
use std::time::Duration;

use crate::limits::*;

/// Settings the engine needs at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Ceiling on rooms per hotel.
    pub max_rooms: u32,
    /// How long a mutation waits for a hotel's write lock before giving up.
    pub lock_timeout: Duration,
    /// Key mixed into every access token.
    pub token_secret: String,
    /// WAL appends between automatic compactions.
    pub compact_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rooms: DEFAULT_MAX_ROOMS,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            token_secret: "roomkeep".into(),
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub engine: EngineConfig,
}

impl Config {
    /// Read `ROOMKEEP_*` variables, falling back to defaults for anything unset
    /// or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = EngineConfig::default();
        let data_dir = get("ROOMKEEP_DATA_DIR").unwrap_or_else(|| "./data".into());
        let max_rooms = get("ROOMKEEP_MAX_ROOMS")
            .and_then(|s| s.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.max_rooms);
        let lock_timeout = get("ROOMKEEP_LOCK_TIMEOUT_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);
        let token_secret = get("ROOMKEEP_TOKEN_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.token_secret);
        let compact_threshold = get("ROOMKEEP_COMPACT_THRESHOLD")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.compact_threshold);

        Self {
            data_dir: PathBuf::from(data_dir),
            engine: EngineConfig {
                max_rooms,
                lock_timeout,
                token_secret,
                compact_threshold,
            },
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("hotels.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert_eq!(cfg.engine.max_rooms, DEFAULT_MAX_ROOMS);
        assert_eq!(cfg.engine.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
        assert_eq!(cfg.engine.compact_threshold, DEFAULT_COMPACT_THRESHOLD);
        assert_eq!(cfg.wal_path(), PathBuf::from("./data").join("hotels.wal"));
    }

    #[test]
    fn reads_overrides() {
        let cfg = Config::from_lookup(lookup(&[
            ("ROOMKEEP_DATA_DIR", "/var/lib/roomkeep"),
            ("ROOMKEEP_MAX_ROOMS", "50"),
            ("ROOMKEEP_LOCK_TIMEOUT_MS", "250"),
            ("ROOMKEEP_TOKEN_SECRET", "s3cret"),
            ("ROOMKEEP_COMPACT_THRESHOLD", "10"),
        ]));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/roomkeep"));
        assert_eq!(cfg.engine.max_rooms, 50);
        assert_eq!(cfg.engine.lock_timeout, Duration::from_millis(250));
        assert_eq!(cfg.engine.token_secret, "s3cret");
        assert_eq!(cfg.engine.compact_threshold, 10);
    }

    #[test]
    fn garbage_falls_back() {
        let cfg = Config::from_lookup(lookup(&[
            ("ROOMKEEP_MAX_ROOMS", "lots"),
            ("ROOMKEEP_LOCK_TIMEOUT_MS", "-1"),
            ("ROOMKEEP_TOKEN_SECRET", ""),
        ]));
        assert_eq!(cfg.engine.max_rooms, DEFAULT_MAX_ROOMS);
        assert_eq!(cfg.engine.lock_timeout, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS));
        assert_eq!(cfg.engine.token_secret, "roomkeep");
    }

    #[test]
    fn zero_max_rooms_rejected() {
        let cfg = Config::from_lookup(lookup(&[("ROOMKEEP_MAX_ROOMS", "0")]));
        assert_eq!(cfg.engine.max_rooms, DEFAULT_MAX_ROOMS);
    }
}
