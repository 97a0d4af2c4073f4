//! Core configuration (§6): the five options the ingest/curation
//! engine recognises. Loaded the way the rest of the pack layers
//! configuration — built-in defaults, then `config/default.toml` if
//! present, then `CORE__*` environment overrides — via the `config`
//! crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options recognised by the core (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// How long a listing may go unconfirmed before it is marked
    /// non-active (§4.5). Default 24h.
    #[serde(with = "humantime_seconds")]
    pub stalled_listing_threshold: Duration,

    /// Width of the sold-price voting window (§3 invariant 2). Default 7d.
    #[serde(with = "humantime_seconds")]
    pub final_price_window: Duration,

    /// Deadlock retry budget (§5). Default 3.
    pub deadlock_retries: u32,

    /// Duplicate finder's minimum similarity to surface a pair at all.
    pub duplicate_finder_min_similarity: f64,

    /// Duplicate finder's "confident enough to rule-override" threshold.
    pub duplicate_finder_high_conf: f64,

    /// Postgres connection string. Not part of §6's options table but
    /// required to construct the pool; kept out of `serde(default)`'s
    /// computed defaults via an empty-string sentinel that callers must
    /// override.
    pub database_url: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            stalled_listing_threshold: Duration::from_secs(24 * 3600),
            final_price_window: Duration::from_secs(7 * 24 * 3600),
            deadlock_retries: 3,
            duplicate_finder_min_similarity: 0.70,
            duplicate_finder_high_conf: 0.90,
            database_url: String::new(),
        }
    }
}

impl CoreConfig {
    /// Layer defaults -> `config/default.toml` (optional) -> `CORE__*`
    /// environment variables (e.g. `CORE__DEADLOCK_RETRIES=5`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default(
                "stalled_listing_threshold",
                defaults.stalled_listing_threshold.as_secs(),
            )?
            .set_default("final_price_window", defaults.final_price_window.as_secs())?
            .set_default("deadlock_retries", defaults.deadlock_retries)?
            .set_default(
                "duplicate_finder_min_similarity",
                defaults.duplicate_finder_min_similarity,
            )?
            .set_default(
                "duplicate_finder_high_conf",
                defaults.duplicate_finder_high_conf,
            )?
            .set_default("database_url", defaults.database_url)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("CORE").separator("__"));

        builder.build()?.try_deserialize()
    }
}

mod humantime_seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.stalled_listing_threshold, Duration::from_secs(86_400));
        assert_eq!(cfg.final_price_window, Duration::from_secs(604_800));
        assert_eq!(cfg.deadlock_retries, 3);
        assert!((cfg.duplicate_finder_min_similarity - 0.70).abs() < f64::EPSILON);
        assert!((cfg.duplicate_finder_high_conf - 0.90).abs() < f64::EPSILON);
    }
}
