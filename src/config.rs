//! Engine tunables and per-call requests.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Tunables for the clustering engine.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed for every k-means run. Fixed so results are reproducible.
    pub seed: u64,
    /// k-means restarts per fit.
    pub n_init: usize,
    /// Lloyd iterations per restart.
    pub max_iter: usize,
    /// Relative convergence tolerance.
    pub tol: f32,
    /// Upper bound of the group-count search when a request doesn't set one.
    pub max_k: usize,
    /// Group count used when auto-selection is off and none is requested.
    pub default_k: usize,
    /// Below this many records, auto-selection uses a single group.
    pub min_records_for_search: usize,
    /// Characters kept in each summary preview.
    pub preview_chars: usize,
    /// Previews per group in a summary.
    pub preview_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            max_k: 10,
            default_k: 3,
            min_records_for_search: 3,
            preview_chars: 100,
            preview_samples: 3,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML, then validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file (defaults if it doesn't exist), then apply env
    /// overrides (`CORTEX_SEED`, `CORTEX_MAX_K`, `CORTEX_N_INIT`).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?
        } else {
            info!("no config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        override_from_env("CORTEX_SEED", &mut self.seed);
        override_from_env("CORTEX_MAX_K", &mut self.max_k);
        override_from_env("CORTEX_N_INIT", &mut self.n_init);
    }

    /// Reject settings k-means can't run with.
    pub fn validate(&self) -> Result<()> {
        if self.n_init == 0 {
            return Err(Error::InvalidParameter {
                name: "n_init",
                message: "must be at least 1",
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iter",
                message: "must be at least 1",
            });
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "tol",
                message: "must be finite and positive",
            });
        }
        Ok(())
    }
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(parsed) => *slot = parsed,
            Err(_) => warn!(key, value = %val, "ignoring unparsable env override"),
        }
    }
}

/// Per-call clustering options.
///
/// Mirrors the request body `{"k": .., "auto_k": .., "max_k": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterRequest {
    /// Fixed group count. `None` means "decide".
    pub k: Option<usize>,
    /// Search for the best group count when `k` is unset.
    pub auto_k: bool,
    /// Upper bound of the search; falls back to [`EngineConfig::max_k`].
    pub max_k: Option<usize>,
}

impl Default for ClusterRequest {
    fn default() -> Self {
        Self {
            k: None,
            auto_k: true,
            max_k: None,
        }
    }
}

impl ClusterRequest {
    /// Search for the group count, up to `max_k`.
    pub fn auto(max_k: usize) -> Self {
        Self {
            k: None,
            auto_k: true,
            max_k: Some(max_k),
        }
    }

    /// Use exactly `k` groups (clamped to the record count).
    pub fn fixed(k: usize) -> Self {
        Self {
            k: Some(k),
            auto_k: false,
            max_k: None,
        }
    }

    /// Whether this request lets the engine choose the count.
    pub fn is_auto(&self) -> bool {
        self.auto_k && self.k.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.seed, 42);
        assert_eq!(config.max_k, 10);
        assert_eq!(config.preview_chars, 100);
    }

    #[test]
    fn test_parse_toml_config() {
        let config = EngineConfig::from_toml_str(
            r#"
seed = 7
max_k = 5
preview_samples = 1
"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_k, 5);
        assert_eq!(config.preview_samples, 1);
        // defaults still apply for unset fields
        assert_eq!(config.n_init, 10);
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("n_init = 0"),
            Err(Error::InvalidParameter { name: "n_init", .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("seed = \"abc\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = EngineConfig::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(missing.default_k, 3);

        let path = dir.path().join("cortex.toml");
        std::fs::write(&path, "default_k = 4\nmin_records_for_search = 5\n").unwrap();
        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded.default_k, 4);
        assert_eq!(loaded.min_records_for_search, 5);
    }

    #[test]
    fn test_request_json_defaults() {
        let req: ClusterRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, ClusterRequest::default());
        assert!(req.is_auto());

        let req: ClusterRequest = serde_json::from_str(r#"{"k": 4, "max_k": 6}"#).unwrap();
        assert_eq!(req.k, Some(4));
        assert!(!req.is_auto());
        assert_eq!(req.max_k, Some(6));
    }
}
