//! Configuration loading for the ANN harness.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/ann-harness/config.toml.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::HarnessError;

/// Environment variable prefix (`ANN_HARNESS_K=20`, ...)
pub const ENV_PREFIX: &str = "ANN_HARNESS";

/// Main harness settings.
///
/// Index parameters are passed through to the HNSW collaborator as-is;
/// workload parameters shape the synthetic build and query runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vector dimensionality
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Number of vectors to index (also the index capacity)
    #[serde(default = "default_max_elements")]
    pub max_elements: usize,

    /// Connections per HNSW layer (M)
    #[serde(default = "default_connectivity")]
    pub connectivity: usize,

    /// Build-time search depth (ef_construction)
    #[serde(default = "default_expansion_add")]
    pub expansion_add: usize,

    /// Query-time search depth (ef)
    #[serde(default = "default_expansion_search")]
    pub expansion_search: usize,

    /// Worker threads for build and query (0 = one per hardware thread)
    #[serde(default)]
    pub num_threads: usize,

    /// Neighbors requested per query
    #[serde(default = "default_k")]
    pub k: usize,

    /// Number of query rows (the first `query_count` indexed vectors)
    #[serde(default = "default_query_count")]
    pub query_count: usize,

    /// Only labels divisible by this value are returned
    #[serde(default = "default_filter_divisor")]
    pub filter_divisor: u64,

    /// Seed for synthetic vector generation
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding index files
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// Explicit index file, overrides the name derived from build parameters
    #[serde(default)]
    pub index_path: Option<String>,
}

fn default_dimension() -> usize {
    128
}

fn default_max_elements() -> usize {
    10_000
}

fn default_connectivity() -> usize {
    16
}

fn default_expansion_add() -> usize {
    200
}

fn default_expansion_search() -> usize {
    512
}

fn default_k() -> usize {
    10
}

fn default_query_count() -> usize {
    100
}

fn default_filter_divisor() -> u64 {
    2
}

fn default_seed() -> u64 {
    47
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_index_dir() -> String {
    ProjectDirs::from("", "", "ann-harness")
        .map(|p| p.data_local_dir().join("indexes"))
        .unwrap_or_else(|| PathBuf::from("./indexes"))
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            max_elements: default_max_elements(),
            connectivity: default_connectivity(),
            expansion_add: default_expansion_add(),
            expansion_search: default_expansion_search(),
            num_threads: 0,
            k: default_k(),
            query_count: default_query_count(),
            filter_divisor: default_filter_divisor(),
            seed: default_seed(),
            log_level: default_log_level(),
            index_dir: default_index_dir(),
            index_path: None,
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/ann-harness/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (ANN_HARNESS_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, HarnessError> {
        let config_dir = ProjectDirs::from("", "", "ann-harness")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults
            .set_default("dimension", default_dimension() as i64)?
            .set_default("max_elements", default_max_elements() as i64)?
            .set_default("connectivity", default_connectivity() as i64)?
            .set_default("expansion_add", default_expansion_add() as i64)?
            .set_default("expansion_search", default_expansion_search() as i64)?
            .set_default("num_threads", 0_i64)?
            .set_default("k", default_k() as i64)?
            .set_default("query_count", default_query_count() as i64)?
            .set_default("filter_divisor", default_filter_divisor() as i64)?
            .set_default("seed", default_seed() as i64)?
            .set_default("log_level", default_log_level())?
            .set_default("index_dir", default_index_dir())?
            // 2. Default config file
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        // 3. CLI-specified config file (higher precedence than default)
        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // 4. Environment variables: ANN_HARNESS_MAX_ELEMENTS, ANN_HARNESS_K, ...
        // Nested keys would use a double underscore, so single underscores
        // stay part of the field name.
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Reject settings the index or the query batch cannot work with.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.dimension == 0 {
            return Err(HarnessError::InvalidInput("dimension must be > 0".to_string()));
        }
        if self.max_elements == 0 {
            return Err(HarnessError::InvalidInput(
                "max_elements must be > 0".to_string(),
            ));
        }
        if self.connectivity == 0 {
            return Err(HarnessError::InvalidInput(
                "connectivity must be > 0".to_string(),
            ));
        }
        if self.k == 0 {
            return Err(HarnessError::InvalidInput("k must be > 0".to_string()));
        }
        if self.filter_divisor == 0 {
            return Err(HarnessError::InvalidInput(
                "filter_divisor must be > 0".to_string(),
            ));
        }
        if self.query_count > self.max_elements {
            return Err(HarnessError::InvalidInput(format!(
                "query_count ({}) exceeds max_elements ({})",
                self.query_count, self.max_elements
            )));
        }
        Ok(())
    }

    /// Index file for these settings.
    ///
    /// Without an explicit `index_path` the name encodes everything that
    /// shapes the saved graph: dimension, M, ef_construction, element count
    /// and the vector seed.
    pub fn index_file(&self) -> PathBuf {
        match &self.index_path {
            Some(path) => expand_home(path),
            None => expand_home(&self.index_dir).join(format!(
                "hnsw_d{}_m{}_ef{}_n{}_s{}.usearch",
                self.dimension, self.connectivity, self.expansion_add, self.max_elements, self.seed
            )),
        }
    }

    /// Pretty JSON rendering, used by `ann-harness info`.
    pub fn to_json_pretty(&self) -> Result<String, HarnessError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.dimension, 128);
        assert_eq!(settings.max_elements, 10_000);
        assert_eq!(settings.connectivity, 16);
        assert_eq!(settings.expansion_add, 200);
        assert_eq!(settings.num_threads, 0);
        assert_eq!(settings.filter_divisor, 2);
        assert_eq!(settings.seed, 47);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.dimension, 128);
        assert_eq!(settings.connectivity, 16);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "dimension = 2\nmax_elements = 10\nquery_count = 4\nfilter_divisor = 3"
        )
        .unwrap();

        let settings = Settings::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(settings.dimension, 2);
        assert_eq!(settings.max_elements, 10);
        assert_eq!(settings.query_count, 4);
        assert_eq!(settings.filter_divisor, 3);
        // untouched keys keep their defaults
        assert_eq!(settings.expansion_add, 200);
    }

    #[test]
    fn test_missing_cli_config_is_error() {
        let result = Settings::load(Some("/nonexistent/ann-harness/config.toml"));
        assert!(matches!(result, Err(HarnessError::Config(_))));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("ANN_HARNESS_EXPANSION_SEARCH", "77");
        let settings = Settings::load(None);
        std::env::remove_var("ANN_HARNESS_EXPANSION_SEARCH");
        assert_eq!(settings.unwrap().expansion_search, 77);
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.k = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.filter_divisor = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.max_elements = 10;
        settings.query_count = 11;
        assert!(matches!(
            settings.validate(),
            Err(HarnessError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_index_file_encodes_build_parameters() {
        let settings = Settings {
            index_dir: "/tmp/idx".to_string(),
            connectivity: 32,
            expansion_add: 500,
            max_elements: 500_000,
            ..Default::default()
        };
        assert_eq!(
            settings.index_file(),
            PathBuf::from("/tmp/idx/hnsw_d128_m32_ef500_n500000_s47.usearch")
        );
    }

    #[test]
    fn test_index_file_changes_with_dimension_and_seed() {
        let base = Settings {
            index_dir: "/tmp/idx".to_string(),
            ..Default::default()
        };
        let reseeded = Settings {
            seed: 1,
            ..base.clone()
        };
        let narrower = Settings {
            dimension: 64,
            ..base.clone()
        };

        assert_ne!(base.index_file(), reseeded.index_file());
        assert_ne!(base.index_file(), narrower.index_file());
        assert_ne!(reseeded.index_file(), narrower.index_file());
    }

    #[test]
    fn test_explicit_index_path_wins() {
        let settings = Settings {
            index_path: Some("/data/custom.usearch".to_string()),
            ..Default::default()
        };
        assert_eq!(settings.index_file(), PathBuf::from("/data/custom.usearch"));
    }

    #[test]
    fn test_settings_json() {
        let json = Settings::default().to_json_pretty().unwrap();
        let decoded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.k, 10);
        assert_eq!(decoded.index_path, None);
    }
}
