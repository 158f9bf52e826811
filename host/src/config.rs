//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `host.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: bind address, port, dashboard directory.
//!     - ClassifierConfig: whether the odor model is trained at startup.
//!     - ThresholdConfig: gas bands and fallback confidences.
//!     - LoggingConfig: log level and per-reading logging.
//!
//! every section is optional; a missing key takes its default.
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::decision::ThresholdTable;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub classifier: ClassifierConfig,
    pub thresholds: ThresholdConfig,
    pub logging: LoggingConfig,
    /// file the config was read from; None when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
    /// problems met while loading; logged once tracing is up
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// directory holding index.html for the dashboard
    pub static_dir: PathBuf,
    pub service_name: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub enabled: bool,
}

/// gas bands, in raw MQ units
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ThresholdConfig {
    /// above this the air is at least "mild odor"
    pub mild_gas: f64,
    /// above this the fallback path triggers the spray
    pub odor_gas: f64,
    pub odor_confidence: f64,
    pub mild_confidence: f64,
    pub clean_confidence: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub show_sensor_data: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
            static_dir: PathBuf::from("static"),
            service_name: "SIGETA".to_string(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            mild_gas: 400.0,
            odor_gas: 700.0,
            odor_confidence: 0.95,
            mild_confidence: 0.85,
            clean_confidence: 0.90,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), show_sensor_data: true }
    }
}

impl HostConfig {
    /// Parse and validate a TOML document
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: HostConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// An unreadable file is skipped with a warning, like a missing one.
    /// A file that reads but fails to parse or validate is an error.
    /// runs before logging is set up, so warnings are kept on the config.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let paths = [
            PathBuf::from("config").join("host.toml"),
            PathBuf::from("..").join("config").join("host.toml"),
        ];
        Self::load_first(&paths)
    }

    /// first readable path wins
    pub fn load_first(paths: &[PathBuf]) -> anyhow::Result<Self> {
        let mut warnings = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    warnings.push(format!("Failed to read {}: {}", path.display(), e));
                    continue;
                }
            };

            let mut config = Self::parse(&content)
                .map_err(|e| anyhow::anyhow!("{}: {:#}", path.display(), e))?;
            config.source = Some(path.clone());
            config.warnings = warnings;
            return Ok(config);
        }

        Ok(Self { warnings, ..Self::default() })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.thresholds;
        if !t.mild_gas.is_finite() || !t.odor_gas.is_finite() {
            anyhow::bail!("thresholds must be finite numbers");
        }
        if t.odor_gas < t.mild_gas {
            anyhow::bail!(
                "odor_gas ({}) must not be below mild_gas ({})",
                t.odor_gas,
                t.mild_gas
            );
        }
        for (name, c) in [
            ("odor_confidence", t.odor_confidence),
            ("mild_confidence", t.mild_confidence),
            ("clean_confidence", t.clean_confidence),
        ] {
            if !(0.0..=1.0).contains(&c) {
                anyhow::bail!("{} must be within [0, 1], got {}", name, c);
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.server.bind, self.server.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {}", self.server.bind, self.server.port, e))
    }

    /// dashboard directory; relative paths in a config file resolve against
    /// the directory that holds `config/`
    pub fn static_dir(&self) -> PathBuf {
        let dir = &self.server.static_dir;
        if dir.is_absolute() {
            return dir.clone();
        }
        match self.source.as_deref().and_then(Path::parent).and_then(Path::parent) {
            Some(root) => root.join(dir),
            None => dir.clone(),
        }
    }

    pub fn threshold_table(&self) -> ThresholdTable {
        ThresholdTable::from_config(&self.thresholds)
    }

    /// Default tracing filter when RUST_LOG is unset
    pub fn log_filter(&self) -> String {
        format!("sigeta_host={0},tower_http={0}", self.logging.level)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        for w in &self.warnings {
            tracing::warn!("[CONFIG] Warning: {}", w);
        }
        match &self.source {
            Some(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
            None => tracing::warn!("[CONFIG] No config file found - using defaults"),
        }
        tracing::info!("┌─────────────────────────────────────────┐");
        tracing::info!("│           HOST CONFIGURATION            │");
        tracing::info!("├─────────────────────────────────────────┤");
        tracing::info!("│ Listen: {}:{}", self.server.bind, self.server.port);
        tracing::info!("│ Dashboard dir: {}", self.static_dir().display());
        tracing::info!("│ Classifier: {}", if self.classifier.enabled { "enabled" } else { "disabled" });
        tracing::info!("│ Mild / odor gas: {} / {}", self.thresholds.mild_gas, self.thresholds.odor_gas);
        tracing::info!("│ Log Level: {}", self.logging.level);
        tracing::info!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = HostConfig::parse("").unwrap();
        assert_eq!(config.server.port, 5000);
        assert!(config.classifier.enabled);
        assert_eq!(config.thresholds.mild_gas, 400.0);
        assert_eq!(config.thresholds.odor_gas, 700.0);
        assert!(config.logging.show_sensor_data);
        assert!(config.source.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = HostConfig::parse(
            r#"
            [server]
            port = 8080

            [thresholds]
            odor_gas = 650.0
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.thresholds.odor_gas, 650.0);
        assert_eq!(config.thresholds.mild_gas, 400.0);
        assert_eq!(config.thresholds.odor_confidence, 0.95);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = HostConfig::parse("[thresholds]\nmild_gas = 800.0\nodor_gas = 700.0\n").unwrap_err();
        assert!(err.to_string().contains("odor_gas"));
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        assert!(HostConfig::parse("[thresholds]\nclean_confidence = 1.5\n").is_err());
    }

    #[test]
    fn static_dir_resolves_against_config_root() {
        let mut config = HostConfig::parse("[server]\nstatic_dir = \"host/static\"\n").unwrap();
        assert_eq!(config.static_dir(), PathBuf::from("host/static"));

        config.source = Some(PathBuf::from("/srv/sigeta/config/host.toml"));
        assert_eq!(config.static_dir(), PathBuf::from("/srv/sigeta/host/static"));
    }

    /// fresh scratch directory under the system temp dir
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sigeta-config-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = scratch("missing");
        let config = HostConfig::load_first(&[dir.join("config").join("host.toml")]).unwrap();
        assert!(config.source.is_none());
        assert!(config.warnings.is_empty());
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn unreadable_file_falls_back_with_warning() {
        let dir = scratch("unreadable");
        // a directory where the file should be cannot be read as text
        let path = dir.join("host.toml");
        std::fs::create_dir_all(&path).unwrap();

        let config = HostConfig::load_first(&[path]).unwrap();
        assert!(config.source.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(config.warnings[0].contains("host.toml"));
        assert_eq!(config.thresholds.odor_gas, 700.0);
    }

    #[test]
    fn unreadable_first_path_falls_through_to_second() {
        let dir = scratch("fallthrough");
        let first = dir.join("first.toml");
        std::fs::create_dir_all(&first).unwrap();
        let second = dir.join("second.toml");
        std::fs::write(&second, "[server]\nport = 6001\n").unwrap();

        let config = HostConfig::load_first(&[first, second.clone()]).unwrap();
        assert_eq!(config.server.port, 6001);
        assert_eq!(config.source, Some(second));
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn first_existing_path_wins() {
        let dir = scratch("order");
        let first = dir.join("first.toml");
        let second = dir.join("second.toml");
        std::fs::write(&first, "[server]\nport = 7001\n").unwrap();
        std::fs::write(&second, "[server]\nport = 7002\n").unwrap();

        let config = HostConfig::load_first(&[dir.join("absent.toml"), first.clone(), second]).unwrap();
        assert_eq!(config.server.port, 7001);
        assert_eq!(config.source, Some(first));
    }

    #[test]
    fn invalid_file_is_fatal() {
        let dir = scratch("invalid");
        let path = dir.join("host.toml");
        std::fs::write(&path, "[thresholds]\nmild_gas = 900.0\n").unwrap();
        let err = HostConfig::load_first(&[path]).unwrap_err();
        assert!(err.to_string().contains("host.toml"));

        let path = dir.join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(HostConfig::load_first(&[path]).is_err());
    }

    #[test]
    fn socket_addr_combines_bind_and_port() {
        let config = HostConfig::parse("[server]\nbind = \"127.0.0.1\"\nport = 5001\n").unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:5001");
    }
}
