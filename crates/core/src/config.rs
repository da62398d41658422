use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Config file ───────────────────────────────────────────────

/// Options read from a `--conf` TOML file.
///
/// Keys are the long CLI flag names (`es-addr`, `lua-vms`, ...). Every key is
/// optional; a value here only applies when the flag was given neither on the
/// command line nor through its environment variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub alerts: Option<PathBuf>,
    pub es_addr: Option<String>,
    pub es_user: Option<String>,
    pub es_pass: Option<String>,
    pub lua_init: Option<PathBuf>,
    pub lua_vms: Option<usize>,
    pub slack_webhook: Option<String>,
    pub dingding_webhook: Option<String>,
    pub force_run: Option<String>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub run_timeout: Option<String>,
}

impl FileConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// A YAML file, or a directory of YAML files, holding rule definitions.
    pub alerts_path: PathBuf,
    pub elasticsearch: ElasticsearchConfig,
    pub script: ScriptConfig,
    pub notify: NotifyConfig,
    pub log: LogConfig,
    /// When set, run only this rule once and exit.
    pub force_run: Option<String>,
    /// Optional per-run deadline as a duration string (`30s`, `5m`, ...).
    pub run_timeout: Option<String>,
}

impl Config {
    /// Reject settings the engine cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alerts_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing("alerts"));
        }
        if self.script.vms == 0 {
            return Err(ConfigError::Invalid {
                key: "lua-vms",
                reason: "at least one interpreter is required".to_string(),
            });
        }
        if self.elasticsearch.addr.trim().is_empty() {
            return Err(ConfigError::Missing("es-addr"));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  alerts:         {}", self.alerts_path.display());
        tracing::info!(
            "  elasticsearch:  addr={}, user={}",
            self.elasticsearch.addr,
            self.elasticsearch.user
        );
        tracing::info!(
            "  script:         vms={}, init={}",
            self.script.vms,
            self.script
                .init_script
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        tracing::info!(
            "  notify:         slack={}, dingding={}",
            self.notify.slack_webhook.is_some(),
            self.notify.dingding_webhook.is_some()
        );
        tracing::info!(
            "  log:            level={}, dir={}",
            self.log.level,
            self.log
                .dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(stdout)".to_string())
        );
    }
}

// ── Elasticsearch ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// `host:port` or a full `http(s)://` base URL.
    pub addr: String,
    pub user: String,
    pub password: String,
}

impl ElasticsearchConfig {
    /// Base URL with a scheme, suitable for joining request paths onto.
    pub fn base_url(&self) -> String {
        let addr = self.addr.trim().trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        }
    }
}

// ── Scripting ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Script executed once in every interpreter at pool construction.
    pub init_script: Option<PathBuf>,
    /// Number of independent interpreters in the pool.
    pub vms: usize,
}

// ── Notification connectors ───────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub slack_webhook: Option<String>,
    pub dingding_webhook: Option<String>,
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
    /// Directory for daily log files; stdout when unset.
    pub dir: Option<PathBuf>,
}
