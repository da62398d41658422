//! esalert: scheduled Elasticsearch alerting.
//!
//! Loads rule files, then either runs every rule on its cron schedule until
//! Ctrl-C, or with `--force-run <name>` runs one rule once and exits.
//!
//! Options come from the command line, then `ESALERT_*` environment
//! variables, then the optional `--conf` TOML file, then built-in defaults.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use esalert_core::config::{ElasticsearchConfig, LogConfig, NotifyConfig, ScriptConfig};
use esalert_core::{Config, FileConfig};
use esalert_notify::Dispatcher;
use esalert_rules::loader::{LoadStatus, RuleLoader};
use esalert_rules::{RuleScheduler, ThrottleGuard};
use esalert_runner::{parse_run_timeout, report_outcome, Orchestrator};
use esalert_script::EnginePool;
use esalert_search::ElasticsearchClient;

// ── CLI ─────────────────────────────────────────────────────────────

/// Run alert rules against Elasticsearch on a schedule.
#[derive(Parser, Debug)]
#[command(name = "esalert", version, about)]
struct Cli {
    /// TOML file with default values for any of the options below.
    #[arg(short, long, env = "ESALERT_CONF")]
    conf: Option<PathBuf>,

    /// Rule file, or directory of rule files (searched recursively).
    #[arg(short, long, env = "ESALERT_ALERTS")]
    alerts: Option<PathBuf>,

    /// Elasticsearch address (`host:port` or URL).
    #[arg(long, env = "ESALERT_ES_ADDR", default_value = "127.0.0.1:9200")]
    es_addr: String,

    #[arg(long, env = "ESALERT_ES_USER", default_value = "elastic")]
    es_user: String,

    #[arg(long, env = "ESALERT_ES_PASS", default_value = "changeme", hide_env_values = true)]
    es_pass: String,

    /// Lua script run once in every interpreter at startup.
    #[arg(long, env = "ESALERT_LUA_INIT")]
    lua_init: Option<PathBuf>,

    /// Number of Lua interpreters shared by all rules.
    #[arg(long, env = "ESALERT_LUA_VMS", default_value_t = 1)]
    lua_vms: usize,

    /// Slack webhook URL, required for `slack` actions.
    #[arg(long, env = "ESALERT_SLACK_WEBHOOK", hide_env_values = true)]
    slack_webhook: Option<String>,

    /// DingTalk robot webhook URL, required for `dingding` actions.
    #[arg(long, env = "ESALERT_DINGDING_WEBHOOK", hide_env_values = true)]
    dingding_webhook: Option<String>,

    /// Run the named rule once, immediately, and exit.
    #[arg(long, env = "ESALERT_FORCE_RUN")]
    force_run: Option<String>,

    /// error, warn, info, debug or trace. `RUST_LOG` takes precedence.
    #[arg(long, env = "ESALERT_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write daily log files here instead of stdout.
    #[arg(long, env = "ESALERT_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Abandon a run after this long (`30s`, `5m`, `1h`).
    #[arg(long, env = "ESALERT_RUN_TIMEOUT")]
    run_timeout: Option<String>,
}

/// Whether the option `id` was left to its default, so a file value may apply.
fn unset(matches: &ArgMatches, id: &str) -> bool {
    !matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

impl Cli {
    /// Parse the command line, layering the `--conf` file underneath it.
    fn load() -> Result<Self> {
        Self::load_from(std::env::args_os())
    }

    fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches = Self::command().get_matches_from(args);
        let cli = Self::from_arg_matches(&matches)?;
        match &cli.conf {
            Some(path) => {
                let file = FileConfig::load(path)?;
                Ok(cli.merge_file(&matches, file))
            }
            None => Ok(cli),
        }
    }

    /// Fill every option not given on the command line or in the environment.
    fn merge_file(mut self, matches: &ArgMatches, file: FileConfig) -> Self {
        macro_rules! fill {
            ($field:ident) => {
                if unset(matches, stringify!($field)) {
                    if let Some(value) = file.$field {
                        self.$field = value;
                    }
                }
            };
            ($field:ident, optional) => {
                if unset(matches, stringify!($field)) && file.$field.is_some() {
                    self.$field = file.$field;
                }
            };
        }

        fill!(alerts, optional);
        fill!(es_addr);
        fill!(es_user);
        fill!(es_pass);
        fill!(lua_init, optional);
        fill!(lua_vms);
        fill!(slack_webhook, optional);
        fill!(dingding_webhook, optional);
        fill!(force_run, optional);
        fill!(log_level);
        fill!(log_dir, optional);
        fill!(run_timeout, optional);
        self
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            alerts_path: cli.alerts.unwrap_or_default(),
            elasticsearch: ElasticsearchConfig {
                addr: cli.es_addr,
                user: cli.es_user,
                password: cli.es_pass,
            },
            script: ScriptConfig {
                init_script: cli.lua_init,
                vms: cli.lua_vms,
            },
            notify: NotifyConfig {
                slack_webhook: cli.slack_webhook.filter(|s| !s.is_empty()),
                dingding_webhook: cli.dingding_webhook.filter(|s| !s.is_empty()),
            },
            log: LogConfig {
                level: cli.log_level,
                dir: cli.log_dir,
            },
            force_run: cli.force_run,
            run_timeout: cli.run_timeout,
        }
    }
}

// ── Logging ─────────────────────────────────────────────────────────

/// Install the global subscriber. The returned guard flushes file output on drop.
///
/// Output always goes to stdout; with a log directory it is also written to a
/// daily rolling file there.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .with_context(|| format!("invalid log level '{}'", log.level))?;

    let (file_layer, guard) = match &log.dir {
        Some(dir) => {
            let appender = RollingBuilder::new()
                .rotation(Rotation::DAILY)
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
    Ok(guard)
}

// ── Main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    esalert_core::config::load_dotenv();
    let config: Config = Cli::load()?.into();
    let _log_guard = init_tracing(&config.log)?;

    config.validate()?;
    config.log_summary();
    let run_timeout = config
        .run_timeout
        .as_deref()
        .map(parse_run_timeout)
        .transpose()?;

    // Rules
    let loader = RuleLoader::new(config.alerts_path.clone());
    let results = loader.load_all().context("loading rule files")?;
    for result in &results {
        match &result.status {
            LoadStatus::Loaded { rule_names } => {
                info!(path = %result.path.display(), rules = ?rule_names, "rule file loaded")
            }
            LoadStatus::Skipped { reason } => {
                info!(path = %result.path.display(), reason = %reason, "rule file skipped")
            }
            LoadStatus::Failed { error } => {
                error!(path = %result.path.display(), error = %error, "rule file rejected")
            }
        }
    }
    let report = loader.initialize();
    info!(
        rules = report.rules.len(),
        failed = report.failures.len(),
        "rules initialized"
    );

    // Pipeline
    let throttle = Arc::new(ThrottleGuard::new());
    for rule in &report.rules {
        throttle.register(&rule.name, rule.cooldown);
    }
    let pool = EnginePool::lua(config.script.vms, config.script.init_script.as_deref())
        .context("starting Lua interpreters")?;
    let search = Arc::new(
        ElasticsearchClient::new(&config.elasticsearch).context("building search client")?,
    );
    let dispatcher =
        Arc::new(Dispatcher::from_config(&config.notify).context("configuring connectors")?);
    let orchestrator = Arc::new(
        Orchestrator::new(search, pool.clone(), throttle, dispatcher).with_run_timeout(run_timeout),
    );

    if let Some(name) = &config.force_run {
        let Some(rule) = report.rules.iter().find(|r| &r.name == name) else {
            bail!("no initialized rule named '{name}'");
        };
        info!(rule = %name, "force-running rule once");
        let outcome = orchestrator.run(rule).await;
        report_outcome(name, &outcome);
        return Ok(if outcome.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let mut scheduler = RuleScheduler::new();
    for rule in report.rules {
        scheduler.add_rule(Arc::new(rule));
    }
    if scheduler.is_empty() {
        warn!("no rules to schedule");
    }
    scheduler.start(orchestrator);
    info!(rules = scheduler.len(), "scheduler running, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl-C")?;
    info!("shutdown requested, waiting for in-flight runs");
    scheduler.shutdown();
    scheduler.join().await;
    pool.close();
    info!("stopped");

    Ok(ExitCode::SUCCESS)
}
