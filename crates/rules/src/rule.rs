//! Initialized, immutable alert rules.
//!
//! A [`RuleDefinition`] becomes a [`Rule`] only after every part of it has
//! been validated: the schedule parses, the three search templates compile,
//! the throttle period parses and the decision procedure source is readable.
//! A defect in any one of them rejects the whole rule.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cron::Schedule;

use esalert_core::{DecisionProcedure, ExecutionContext, Metadata, SearchRequest};

use crate::scheduler::{normalize_cron, parse_cooldown};
use crate::schema::{ProcessSource, RuleDefinition};
use crate::templates::{CompileError, CompiledSearch, QueryTemplate, RenderError};

/// Reasons a rule definition cannot be initialized.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("parsing interval '{expr}': {reason}")]
    Schedule { expr: String, reason: String },

    #[error(transparent)]
    Template(#[from] CompileError),

    #[error("invalid throttle period '{0}': only <int>[s|m|h] is supported")]
    ThrottlePeriod(String),

    #[error("process must set exactly one of lua_file or lua_inline")]
    Process,

    #[error("reading decision procedure {path}: {source}")]
    ProcessFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rule that passed initialization and is eligible for scheduling.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    /// Normalized cron expression the schedule was parsed from.
    pub cron_expression: String,
    pub schedule: Schedule,
    pub search: CompiledSearch,
    pub procedure: DecisionProcedure,
    pub cooldown: Duration,
    pub metadata: Metadata,
}

impl Rule {
    /// Validate and compile a rule definition.
    ///
    /// Relative `lua_file` paths resolve against `base_dir` when given.
    pub fn init(definition: RuleDefinition, base_dir: Option<&Path>) -> Result<Self, InitError> {
        if definition.name.trim().is_empty() {
            return Err(InitError::EmptyName);
        }

        let query = match (definition.search, definition.search_query) {
            (Some(document), _) => QueryTemplate::Structured(document),
            (None, Some(text)) => QueryTemplate::Raw(text),
            (None, None) => QueryTemplate::Raw(String::new()),
        };
        let search = CompiledSearch::compile(
            &definition.search_index,
            &definition.search_type,
            &query,
        )?;

        let cron_expression = normalize_cron(&definition.interval);
        let schedule: Schedule = cron_expression.parse().map_err(|e: cron::error::Error| {
            InitError::Schedule {
                expr: definition.interval.clone(),
                reason: e.to_string(),
            }
        })?;

        let cooldown = match definition.throttle_period.as_deref() {
            None => Duration::ZERO,
            Some(period) => parse_cooldown(period)
                .ok_or_else(|| InitError::ThrottlePeriod(period.to_string()))?,
        };

        let procedure = load_procedure(definition.process, base_dir)?;

        Ok(Self {
            name: definition.name,
            cron_expression,
            schedule,
            search,
            procedure,
            cooldown,
            metadata: definition.metadata,
        })
    }

    /// Render this rule's search parameters for one run.
    pub fn render_search(&self, ctx: &ExecutionContext) -> Result<SearchRequest, RenderError> {
        self.search.render(ctx)
    }
}

fn load_procedure(
    process: ProcessSource,
    base_dir: Option<&Path>,
) -> Result<DecisionProcedure, InitError> {
    match (process.lua_file, process.lua_inline) {
        (Some(file), None) => {
            let path = match base_dir {
                Some(dir) if file.is_relative() => dir.join(&file),
                _ => file,
            };
            let source = std::fs::read_to_string(&path).map_err(|source| {
                InitError::ProcessFile {
                    path: path.clone(),
                    source,
                }
            })?;
            Ok(DecisionProcedure {
                path: Some(path),
                source,
            })
        }
        (None, Some(inline)) => Ok(DecisionProcedure::inline(inline)),
        _ => Err(InitError::Process),
    }
}
