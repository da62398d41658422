use std::path::PathBuf;

/// Errors from evaluating a decision procedure.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("decision procedure returned {0}, expected a list of actions")]
    NotASequence(&'static str),

    #[error("interpreter panicked during evaluation")]
    Panicked,

    #[error("engine pool is closed")]
    PoolClosed,
}

/// Errors from constructing an engine pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("engine pool size must be at least 1")]
    Empty,

    #[error("reading init script {path}: {source}")]
    InitScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("init script failed on interpreter {instance}: {source}")]
    InitScript {
        instance: usize,
        #[source]
        source: mlua::Error,
    },
}
