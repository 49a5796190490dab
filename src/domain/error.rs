use thiserror::Error;

/// Failure of a single root task. All variants abort only the task they
/// occurred in; the wave scheduler isolates them from sibling tasks.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("store query failed: {0:#}")]
    Store(anyhow::Error),

    #[error("failed to write call-chain output: {0}")]
    OutputWrite(#[from] std::io::Error),

    #[error(
        "more than one manual extended-data override matches \
         caller {caller} callee {callee} occurrence {occurrence}"
    )]
    AmbiguousOverride {
        caller: String,
        callee: String,
        occurrence: u64,
    },

    #[error("entry method {class}:{method} matches more than one method: {candidates:?}")]
    AmbiguousEntry {
        class: String,
        method: String,
        candidates: Vec<String>,
    },

    #[error("extended-data plugin failed: {0:#}")]
    Plugin(anyhow::Error),

    #[error("extended data type {0:?} is not allowed here")]
    ReservedDataType(String),

    #[error("extended data type {0:?} contains the type/value separator")]
    InvalidDataType(String),
}
