use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Call type - granular classification of a recorded invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Plain virtual/static invocation
    Normal,
    /// Interface method dispatching to an implementation
    Interface,
    /// Abstract superclass method dispatching to a subclass override
    Subclass,
    /// Runnable implementation constructor wired to its run() method
    RunnableRun,
    /// Callable implementation constructor wired to its call() method
    CallableCall,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Normal => "normal",
            CallType::Interface => "interface",
            CallType::Subclass => "subclass",
            CallType::RunnableRun => "runnable_run",
            CallType::CallableCall => "callable_call",
        }
    }

    /// Constructor-to-run wiring must not be dropped by method-name ignore rules,
    /// since `run(`/`call(` prefixes are common ignore targets.
    pub fn is_construct_to_run(&self) -> bool {
        matches!(self, CallType::RunnableRun | CallType::CallableCall)
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(CallType::Normal),
            "interface" => Ok(CallType::Interface),
            "subclass" => Ok(CallType::Subclass),
            "runnable_run" => Ok(CallType::RunnableRun),
            "callable_call" => Ok(CallType::CallableCall),
            other => Err(format!("unknown call type: {other}")),
        }
    }
}

/// One row of the method-call relationship table.
///
/// Edges are immutable during traversal; `call_id` is the global ordering key
/// (monotonically increasing, never reused) that makes sibling enumeration
/// deterministic and resumable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub call_id: i64,
    pub call_type: CallType,
    pub enabled: bool,
    pub caller_method_hash: String,
    pub caller_full_method: String,
    /// Simple class name of the caller (fully qualified on simple-name clashes)
    pub caller_class_name: String,
    pub caller_line_number: Option<u32>,
    pub callee_method_hash: String,
    pub callee_full_method: String,
    pub callee_class_name: String,
}

/// Inclusive caller-line range restricting depth-0 children of a root task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineWindow {
    pub start: u32,
    pub end: u32,
}

impl LineWindow {
    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

/// An auxiliary annotation attached to one call occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedData {
    pub data_type: String,
    pub data_value: String,
}

impl ExtendedData {
    pub fn new(data_type: impl Into<String>, data_value: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            data_value: data_value.into(),
        }
    }
}
