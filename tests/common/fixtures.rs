//! Fixture builders for integration tests.
#![allow(dead_code)]

use callchain::adapters::store::memory::{EdgeDump, MemoryStore};
use callchain::config::AppConfig;
use callchain::domain::edge::{CallEdge, CallType};
use callchain::domain::method;
use std::path::Path;

/// Deterministic readable stand-in for the ingested method hash.
pub fn method_hash(full_method: &str) -> String {
    format!(
        "h_{}_{}",
        method::simple_class_of_method(full_method),
        method::method_name(full_method)
    )
}

/// A normal enabled edge; the caller line defaults to 10.
pub fn edge(call_id: i64, caller_full: &str, callee_full: &str) -> CallEdge {
    edge_at_line(call_id, caller_full, callee_full, 10)
}

pub fn edge_at_line(call_id: i64, caller_full: &str, callee_full: &str, line: u32) -> CallEdge {
    CallEdge {
        call_id,
        call_type: CallType::Normal,
        enabled: true,
        caller_method_hash: method_hash(caller_full),
        caller_full_method: caller_full.to_string(),
        caller_class_name: method::simple_class_of_method(caller_full).to_string(),
        caller_line_number: Some(line),
        callee_method_hash: method_hash(callee_full),
        callee_full_method: callee_full.to_string(),
        callee_class_name: method::simple_class_of_method(callee_full).to_string(),
    }
}

/// An interface/subclass dispatch edge from a dispatch point to one
/// implementation.
pub fn typed_edge(
    call_id: i64,
    caller_full: &str,
    callee_full: &str,
    call_type: CallType,
) -> CallEdge {
    let mut e = edge(call_id, caller_full, callee_full);
    e.call_type = call_type;
    e
}

pub fn store(edges: Vec<CallEdge>) -> MemoryStore {
    MemoryStore::new(EdgeDump {
        edges,
        ..EdgeDump::default()
    })
}

/// Minimal run configuration for the given output dir and entry list.
pub fn run_config(out_dir: &Path, entries: &[&str]) -> AppConfig {
    let mut config = AppConfig::default();
    config.entry_methods = entries.iter().map(|e| e.to_string()).collect();
    config.output.dir = out_dir.to_path_buf();
    config.pool.threads = 2;
    config
}
