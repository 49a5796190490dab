//! In-memory graph store, backed by a serde-loadable edge dump.
//!
//! Used for tests and for running against a JSON export of the method-call
//! table instead of a live database.

use crate::domain::edge::{CallEdge, ExtendedData, LineWindow};
use crate::domain::method;
use crate::domain::multi_impl::DispatchKind;
use crate::domain::ports::{GraphStore, ImplTarget, MethodId, StoreProvider};
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// One manually curated extended-data override row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualOverrideRow {
    /// Exact caller full method, or `*` for any caller.
    pub caller_full_method: String,
    pub callee_full_method: String,
    /// 1-based ordinal of the callee occurrence within the caller.
    pub callee_occurrence: u64,
    pub data_type: String,
    pub data_value: String,
}

/// Source-span row locating a method by class and line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodLineRow {
    pub method_hash: String,
    pub full_method: String,
    pub simple_class_name: String,
    pub min_line: u32,
    pub max_line: u32,
}

/// The whole store content in one serde-friendly bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeDump {
    pub edges: Vec<CallEdge>,
    #[serde(default)]
    pub manual_overrides: Vec<ManualOverrideRow>,
    /// (call id, data) pairs of auto-detected extended data.
    #[serde(default)]
    pub detected_extended: Vec<(i64, ExtendedData)>,
    /// (method hash, annotation name) pairs.
    #[serde(default)]
    pub annotations: Vec<(String, String)>,
    #[serde(default)]
    pub method_lines: Vec<MethodLineRow>,
}

#[derive(Debug)]
struct Inner {
    /// Edges sorted by call id; all lookups scan or binary-search this.
    edges: Vec<CallEdge>,
    dump: EdgeDump,
}

/// Cheap-to-clone handle; every clone is an independent `GraphStore`.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new(dump: EdgeDump) -> Self {
        let mut edges = dump.edges.clone();
        edges.sort_by_key(|e| e.call_id);
        Self {
            inner: Arc::new(Inner { edges, dump }),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read edge dump {}", path.display()))?;
        let dump: EdgeDump = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse edge dump {}", path.display()))?;
        Ok(Self::new(dump))
    }

    fn class_matches(edge_class: &str, edge_full_method: &str, wanted: &str) -> bool {
        edge_class == wanted || method::full_class_of(edge_full_method) == wanted
    }
}

impl StoreProvider for MemoryStore {
    fn open_store(&self) -> Result<Box<dyn GraphStore>> {
        Ok(Box::new(self.clone()))
    }
}

impl GraphStore for MemoryStore {
    fn next_edge(
        &self,
        caller_hash: &str,
        after_call_id: i64,
        line_window: Option<&LineWindow>,
    ) -> Result<Option<CallEdge>> {
        let edge = self
            .inner
            .edges
            .iter()
            .filter(|e| e.call_id > after_call_id && e.caller_method_hash == caller_hash)
            .find(|e| match line_window {
                Some(window) => e
                    .caller_line_number
                    .is_some_and(|line| window.contains(line)),
                None => true,
            });
        Ok(edge.cloned())
    }

    fn implementations_of(
        &self,
        dispatch_hash: &str,
        kind: DispatchKind,
    ) -> Result<Vec<ImplTarget>> {
        Ok(self
            .inner
            .edges
            .iter()
            .filter(|e| {
                e.enabled
                    && e.caller_method_hash == dispatch_hash
                    && e.call_type == kind.call_type()
            })
            .map(|e| ImplTarget {
                callee_class_name: e.callee_class_name.clone(),
                callee_full_method: e.callee_full_method.clone(),
            })
            .collect())
    }

    fn occurrence_index(
        &self,
        callee_hash: &str,
        caller_full_method: &str,
        upto_call_id: i64,
    ) -> Result<u64> {
        Ok(self
            .inner
            .edges
            .iter()
            .filter(|e| {
                e.call_id <= upto_call_id
                    && e.callee_method_hash == callee_hash
                    && e.caller_full_method == caller_full_method
            })
            .count() as u64)
    }

    fn find_entry_methods(&self, class_name: &str, method_prefix: &str) -> Result<Vec<MethodId>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for e in &self.inner.edges {
            if !Self::class_matches(&e.caller_class_name, &e.caller_full_method, class_name) {
                continue;
            }
            if !method::method_with_args(&e.caller_full_method).starts_with(method_prefix) {
                continue;
            }
            if seen.insert(e.caller_method_hash.clone()) {
                found.push(MethodId {
                    method_hash: e.caller_method_hash.clone(),
                    full_method: e.caller_full_method.clone(),
                });
            }
        }
        Ok(found)
    }

    fn find_method_by_line(&self, class_name: &str, line: u32) -> Result<Option<MethodId>> {
        Ok(self
            .inner
            .dump
            .method_lines
            .iter()
            .find(|row| {
                (row.simple_class_name == class_name
                    || method::full_class_of(&row.full_method) == class_name)
                    && row.min_line <= line
                    && line <= row.max_line
            })
            .map(|row| MethodId {
                method_hash: row.method_hash.clone(),
                full_method: row.full_method.clone(),
            }))
    }

    fn class_methods(&self, class_name: &str) -> Result<Vec<String>> {
        let mut methods: Vec<String> = self
            .inner
            .edges
            .iter()
            .filter(|e| Self::class_matches(&e.caller_class_name, &e.caller_full_method, class_name))
            .map(|e| e.caller_full_method.clone())
            .collect();
        methods.sort();
        methods.dedup();
        Ok(methods)
    }

    fn multi_dispatch_hashes(&self, kind: DispatchKind) -> Result<HashSet<String>> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for e in &self.inner.edges {
            if e.enabled && e.call_type == kind.call_type() {
                *counts.entry(e.caller_method_hash.as_str()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(hash, _)| hash.to_string())
            .collect())
    }

    fn detected_extended_call_ids(&self) -> Result<HashSet<i64>> {
        Ok(self
            .inner
            .dump
            .detected_extended
            .iter()
            .map(|(call_id, _)| *call_id)
            .collect())
    }

    fn extended_data_by_call_id(&self, call_id: i64) -> Result<Option<ExtendedData>> {
        Ok(self
            .inner
            .dump
            .detected_extended
            .iter()
            .find(|(id, _)| *id == call_id)
            .map(|(_, data)| data.clone()))
    }

    fn manual_override_pairs(&self) -> Result<HashMap<String, HashSet<String>>> {
        let mut pairs: HashMap<String, HashSet<String>> = HashMap::new();
        for row in &self.inner.dump.manual_overrides {
            pairs
                .entry(row.caller_full_method.clone())
                .or_default()
                .insert(row.callee_full_method.clone());
        }
        Ok(pairs)
    }

    fn manual_override(
        &self,
        caller_full_method: &str,
        callee_full_method: &str,
        occurrence: u64,
    ) -> Result<Vec<ExtendedData>> {
        Ok(self
            .inner
            .dump
            .manual_overrides
            .iter()
            .filter(|row| {
                row.caller_full_method == caller_full_method
                    && row.callee_full_method == callee_full_method
                    && row.callee_occurrence == occurrence
            })
            .map(|row| ExtendedData::new(row.data_type.clone(), row.data_value.clone()))
            .collect())
    }

    fn load_annotations(&self) -> Result<HashMap<String, Vec<String>>> {
        let mut annotations: HashMap<String, Vec<String>> = HashMap::new();
        for (hash, name) in &self.inner.dump.annotations {
            annotations.entry(hash.clone()).or_default().push(name.clone());
        }
        for names in annotations.values_mut() {
            names.sort();
        }
        Ok(annotations)
    }
}
