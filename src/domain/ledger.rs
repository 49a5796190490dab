//! Run-scoped bookkeeping shared across workers: disabled dispatch calls and
//! one-to-many dispatch calls, both reported at the end of the run.

use crate::domain::edge::CallEdge;
use crate::domain::multi_impl::DispatchKind;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Callees recorded under one dispatching caller method.
#[derive(Debug, Clone, Default)]
pub struct DispatchCalls {
    pub caller_method_hash: String,
    pub callees: BTreeSet<String>,
}

type CallMap = DashMap<String, DispatchCalls>;

fn record_call(map: &CallMap, edge: &CallEdge) {
    let mut entry = map
        .entry(edge.caller_full_method.clone())
        .or_insert_with(|| DispatchCalls {
            caller_method_hash: edge.caller_method_hash.clone(),
            callees: BTreeSet::new(),
        });
    entry.callees.insert(edge.callee_full_method.clone());
}

fn sorted_snapshot(map: &CallMap) -> Vec<(String, DispatchCalls)> {
    let mut rows: Vec<_> = map
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}

/// Disabled interface/subclass edges encountered during traversal, grouped by
/// the owning dispatch point. Other call types are not recorded.
#[derive(Debug, Default)]
pub struct DisabledLedger {
    interface: CallMap,
    subclass: CallMap,
}

impl DisabledLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, edge: &CallEdge) {
        match DispatchKind::of_call_type(edge.call_type) {
            Some(DispatchKind::Interface) => record_call(&self.interface, edge),
            Some(DispatchKind::Subclass) => record_call(&self.subclass, edge),
            None => {}
        }
    }

    pub fn snapshot(&self, kind: DispatchKind) -> Vec<(String, DispatchCalls)> {
        match kind {
            DispatchKind::Interface => sorted_snapshot(&self.interface),
            DispatchKind::Subclass => sorted_snapshot(&self.subclass),
        }
    }

    pub fn is_empty(&self, kind: DispatchKind) -> bool {
        match kind {
            DispatchKind::Interface => self.interface.is_empty(),
            DispatchKind::Subclass => self.subclass.is_empty(),
        }
    }
}

/// Rendered interface/subclass edges, used to flag callers whose dispatch
/// point fans out to more than one callee in the final output.
#[derive(Debug, Default)]
pub struct MultiCallLedger {
    interface: CallMap,
    subclass: CallMap,
}

impl MultiCallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, edge: &CallEdge) {
        match DispatchKind::of_call_type(edge.call_type) {
            Some(DispatchKind::Interface) => record_call(&self.interface, edge),
            Some(DispatchKind::Subclass) => record_call(&self.subclass, edge),
            None => {}
        }
    }

    /// Callers that dispatched to more than one distinct callee.
    pub fn one_to_many(&self, kind: DispatchKind) -> Vec<(String, DispatchCalls)> {
        let rows = match kind {
            DispatchKind::Interface => sorted_snapshot(&self.interface),
            DispatchKind::Subclass => sorted_snapshot(&self.subclass),
        };
        rows.into_iter()
            .filter(|(_, calls)| calls.callees.len() > 1)
            .collect()
    }
}
