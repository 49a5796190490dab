//! Dispatch points (interface / abstract-superclass methods with multiple
//! implementations) and the registry that defers their expansion to a later
//! wave.

use crate::domain::edge::CallType;
use crate::domain::ports::GraphStore;
use anyhow::Result;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    Interface,
    Subclass,
}

impl DispatchKind {
    pub fn call_type(&self) -> CallType {
        match self {
            DispatchKind::Interface => CallType::Interface,
            DispatchKind::Subclass => CallType::Subclass,
        }
    }

    pub fn of_call_type(call_type: CallType) -> Option<DispatchKind> {
        match call_type {
            CallType::Interface => Some(DispatchKind::Interface),
            CallType::Subclass => Some(DispatchKind::Subclass),
            _ => None,
        }
    }
}

/// Hashes of methods with more than one reachable implementation, split by
/// dispatch kind. Queried once at run start.
#[derive(Debug, Default)]
pub struct DispatchIndex {
    pub interface: HashSet<String>,
    pub subclass: HashSet<String>,
}

impl DispatchIndex {
    pub fn load(store: &dyn GraphStore) -> Result<Self> {
        Ok(Self {
            interface: store.multi_dispatch_hashes(DispatchKind::Interface)?,
            subclass: store.multi_dispatch_hashes(DispatchKind::Subclass)?,
        })
    }

    pub fn kind_of(&self, method_hash: &str) -> Option<DispatchKind> {
        if self.interface.contains(method_hash) {
            Some(DispatchKind::Interface)
        } else if self.subclass.contains(method_hash) {
            Some(DispatchKind::Subclass)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct DispatchPointInfo {
    kind: DispatchKind,
    /// Cross-reference base name rendered in the parent chain; also the
    /// subdirectory the follow-up artifacts land in.
    base_name: String,
}

/// A root task seeded by a drained dispatch point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpTask {
    pub class_name: String,
    pub method_with_args: String,
    pub save_subdir: String,
}

/// Tracks dispatch points discovered while walking.
///
/// The lifetime set guarantees a dispatch point is expanded at most once per
/// run; the per-wave map feeds the next wave's task list. Both sides need
/// linearizable insert-if-absent since workers record concurrently.
#[derive(Debug, Default)]
pub struct MultiImplRegistry {
    lifetime: DashSet<String>,
    wave: DashMap<String, DispatchPointInfo>,
}

impl MultiImplRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dispatch point encountered as a leaf. Returns true when this
    /// is the first time in the lifetime of the run; only then does the point
    /// enter the current wave.
    pub fn record(&self, method_hash: &str, kind: DispatchKind, base_name: &str) -> bool {
        if !self.lifetime.insert(method_hash.to_string()) {
            return false;
        }
        self.wave.insert(
            method_hash.to_string(),
            DispatchPointInfo {
                kind,
                base_name: base_name.to_string(),
            },
        );
        true
    }

    /// Expand every dispatch point discovered this wave into one follow-up
    /// task per implementation, then reset the per-wave state. An empty
    /// result terminates the wave loop.
    pub fn drain_wave_tasks(&self, store: &dyn GraphStore) -> Result<Vec<FollowUpTask>> {
        let mut drained: Vec<(String, DispatchPointInfo)> = Vec::new();
        for entry in self.wave.iter() {
            drained.push((entry.key().clone(), entry.value().clone()));
        }
        self.wave.clear();
        // Keep follow-up ordering independent of map iteration order.
        drained.sort_by(|a, b| a.0.cmp(&b.0));

        let mut tasks = Vec::new();
        for (hash, info) in drained {
            let impls = store.implementations_of(&hash, info.kind)?;
            if impls.is_empty() {
                tracing::warn!(
                    dispatch = %hash,
                    kind = ?info.kind,
                    "dispatch point has no reachable implementations, skipping"
                );
                continue;
            }
            tracing::info!(
                dispatch = %hash,
                kind = ?info.kind,
                count = impls.len(),
                "expanding dispatch point"
            );
            for target in impls {
                tasks.push(FollowUpTask {
                    class_name: target.callee_class_name,
                    method_with_args: crate::domain::method::method_with_args(
                        &target.callee_full_method,
                    )
                    .to_string(),
                    save_subdir: info.base_name.clone(),
                });
            }
        }
        Ok(tasks)
    }

    /// Number of dispatch points waiting in the current wave.
    pub fn pending(&self) -> usize {
        self.wave.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_once_per_lifetime() {
        let reg = MultiImplRegistry::new();
        assert!(reg.record("h_i", DispatchKind::Interface, "I@run@h_i"));
        assert!(!reg.record("h_i", DispatchKind::Interface, "I@run@h_i"));
        assert_eq!(reg.pending(), 1);
    }

    #[test]
    fn test_dispatch_index_kind_of() {
        let mut idx = DispatchIndex::default();
        idx.interface.insert("h_i".into());
        idx.subclass.insert("h_s".into());
        assert_eq!(idx.kind_of("h_i"), Some(DispatchKind::Interface));
        assert_eq!(idx.kind_of("h_s"), Some(DispatchKind::Subclass));
        assert_eq!(idx.kind_of("h_x"), None);
    }

    #[test]
    fn test_kind_call_type_mapping() {
        assert_eq!(DispatchKind::Interface.call_type(), CallType::Interface);
        assert_eq!(
            DispatchKind::of_call_type(CallType::Subclass),
            Some(DispatchKind::Subclass)
        );
        assert_eq!(DispatchKind::of_call_type(CallType::Normal), None);
    }
}
