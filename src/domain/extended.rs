//! Extended-data resolution for call occurrences.
//!
//! Three producers compete for each accepted edge, in strict priority order:
//! manually curated overrides, registered plugins, and precomputed automatic
//! detection. At most one value wins, and an optional per-type supplement
//! hook may post-process it before rendering.

use crate::domain::edge::{CallEdge, ExtendedData};
use crate::domain::error::TaskError;
use crate::domain::ports::{
    ExtendedDataProducer, ExtendedDataSupplement, GraphStore, WILDCARD_CALLER,
};
use crate::domain::render;
use anyhow::{Result, anyhow, bail};
use std::collections::{HashMap, HashSet};

pub struct ExtendedDataResolver {
    /// Caller full method (or `*`) -> callee full methods carrying a manual
    /// override. Lets the hot path skip the occurrence-index query entirely.
    manual_pairs: HashMap<String, HashSet<String>>,
    /// Call ids known to carry auto-detected data.
    detected_ids: HashSet<i64>,
    producers: Vec<Box<dyn ExtendedDataProducer>>,
    supplements: HashMap<String, Box<dyn ExtendedDataSupplement>>,
}

impl ExtendedDataResolver {
    /// Preload the pair index and the detected-id set, and register plugins.
    /// Two supplements for the same data type are a configuration error and
    /// abort the run before any wave starts.
    pub fn load(
        store: &dyn GraphStore,
        producers: Vec<Box<dyn ExtendedDataProducer>>,
        supplements: Vec<Box<dyn ExtendedDataSupplement>>,
    ) -> Result<Self> {
        let manual_pairs = store.manual_override_pairs()?;
        let detected_ids = store.detected_extended_call_ids()?;

        let mut supplement_map: HashMap<String, Box<dyn ExtendedDataSupplement>> = HashMap::new();
        for supplement in supplements {
            let data_type = supplement.data_type().to_string();
            if supplement_map.insert(data_type.clone(), supplement).is_some() {
                bail!("duplicate extended-data supplement for type {data_type:?}");
            }
        }

        Ok(Self {
            manual_pairs,
            detected_ids,
            producers,
            supplements: supplement_map,
        })
    }

    /// Resolve the annotation for one accepted edge, or `None`.
    pub fn resolve(
        &self,
        store: &dyn GraphStore,
        edge: &CallEdge,
    ) -> Result<Option<ExtendedData>, TaskError> {
        let mut occurrence: Option<u64> = None;

        if self.has_manual_pair(edge) {
            let occ = self.occurrence(store, edge, &mut occurrence)?;
            if let Some(data) = self.lookup_manual(store, edge, occ)? {
                // Manual rows are curated; only the separator rule applies.
                render::validate_extended_data(&data, true)?;
                return Ok(Some(self.supplement(data)));
            }
        }

        for producer in &self.producers {
            if !producer.claims(&edge.caller_full_method, &edge.callee_full_method) {
                continue;
            }
            let occ = self.occurrence(store, edge, &mut occurrence)?;
            let produced = producer
                .produce(&edge.caller_full_method, &edge.callee_full_method, occ)
                .map_err(TaskError::Plugin)?;
            if let Some(data) = produced {
                render::validate_extended_data(&data, false)?;
                return Ok(Some(self.supplement(data)));
            }
        }

        if self.detected_ids.contains(&edge.call_id) {
            let data = store
                .extended_data_by_call_id(edge.call_id)
                .map_err(TaskError::Store)?
                .ok_or_else(|| {
                    TaskError::Store(anyhow!(
                        "call id {} is flagged as carrying extended data but has none",
                        edge.call_id
                    ))
                })?;
            render::validate_extended_data(&data, false)?;
            return Ok(Some(self.supplement(data)));
        }

        Ok(None)
    }

    fn has_manual_pair(&self, edge: &CallEdge) -> bool {
        let callee = &edge.callee_full_method;
        self.manual_pairs
            .get(&edge.caller_full_method)
            .is_some_and(|s| s.contains(callee))
            || self
                .manual_pairs
                .get(WILDCARD_CALLER)
                .is_some_and(|s| s.contains(callee))
    }

    fn occurrence(
        &self,
        store: &dyn GraphStore,
        edge: &CallEdge,
        cached: &mut Option<u64>,
    ) -> Result<u64, TaskError> {
        if let Some(occ) = *cached {
            return Ok(occ);
        }
        let occ = store
            .occurrence_index(
                &edge.callee_method_hash,
                &edge.caller_full_method,
                edge.call_id,
            )
            .map_err(TaskError::Store)?;
        *cached = Some(occ);
        Ok(occ)
    }

    /// Exact-caller rows first, wildcard-caller rows only as a fallback. More
    /// than one matching row is an ambiguous configuration.
    fn lookup_manual(
        &self,
        store: &dyn GraphStore,
        edge: &CallEdge,
        occurrence: u64,
    ) -> Result<Option<ExtendedData>, TaskError> {
        let mut rows = store
            .manual_override(
                &edge.caller_full_method,
                &edge.callee_full_method,
                occurrence,
            )
            .map_err(TaskError::Store)?;
        if rows.is_empty() {
            rows = store
                .manual_override(WILDCARD_CALLER, &edge.callee_full_method, occurrence)
                .map_err(TaskError::Store)?;
        }
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            _ => Err(TaskError::AmbiguousOverride {
                caller: edge.caller_full_method.clone(),
                callee: edge.callee_full_method.clone(),
                occurrence,
            }),
        }
    }

    fn supplement(&self, mut data: ExtendedData) -> ExtendedData {
        if let Some(handler) = self.supplements.get(&data.data_type) {
            data.data_value = handler.supplement(&data.data_value);
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::memory::{EdgeDump, ManualOverrideRow, MemoryStore};
    use crate::domain::edge::CallType;

    fn edge(call_id: i64, caller: &str, callee: &str) -> CallEdge {
        CallEdge {
            call_id,
            call_type: CallType::Normal,
            enabled: true,
            caller_method_hash: format!("h_{}", caller),
            caller_full_method: caller.to_string(),
            caller_class_name: "A".into(),
            caller_line_number: None,
            callee_method_hash: format!("h_{}", callee),
            callee_full_method: callee.to_string(),
            callee_class_name: "B".into(),
        }
    }

    fn manual(caller: &str, callee: &str, occurrence: u64, ty: &str, value: &str) -> ManualOverrideRow {
        ManualOverrideRow {
            caller_full_method: caller.to_string(),
            callee_full_method: callee.to_string(),
            callee_occurrence: occurrence,
            data_type: ty.to_string(),
            data_value: value.to_string(),
        }
    }

    struct ClaimAll(&'static str);
    impl ExtendedDataProducer for ClaimAll {
        fn claims(&self, _caller: &str, _callee: &str) -> bool {
            true
        }
        fn produce(&self, _caller: &str, _callee: &str, _occ: u64) -> Result<Option<ExtendedData>> {
            Ok(Some(ExtendedData::new("plugin", self.0)))
        }
    }

    struct ClaimNone;
    impl ExtendedDataProducer for ClaimNone {
        fn claims(&self, _caller: &str, _callee: &str) -> bool {
            false
        }
        fn produce(&self, _caller: &str, _callee: &str, _occ: u64) -> Result<Option<ExtendedData>> {
            Ok(Some(ExtendedData::new("never", "never")))
        }
    }

    struct Upper;
    impl ExtendedDataSupplement for Upper {
        fn data_type(&self) -> &str {
            "plugin"
        }
        fn supplement(&self, value: &str) -> String {
            value.to_uppercase()
        }
    }

    fn store_with(dump: EdgeDump) -> MemoryStore {
        MemoryStore::new(dump)
    }

    #[test]
    fn test_manual_override_beats_plugin() {
        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        dump.manual_overrides
            .push(manual("t.A:m()", "t.B:n()", 1, "manual", "kept"));
        let store = store_with(dump);

        let resolver =
            ExtendedDataResolver::load(&store, vec![Box::new(ClaimAll("lost"))], vec![]).unwrap();
        let data = resolver.resolve(&store, &e).unwrap().unwrap();
        assert_eq!(data.data_type, "manual");
        assert_eq!(data.data_value, "kept");
    }

    #[test]
    fn test_wildcard_caller_fallback() {
        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        dump.manual_overrides
            .push(manual(WILDCARD_CALLER, "t.B:n()", 1, "manual", "wild"));
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(&store, vec![], vec![]).unwrap();
        let data = resolver.resolve(&store, &e).unwrap().unwrap();
        assert_eq!(data.data_value, "wild");
    }

    #[test]
    fn test_ambiguous_manual_override_fails() {
        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        dump.manual_overrides
            .push(manual("t.A:m()", "t.B:n()", 1, "manual", "one"));
        dump.manual_overrides
            .push(manual("t.A:m()", "t.B:n()", 1, "manual", "two"));
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(&store, vec![], vec![]).unwrap();
        assert!(matches!(
            resolver.resolve(&store, &e),
            Err(TaskError::AmbiguousOverride { .. })
        ));
    }

    #[test]
    fn test_occurrence_disambiguates_manual_rows() {
        // Same caller/callee pair twice; only the second occurrence is annotated.
        let e1 = edge(1, "t.A:m()", "t.B:n()");
        let mut e2 = edge(5, "t.A:m()", "t.B:n()");
        e2.callee_method_hash = e1.callee_method_hash.clone();
        let mut dump = EdgeDump::default();
        dump.edges.push(e1.clone());
        dump.edges.push(e2.clone());
        dump.manual_overrides
            .push(manual("t.A:m()", "t.B:n()", 2, "manual", "second-only"));
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(&store, vec![], vec![]).unwrap();
        assert!(resolver.resolve(&store, &e1).unwrap().is_none());
        let data = resolver.resolve(&store, &e2).unwrap().unwrap();
        assert_eq!(data.data_value, "second-only");
    }

    #[test]
    fn test_plugins_first_match_wins() {
        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(
            &store,
            vec![
                Box::new(ClaimNone),
                Box::new(ClaimAll("first")),
                Box::new(ClaimAll("second")),
            ],
            vec![],
        )
        .unwrap();
        let data = resolver.resolve(&store, &e).unwrap().unwrap();
        assert_eq!(data.data_value, "first");
    }

    #[test]
    fn test_supplement_post_processes() {
        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(
            &store,
            vec![Box::new(ClaimAll("value"))],
            vec![Box::new(Upper)],
        )
        .unwrap();
        let data = resolver.resolve(&store, &e).unwrap().unwrap();
        assert_eq!(data.data_value, "VALUE");
    }

    #[test]
    fn test_detected_extended_data() {
        let e = edge(9, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        dump.detected_extended.push((9, ExtendedData::new("auto", "found")));
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(&store, vec![], vec![]).unwrap();
        let data = resolver.resolve(&store, &e).unwrap().unwrap();
        assert_eq!(data.data_type, "auto");
        assert_eq!(data.data_value, "found");
    }

    #[test]
    fn test_plugin_reserved_type_rejected() {
        struct Reserved;
        impl ExtendedDataProducer for Reserved {
            fn claims(&self, _c: &str, _d: &str) -> bool {
                true
            }
            fn produce(&self, _c: &str, _d: &str, _o: u64) -> Result<Option<ExtendedData>> {
                Ok(Some(ExtendedData::new(render::JUMP_DATA_TYPE, "x")))
            }
        }

        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(&store, vec![Box::new(Reserved)], vec![]).unwrap();
        assert!(matches!(
            resolver.resolve(&store, &e),
            Err(TaskError::ReservedDataType(_))
        ));
    }

    #[test]
    fn test_duplicate_supplement_rejected() {
        let store = store_with(EdgeDump::default());
        let result =
            ExtendedDataResolver::load(&store, vec![], vec![Box::new(Upper), Box::new(Upper)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_producer_matches() {
        let e = edge(1, "t.A:m()", "t.B:n()");
        let mut dump = EdgeDump::default();
        dump.edges.push(e.clone());
        let store = store_with(dump);

        let resolver = ExtendedDataResolver::load(&store, vec![Box::new(ClaimNone)], vec![]).unwrap();
        assert!(resolver.resolve(&store, &e).unwrap().is_none());
    }
}
