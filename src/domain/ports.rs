use crate::domain::edge::{CallEdge, ExtendedData, LineWindow};
use crate::domain::multi_impl::DispatchKind;
use anyhow::Result;
use std::collections::{HashMap, HashSet};

/// A resolved method identity: hash plus the full method string it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodId {
    pub method_hash: String,
    pub full_method: String,
}

/// One concrete implementation (or subclass override) of a dispatch point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplTarget {
    pub callee_class_name: String,
    pub callee_full_method: String,
}

/// Wildcard caller key for manual extended-data overrides.
pub const WILDCARD_CALLER: &str = "*";

/// Ordered, queryable adjacency source over the method-call table (implemented
/// by the storage adapters).
///
/// One instance serves one worker; implementations need not be `Sync`, the
/// [`StoreProvider`] hands every worker its own connection.
pub trait GraphStore: Send {
    /// The single lowest-call-id edge (enabled or disabled) for `caller_hash`
    /// strictly after `after_call_id`, restricted to a caller-line window when
    /// one is supplied.
    fn next_edge(
        &self,
        caller_hash: &str,
        after_call_id: i64,
        line_window: Option<&LineWindow>,
    ) -> Result<Option<CallEdge>>;

    /// Concrete implementations currently reachable from a dispatch point,
    /// in call-id order. Only enabled edges count.
    fn implementations_of(&self, dispatch_hash: &str, kind: DispatchKind)
    -> Result<Vec<ImplTarget>>;

    /// Ordinal occurrence of a callee within one caller: the count of edges
    /// sharing `callee_hash` and the exact `caller_full_method` whose call id
    /// is <= `upto_call_id`.
    fn occurrence_index(
        &self,
        callee_hash: &str,
        caller_full_method: &str,
        upto_call_id: i64,
    ) -> Result<u64>;

    /// Distinct caller methods of `class_name` (simple or fully qualified)
    /// whose method-name-with-args starts with `method_prefix`.
    fn find_entry_methods(&self, class_name: &str, method_prefix: &str) -> Result<Vec<MethodId>>;

    /// The method of `class_name` whose source span contains `line`.
    fn find_method_by_line(&self, class_name: &str, line: u32) -> Result<Option<MethodId>>;

    /// Distinct caller full methods of a class, ordered, for whole-class tasks.
    fn class_methods(&self, class_name: &str) -> Result<Vec<String>>;

    /// Dispatch-point hashes with more than one enabled outgoing edge of the
    /// given kind.
    fn multi_dispatch_hashes(&self, kind: DispatchKind) -> Result<HashSet<String>>;

    /// Call ids known to carry auto-detected extended data.
    fn detected_extended_call_ids(&self) -> Result<HashSet<i64>>;

    /// Auto-detected extended data for one call id.
    fn extended_data_by_call_id(&self, call_id: i64) -> Result<Option<ExtendedData>>;

    /// Distinct (caller full method, callee full method) pairs that carry a
    /// manual override; wildcard-caller rows appear under [`WILDCARD_CALLER`].
    fn manual_override_pairs(&self) -> Result<HashMap<String, HashSet<String>>>;

    /// Manual override rows for an exact (caller, callee, occurrence) triple.
    /// `caller_full_method` may be [`WILDCARD_CALLER`].
    fn manual_override(
        &self,
        caller_full_method: &str,
        callee_full_method: &str,
        occurrence: u64,
    ) -> Result<Vec<ExtendedData>>;

    /// All method annotations, keyed by method hash, annotation names sorted.
    fn load_annotations(&self) -> Result<HashMap<String, Vec<String>>>;
}

/// Connection facility for the graph store. Must be able to open at least as
/// many concurrent read connections as the wave pool has workers.
pub trait StoreProvider: Send + Sync {
    fn open_store(&self) -> Result<Box<dyn GraphStore>>;
}

/// Extended-data producer plugin. Producers are consulted in registration
/// order; the first one that claims a call and returns data wins.
pub trait ExtendedDataProducer: Send + Sync {
    /// Whether this producer wants to look at the (caller, callee) pair at all.
    fn claims(&self, caller_full_method: &str, callee_full_method: &str) -> bool;

    /// Produce data for one call occurrence, or `None` to let the next
    /// producer try.
    fn produce(
        &self,
        caller_full_method: &str,
        callee_full_method: &str,
        occurrence: u64,
    ) -> Result<Option<ExtendedData>>;
}

/// Post-processor for resolved extended-data values of one data type.
pub trait ExtendedDataSupplement: Send + Sync {
    fn data_type(&self) -> &str;

    fn supplement(&self, data_value: &str) -> String;
}
