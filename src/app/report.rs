//! Run-level report artifacts: the task-to-artifact mapping file and the
//! dispatch-call notice files.

use crate::domain::ledger::{DisabledLedger, DispatchCalls, MultiCallLedger};
use crate::domain::multi_impl::DispatchKind;
use anyhow::{Context as _, Result};
use dashmap::DashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const MAPPING_FILE: &str = "_mapping.txt";

fn kind_slug(kind: DispatchKind) -> &'static str {
    match kind {
        DispatchKind::Interface => "interface",
        DispatchKind::Subclass => "subclass",
    }
}

/// Write the configured-task -> artifact mapping, TAB separated since task
/// text may contain spaces.
pub fn write_mapping_file(mapping: &DashMap<String, PathBuf>, out_dir: &Path) -> Result<()> {
    let path = out_dir.join(MAPPING_FILE);
    let mut rows: Vec<(String, PathBuf)> = mapping
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().clone()))
        .collect();
    rows.sort();

    let mut content = String::from("# configured task\tartifact path\n");
    for (spec, artifact) in rows {
        let _ = writeln!(content, "{spec}\t{}", artifact.display());
    }
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(mapping = %path.display(), "wrote task mapping file");
    Ok(())
}

fn render_dispatch_sections(rows: &[(String, DispatchCalls)]) -> String {
    let mut section = String::new();
    for (caller, calls) in rows {
        let _ = write!(
            section,
            "\n## {caller}\n\n- caller method hash: `{}`\n- callees:\n\n```\n",
            calls.caller_method_hash
        );
        for callee in &calls.callees {
            let _ = writeln!(section, "{callee}");
        }
        section.push_str("```\n");
    }
    section
}

/// One notice file per dispatch kind for callers whose interface/superclass
/// method fans out to more than one callee, and one per kind for disabled
/// dispatch edges. Files are only written when there is something to report.
pub fn write_notice_files(
    multi_call: &MultiCallLedger,
    disabled: &DisabledLedger,
    out_dir: &Path,
) -> Result<()> {
    for kind in [DispatchKind::Interface, DispatchKind::Subclass] {
        let one_to_many = multi_call.one_to_many(kind);
        if !one_to_many.is_empty() {
            let path = out_dir.join(format!("_notice_multi_{}.md", kind_slug(kind)));
            let mut content = format!(
                "# One-to-many {} dispatch calls\n\nThese callers dispatch to more than one \
                 callee; disable the unwanted call edges to keep a single chain.\n",
                kind_slug(kind)
            );
            content.push_str(&render_dispatch_sections(&one_to_many));
            fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(notice = %path.display(), "wrote one-to-many dispatch notice");
        }

        if !disabled.is_empty(kind) {
            let rows = disabled.snapshot(kind);
            let path = out_dir.join(format!("_notice_disabled_{}.md", kind_slug(kind)));
            let mut content = format!(
                "# Disabled {} dispatch calls\n\nThese call edges were skipped because they \
                 are disabled in the method-call table.\n",
                kind_slug(kind)
            );
            content.push_str(&render_dispatch_sections(&rows));
            fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(notice = %path.display(), "wrote disabled dispatch notice");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::edge::{CallEdge, CallType};

    fn dispatch_edge(enabled: bool, caller: &str, callee: &str) -> CallEdge {
        CallEdge {
            call_id: 1,
            call_type: CallType::Interface,
            enabled,
            caller_method_hash: format!("h_{caller}"),
            caller_full_method: caller.to_string(),
            caller_class_name: "C".into(),
            caller_line_number: None,
            callee_method_hash: format!("h_{callee}"),
            callee_full_method: callee.to_string(),
            callee_class_name: "X".into(),
        }
    }

    #[test]
    fn test_mapping_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = DashMap::new();
        mapping.insert("S:a 10-20".to_string(), dir.path().join("S@a@h.txt"));
        write_mapping_file(&mapping, dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join(MAPPING_FILE)).unwrap();
        assert!(content.starts_with("# configured task\tartifact path\n"));
        assert!(content.contains("S:a 10-20\t"));
        assert!(content.contains("S@a@h.txt"));
    }

    #[test]
    fn test_notice_files_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let multi_call = MultiCallLedger::new();
        let disabled = DisabledLedger::new();
        write_notice_files(&multi_call, &disabled, dir.path()).unwrap();
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());

        multi_call.record(&dispatch_edge(true, "t.I:run()", "t.C1:run()"));
        multi_call.record(&dispatch_edge(true, "t.I:run()", "t.C2:run()"));
        disabled.record(&dispatch_edge(false, "t.J:go()", "t.D1:go()"));
        write_notice_files(&multi_call, &disabled, dir.path()).unwrap();

        let multi = fs::read_to_string(dir.path().join("_notice_multi_interface.md")).unwrap();
        assert!(multi.contains("## t.I:run()"));
        assert!(multi.contains("t.C1:run()"));
        assert!(multi.contains("t.C2:run()"));

        let dis = fs::read_to_string(dir.path().join("_notice_disabled_interface.md")).unwrap();
        assert!(dis.contains("## t.J:go()"));
        assert!(!dir.path().join("_notice_multi_subclass.md").exists());
    }
}
