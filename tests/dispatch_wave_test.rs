//! Dispatch-point deferral, wave scheduling, and failure isolation.

use callchain::app::{self, Plugins};
use callchain::domain::edge::CallType;
use std::fs;

mod common;
use common::fixtures::{edge, run_config, store, typed_edge};

/// Interface I with two implementations C1 and C2, reached from two callers.
fn dispatch_edges() -> Vec<callchain::domain::edge::CallEdge> {
    vec![
        edge(1, "test.example.X:a()", "test.example.I:run()"),
        edge(2, "test.example.Y:b()", "test.example.I:run()"),
        typed_edge(3, "test.example.I:run()", "test.example.C1:run()", CallType::Interface),
        typed_edge(4, "test.example.I:run()", "test.example.C2:run()", CallType::Interface),
        edge(5, "test.example.C1:run()", "test.example.D:d()"),
        edge(6, "test.example.C2:run()", "test.example.E:e()"),
    ]
}

#[test]
fn test_dispatch_point_renders_cross_reference_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let config = run_config(dir.path(), &["X:a"]);

    let outcome = app::run(&config, Box::new(store(dispatch_edges())), Plugins::default()).unwrap();
    assert!(outcome.summary.succeeded());

    let content = fs::read_to_string(dir.path().join("X@a@h_X_a.txt")).unwrap();
    assert_eq!(
        content,
        "test.example.X:a()\n\
         (1)# test.example.I:run()!extended_data!jump_multi_impl@I@run@h_I_run\n"
    );
}

#[test]
fn test_second_wave_expands_each_implementation_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    // Two callers reach the same dispatch point; it must still expand once.
    let config = run_config(dir.path(), &["X:a", "Y:b"]);

    let outcome = app::run(&config, Box::new(store(dispatch_edges())), Plugins::default()).unwrap();
    assert!(outcome.summary.succeeded());
    assert_eq!(outcome.summary.waves, 2);
    // 2 configured tasks + exactly 2 follow-up tasks (C1, C2), not 4.
    assert_eq!(outcome.summary.tasks_run, 4);

    let follow_up_dir = dir.path().join("I@run@h_I_run");
    let c1 = fs::read_to_string(follow_up_dir.join("C1@run@h_C1_run.txt")).unwrap();
    assert_eq!(
        c1,
        "test.example.C1:run()\n(1)# test.example.D:d()\n"
    );
    let c2 = fs::read_to_string(follow_up_dir.join("C2@run@h_C2_run.txt")).unwrap();
    assert_eq!(
        c2,
        "test.example.C2:run()\n(1)# test.example.E:e()\n"
    );
}

#[test]
fn test_multi_impl_in_place_expands_inline() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = run_config(dir.path(), &["X:a"]);
    config.output.multi_impl_in_place = true;

    let outcome = app::run(&config, Box::new(store(dispatch_edges())), Plugins::default()).unwrap();
    assert!(outcome.summary.succeeded());
    assert_eq!(outcome.summary.waves, 1);

    let content = fs::read_to_string(dir.path().join("X@a@h_X_a.txt")).unwrap();
    assert_eq!(
        content,
        "test.example.X:a()\n\
         (1)# test.example.I:run()\n\
         (2)# test.example.C1:run()\n\
         (3)# test.example.D:d()\n\
         (2)# test.example.C2:run()\n\
         (3)# test.example.E:e()\n"
    );
    assert!(!dir.path().join("I@run@h_I_run").exists());
}

#[test]
fn test_single_implementation_is_not_a_dispatch_point() {
    let dir = tempfile::tempdir().unwrap();
    let edges = vec![
        edge(1, "test.example.X:a()", "test.example.I:run()"),
        typed_edge(2, "test.example.I:run()", "test.example.C1:run()", CallType::Interface),
        edge(3, "test.example.C1:run()", "test.example.D:d()"),
    ];
    let config = run_config(dir.path(), &["X:a"]);

    let outcome = app::run(&config, Box::new(store(edges)), Plugins::default()).unwrap();
    assert!(outcome.summary.succeeded());
    assert_eq!(outcome.summary.waves, 1);

    let content = fs::read_to_string(dir.path().join("X@a@h_X_a.txt")).unwrap();
    assert_eq!(
        content,
        "test.example.X:a()\n\
         (1)# test.example.I:run()\n\
         (2)# test.example.C1:run()\n\
         (3)# test.example.D:d()\n"
    );
}

#[test]
fn test_disabled_dispatch_edge_recorded_in_notice() {
    let dir = tempfile::tempdir().unwrap();
    let mut disabled = typed_edge(
        2,
        "test.example.I:run()",
        "test.example.C1:run()",
        CallType::Interface,
    );
    disabled.enabled = false;
    let edges = vec![
        edge(1, "test.example.X:a()", "test.example.I:run()"),
        disabled,
        typed_edge(3, "test.example.I:run()", "test.example.C2:run()", CallType::Interface),
    ];
    // Inline mode so the walk actually enumerates the dispatch point's edges.
    let mut config = run_config(dir.path(), &["X:a"]);
    config.output.multi_impl_in_place = true;

    let outcome = app::run(&config, Box::new(store(edges)), Plugins::default()).unwrap();
    assert!(outcome.summary.succeeded());

    // The disabled edge never renders...
    let content = fs::read_to_string(dir.path().join("X@a@h_X_a.txt")).unwrap();
    assert_eq!(
        content,
        "test.example.X:a()\n\
         (1)# test.example.I:run()\n\
         (2)# test.example.C2:run()\n"
    );
    // ...but lands in the disabled notice, keyed by its dispatch point.
    let notice =
        fs::read_to_string(dir.path().join("_notice_disabled_interface.md")).unwrap();
    assert!(notice.contains("## test.example.I:run()"));
    assert!(notice.contains("test.example.C1:run()"));
}

#[test]
fn test_duplicate_output_path_skipped_as_satisfied() {
    let dir = tempfile::tempdir().unwrap();
    let edges = vec![edge(1, "test.example.A:m1()", "test.example.B:m2()")];
    // Same method addressed by simple and by fully qualified class name.
    let config = run_config(dir.path(), &["A:m1", "test.example.A:m1"]);

    let outcome = app::run(&config, Box::new(store(edges)), Plugins::default()).unwrap();
    assert!(outcome.summary.succeeded());
    assert_eq!(outcome.summary.tasks_run, 2);
    assert!(dir.path().join("A@m1@h_A_m1.txt").exists());

    // Both configured entries map to the single produced artifact.
    let mapping = fs::read_to_string(dir.path().join("_mapping.txt")).unwrap();
    assert_eq!(mapping.matches("A@m1@h_A_m1.txt").count(), 2);
}

#[test]
fn test_failing_task_is_isolated_and_marks_run_failed() {
    let dir = tempfile::tempdir().unwrap();
    let edges = vec![
        // Ambiguous entry: two caller methods share the prefix `m`.
        edge(1, "test.example.S:ma()", "test.example.B:m2()"),
        edge(2, "test.example.S:mb()", "test.example.C:m3()"),
        edge(3, "test.example.A:m1()", "test.example.B:m2()"),
    ];
    let config = run_config(dir.path(), &["S:m", "A:m1"]);

    let outcome = app::run(&config, Box::new(store(edges)), Plugins::default()).unwrap();
    assert!(!outcome.summary.succeeded());
    assert_eq!(outcome.summary.failed, vec![Some("S:m".to_string())]);

    // The sibling task still produced its artifact; the mapping file is
    // withheld on failed runs.
    assert!(dir.path().join("A@m1@h_A_m1.txt").exists());
    assert!(!dir.path().join("_mapping.txt").exists());
}
