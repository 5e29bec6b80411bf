use norn_compiler::ast::{Decl, Designator, Expr, Ident, IdentKind, Module, Stmt};
use norn_compiler::types;
use norn_compiler::{generate, Config, GenError, Units};
use std::fs;
use std::path::PathBuf;

// ── Output file protection ───────────────────────────────────────────────
// A stale artifact must never masquerade as generated output, and a
// hand-authored file of the same name must never be clobbered.

#[test]
fn regenerating_over_generated_output_succeeds() {
    let dir = scratch_dir("regen");
    let units = sample_units(false);
    units.write(&dir).expect("first write should succeed");
    units.write(&dir).expect("rewriting generated output should succeed");
    let text = fs::read_to_string(dir.join(".norn/Geo.c")).unwrap();
    assert!(text.starts_with("/*GENERATED BY NORNC"));
    cleanup(&dir);
}

#[test]
fn hand_written_implementation_is_not_overwritten() {
    let dir = scratch_dir("keep-c");
    fs::create_dir_all(dir.join(".norn")).unwrap();
    fs::write(dir.join(".norn/Geo.c"), "/* hand written */\n").unwrap();

    let units = sample_units(false);
    let err = units.write(&dir).expect_err("overwrite must be refused");
    assert!(
        matches!(err, GenError::WillNotOverwrite { .. }),
        "unexpected error: {err}"
    );
    let text = fs::read_to_string(dir.join(".norn/Geo.c")).unwrap();
    assert_eq!(text, "/* hand written */\n", "existing file must be untouched");

    // The temporary must not linger after the refusal.
    let leftovers: Vec<_> = fs::read_dir(dir.join(".norn"))
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("Geo.c."))
        .collect();
    assert!(leftovers.is_empty(), "temporaries left behind: {leftovers:?}");
    cleanup(&dir);
}

#[test]
fn entry_point_removes_only_generated_stale_headers() {
    let dir = scratch_dir("entry-h");

    // A previous non-entry build leaves a generated header behind.
    sample_units(false).write(&dir).unwrap();
    assert!(dir.join(".norn/Geo.h").exists());

    sample_units(true).write(&dir).unwrap();
    assert!(
        !dir.join(".norn/Geo.h").exists(),
        "stale generated header must be deleted for the entry point"
    );

    // A hand-written header of the same name stays, and the build fails.
    fs::write(dir.join(".norn/Geo.h"), "/* hand written */\n").unwrap();
    let err = sample_units(true).write(&dir).expect_err("deletion must be refused");
    assert!(
        matches!(err, GenError::WillNotDelete { .. }),
        "unexpected error: {err}"
    );
    assert!(dir.join(".norn/Geo.h").exists());
    cleanup(&dir);
}

#[test]
fn hand_written_interface_is_not_overwritten() {
    let dir = scratch_dir("keep-h");
    fs::create_dir_all(dir.join(".norn")).unwrap();
    fs::write(dir.join(".norn/Geo.h"), "/* hand written */\n").unwrap();

    let err = sample_units(false)
        .write(&dir)
        .expect_err("interface overwrite must be refused");
    assert!(matches!(err, GenError::WillNotOverwrite { .. }));
    let text = fs::read_to_string(dir.join(".norn/Geo.h")).unwrap();
    assert_eq!(text, "/* hand written */\n");
    cleanup(&dir);
}

// ── Upstream contract violations ─────────────────────────────────────────
// Broken annotation invariants abort generation immediately.

#[test]
#[should_panic(expected = "zero step")]
fn zero_step_for_loop_is_a_fatal_contract_violation() {
    let i = Ident::new("i", IdentKind::Var).typed(types::integer()).build();
    generate(
        &Module {
            imports: vec![],
            decls: vec![Decl::Var(vec![i.clone()])],
            body: vec![Stmt::For {
                var: i.clone(),
                from: Expr::Int(0),
                to: Expr::Int(9),
                by: 0,
                body: vec![],
            }],
        },
        config(false),
    );
}

#[test]
#[should_panic(expected = "no resolved type")]
fn unresolved_identifier_type_is_a_fatal_contract_violation() {
    let x = Ident::new("x", IdentKind::Var).build();
    generate(
        &Module {
            imports: vec![],
            decls: vec![Decl::Var(vec![x.clone()])],
            body: vec![],
        },
        config(false),
    );
}

#[test]
#[should_panic(expected = "label range expands")]
fn unbounded_case_label_range_is_rejected() {
    use norn_compiler::ast::{CaseLabel, IntCase, LabelRange};
    let k = Ident::new("k", IdentKind::Var).typed(types::integer()).build();
    generate(
        &Module {
            imports: vec![],
            decls: vec![Decl::Var(vec![k.clone()])],
            body: vec![Stmt::CaseInt {
                expr: Expr::var(&k, 1),
                arms: vec![IntCase {
                    labels: vec![LabelRange {
                        lo: CaseLabel::Int(0),
                        hi: Some(CaseLabel::Int(1_000_000)),
                    }],
                    body: vec![],
                }],
                line: 1,
            }],
        },
        config(false),
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn config(entry: bool) -> Config {
    let mut cfg = Config::new("Geo.norn", entry);
    cfg.dir_prefix = Some(String::new());
    cfg
}

fn sample_units(entry: bool) -> Units {
    let k = Ident::new("k", IdentKind::Var).typed(types::integer()).build();
    generate(
        &Module {
            imports: vec![],
            decls: vec![Decl::Var(vec![k.clone()])],
            body: vec![Stmt::Assign {
                target: Designator::var(&k, 2),
                value: Expr::Int(1),
            }],
        },
        config(entry),
    )
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("norn-compiler-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn cleanup(dir: &PathBuf) {
    let _ = fs::remove_dir_all(dir);
}
