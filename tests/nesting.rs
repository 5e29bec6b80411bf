use norn_compiler::ast::{
    proc_ident, Decl, Designator, Ident, IdentKind, Module, ProcDecl, Stmt,
};
use norn_compiler::types;
use norn_compiler::{generate, Config, Units};
use std::rc::Rc;

// ── Nested procedure linearization ───────────────────────────────────────
// C only has flat functions; locals must flatten into forward-declared
// functions placed before their textually enclosing procedure.

#[test]
fn nested_procedures_flatten_in_inside_out_order() {
    // P contains L1 and L2; L1 contains L11; L2 calls its sibling's parent
    // and its earlier sibling.
    let l11 = local_proc("L11");
    let l1 = local_proc("L1");
    let l2 = local_proc("L2");
    let p = proc_ident("P", vec![], None);

    let module = Module {
        imports: vec![],
        decls: vec![Decl::Proc(ProcDecl {
            ident: p.clone(),
            decls: vec![
                Decl::Proc(ProcDecl {
                    ident: l1.clone(),
                    decls: vec![Decl::Proc(ProcDecl {
                        ident: l11.clone(),
                        decls: vec![],
                        body: vec![],
                        ret: None,
                    })],
                    body: vec![call(&l11, 4)],
                    ret: None,
                }),
                Decl::Proc(ProcDecl {
                    ident: l2.clone(),
                    decls: vec![],
                    body: vec![call(&l1, 8), call(&p, 9)],
                    ret: None,
                }),
            ],
            body: vec![call(&l2, 12)],
            ret: None,
        })],
        body: vec![],
    };
    let units = gen(module);
    let c = &units.implementation;

    // One forward declaration for each procedure that contains locals.
    assert_eq!(
        count(c, "static void P_(void);"),
        1,
        "the enclosing procedure is forward-declared exactly once: {c}"
    );
    assert_eq!(
        count(c, "static void P_L1_Local(void);"),
        1,
        "a local procedure with its own locals is forward-declared too: {c}"
    );

    // One full declaration each.
    for name in ["P_", "P_L1_Local", "P_L1_L11_Local", "P_L2_Local"] {
        assert_eq!(
            count(c, &format!("static void {name}(void)\n{{")),
            1,
            "{name} should have exactly one full declaration: {c}"
        );
    }

    // Inside-out textual order: the deepest local comes first, the
    // enclosing procedure last.
    let pos = |needle: &str| {
        c.find(needle)
            .unwrap_or_else(|| panic!("missing {needle} in: {c}"))
    };
    let l11_def = pos("static void P_L1_L11_Local(void)\n{");
    let l1_def = pos("static void P_L1_Local(void)\n{");
    let l2_def = pos("static void P_L2_Local(void)\n{");
    let p_def = pos("static void P_(void)\n{");
    assert!(l11_def < l1_def, "nested local precedes its encloser");
    assert!(l1_def < l2_def, "earlier sibling precedes the later one");
    assert!(l2_def < p_def, "all locals precede the enclosing procedure");

    // Forward visibility: L2 calls both its earlier sibling and the still
    // open enclosing procedure without an undeclared identifier.
    let fwd = pos("static void P_(void);");
    assert!(fwd < l11_def, "the forward declaration precedes every local");
    assert!(c.contains("P_L1_Local();"), "sibling call resolves: {c}");
    assert!(c.contains("\tP_();\n"), "call to the enclosing name resolves: {c}");
}

#[test]
fn sibling_name_reuse_mangles_through_the_lexical_path() {
    // P has a local L; that L has its own local also named L. Calls inside
    // the outer L resolve to the child, one level further down.
    let inner = local_proc("L");
    let outer = local_proc("L");
    let p = proc_ident("P", vec![], None);

    let module = Module {
        imports: vec![],
        decls: vec![Decl::Proc(ProcDecl {
            ident: p.clone(),
            decls: vec![Decl::Proc(ProcDecl {
                ident: outer.clone(),
                decls: vec![Decl::Proc(ProcDecl {
                    ident: inner.clone(),
                    decls: vec![],
                    body: vec![],
                    ret: None,
                })],
                body: vec![call(&inner, 6)],
                ret: None,
            })],
            body: vec![call(&outer, 9)],
            ret: None,
        })],
        body: vec![],
    };
    let units = gen(module);
    let c = &units.implementation;

    assert_eq!(count(c, "static void P_L_Local(void)\n{"), 1, "{c}");
    assert_eq!(count(c, "static void P_L_L_Local(void)\n{"), 1, "{c}");
    assert!(
        c.contains("P_L_L_Local();"),
        "call in the outer L resolves to its child: {c}"
    );
    assert!(
        c.contains("P_L_Local();"),
        "call in P resolves to the outer L: {c}"
    );
}

#[test]
fn deep_nesting_keeps_every_level_callable() {
    // Four levels deep; every level calls its own local.
    let d = local_proc("D");
    let cp = local_proc("C");
    let b = local_proc("B");
    let a = proc_ident("A", vec![], None);

    let module = Module {
        imports: vec![],
        decls: vec![Decl::Proc(ProcDecl {
            ident: a.clone(),
            decls: vec![Decl::Proc(ProcDecl {
                ident: b.clone(),
                decls: vec![Decl::Proc(ProcDecl {
                    ident: cp.clone(),
                    decls: vec![Decl::Proc(ProcDecl {
                        ident: d.clone(),
                        decls: vec![],
                        body: vec![],
                        ret: None,
                    })],
                    body: vec![call(&d, 4)],
                    ret: None,
                })],
                body: vec![call(&cp, 7)],
                ret: None,
            })],
            body: vec![call(&b, 10)],
            ret: None,
        })],
        body: vec![],
    };
    let units = gen(module);
    let c = &units.implementation;

    let order = [
        "static void A_B_C_D_Local(void)\n{",
        "static void A_B_C_Local(void)\n{",
        "static void A_B_Local(void)\n{",
        "static void A_(void)\n{",
    ];
    let mut last = 0;
    for needle in order {
        let at = c
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle} in: {c}"));
        assert!(at >= last, "definitions must appear deepest-first: {c}");
        last = at;
    }
    assert!(c.contains("A_B_C_D_Local();"));
    assert!(c.contains("A_B_C_Local();"));
    assert!(c.contains("A_B_Local();"));
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn local_proc(name: &str) -> Rc<Ident> {
    Ident::new(name, IdentKind::Proc)
        .typed(types::procedure(vec![], None))
        .local()
        .build()
}

fn call(proc: &Rc<Ident>, line: u32) -> Stmt {
    Stmt::Call {
        proc: Designator::var(proc, line),
        args: vec![],
    }
}

fn gen(module: Module) -> Units {
    let mut cfg = Config::new("Nest.norn", false);
    cfg.dir_prefix = Some(String::new());
    generate(&module, cfg)
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}
