//! Statement lowering.
//!
//! Assignment branches on the target's structural type, the multi-way
//! branch has one lowering per discriminant kind, and dynamic allocation
//! picks its collector strategy from a static scan of the record's field
//! types.

use super::expr::{array_dimension, char_lit, contains_call, desig_contains_call, is_var_param};
use super::frames::cast_needed;
use super::{tabs, Generator};
use crate::ast::{CaseLabel, Designator, Expr, IntCase, LabelRange, Stmt, TypeCase};
use crate::types::Type;

/// Expanding an integral CASE materializes one label per value in each
/// range; beyond this the output is considered pathological.
const MAX_CASE_LABELS: i64 = 4096;

impl Generator {
    pub(crate) fn stmt_seq(&mut self, body: &[Stmt], indent: usize) {
        for stmt in body {
            self.stmt(stmt, indent);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, indent: usize) {
        match stmt {
            Stmt::Assign { target, value } => self.assignment(target, value, indent),
            Stmt::Call { proc, args } => {
                let call = self.call_text(proc, args);
                self.emit(&format!("{}{};\n", tabs(indent), call));
            }
            Stmt::If { arms, else_arm } => self.if_stmt(arms, else_arm.as_deref(), indent),
            Stmt::While { arms } => self.while_stmt(arms, indent),
            Stmt::Repeat { body, until } => {
                self.emit(&format!("{}do {{\n", tabs(indent)));
                self.stmt_seq(body, indent + 1);
                let cond = self.with_precedence(until);
                self.emit(&format!("{}}} while (! {});\n", tabs(indent), cond));
            }
            Stmt::For {
                var,
                from,
                to,
                by,
                body,
            } => {
                assert!(*by != 0, "FOR statement with zero step");
                let control = self.ident(var);
                let init = self.expr(from);
                let limit = self.expr(to);
                let rel = if *by > 0 { "<=" } else { ">=" };
                self.emit(&format!(
                    "{}for ({control} = {init}; {control} {rel} {limit}; {control} += {by}) {{\n",
                    tabs(indent)
                ));
                self.stmt_seq(body, indent + 1);
                self.emit(&format!("{}}}\n", tabs(indent)));
            }
            Stmt::CaseInt { expr, arms, line } => self.integral_case(expr, arms, *line, indent),
            Stmt::CaseType { des, arms } => self.type_case(des, arms, indent),
            Stmt::Inc { des, by } => self.inc_dec("INC", des, by.as_ref(), indent),
            Stmt::Dec { des, by } => self.inc_dec("DEC", des, by.as_ref(), indent),
            Stmt::Incl { des, elem } => {
                let text = format!(
                    "{}NORN_INCL({}, {});\n",
                    tabs(indent),
                    self.designator(des),
                    self.expr(elem)
                );
                self.emit(&text);
            }
            Stmt::Excl { des, elem } => {
                let text = format!(
                    "{}NORN_EXCL({}, {});\n",
                    tabs(indent),
                    self.designator(des),
                    self.expr(elem)
                );
                self.emit(&text);
            }
            Stmt::New { des } => self.memory_allocation(des, indent),
            Stmt::Assert { cond, line } => {
                let basename = self
                    .cfg
                    .source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let text = format!(
                    "{}NORN_ASSERT({}, \"{}\", {});\n",
                    tabs(indent),
                    self.expr(cond),
                    basename,
                    line
                );
                self.emit(&text);
            }
            Stmt::Pack { x, n } => {
                let text = if desig_contains_call(x) || contains_call(n) {
                    format!(
                        "{}NORN_Pack(&({}), {});\n",
                        tabs(indent),
                        self.designator(x),
                        self.expr(n)
                    )
                } else {
                    format!(
                        "{}NORN_PACK({}, {});\n",
                        tabs(indent),
                        self.designator(x),
                        self.expr(n)
                    )
                };
                self.emit(&text);
            }
            Stmt::Unpk { x, n } => {
                let text = if desig_contains_call(x) || desig_contains_call(n) {
                    format!(
                        "{}NORN_Unpk(&({}), &({}));\n",
                        tabs(indent),
                        self.designator(x),
                        self.designator(n)
                    )
                } else {
                    format!(
                        "{}NORN_UNPK({}, {});\n",
                        tabs(indent),
                        self.designator(x),
                        self.designator(n)
                    )
                };
                self.emit(&text);
            }
            Stmt::SysGet { addr, des } => {
                self.address_ops.set(true);
                let ty = self.desig_ty(des);
                let text = format!(
                    "{}NORN_GET({}, {}, {});\n",
                    tabs(indent),
                    self.expr(addr),
                    self.designator(des),
                    self.type_name(&ty)
                );
                self.emit(&text);
            }
            Stmt::SysPut { addr, value } => {
                self.address_ops.set(true);
                let value_text = match value {
                    // A single-character string literal stores as a char.
                    Expr::Str(text) if self.expr_ty(value).is_single_char_string() => {
                        format!("{}, char", char_lit(text.as_bytes()[0]))
                    }
                    _ => {
                        let ty = self.expr_ty(value);
                        format!("{}, {}", self.expr(value), self.type_name(&ty))
                    }
                };
                let text = format!(
                    "{}NORN_PUT({}, {});\n",
                    tabs(indent),
                    self.expr(addr),
                    value_text
                );
                self.emit(&text);
            }
            Stmt::SysCopy { src, dst, count } => {
                self.address_ops.set(true);
                let text = format!(
                    "{}NORN_COPY({}, {}, {});\n",
                    tabs(indent),
                    self.expr(src),
                    self.expr(dst),
                    self.expr(count)
                );
                self.emit(&text);
            }
        }
    }

    fn assignment(&mut self, target: &Designator, value: &Expr, indent: usize) {
        let target_ty = self.desig_ty(target);
        match Type::structure_of(&target_ty).as_ref() {
            Type::Array { .. } => self.array_assignment(target, value, indent),
            Type::Record(_) => self.record_assignment(target, value, indent),
            _ => {
                let source_ty = self.expr_ty(value);
                let text = if cast_needed(&source_ty, &target_ty) {
                    format!(
                        "{}{} = ({}) {};\n",
                        tabs(indent),
                        self.designator(target),
                        self.type_name(&target_ty),
                        self.with_precedence(value)
                    )
                } else {
                    format!(
                        "{}{} = {};\n",
                        tabs(indent),
                        self.designator(target),
                        self.expr(value)
                    )
                };
                self.emit(&text);
            }
        }
    }

    /// Arrays copy by value. When either side's length is only known at
    /// run time the copy is preceded by a length-equality trap.
    fn array_assignment(&mut self, target: &Designator, value: &Expr, indent: usize) {
        let target_ty = self.desig_ty(target);
        let source_ty = self.expr_ty(value);
        let mut text = String::new();

        if source_ty.is_open_array() || target_ty.is_open_array() {
            let source_len = match value {
                Expr::Str(s) => (s.chars().count() + 1).to_string(),
                Expr::Desig(des) => {
                    self.array_len(&source_ty, &des.base, array_dimension(des))
                }
                _ => panic!("array assignment source is neither a string nor a designator"),
            };
            let target_len = self.array_len(&target_ty, &target.base, array_dimension(target));
            text.push_str(&format!(
                "{}NORN_AAT({}, {}, {});\n",
                tabs(indent),
                source_len,
                target_len,
                target.line
            ));
        }

        text.push_str(&tabs(indent));
        text.push_str("NORN_COPY_ARRAY(");
        if source_ty.is_array() {
            if let Expr::Desig(des) = value {
                if array_dimension(des) > 0 {
                    text.push('&');
                }
            }
        }
        text.push_str(&self.with_precedence(value));
        text.push_str(", ");
        if array_dimension(target) > 0 {
            text.push('&');
        }
        text.push_str(&self.designator(target));
        text.push_str(", ");
        match value {
            Expr::Str(s) => text.push_str(&(s.chars().count() + 1).to_string()),
            Expr::Desig(des) => text.push_str(&self.flattened_array_len(
                &source_ty,
                &des.base,
                array_dimension(des),
            )),
            _ => unreachable!(),
        }
        text.push_str(");\n");
        self.emit(&text);
    }

    /// Records copy plainly when the static types match; a by-reference
    /// target may hold a proper extension of its declared type, so its copy
    /// goes through the descriptors with a compatibility trap first.
    fn record_assignment(&mut self, target: &Designator, value: &Expr, indent: usize) {
        let target_ty = self.desig_ty(target);
        let source_ty = self.expr_ty(value);
        let via_reference = is_var_param(target);
        let mut text = String::new();

        if via_reference {
            let Expr::Desig(source) = value else {
                panic!("record assignment source is not a designator");
            };
            text.push_str(&format!(
                "{}NORN_RAT({}, {}, {});\n",
                tabs(indent),
                self.typedesc_expr(source),
                self.typedesc_expr(target),
                target.line
            ));
        }
        if source_ty.same(&target_ty) && !via_reference {
            text.push_str(&format!(
                "{}{} = {};\n",
                tabs(indent),
                self.designator(target),
                self.expr(value)
            ));
        } else {
            text.push_str(&tabs(indent));
            text.push_str(&self.designator(target));
            text.push_str(" = ");
            if !source_ty.same(&target_ty) {
                assert!(
                    target_ty.extends(&source_ty),
                    "record assignment between unrelated types"
                );
                text.push_str(&format!("*({} *) &", self.type_name(&target_ty)));
            }
            text.push_str(&self.expr(value));
            text.push_str(";\n");
        }
        self.emit(&text);
    }

    fn if_stmt(&mut self, arms: &[(Expr, Vec<Stmt>)], else_arm: Option<&[Stmt]>, indent: usize) {
        for (i, (cond, body)) in arms.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "else if" };
            let cond_text = self.expr(cond);
            self.emit(&format!("{}{} ({}) {{\n", tabs(indent), keyword, cond_text));
            self.stmt_seq(body, indent + 1);
            self.emit(&format!("{}}}\n", tabs(indent)));
        }
        if let Some(body) = else_arm {
            self.emit(&format!("{}else {{\n", tabs(indent)));
            self.stmt_seq(body, indent + 1);
            self.emit(&format!("{}}}\n", tabs(indent)));
        }
    }

    /// A WHILE with trailing ELSIF alternatives cannot be re-tested as one
    /// guard expression; it becomes an unconditional loop with a
    /// conditional-break chain.
    fn while_stmt(&mut self, arms: &[(Expr, Vec<Stmt>)], indent: usize) {
        assert!(!arms.is_empty(), "WHILE statement without a guard");
        if arms.len() == 1 {
            let (cond, body) = &arms[0];
            let cond_text = self.expr(cond);
            self.emit(&format!("{}while ({}) {{\n", tabs(indent), cond_text));
            self.stmt_seq(body, indent + 1);
            self.emit(&format!("{}}}\n", tabs(indent)));
            return;
        }
        self.emit(&format!("{}while (1) {{\n", tabs(indent)));
        for (i, (cond, body)) in arms.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "else if" };
            let cond_text = self.expr(cond);
            self.emit(&format!(
                "{}{} ({}) {{\n",
                tabs(indent + 1),
                keyword,
                cond_text
            ));
            self.stmt_seq(body, indent + 2);
            self.emit(&format!("{}}}\n", tabs(indent + 1)));
        }
        self.emit(&format!(
            "{0}else {{\n{1}break;\n{0}}}\n",
            tabs(indent + 1),
            tabs(indent + 2)
        ));
        self.emit(&format!("{}}}\n", tabs(indent)));
    }

    /// Integral discriminants lower to a native switch; every label range
    /// expands into individual labels, and the default arm traps, since
    /// label exhaustiveness is only a convention of the source language.
    fn integral_case(&mut self, expr: &Expr, arms: &[IntCase], line: u32, indent: usize) {
        let ty = self.expr_ty(expr);
        assert!(
            ty.is_integer() || ty.is_char(),
            "integral CASE over a non-integral discriminant"
        );
        let head = self.expr(expr);
        self.emit(&format!("{}switch ({}) {{\n", tabs(indent), head));
        for arm in arms {
            for range in &arm.labels {
                self.case_labels(range, indent + 1);
            }
            self.stmt_seq(&arm.body, indent + 2);
            self.emit(&format!("{}break;\n", tabs(indent + 2)));
        }
        self.emit(&format!(
            "{}default:\n{}NORN_CT({});\n{}}}\n",
            tabs(indent + 1),
            tabs(indent + 2),
            line,
            tabs(indent)
        ));
    }

    fn case_labels(&mut self, range: &LabelRange, indent: usize) {
        let (lo, hi, is_char) = match (&range.lo, &range.hi) {
            (CaseLabel::Int(lo), None) => (*lo, *lo, false),
            (CaseLabel::Int(lo), Some(CaseLabel::Int(hi))) => (*lo, *hi, false),
            (CaseLabel::Char(lo), None) => (*lo as i64, *lo as i64, true),
            (CaseLabel::Char(lo), Some(CaseLabel::Char(hi))) => (*lo as i64, *hi as i64, true),
            _ => panic!("CASE label range mixes integer and character labels"),
        };
        assert!(lo <= hi, "CASE label range with inverted bounds");
        assert!(
            hi - lo < MAX_CASE_LABELS,
            "CASE label range expands to {} labels",
            hi - lo + 1
        );
        let mut text = String::new();
        for label in lo..=hi {
            if is_char {
                text.push_str(&format!("{}case {}:\n", tabs(indent), char_lit(label as u8)));
            } else {
                text.push_str(&format!("{}case {}:\n", tabs(indent), label));
            }
        }
        self.emit(&text);
    }

    /// Type discriminants lower to a chained conditional of dynamic type
    /// tests; inside each arm the discriminant reads as the arm's type.
    fn type_case(&mut self, des: &Designator, arms: &[TypeCase], indent: usize) {
        assert!(
            self.case_variable.is_none(),
            "nested type-CASE over another discriminant"
        );
        self.case_variable = Some(des.base.clone());
        for (i, arm) in arms.iter().enumerate() {
            let test = self.is_expression(des, &arm.target);
            if i == 0 {
                self.emit(&format!("{}if ({}) {{\n", tabs(indent), test));
            } else {
                self.emit(&format!(" else if ({}) {{\n", test));
            }
            self.case_label = Some(arm.target.clone());
            self.stmt_seq(&arm.body, indent + 1);
            self.case_label = None;
            self.emit(&tabs(indent));
            self.emit("}");
            if i + 1 == arms.len() {
                self.emit("\n");
            }
        }
        self.case_variable = None;
    }

    fn inc_dec(&mut self, op: &str, des: &Designator, by: Option<&Expr>, indent: usize) {
        let text = match by {
            None => format!("{}NORN_{}({});\n", tabs(indent), op, self.designator(des)),
            Some(step) => format!(
                "{}NORN_{}_N({}, {});\n",
                tabs(indent),
                op,
                self.designator(des),
                self.expr(step)
            ),
        };
        self.emit(&text);
    }

    /// NEW: the allocation strategy comes from a static scan of the
    /// record's (and its ancestors') field types. Pointer-free blocks are
    /// exempt from collector scanning; blocks holding procedure values but
    /// no pointers are zero-filled but still exempt.
    fn memory_allocation(&mut self, des: &Designator, indent: usize) {
        let ty = self.desig_ty(des);
        let pointee = ty.pointer_base().clone();
        let mut has_pointer = false;
        let mut has_procedure = false;
        search_pointers_and_procedures(&pointee, &mut has_pointer, &mut has_procedure);
        let alloc = if has_pointer {
            "NORN_REGULAR_ALLOC"
        } else if has_procedure {
            "NORN_ATOMIC_ALLOC"
        } else {
            "NORN_ATOMIC_NOINIT_ALLOC"
        };
        let text = if pointee.record().has_desc_ident() {
            let name = self.ident(&self.desc_ident(&ty));
            format!(
                "{}NORN_NEW({}, &{2}td, struct {2}Heap, {3});\n",
                tabs(indent),
                self.designator(des),
                name,
                alloc
            )
        } else {
            format!(
                "{}NORN_NEW_ANON({}, {});\n",
                tabs(indent),
                self.designator(des),
                alloc
            )
        };
        self.emit(&text);
    }
}

pub(crate) fn search_pointers_and_procedures(
    ty: &Type,
    has_pointer: &mut bool,
    has_procedure: &mut bool,
) {
    if *has_pointer && *has_procedure {
        return;
    }
    match ty.structure() {
        Type::Array { elem, .. } => {
            search_pointers_and_procedures(elem, has_pointer, has_procedure)
        }
        Type::Record(rec) => {
            if let Some(base) = &rec.base {
                search_pointers_and_procedures(base, has_pointer, has_procedure);
            }
            for group in &rec.fields {
                for field in &group.idents {
                    if *has_pointer && *has_procedure {
                        return;
                    }
                    search_pointers_and_procedures(field.ty(), has_pointer, has_procedure);
                }
            }
        }
        Type::Pointer(_) => *has_pointer = true,
        Type::Procedure(_) => *has_procedure = true,
        _ => {}
    }
}
