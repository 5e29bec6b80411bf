//! Expression and designator lowering.
//!
//! Expressions render to C text bottom-up. Designators are generated from
//! the last selector backward: a field inherited through record extension
//! wraps the whole already-rendered prefix in a cast to the declaring
//! ancestor, so composition happens outside-in while the walk recurses
//! inside-out.

use super::frames::cast_needed;
use super::Generator;
use crate::ast::{BinOp, Designator, Expr, Ident, IdentKind, Selector, UnOp};
use crate::types::{self, RecordType, Type};
use std::rc::Rc;

impl Generator {
    pub(crate) fn expr(&self, exp: &Expr) -> String {
        match exp {
            Expr::Int(value) => int_lit(*value),
            Expr::Real(value) => real_lit(*value),
            Expr::Str(text) => string_lit(text),
            Expr::Char(ch) => char_lit(*ch),
            Expr::Bool(true) => "1".to_string(),
            Expr::Bool(false) => "0".to_string(),
            Expr::Nil => "0".to_string(),
            Expr::SetConst(bits) => format!("0x{:X}u", bits),
            Expr::SetRange { lo, hi } => {
                let name = if contains_call(lo) || contains_call(hi) {
                    "NORN_Range"
                } else {
                    "NORN_RANGE"
                };
                format!("{}({}, {})", name, self.expr(lo), self.expr(hi))
            }
            Expr::SetElem(elem) => format!("(0x1u << {})", self.with_precedence(elem)),
            Expr::Desig(des) => self.designator(des),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary { op, operand } => {
                let oper = match op {
                    UnOp::Neg if self.expr_ty(operand).is_set() => "~",
                    UnOp::Neg => "-",
                    UnOp::Not => "! ",
                };
                format!("{}{}", oper, self.with_precedence(operand))
            }
            Expr::Is { des, target } => self.is_expression(des, target),
            Expr::Call { proc, args } => self.call_text(proc, args),
            Expr::Abs(arg) => {
                let name = if self.expr_ty(arg).is_integer() {
                    "NORN_ABS_INT"
                } else {
                    "NORN_ABS_FLT"
                };
                format!("{}({})", name, self.expr(arg))
            }
            Expr::Odd(arg) => format!("NORN_ODD({})", self.expr(arg)),
            Expr::Len(des) => {
                let ty = self.desig_ty(des);
                self.array_len(&ty, &des.base, array_dimension(des))
            }
            Expr::Lsl(x, n) => format!("NORN_LSL({}, {})", self.expr(x), self.expr(n)),
            Expr::Asr(x, n) => format!("NORN_ASR({}, {})", self.expr(x), self.expr(n)),
            Expr::Ror(x, n) => {
                let name = if contains_call(x) || contains_call(n) {
                    "NORN_Ror"
                } else {
                    "NORN_ROR"
                };
                format!("{}({}, {})", name, self.expr(x), self.expr(n))
            }
            Expr::Floor(arg) => format!("NORN_FLOOR({})", self.expr(arg)),
            Expr::Flt(arg) => format!("NORN_FLT({})", self.expr(arg)),
            Expr::Ord(arg) => {
                let cast = if self.expr_ty(arg).is_char() {
                    "(unsigned char) "
                } else {
                    ""
                };
                format!("NORN_ORD({}{})", cast, self.with_precedence(arg))
            }
            Expr::Chr(arg) => format!("NORN_CHR({})", self.expr(arg)),
            Expr::Adr(arg) => {
                self.address_ops.set(true);
                format!("NORN_ADR({})", self.expr(arg))
            }
            Expr::Size(ty) => format!("NORN_SIZE({})", self.ident(ty)),
            Expr::Bit(addr, bit) => {
                self.address_ops.set(true);
                format!("NORN_BIT({}, {})", self.expr(addr), self.expr(bit))
            }
            Expr::Val(ty, arg) => format!("NORN_VAL({}, {})", self.ident(ty), self.expr(arg)),
        }
    }

    /// Operator operands that are themselves operators get parentheses.
    pub(crate) fn with_precedence(&self, exp: &Expr) -> String {
        match exp {
            Expr::Binary { .. } | Expr::Unary { .. } => format!("({})", self.expr(exp)),
            _ => self.expr(exp),
        }
    }

    fn binary(&self, op: BinOp, left: &Expr, right: &Expr) -> String {
        let left_ty = self.expr_ty(left);
        let right_ty = self.expr_ty(right);

        if (left_ty.is_string() || left_ty.is_character_array())
            && (right_ty.is_string() || right_ty.is_character_array())
        {
            return self.nonscalar_compare(op, left, right, &left_ty, &right_ty);
        }

        match op {
            BinOp::Div | BinOp::Mod => {
                let function_form = contains_call(left) || contains_call(right);
                let name = match (op, function_form) {
                    (BinOp::Div, false) => "NORN_DIV",
                    (BinOp::Div, true) => "NORN_Div",
                    (BinOp::Mod, false) => "NORN_MOD",
                    (BinOp::Mod, true) => "NORN_Mod",
                    _ => unreachable!(),
                };
                format!("{}({}, {})", name, self.expr(left), self.expr(right))
            }
            BinOp::In => format!("NORN_IN({}, {})", self.expr(left), self.expr(right)),
            BinOp::Lt | BinOp::Leq | BinOp::Gt | BinOp::Geq => {
                let left_cast = if left_ty.is_char() { "(unsigned char) " } else { "" };
                let right_cast = if right_ty.is_char() { "(unsigned char) " } else { "" };
                format!(
                    "{}{} {} {}{}",
                    left_cast,
                    self.with_precedence(left),
                    c_oper(op, false),
                    right_cast,
                    self.with_precedence(right)
                )
            }
            _ => {
                let oper = c_oper(op, left_ty.is_set());
                // Pointer comparison across an extension relationship
                // upcasts to the more-derived static type.
                if left_ty.is_pointer()
                    && !matches!(left, Expr::Nil)
                    && !matches!(right, Expr::Nil)
                    && !left_ty.same(&right_ty)
                {
                    if left_ty.extends(&right_ty) {
                        format!(
                            "{} {} ({}) {}",
                            self.with_precedence(left),
                            oper,
                            self.type_name(&left_ty),
                            self.with_precedence(right)
                        )
                    } else {
                        format!(
                            "({}) {} {} {}",
                            self.type_name(&right_ty),
                            self.with_precedence(left),
                            oper,
                            self.with_precedence(right)
                        )
                    }
                } else {
                    format!(
                        "{} {} {}",
                        self.with_precedence(left),
                        oper,
                        self.with_precedence(right)
                    )
                }
            }
        }
    }

    /// Array and string comparison: C arrays have no comparison operators,
    /// so both operands go through the length-carrying compare helper.
    fn nonscalar_compare(
        &self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        left_ty: &Rc<Type>,
        right_ty: &Rc<Type>,
    ) -> String {
        assert!(
            matches!(
                op,
                BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::Leq | BinOp::Gt | BinOp::Geq
            ),
            "non-comparison operator applied to array operands"
        );
        let name = if contains_call(left) || contains_call(right) {
            "NORN_Cmp"
        } else {
            "NORN_CMP"
        };
        let mut out = format!("{}(", name);
        for (i, (exp, ty)) in [(left, left_ty), (right, right_ty)].into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            if ty.is_array() {
                if let Expr::Desig(des) = exp {
                    if array_dimension(des) > 0 {
                        out.push('&');
                    }
                }
            }
            out.push_str(&self.with_precedence(exp));
            out.push_str(", ");
            match exp {
                Expr::Str(text) => out.push_str(&(text.chars().count() + 1).to_string()),
                Expr::Desig(des) => {
                    out.push_str(&self.array_len(ty, &des.base, array_dimension(des)))
                }
                _ => panic!("array comparison operand is neither a string nor a designator"),
            }
        }
        out.push_str(") ");
        out.push_str(c_oper(op, false));
        out.push_str(" 0");
        out
    }

    /// Synthesized result type of an annotated expression.
    pub(crate) fn expr_ty(&self, exp: &Expr) -> Rc<Type> {
        match exp {
            Expr::Int(_) => types::integer(),
            Expr::Real(_) => types::real(),
            Expr::Str(text) => types::string(text.chars().count()),
            Expr::Char(_) => types::character(),
            Expr::Bool(_) => types::boolean(),
            Expr::Nil => types::nil(),
            Expr::SetConst(_) | Expr::SetRange { .. } | Expr::SetElem(_) => types::set(),
            Expr::Desig(des) => self.desig_ty(des),
            Expr::Binary { op, left, .. } => match op {
                BinOp::Eq
                | BinOp::Neq
                | BinOp::Lt
                | BinOp::Leq
                | BinOp::Gt
                | BinOp::Geq
                | BinOp::In
                | BinOp::And
                | BinOp::Or => types::boolean(),
                _ => self.expr_ty(left),
            },
            Expr::Unary { op, operand } => match op {
                UnOp::Not => types::boolean(),
                UnOp::Neg => self.expr_ty(operand),
            },
            Expr::Is { .. } => types::boolean(),
            Expr::Call { proc, .. } => self
                .desig_ty(proc)
                .procedure()
                .result
                .clone()
                .unwrap_or_else(|| panic!("proper procedure {} called in an expression", proc.base.name)),
            Expr::Abs(arg) => self.expr_ty(arg),
            Expr::Odd(_) | Expr::Bit(..) => types::boolean(),
            Expr::Len(_)
            | Expr::Lsl(..)
            | Expr::Asr(..)
            | Expr::Ror(..)
            | Expr::Floor(_)
            | Expr::Ord(_)
            | Expr::Adr(_)
            | Expr::Size(_) => types::integer(),
            Expr::Flt(_) => types::real(),
            Expr::Chr(_) => types::character(),
            Expr::Val(ty, _) => types::named(ty),
        }
    }

    /// The label type a designator silently narrows to inside a type-CASE
    /// arm over its base variable.
    fn implicit_guard(&self, des: &Designator) -> Option<Rc<Ident>> {
        let variable = self.case_variable.as_ref()?;
        let label = self.case_label.as_ref()?;
        if !Rc::ptr_eq(&des.base, variable) {
            return None;
        }
        if matches!(des.selectors.first(), Some(Selector::Guard(_))) {
            return None;
        }
        if variable.ty().same(label.ty()) {
            return None;
        }
        Some(label.clone())
    }

    /// `result[k]` is the designator's type after `k` selectors; the last
    /// entry is its full type. Inside a type-CASE arm the base starts out
    /// narrowed to the arm's label type.
    pub(crate) fn desig_types(&self, des: &Designator) -> Vec<Rc<Type>> {
        let mut tys = Vec::with_capacity(des.selectors.len() + 1);
        tys.push(match self.implicit_guard(des) {
            Some(label) => types::named(&label),
            None => des.base.ty().clone(),
        });
        for sel in &des.selectors {
            let cur = tys.last().unwrap().clone();
            let next = match sel {
                Selector::Index(_) => Type::structure_of(&cur).element_type().clone(),
                Selector::Field(name) => {
                    let (field, _) = RecordType::find_field(&Type::structure_of(&cur), name)
                        .unwrap_or_else(|| {
                            panic!("field {} not found in type {:?}", name, cur)
                        });
                    field.ty().clone()
                }
                Selector::Deref => Type::structure_of(&cur).pointer_base().clone(),
                Selector::Guard(target) => types::named(target),
            };
            tys.push(next);
        }
        tys
    }

    pub(crate) fn desig_ty(&self, des: &Designator) -> Rc<Type> {
        self.desig_types(des).pop().unwrap()
    }

    pub(crate) fn designator(&self, des: &Designator) -> String {
        let tys = self.desig_types(des);
        self.designator_upto(des, des.selectors.len(), &tys)
    }

    /// Renders the designator truncated to its first `n` selectors.
    fn designator_upto(&self, des: &Designator, n: usize, tys: &[Rc<Type>]) -> String {
        if n == 0 {
            if let Some(label) = self.implicit_guard(des) {
                let prefix = self.designator_var(&des.base);
                return self.guard_core(prefix, des.base.ty(), &des.base, true, &label, des.line);
            }
            return self.designator_var(&des.base);
        }
        match &des.selectors[n - 1] {
            Selector::Index(_) => {
                let mut start = n - 1;
                while start > 0 && matches!(des.selectors[start - 1], Selector::Index(_)) {
                    start -= 1;
                }
                format!(
                    "{}[{}]",
                    self.designator_upto(des, start, tys),
                    self.array_index(des, start, n, tys)
                )
            }
            Selector::Field(name) => {
                let prefix_ty = &tys[n - 1];
                let (field, declaring) =
                    RecordType::find_field(&Type::structure_of(prefix_ty), name).unwrap_or_else(
                        || panic!("field {} not found in type {:?}", name, prefix_ty),
                    );
                let prefix = self.designator_upto(des, n - 1, tys);
                if declaring.same(prefix_ty) {
                    format!("{}.{}", prefix, self.ident(&field))
                } else {
                    // The field lives in an ancestor: reinterpret the whole
                    // prefix as the declaring record.
                    format!(
                        "(*(({} *) &{})).{}",
                        self.type_name(&declaring),
                        prefix,
                        self.ident(&field)
                    )
                }
            }
            Selector::Deref => format!(
                "(*NORN_PT({}, {}))",
                self.designator_upto(des, n - 1, tys),
                des.line
            ),
            Selector::Guard(target) => {
                let prefix = self.designator_upto(des, n - 1, tys);
                self.guard_core(prefix, &tys[n - 1], &des.base, n == 1, target, des.line)
            }
        }
    }

    /// Type-guard rendering shared by explicit guards and the implicit
    /// narrowing inside type-CASE arms. A failed test traps with the type
    /// name and source line at the generated program's run time.
    pub(crate) fn guard_core(
        &self,
        prefix: String,
        prefix_ty: &Rc<Type>,
        base: &Rc<Ident>,
        first_selector: bool,
        target: &Rc<Ident>,
        line: u32,
    ) -> String {
        let target_record = target.ty().is_record();
        let mut out = format!("(*(({}", self.ident(target));
        out.push_str(if target_record {
            "*) NORN_RTT(&("
        } else {
            "*) NORN_PTT(&("
        });
        out.push_str(&prefix);
        out.push_str("), ");
        if target_record {
            if base.kind == IdentKind::VarParam && first_selector {
                out.push_str(&format!("{}td", self.ident(base)));
            } else {
                out.push_str(&format!("&{}td", self.ident(&self.desc_ident(prefix_ty))));
            }
        } else {
            out.push_str(&format!(
                "NORN_TD({}, struct {}Heap)",
                prefix,
                self.ident(&self.desc_ident(prefix_ty))
            ));
        }
        out.push_str(&format!(
            ", &{}id, {}, {})))",
            self.ident(&self.desc_ident(target.ty())),
            target.ty().extension_level(),
            line
        ));
        out
    }

    fn designator_var(&self, ident: &Rc<Ident>) -> String {
        let deref = (ident.kind == IdentKind::ValueParam && ident.ty().is_record())
            || (ident.kind == IdentKind::VarParam && !ident.ty().is_array());
        if deref {
            format!("(*{})", self.ident(ident))
        } else {
            self.ident(ident)
        }
    }

    /// Flattened offset of one run of index selectors. Multi-dimensional
    /// arrays are stored as one dimension, so each index is scaled by the
    /// lengths of its trailing dimensions; indexes not provably in range
    /// get a bounds trap.
    fn array_index(&self, des: &Designator, start: usize, end: usize, tys: &[Rc<Type>]) -> String {
        let run_ty = Type::structure_of(&tys[start]);
        let mut out = String::new();
        if run_ty.element_type().is_array() {
            out.push_str("(size_t) ");
        }
        let open = run_ty.is_open_array();
        let mut cur = run_ty;
        for (k, sel) in (start..end).enumerate() {
            let Selector::Index(exp) = &des.selectors[sel] else {
                unreachable!("index run contains a non-index selector");
            };
            if k > 0 {
                out.push_str(" + ");
            }
            let trap = open || !is_const_expr(exp);
            if trap {
                out.push_str(if contains_call(exp) {
                    "NORN_IT1("
                } else {
                    "NORN_IT("
                });
            }
            out.push_str(&self.expr(exp));
            if trap {
                out.push_str(&format!(
                    ", {}, {})",
                    self.array_len(&cur, &des.base, k),
                    des.line
                ));
            }
            let mut trailing = Type::structure_of(cur.element_type());
            let mut dim = k + 1;
            while trailing.is_array() {
                out.push_str(&format!(" * {}", self.array_len(&trailing, &des.base, dim)));
                let next = Type::structure_of(trailing.element_type());
                trailing = next;
                dim += 1;
            }
            cur = Type::structure_of(cur.element_type());
        }
        out
    }

    /// One dimension's length: the literal length, or the hidden length
    /// argument of an open array parameter.
    pub(crate) fn array_len(&self, ty: &Rc<Type>, base: &Rc<Ident>, dim: usize) -> String {
        match ty.array_length() {
            Some(len) => len.to_string(),
            None => {
                let suffix = if dim > 0 {
                    dim.to_string()
                } else {
                    String::new()
                };
                format!("{}len{}", self.ident(base), suffix)
            }
        }
    }

    /// Product of all dimension lengths from `dim0` down.
    pub(crate) fn flattened_array_len(
        &self,
        ty: &Rc<Type>,
        base: &Rc<Ident>,
        dim0: usize,
    ) -> String {
        let mut out = String::new();
        let mut cur = Type::structure_of(ty);
        if cur.element_type().is_array() {
            out.push_str("(size_t) ");
        }
        let mut i = 0;
        loop {
            if i > 0 {
                out.push_str(" * ");
            }
            out.push_str(&self.array_len(&cur, base, dim0 + i));
            let elem = Type::structure_of(cur.element_type());
            if !elem.is_array() {
                break;
            }
            cur = elem;
            i += 1;
        }
        out
    }

    /// Call lowering: per argument, value vs. reference passing, an upcast
    /// where the static argument type is a proper ancestor of the formal
    /// type, hidden length arguments per open-array dimension, and a hidden
    /// descriptor for by-reference record parameters.
    pub(crate) fn call_text(&self, proc: &Designator, args: &[Expr]) -> String {
        let proc_ty = self.desig_ty(proc);
        let signature = proc_ty.procedure();
        assert_eq!(
            args.len(),
            signature.params.len(),
            "call to {} with a mismatched argument count",
            proc.base.name
        );

        let mut out = String::new();
        if proc.base.kind == IdentKind::Proc {
            out.push_str(&self.designator(proc));
        } else {
            // A procedure variable may be uninitialized; trap on nil.
            out.push_str(&format!("NORN_PCT({}, {})", self.designator(proc), proc.line));
        }
        out.push('(');

        for (i, (arg, formal)) in args.iter().zip(&signature.params).enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let arg_ty = self.expr_ty(arg);
            let fp_ty = formal.ty();
            let is_value = formal.kind == IdentKind::ValueParam;
            let is_var = formal.kind == IdentKind::VarParam;

            if cast_needed(&arg_ty, fp_ty) {
                out.push('(');
                out.push_str(&self.type_name(fp_ty));
                if (is_var && !fp_ty.is_array()) || fp_ty.is_record() {
                    out.push_str(" *");
                }
                out.push_str(") ");
            }
            let sliced_array = arg_ty.is_array()
                && matches!(arg, Expr::Desig(des) if array_dimension(des) > 0);
            if sliced_array || (is_value && fp_ty.is_record()) || (is_var && !fp_ty.is_array()) {
                out.push('&');
            }
            out.push_str(&self.with_precedence(arg));

            if fp_ty.is_open_array() {
                if let Expr::Str(text) = arg {
                    out.push_str(&format!(", {}", text.chars().count() + 1));
                } else {
                    let Expr::Desig(des) = arg else {
                        panic!("open array argument is neither a string nor a designator");
                    };
                    let mut fp_comp = Type::structure_of(fp_ty);
                    let mut arg_comp = Type::structure_of(&arg_ty);
                    let mut dim = array_dimension(des);
                    loop {
                        out.push_str(", ");
                        out.push_str(&self.array_len(&arg_comp, &des.base, dim));
                        fp_comp = Type::structure_of(fp_comp.element_type());
                        if !fp_comp.is_array() {
                            break;
                        }
                        arg_comp = Type::structure_of(arg_comp.element_type());
                        dim += 1;
                    }
                }
            } else if is_var && fp_ty.is_record() {
                let Expr::Desig(des) = arg else {
                    panic!("by-reference record argument is not a designator");
                };
                out.push_str(", ");
                out.push_str(&self.typedesc_expr(des));
            }
        }
        out.push(')');
        out
    }
}

fn c_oper(op: BinOp, set: bool) -> &'static str {
    match op {
        BinOp::Add => {
            if set {
                "|"
            } else {
                "+"
            }
        }
        BinOp::Sub => {
            if set {
                "& ~"
            } else {
                "-"
            }
        }
        BinOp::Mul => {
            if set {
                "&"
            } else {
                "*"
            }
        }
        BinOp::Quot => {
            if set {
                "^"
            } else {
                "/"
            }
        }
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::Eq => "==",
        BinOp::Neq => "!=",
        BinOp::Lt => "<",
        BinOp::Leq => "<=",
        BinOp::Gt => ">",
        BinOp::Geq => ">=",
        BinOp::Div | BinOp::Mod | BinOp::In => {
            unreachable!("operator lowered through a runtime helper")
        }
    }
}

/// Count of trailing consecutive index selectors; a partially indexed
/// multi-dimensional array designates a slice at this dimension offset.
pub(crate) fn array_dimension(des: &Designator) -> usize {
    let mut dim = 0;
    for sel in &des.selectors {
        if matches!(sel, Selector::Index(_)) {
            dim += 1;
        } else {
            dim = 0;
        }
    }
    dim
}

pub(crate) fn is_var_param(des: &Designator) -> bool {
    des.base.kind == IdentKind::VarParam
        && (des.selectors.is_empty()
            || (des.selectors.len() == 1 && matches!(des.selectors[0], Selector::Guard(_))))
}

/// Whether evaluating the expression may call a procedure; macro-form
/// runtime helpers evaluate their arguments more than once and must not be
/// used then.
pub(crate) fn contains_call(exp: &Expr) -> bool {
    match exp {
        Expr::Call { .. } => true,
        Expr::Int(_)
        | Expr::Real(_)
        | Expr::Str(_)
        | Expr::Char(_)
        | Expr::Bool(_)
        | Expr::Nil
        | Expr::SetConst(_)
        | Expr::Size(_) => false,
        Expr::SetRange { lo, hi } => contains_call(lo) || contains_call(hi),
        Expr::SetElem(elem) => contains_call(elem),
        Expr::Desig(des) => desig_contains_call(des),
        Expr::Binary { left, right, .. } => contains_call(left) || contains_call(right),
        Expr::Unary { operand, .. } => contains_call(operand),
        Expr::Is { des, .. } => desig_contains_call(des),
        Expr::Abs(arg)
        | Expr::Odd(arg)
        | Expr::Floor(arg)
        | Expr::Flt(arg)
        | Expr::Ord(arg)
        | Expr::Chr(arg)
        | Expr::Adr(arg) => contains_call(arg),
        Expr::Len(des) => desig_contains_call(des),
        Expr::Lsl(x, n) | Expr::Asr(x, n) | Expr::Ror(x, n) | Expr::Bit(x, n) => {
            contains_call(x) || contains_call(n)
        }
        Expr::Val(_, arg) => contains_call(arg),
    }
}

pub(crate) fn desig_contains_call(des: &Designator) -> bool {
    des.selectors.iter().any(|sel| match sel {
        Selector::Index(exp) => contains_call(exp),
        _ => false,
    })
}

/// Compile-time constants need no bounds trap when indexing a fixed array;
/// range validity was checked upstream.
pub(crate) fn is_const_expr(exp: &Expr) -> bool {
    matches!(
        exp,
        Expr::Int(_) | Expr::Real(_) | Expr::Str(_) | Expr::Char(_) | Expr::Bool(_)
            | Expr::SetConst(_)
    )
}

pub(crate) fn expr_uses_address_ops(exp: &Expr) -> bool {
    match exp {
        Expr::Adr(_) | Expr::Bit(..) => true,
        Expr::Int(_)
        | Expr::Real(_)
        | Expr::Str(_)
        | Expr::Char(_)
        | Expr::Bool(_)
        | Expr::Nil
        | Expr::SetConst(_)
        | Expr::Size(_) => false,
        Expr::SetRange { lo, hi } => expr_uses_address_ops(lo) || expr_uses_address_ops(hi),
        Expr::SetElem(elem) => expr_uses_address_ops(elem),
        Expr::Desig(des) | Expr::Is { des, .. } => desig_uses_address_ops(des),
        Expr::Binary { left, right, .. } => {
            expr_uses_address_ops(left) || expr_uses_address_ops(right)
        }
        Expr::Unary { operand, .. } => expr_uses_address_ops(operand),
        Expr::Call { proc, args } => {
            desig_uses_address_ops(proc) || args.iter().any(expr_uses_address_ops)
        }
        Expr::Abs(arg)
        | Expr::Odd(arg)
        | Expr::Floor(arg)
        | Expr::Flt(arg)
        | Expr::Ord(arg)
        | Expr::Chr(arg)
        | Expr::Adr(arg)
        | Expr::Val(_, arg) => expr_uses_address_ops(arg),
        Expr::Len(des) => desig_uses_address_ops(des),
        Expr::Lsl(x, n) | Expr::Asr(x, n) | Expr::Ror(x, n) | Expr::Bit(x, n) => {
            expr_uses_address_ops(x) || expr_uses_address_ops(n)
        }
    }
}

pub(crate) fn desig_uses_address_ops(des: &Designator) -> bool {
    des.selectors.iter().any(|sel| match sel {
        Selector::Index(exp) => expr_uses_address_ops(exp),
        _ => false,
    })
}

fn int_lit(value: i64) -> String {
    // The most negative literal has no C spelling of its own width.
    if value == i64::MIN {
        format!("({} - 1)", value + 1)
    } else {
        value.to_string()
    }
}

fn real_lit(value: f64) -> String {
    if value.is_nan() {
        if value.is_sign_negative() {
            return "(-0.0 / 0.0)".to_string();
        }
        return "(0.0 / 0.0)".to_string();
    }
    if value == f64::INFINITY {
        return "(1.0 / 0.0)".to_string();
    }
    if value == f64::NEG_INFINITY {
        return "(-1.0 / 0.0)".to_string();
    }
    let mut out = format!("{}", value);
    if !out.contains('.') && !out.contains('e') && !out.contains('E') {
        out.push_str(".0");
    }
    out
}

fn string_lit(text: &str) -> String {
    let mut out = String::from("\"");
    for ch in text.chars() {
        if ch.is_ascii() {
            if ch.is_ascii_graphic() || ch == ' ' {
                if ch == '"' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            } else {
                // Splice hex escapes between adjacent literals so following
                // characters are not swallowed by the escape.
                out.push_str(&format!("\" \"\\x{:02x}\" \"", ch as u32));
            }
        } else {
            out.push(ch);
        }
    }
    out.push('"');
    out
}

pub(crate) fn char_lit(ch: u8) -> String {
    match ch {
        b'\'' | b'\\' => format!("'\\{}'", ch as char),
        _ if ch.is_ascii_graphic() || ch == b' ' => format!("'{}'", ch as char),
        _ => format!("'\\x{:02x}'", ch),
    }
}
