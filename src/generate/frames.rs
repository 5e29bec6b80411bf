//! Procedure declaration frames and the nesting linearizer.
//!
//! C only has flat functions, so a procedure declared inside another one is
//! emitted as an ordinary function placed textually before its enclosing
//! procedure. Each open declaration owns two growable buffers: `decl` is
//! its own partial text, `before` collects the finished declarations of its
//! local procedures. Entering the first local procedure forward-declares
//! the enclosing one so siblings can call it; leaving a local procedure
//! splices its text into the parent's `before`, and the parent resumes
//! exactly where it left off.

use super::Generator;
use crate::ast::{Ident, IdentKind, Stmt};
use crate::types::Type;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

pub(crate) struct Frame {
    pub ident: Rc<Ident>,
    /// Names of this procedure's direct local procedures, for same-level
    /// name-reuse detection in the lexical-path renderer.
    pub children: HashSet<String>,
    /// Completed local-procedure declarations, in emission order.
    pub before: String,
    /// This procedure's own declaration text, still growing.
    pub decl: String,
    /// The declaration's signature, kept for the forward declaration.
    pub sig: Option<String>,
    pub forward_declared: bool,
}

impl Generator {
    pub fn procedure_heading(&mut self, ident: &Rc<Ident>) {
        assert!(
            ident.kind == IdentKind::Proc,
            "procedure heading generated for non-procedure identifier {}",
            ident.name
        );
        self.ensure_internal_decls();
        self.push_frame(ident);
        debug!(procedure = %ident.name, local = ident.local, "generating procedure");

        let mut sig = String::new();
        if !ident.exported {
            sig.push_str("static ");
        }
        let proc_type = ident.ty().procedure();
        match &proc_type.result {
            Some(result) => {
                sig.push_str(&self.type_name(result));
                sig.push(' ');
            }
            None => sig.push_str("void "),
        }
        sig.push_str(&self.ident(ident));
        sig.push('(');
        if proc_type.params.is_empty() {
            sig.push_str("void");
        } else {
            sig.push_str(&self.formal_parameter_list(&proc_type.params));
        }
        sig.push(')');

        self.emit("\n");
        self.emit(&sig);
        if ident.exported {
            self.emit_h("\n");
            let macros = self.symbol_macros(&[ident.clone()], "", 0);
            self.emit_h(&macros);
            self.emit_h(&sig);
            self.emit_h(";\n");
        }
        self.emit("\n{\n");
        self.frames
            .last_mut()
            .expect("frame vanished under an open procedure heading")
            .sig = Some(sig);
    }

    pub fn procedure_statements(&mut self, body: &[Stmt]) {
        assert!(
            !self.frames.is_empty(),
            "procedure statements generated outside a procedure declaration"
        );
        self.emit("\n");
        self.stmt_seq(body, 1);
    }

    pub fn return_clause(&mut self, exp: &crate::ast::Expr) {
        let frame = self
            .frames
            .last()
            .expect("return clause generated outside a procedure declaration");
        let result = frame
            .ident
            .ty()
            .procedure()
            .result
            .clone()
            .expect("return clause in a proper procedure");
        let mut text = "\treturn ".to_string();
        let exp_ty = self.expr_ty(exp);
        if cast_needed(&exp_ty, &result) {
            text.push_str(&format!("({}) ", self.type_name(&result)));
            text.push_str(&self.with_precedence(exp));
        } else {
            text.push_str(&self.expr(exp));
        }
        text.push_str(";\n");
        self.emit(&text);
    }

    pub fn procedure_end(&mut self, ident: &Rc<Ident>) {
        self.emit("}\n\n");
        let frame = self
            .frames
            .pop()
            .expect("procedure end generated outside a procedure declaration");
        assert!(
            Rc::ptr_eq(&frame.ident, ident),
            "procedure end for {} closes an open declaration of {}",
            ident.name,
            frame.ident.name
        );
        let text = format!("{}{}", frame.before, frame.decl);
        match self.frames.last_mut() {
            Some(parent) => parent.before.push_str(&text),
            None => self.impl_root.push_str(&text),
        }
    }

    /// Opens a declaration frame. A local procedure registers itself with
    /// its parent and, if it is the parent's first local procedure, leaves
    /// a forward declaration of the parent behind so the enclosing name
    /// stays callable from the procedures emitted ahead of it.
    fn push_frame(&mut self, ident: &Rc<Ident>) {
        if ident.local {
            let parent = self
                .frames
                .last_mut()
                .expect("local procedure declared outside any procedure");
            parent.children.insert(ident.name.clone());
            if !parent.forward_declared {
                let sig = parent
                    .sig
                    .clone()
                    .expect("local procedure declared before the enclosing heading");
                parent.before.push_str(&format!("\n{};\n", sig));
                parent.forward_declared = true;
            }
        }
        self.frames.push(Frame {
            ident: ident.clone(),
            children: HashSet::new(),
            before: String::new(),
            decl: String::new(),
            sig: None,
            forward_declared: false,
        });
    }
}

/// A narrowing store needs an explicit cast: byte targets, and record or
/// pointer targets whose declared type is a proper extension of the
/// source's static type.
pub(crate) fn cast_needed(source: &Type, target: &Type) -> bool {
    (target.is_byte() && !source.is_byte())
        || ((target.is_record() || target.is_pointer())
            && !source.is_nil()
            && target.extends(source)
            && !target.same(source))
}
