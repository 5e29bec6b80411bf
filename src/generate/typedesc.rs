//! Runtime type descriptors and the dynamic type test.
//!
//! Every record or pointer-to-record declaration emits a descriptor: a
//! unique address (`<T>id`), the ordered ancestor table (`<T>ids`, root
//! first, self at index `level`), and the descriptor object (`<T>td`)
//! carrying the table and its length. A subtype test between a dynamic
//! type D and a target T is then one lookup:
//! `D.ids[level(T)] == &T id`, true exactly for T and its proper
//! extensions and false for siblings even when they share an ancestor.
//!
//! Heap records are laid out behind a wrapper struct that prefixes the
//! descriptor pointer to the record's own fields; by-reference record
//! parameters instead receive their caller's descriptor as a hidden
//! argument, since the declared parameter type may be a proper ancestor of
//! the argument's dynamic type.

use super::expr::is_var_param;
use super::{tabs, Generator};
use crate::ast::{Designator, Ident, Selector};
use crate::types::Type;
use std::rc::Rc;

impl Generator {
    /// The identifier a type's descriptor objects are named after.
    pub(crate) fn desc_ident(&self, ty: &Rc<Type>) -> Rc<Ident> {
        ty.record_of()
            .unwrap_or_else(|| panic!("type {:?} carries no type descriptor", ty))
            .desc_ident()
            .clone()
    }

    /// The descriptor of a designator's dynamic type: read from the heap
    /// wrapper for pointers and dereferenced records, from the hidden
    /// parameter for by-reference record parameters, and from the static
    /// descriptor object otherwise.
    pub(crate) fn typedesc_expr(&self, des: &Designator) -> String {
        let ty = self.desig_ty(des);
        if ty.is_pointer() {
            return format!(
                "NORN_TD({}, struct {}Heap)",
                self.designator(des),
                self.ident(&self.desc_ident(&ty))
            );
        }
        if matches!(des.selectors.last(), Some(Selector::Deref)) {
            return format!(
                "NORN_TD(&({}), struct {}Heap)",
                self.designator(des),
                self.ident(&self.desc_ident(&ty))
            );
        }
        assert!(
            ty.is_record(),
            "type descriptor requested for a non-record designator"
        );
        if is_var_param(des) {
            format!("{}td", self.ident(&des.base))
        } else {
            format!("&{}td", self.ident(&self.desc_ident(&ty)))
        }
    }

    /// `des IS target`, §4.2: one table lookup against the target's level.
    pub(crate) fn is_expression(&self, des: &Designator, target: &Rc<Ident>) -> String {
        let ty = self.desig_ty(des);
        let operand = if ty.is_pointer() {
            self.designator(des)
        } else {
            format!("&({})", self.designator(des))
        };
        format!(
            "NORN_IS({}, {}, &{}id, {})",
            operand,
            self.typedesc_expr(des),
            self.ident(&self.desc_ident(target.ty())),
            target.ty().extension_level()
        )
    }

    /// The heap layout of a dynamically allocated record: descriptor
    /// pointer first, then the record's own fields.
    pub(crate) fn heap_type_decl(&self, desc: &Rc<Ident>, indent: usize) -> String {
        let name = self.ident(desc);
        let t = tabs(indent);
        format!(
            "{t}struct {name}Heap {{\n{t}\tconst NORN_Td *td;\n{t}\tstruct {name} fields;\n{t}}};\n"
        )
    }

    /// Emits the descriptor objects for a declared record or
    /// pointer-to-record type into the implementation unit, and their
    /// externs into the interface unit when the type is module-visible.
    pub(crate) fn type_desc_decl(&mut self, desc: &Rc<Ident>, indent: usize) {
        let level = desc.ty().extension_level();
        let count = level + 1;
        let name = self.ident(desc);
        let prefixed = self.module_prefix_needed(desc);

        if prefixed {
            let idents = [desc.clone()];
            let id_macros = self.symbol_macros(&idents, "id", 0);
            let ids_macros = self.symbol_macros(&idents, "ids", 0);
            let td_macros = self.symbol_macros(&idents, "td", 0);
            self.emit_h("\n");
            self.emit_h(&id_macros);
            self.emit_h(&format!("{}extern const int {}id;\n\n", tabs(indent), name));
            self.emit_h(&ids_macros);
            self.emit_h(&format!(
                "{}extern const int *const {}ids[{}];\n\n",
                tabs(indent),
                name,
                count
            ));
            self.emit_h(&td_macros);
            self.emit_h(&format!(
                "{}extern const NORN_Td {}td;\n",
                tabs(indent),
                name
            ));
        }
        let storage = if prefixed { "" } else { "static " };

        let entries: Vec<String> = self
            .ancestor_descs(desc)
            .iter()
            .map(|ancestor| format!("&{}id", self.ident(ancestor)))
            .collect();
        assert_eq!(
            entries.len() as i32,
            count,
            "descriptor table length disagrees with the extension level of {}",
            desc.name
        );

        let t = tabs(indent);
        let text = format!(
            "\n{t}{storage}const int {name}id;\n\
             {t}{storage}const int *const {name}ids[{count}] = {{{}}};\n\
             {t}{storage}const NORN_Td {name}td = {{{name}ids, {count}}};\n",
            entries.join(", ")
        );
        self.emit(&text);
    }

    /// Descriptor identifiers of the ancestor chain, lattice root first,
    /// the type itself last.
    fn ancestor_descs(&self, desc: &Rc<Ident>) -> Vec<Rc<Ident>> {
        let mut chain = Vec::new();
        let mut cur = record_struct(desc.ty());
        loop {
            let Type::Record(rec) = &*cur else {
                panic!("ancestor chain of {} leaves the record lattice", desc.name);
            };
            chain.push(rec.desc_ident().clone());
            match rec.base.clone() {
                Some(base) => cur = record_struct(&base),
                None => break,
            }
        }
        chain.reverse();
        chain
    }
}

/// Resolves a record or pointer-to-record type to the record structure.
fn record_struct(ty: &Rc<Type>) -> Rc<Type> {
    let st = Type::structure_of(ty);
    match &*st {
        Type::Pointer(p) => Type::structure_of(p.base()),
        _ => st,
    }
}
