//! Declaration rendering.
//!
//! Every declaration renders once into the implementation unit and,
//! exactly when it is part of the module's public surface, into the
//! interface unit as well. Multi-dimensional arrays are declared flattened
//! to one dimension so open-array parameters can be substituted with the
//! correct type.

use super::stmt::search_pointers_and_procedures;
use super::{tabs, Generator};
use crate::ast::{tie_desc_ident, Expr, Ident, IdentKind};
use crate::types::{self, Type};
use std::rc::Rc;

impl Generator {
    /// Exported constants become textual-substitution macros in the
    /// interface unit; everything else about a constant was folded away
    /// upstream.
    pub fn const_declaration(&mut self, ident: &Rc<Ident>, value: &Expr) {
        self.ensure_internal_decls();
        if ident.exported {
            let text = format!("\n#define {} {}\n", self.ident(ident), self.expr(value));
            self.emit_h(&text);
        }
    }

    pub fn type_declaration(&mut self, ident: &Rc<Ident>) {
        self.ensure_internal_decls();
        tie_desc_ident(ident);
        let indent = usize::from(ident.local);
        let prefixed = self.module_prefix_needed(ident);

        self.declared_type = Some(ident.clone());
        let text = self.render_declaration(&[ident.clone()], indent, prefixed);
        self.declared_type = None;
        if prefixed {
            self.emit_h("\n");
            self.emit_h(&text);
        } else {
            if !ident.local {
                self.emit("\n");
            }
            self.emit(&text);
        }

        let needs_descriptor = match &**ident.ty() {
            Type::Record(_) => true,
            Type::Pointer(p) => matches!(&**p.base(), Type::Record(_)),
            _ => false,
        };
        if needs_descriptor {
            let desc = self.desc_ident(ident.ty());
            if prefixed {
                let heap = self.heap_type_decl(&desc, 0);
                self.emit_h("\n");
                self.emit_h(&heap);
            } else {
                let heap = self.heap_type_decl(&desc, indent);
                self.emit("\n");
                self.emit(&heap);
            }
            self.type_desc_decl(&desc, indent);
        }
    }

    /// A variable group renders into the interface unit when any of its
    /// identifiers is exported, split into exported and non-exported
    /// sub-declarations when the marks differ. An anonymous structural type
    /// is first hoisted into a synthesized named type so both units agree
    /// on a nameable type.
    pub fn variable_declaration(&mut self, idents: &[Rc<Ident>]) {
        assert!(!idents.is_empty(), "empty variable declaration group");
        self.ensure_internal_decls();
        let first = &idents[0];
        let indent = usize::from(first.local);
        if !first.local {
            self.emit("\n");
        }

        let any_exported = idents.iter().any(|ident| ident.exported);
        if !any_exported || self.cfg.entry_point {
            let text = self.render_declaration(idents, indent, false);
            self.emit(&text);
            return;
        }

        self.emit_h("\n");
        let ty = first.ty().clone();
        let group: Vec<Rc<Ident>> = if name_equivalence_needed(&ty) {
            let hoisted = Ident::new(&self.next_hoisted_name(), IdentKind::Type)
                .typed(ty)
                .internal()
                .build();
            let decl = self.render_declaration(&[hoisted.clone()], indent, true);
            self.emit_h(&decl);
            let named = types::named(&hoisted);
            idents.iter().map(|ident| ident.retyped(named.clone())).collect()
        } else {
            idents.to_vec()
        };

        let exported: Vec<Rc<Ident>> = group.iter().filter(|i| i.exported).cloned().collect();
        let hidden: Vec<Rc<Ident>> = group.iter().filter(|i| !i.exported).cloned().collect();

        let macros = self.symbol_macros(&exported, "", indent);
        self.emit_h(&macros);
        let header_decl = self.render_declaration(&exported, indent, true);
        self.emit_h(&header_decl);
        let impl_decl = self.render_declaration(&exported, indent, false);
        self.emit(&impl_decl);
        if !hidden.is_empty() {
            let impl_hidden = self.render_declaration(&hidden, indent, false);
            self.emit(&impl_hidden);
        }
    }

    /// One declaration line for a group of identifiers sharing a type.
    pub(crate) fn render_declaration(
        &self,
        idents: &[Rc<Ident>],
        indent: usize,
        header: bool,
    ) -> String {
        let first = &idents[0];
        let mut out = tabs(indent);
        out.push_str(storage_class(first, header));
        out.push_str(&self.type_specifier(Some(first), first.ty(), indent));
        out.push(' ');
        for (i, ident) in idents.iter().enumerate() {
            out.push_str(&self.declarator(ident));
            if first.kind == IdentKind::Var && first.local && !header {
                // The collector must never see indeterminate pointers.
                match Type::structure_of(first.ty()).as_ref() {
                    Type::Array { .. } | Type::Record(_) => {
                        let mut has_pointer = false;
                        let mut has_procedure = false;
                        search_pointers_and_procedures(
                            first.ty(),
                            &mut has_pointer,
                            &mut has_procedure,
                        );
                        if has_pointer || has_procedure {
                            out.push_str(" = {0}");
                        }
                    }
                    Type::Pointer(_) | Type::Procedure(_) => out.push_str(" = 0"),
                    _ => {}
                }
            }
            if i + 1 < idents.len() {
                out.push_str(", ");
            }
        }
        out.push_str(";\n");
        out
    }

    fn type_specifier(
        &self,
        decl_ident: Option<&Rc<Ident>>,
        ty: &Rc<Type>,
        indent: usize,
    ) -> String {
        match &**ty {
            Type::Named(target) => {
                let mut out = String::new();
                if self.possibly_incomplete(target, decl_ident) {
                    out.push_str("struct ");
                }
                out.push_str(&self.ident(target));
                out
            }
            Type::Array { .. } => {
                let mut elem = ty.element_type().clone();
                while elem.is_array() {
                    let next = Type::structure_of(&elem).element_type().clone();
                    elem = next;
                }
                self.type_specifier(decl_ident, &elem, indent)
            }
            Type::Record(_) => self.record_decl(ty, decl_ident, indent),
            Type::Pointer(p) => self.type_specifier(decl_ident, p.base(), indent),
            Type::Procedure(p) => match &p.result {
                Some(result) => self.type_specifier(decl_ident, result, indent),
                None => "void".to_string(),
            },
            t if t.is_basic() => super::ident::c_basic_name(t).to_string(),
            _ => panic!("type {:?} has no declaration specifier", ty),
        }
    }

    fn declarator(&self, ident: &Rc<Ident>) -> String {
        let ty = ident.ty();
        let mut first_non_array = ty.clone();
        while let Type::Array { elem, .. } = &*first_non_array {
            first_non_array = elem.clone();
        }

        let mut out = String::new();
        match &*first_non_array {
            Type::Pointer(_) => out.push('*'),
            Type::Named(target)
                if first_non_array.is_pointer()
                    && self.possibly_incomplete(target, Some(ident)) =>
            {
                out.push('*');
            }
            Type::Procedure(p) => {
                if let (Some(result), Some(declared)) = (&p.result, &self.declared_type) {
                    if matches!(&**result, Type::Named(t) if Rc::ptr_eq(t, declared)) {
                        out.push('*');
                    }
                }
                out.push_str("(*");
            }
            _ => {}
        }
        out.push_str(&self.ident(ident));
        if matches!(&**ty, Type::Array { .. }) {
            out.push('[');
            out.push_str(&self.flattened_array_len(ty, ident, 0));
            out.push(']');
        }
        if let Type::Procedure(p) = &*first_non_array {
            out.push_str(")(");
            if p.params.is_empty() {
                out.push_str("void");
            } else {
                out.push_str(&self.formal_parameter_list(&p.params));
            }
            out.push(')');
        }
        out
    }

    /// A named type reference that must render as a struct tag: pointer
    /// declarations whose pointee record may not be complete yet, and self
    /// references to the type currently being declared.
    fn possibly_incomplete(&self, target: &Rc<Ident>, decl_ident: Option<&Rc<Ident>>) -> bool {
        if let Some(declared) = &self.declared_type {
            if Rc::ptr_eq(target, declared) {
                return true;
            }
        }
        let Some(ident) = decl_ident else {
            return false;
        };
        let declaring_pointer = matches!(ident.raw_ty().map(|t| &**t), Some(Type::Pointer(_)));
        if !declaring_pointer || !matches!(ident.kind, IdentKind::Type | IdentKind::Field) {
            return false;
        }
        match target.raw_ty() {
            None => true,
            Some(ty) => ty.is_record(),
        }
    }

    fn record_decl(&self, ty: &Rc<Type>, decl_ident: Option<&Rc<Ident>>, indent: usize) -> String {
        let mut out = String::from("struct ");
        if let Some(ident) = decl_ident {
            if ident.kind == IdentKind::Type {
                out.push_str(&self.ident(ident));
                out.push(' ');
            }
        }
        out.push_str("{\n");
        out.push_str(&self.record_fields(ty, indent + 1));
        out.push_str(&tabs(indent));
        out.push('}');
        out
    }

    fn record_fields(&self, ty: &Rc<Type>, indent: usize) -> String {
        let rec = ty.record();
        let mut out = String::new();
        if let Some(base) = &rec.base {
            let base_struct = Type::structure_of(base);
            match &*base_struct {
                Type::Record(_) => {
                    out.push_str(&format!("{}{} base;\n", tabs(indent), self.type_name(base)));
                }
                Type::Pointer(p) => match &**p.base() {
                    Type::Named(pointee) => out.push_str(&format!(
                        "{}{} base;\n",
                        tabs(indent),
                        self.ident(pointee)
                    )),
                    Type::Record(r) => out.push_str(&format!(
                        "{}struct {} base;\n",
                        tabs(indent),
                        self.ident(r.desc_ident())
                    )),
                    _ => panic!("record base must resolve to a record"),
                },
                _ => panic!("record base must resolve to a record"),
            }
        } else if rec.fields.is_empty() {
            out.push_str(&format!("{}char dummy;\n", tabs(indent)));
        }
        for group in &rec.fields {
            out.push_str(&self.render_declaration(&group.idents, indent, false));
        }
        out
    }

    pub(crate) fn formal_parameter_list(&self, params: &[Rc<Ident>]) -> String {
        params
            .iter()
            .map(|param| self.formal_parameter(param))
            .collect::<Vec<String>>()
            .join(", ")
    }

    fn formal_parameter(&self, param: &Rc<Ident>) -> String {
        let ty = param.ty();
        let self_ref = self.is_declared_self(ty);
        let mut out = String::new();
        match param.kind {
            IdentKind::ValueParam => {
                if ty.is_array() || ty.is_record() {
                    out.push_str("const ");
                }
                if ty.is_record() || self_ref {
                    out.push_str("struct ");
                }
                if ty.is_open_array() {
                    out.push_str(&self.open_array_parameter(param));
                } else {
                    if ty.is_record() {
                        // The struct tag is the unaliased declaring name.
                        out.push_str(&self.ident(&self.desc_ident(ty)));
                    } else {
                        out.push_str(&self.type_name(ty));
                    }
                    out.push(' ');
                    if ty.is_record() || self_ref {
                        out.push('*');
                    }
                    out.push_str(&self.ident(param));
                }
            }
            IdentKind::VarParam => {
                if self_ref {
                    out.push_str("struct ");
                }
                if ty.is_open_array() {
                    out.push_str(&self.open_array_parameter(param));
                } else {
                    out.push_str(&self.type_name(ty));
                    out.push(' ');
                    if !ty.is_array() {
                        out.push('*');
                    }
                    if ty.is_pointer() && self_ref {
                        out.push('*');
                    }
                    out.push_str(&self.ident(param));
                    if ty.is_record() {
                        // The caller's actual descriptor crosses the call
                        // boundary for dynamic tests on this parameter.
                        out.push_str(&format!(", const NORN_Td *{}td", self.ident(param)));
                    }
                }
            }
            _ => panic!(
                "formal parameter {} has kind {:?}",
                param.name, param.kind
            ),
        }
        out
    }

    /// An open array passes as element pointer plus one hidden length per
    /// dimension.
    fn open_array_parameter(&self, param: &Rc<Ident>) -> String {
        let ty = param.ty();
        let mut elem = Type::structure_of(ty).element_type().clone();
        let mut ndims = 1;
        while elem.is_array() {
            let next = Type::structure_of(&elem).element_type().clone();
            elem = next;
            ndims += 1;
        }
        let name = self.ident(param);
        let mut out = format!("{} {}[]", self.type_name(&elem), name);
        for dim in 0..ndims {
            out.push_str(&format!(", NORN_INTEGER {}len", name));
            if dim > 0 {
                out.push_str(&dim.to_string());
            }
        }
        out
    }

    fn is_declared_self(&self, ty: &Type) -> bool {
        match (ty, &self.declared_type) {
            (Type::Named(target), Some(declared)) => Rc::ptr_eq(target, declared),
            _ => false,
        }
    }
}

fn storage_class(ident: &Rc<Ident>, header: bool) -> &'static str {
    if ident.kind == IdentKind::Type {
        return "typedef ";
    }
    if ident.kind == IdentKind::Var && !ident.local {
        if header {
            return "extern ";
        }
        if !ident.exported {
            return "static ";
        }
    }
    ""
}

/// Structural types that need a nameable stand-in before they can appear
/// in the interface unit.
fn name_equivalence_needed(ty: &Type) -> bool {
    match ty {
        Type::Array { elem, .. } => name_equivalence_needed(elem),
        Type::Record(_) => true,
        Type::Pointer(p) => matches!(&**p.base(), Type::Record(_)),
        _ => false,
    }
}
