//! Identifier rendering.
//!
//! Output names are deterministic and collision-free across the linked
//! program: module-level exports are qualified with the module name, local
//! procedures carry their lexical path, and everything else gets a trailing
//! underscore to stay clear of C keywords and runtime names.

use super::{tabs, Generator};
use crate::ast::{Ident, IdentKind};
use crate::types::Type;
use std::rc::Rc;

impl Generator {
    pub(crate) fn ident(&self, ident: &Rc<Ident>) -> String {
        if ident.kind == IdentKind::Type && ident.ty().is_basic() {
            return c_basic_name(ident.ty().structure()).to_string();
        }
        if ident.internal {
            return ident.name.clone();
        }
        if self.module_prefix_needed(ident) {
            return format!("{}__{}_", self.module_name, ident.name);
        }
        if ident.kind == IdentKind::Type && ident.local && ident.ty().is_record() {
            // A record type shadowing a module-level type of the same name
            // must not capture references to the global heap layout needed
            // by NEW.
            return format!("{}_Local", ident.name);
        }
        if ident.kind == IdentKind::Proc && ident.local {
            return self.local_proc_ident(ident);
        }
        format!("{}_", ident.name.replace('.', "__"))
    }

    pub(crate) fn module_prefix_needed(&self, ident: &Rc<Ident>) -> bool {
        let indirectly_imported = !ident.imported && ident.name.contains('.');
        let global = !ident.local;
        let is_type = ident.kind == IdentKind::Type;
        let is_field = ident.kind == IdentKind::Field;
        !self.cfg.entry_point
            && !ident.imported
            && !indirectly_imported
            && ((ident.exported && !is_field) || (global && is_type))
    }

    /// Dot-free lexical path of a local procedure: the names of all
    /// enclosing local-procedure frames, then `<name>_Local`. A name found
    /// in the innermost frame's children set refers to a child and keeps
    /// the full path; anything else is a sibling or self and drops the
    /// innermost frame.
    fn local_proc_ident(&self, ident: &Rc<Ident>) -> String {
        let top = self
            .frames
            .last()
            .expect("local procedure referenced outside any procedure declaration");
        let upto = if top.children.contains(&ident.name) {
            self.frames.len()
        } else {
            self.frames.len() - 1
        };
        let mut out = String::new();
        for frame in &self.frames[..upto] {
            out.push_str(&frame.ident.name);
            out.push('_');
        }
        out.push_str(&ident.name);
        out.push_str("_Local");
        out
    }

    /// `#define` wrappers keyed on the sanitized directory prefix, guarding
    /// externally linked symbols against same-name modules from other
    /// directories.
    pub(crate) fn symbol_macros(&self, idents: &[Rc<Ident>], suffix: &str, indent: usize) -> String {
        if self.dir_prefix.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        for ident in idents {
            let name = self.ident(ident);
            out.push_str(&format!(
                "{}#define {1}{2} {3}_{1}{2}\n",
                tabs(indent),
                name,
                suffix,
                self.dir_prefix
            ));
        }
        out
    }

    /// The C spelling of a type reference: a named type's output name, a
    /// basic type's C type, or a pointer spelled through its pointee.
    pub(crate) fn type_name(&self, ty: &Rc<Type>) -> String {
        match &**ty {
            Type::Named(ident) => self.ident(ident),
            Type::Record(r) => self.ident(r.desc_ident()),
            Type::Pointer(p) => match &**p.base() {
                Type::Named(ident) => format!("{} *", self.ident(ident)),
                Type::Record(r) => format!("struct {} *", self.ident(r.desc_ident())),
                _ => panic!("pointer type has no C spelling"),
            },
            t if t.is_basic() => c_basic_name(t).to_string(),
            _ => panic!("type {:?} used where a named type is required", ty),
        }
    }
}

pub(crate) fn c_basic_name(ty: &Type) -> &'static str {
    match ty {
        Type::Boolean => "int",
        Type::Char => "char",
        Type::Integer => "NORN_INTEGER",
        Type::Real => "NORN_REAL",
        Type::Byte => "unsigned char",
        Type::Set => "unsigned NORN_INTEGER",
        _ => panic!("type {:?} is not a basic type", ty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::proc_ident;
    use crate::generate::Config;
    use crate::types;

    fn generator() -> Generator {
        let mut cfg = Config::new("Shapes.norn", false);
        cfg.dir_prefix = Some(String::new());
        Generator::new(cfg)
    }

    #[test]
    fn exported_idents_carry_the_module_qualifier() {
        let gen = generator();
        let ident = Ident::new("Area", IdentKind::Proc)
            .typed(types::procedure(vec![], Some(types::integer())))
            .exported()
            .build();
        assert_eq!(gen.ident(&ident), "Shapes__Area_");
    }

    #[test]
    fn module_global_types_are_qualified_even_unexported() {
        let gen = generator();
        let ident = Ident::type_decl("Point", types::record(None, vec![]));
        assert_eq!(gen.ident(&ident), "Shapes__Point_");
    }

    #[test]
    fn plain_locals_get_a_trailing_underscore() {
        let gen = generator();
        let ident = Ident::new("count", IdentKind::Var)
            .typed(types::integer())
            .local()
            .build();
        assert_eq!(gen.ident(&ident), "count_");
    }

    #[test]
    fn imported_names_replace_dots() {
        let gen = generator();
        let ident = Ident::new("Geo.Origin", IdentKind::Var)
            .typed(types::integer())
            .imported()
            .exported()
            .build();
        assert_eq!(gen.ident(&ident), "Geo__Origin_");
    }

    #[test]
    fn internal_idents_render_verbatim() {
        let gen = generator();
        let ident = Ident::new("Shapes_T0", IdentKind::Type)
            .typed(types::record(None, vec![]))
            .internal()
            .build();
        assert_eq!(gen.ident(&ident), "Shapes_T0");
    }

    #[test]
    fn basic_type_aliases_render_as_the_c_type() {
        let gen = generator();
        let ident = Ident::new("Length", IdentKind::Type)
            .typed(types::integer())
            .build();
        assert_eq!(gen.ident(&ident), "NORN_INTEGER");
    }

    #[test]
    fn shadowing_local_record_type_gets_the_local_suffix() {
        let gen = generator();
        let ident = Ident::new("T", IdentKind::Type)
            .typed(types::record(None, vec![]))
            .local()
            .build();
        assert_eq!(gen.ident(&ident), "T_Local");
    }

    #[test]
    fn local_procedures_render_their_lexical_path() {
        let mut gen = generator();
        let outer = proc_ident("Outer", vec![], None);
        let inner = Ident::new("Inner", IdentKind::Proc)
            .typed(types::procedure(vec![], None))
            .local()
            .build();
        gen.procedure_heading(&outer);
        gen.procedure_heading(&inner);
        // Self reference inside Inner.
        assert_eq!(gen.ident(&inner), "Outer_Inner_Local");
        gen.procedure_end(&inner);
        // Sibling-level reference inside Outer.
        assert_eq!(gen.ident(&inner), "Outer_Inner_Local");
        gen.procedure_end(&outer);
    }

    #[test]
    fn symbol_macros_wrap_external_names() {
        let mut cfg = Config::new("Shapes.norn", false);
        cfg.dir_prefix = Some("pkg".to_string());
        let gen = Generator::new(cfg);
        let ident = Ident::new("Origin", IdentKind::Var)
            .typed(types::integer())
            .exported()
            .build();
        assert_eq!(
            gen.symbol_macros(&[ident], "", 0),
            "#define Shapes__Origin_ pkg_Shapes__Origin_\n"
        );
    }
}
